//! Input normalisation: scalars and arrays of any rank into N-d arrays.

use chrono::{DateTime, Utc};
use ndarray::{arr0, Array, Array1, ArrayD, Axis, Dimension, Ix1};

use crate::error::{MsisError, Result};

/// Owned N-d input value, built from scalars, vectors or ndarray arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct NdInput<T>(pub ArrayD<T>);

impl<T> NdInput<T> {
    pub fn into_inner(self) -> ArrayD<T> {
        self.0
    }
}

impl From<f64> for NdInput<f64> {
    fn from(value: f64) -> Self {
        Self(arr0(value).into_dyn())
    }
}

impl From<i32> for NdInput<f64> {
    fn from(value: i32) -> Self {
        Self(arr0(f64::from(value)).into_dyn())
    }
}

impl From<DateTime<Utc>> for NdInput<DateTime<Utc>> {
    fn from(value: DateTime<Utc>) -> Self {
        Self(arr0(value).into_dyn())
    }
}

impl<T> From<Vec<T>> for NdInput<T> {
    fn from(values: Vec<T>) -> Self {
        Self(Array1::from_vec(values).into_dyn())
    }
}

impl<T: Clone> From<&[T]> for NdInput<T> {
    fn from(values: &[T]) -> Self {
        Self(Array1::from_vec(values.to_vec()).into_dyn())
    }
}

impl<T, D: Dimension> From<Array<T, D>> for NdInput<T> {
    fn from(values: Array<T, D>) -> Self {
        Self(values.into_dyn())
    }
}

/// Coerces `a` to at least 1-D and rejects ranks above `max_ndim`.
pub fn check_nd<T>(a: ArrayD<T>, max_ndim: usize) -> Result<ArrayD<T>> {
    let a = if a.ndim() == 0 {
        a.insert_axis(Axis(0))
    } else {
        a
    };
    if a.ndim() > max_ndim {
        return Err(MsisError::InvalidShape {
            ndim: a.ndim(),
            max_ndim,
        });
    }
    Ok(a)
}

/// Normalises a grid axis: a scalar or a non-empty 1-D sequence.
pub fn check_axis<T>(a: ArrayD<T>) -> Result<Array1<T>> {
    let a = check_nd(a, 1)?
        .into_dimensionality::<Ix1>()
        .map_err(|e| MsisError::shape_mismatch("axis", &[], e.to_string()))?;
    if a.is_empty() {
        return Err(MsisError::shape_mismatch("axis", &[0], "at least one element"));
    }
    Ok(a)
}
