//! Error types for grid evaluation.

use chrono::NaiveDate;
use thiserror::Error;

use crate::drivers::DriverIndex;

/// Errors raised while assembling or evaluating a model grid.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MsisError {
    /// An axis or override array has a higher rank than supported.
    #[error(
        "Only scalars and up to {max_ndim}-D arrays are currently supported, \
         got {ndim} dimensional array."
    )]
    InvalidShape { ndim: usize, max_ndim: usize },

    /// An array fits none of the accepted layouts.
    #[error("{what} with shape {shape:?} is incompatible with {expected}")]
    ShapeMismatch {
        what: String,
        shape: Vec<usize>,
        expected: String,
    },

    /// Wrong length or element type of `ap_a` or `flags`.
    #[error("{0}")]
    AuxiliaryArray(String),

    /// No explicit value and no driver table to look it up in.
    #[error("no {index} values given and no driver table available")]
    MissingDriver { index: DriverIndex },

    /// The driver table has no entry for the requested day.
    #[error("no {index} value available for {day}")]
    DriverUnavailable { index: DriverIndex, day: NaiveDate },

    /// Failure reported by the point-wise model.
    #[error("point model failed: {0}")]
    Model(String),
}

impl MsisError {
    pub fn shape_mismatch(
        what: impl Into<String>,
        shape: &[usize],
        expected: impl Into<String>,
    ) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            shape: shape.to_vec(),
            expected: expected.into(),
        }
    }

    pub fn auxiliary(msg: impl Into<String>) -> Self {
        Self::AuxiliaryArray(msg.into())
    }
}

#[cfg(feature = "python")]
impl From<MsisError> for pyo3::PyErr {
    fn from(err: MsisError) -> Self {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, MsisError>;
