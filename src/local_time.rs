//! Local solar time on the (time, lon) plane.
//!
//! Either computed from the timestamps and longitudes, or taken from an
//! override that may be a scalar, a 1-D array along time or longitude, or a
//! 2-D array in (time, lon) or (lon, time) order.
//!
//! Layout detection follows a fixed priority:
//! - 1-D: a length equal to the longitude axis means "per longitude",
//!   otherwise it must be 1 or the time axis length ("per time").
//! - 2-D: (lon, time) is tried first and transposed; otherwise the array
//!   must fit (time, lon).
//!
//! When the two axis sizes coincide both readings fit; the priority above
//! decides and a warning is logged.

use chrono::{DateTime, Timelike, Utc};
use ndarray::{Array2, ArrayD, ArrayView1, Axis, Ix1, Ix2};

use crate::error::{MsisError, Result};
use crate::shape::check_nd;

/// How an override array was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LstLayout {
    /// 1-D, indexed by longitude, repeated for every time.
    PerLongitude,
    /// 1-D, indexed by time (or a single value), repeated for every longitude.
    PerTime,
    /// 2-D in (lon, time) order, transposed before use.
    LonTime,
    /// 2-D already in (time, lon) order.
    TimeLon,
}

fn fits(n: usize, axis: usize) -> bool {
    n == 1 || n == axis
}

/// Picks the layout of an override with `shape` for axes of sizes
/// `n_time` and `n_lon`.
pub fn detect_layout(shape: &[usize], n_time: usize, n_lon: usize) -> Result<LstLayout> {
    match *shape {
        [n] => {
            if n == n_lon {
                if n == n_time && n > 1 {
                    tracing::warn!(
                        n,
                        "1-D local time matches both time and lon axes, using lon"
                    );
                }
                Ok(LstLayout::PerLongitude)
            } else if fits(n, n_time) {
                Ok(LstLayout::PerTime)
            } else {
                Err(MsisError::shape_mismatch(
                    "lst",
                    shape,
                    format!("lon ({n_lon},) or time ({n_time},)"),
                ))
            }
        }
        [a, b] => {
            let lon_time = fits(a, n_lon) && fits(b, n_time);
            let time_lon = fits(a, n_time) && fits(b, n_lon);
            if lon_time {
                if time_lon && (a > 1 || b > 1) {
                    tracing::warn!(
                        ?shape,
                        "2-D local time fits (lon, time) and (time, lon), using (lon, time)"
                    );
                }
                Ok(LstLayout::LonTime)
            } else if time_lon {
                Ok(LstLayout::TimeLon)
            } else {
                Err(MsisError::shape_mismatch(
                    "lst",
                    shape,
                    format!("(time, lon) = ({n_time}, {n_lon}) or its transpose"),
                ))
            }
        }
        _ => Err(MsisError::InvalidShape {
            ndim: shape.len(),
            max_ndim: 2,
        }),
    }
}

/// Validates an override and broadcasts it to `(n_time, n_lon)`.
pub fn check_lst(lst: ArrayD<f64>, n_time: usize, n_lon: usize) -> Result<Array2<f64>> {
    let lst = check_nd(lst, 2)?;
    let shape = lst.shape().to_vec();
    let shape_err = |e: ndarray::ShapeError| MsisError::shape_mismatch("lst", &shape, e.to_string());
    let lst = match detect_layout(&shape, n_time, n_lon)? {
        LstLayout::PerLongitude => lst
            .into_dimensionality::<Ix1>()
            .map_err(shape_err)?
            .insert_axis(Axis(0)),
        LstLayout::PerTime => lst
            .into_dimensionality::<Ix1>()
            .map_err(shape_err)?
            .insert_axis(Axis(1)),
        LstLayout::LonTime => lst
            .into_dimensionality::<Ix2>()
            .map_err(shape_err)?
            .reversed_axes(),
        LstLayout::TimeLon => lst.into_dimensionality::<Ix2>().map_err(shape_err)?,
    };
    lst.broadcast((n_time, n_lon))
        .map(|v| v.to_owned())
        .ok_or_else(|| {
            MsisError::shape_mismatch("lst", lst.shape(), format!("({n_time}, {n_lon})"))
        })
}

/// Mean local solar time [h] from whole seconds, as reported in the dataset.
pub fn mean_solar_hour(t: &DateTime<Utc>, lon: f64) -> f64 {
    f64::from(t.hour())
        + f64::from(t.minute()) / 60.0
        + f64::from(t.second()) / 3600.0
        + lon / 15.0
}

/// Mean local solar time for every (time, lon) pair.
///
/// Sub-second parts are dropped; the point model itself derives lst from
/// the full timestamp.
pub fn compute_lst(times: ArrayView1<DateTime<Utc>>, lon: ArrayView1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((times.len(), lon.len()), |(i, l)| {
        mean_solar_hour(&times[i], lon[l])
    })
}

/// Local solar time field of shape `(times.len(), lon.len())`.
pub fn resolve_lst(
    lst: Option<ArrayD<f64>>,
    times: ArrayView1<DateTime<Utc>>,
    lon: ArrayView1<f64>,
) -> Result<Array2<f64>> {
    match lst {
        Some(lst) => check_lst(lst, times.len(), lon.len()),
        None => Ok(compute_lst(times, lon)),
    }
}
