//! Atmospheric scale height from altitude, latitude, molecular mass and
//! temperature.

use ndarray::{ArrayD, ArrayViewD, IxDyn, Zip};

use crate::error::{MsisError, Result};
use crate::vectorize::broadcast_shapes;

/// Molar gas constant [J / K / mol].
const R_GAS: f64 = 8.31446261815324;
const DEG_TO_RAD: f64 = 1.7453292519943295e-2;

/// Scale height in [m].
///
/// `alt` in [km], `lat` geodetic in [degrees N], `molw` in [kg / mol],
/// `temp` in [K]. The molecular mass can be derived from a model output as
/// total mass density over the sum of number densities times Avogadro's
/// constant.
pub fn scale_height(alt: f64, lat: f64, molw: f64, temp: f64) -> f64 {
    let c2 = (2.0 * DEG_TO_RAD * lat).cos();
    let g_surf = 9.80665 * (1.0 - 0.0026373 * c2);
    // effective earth radius [km]
    let r_e = 2.0 * g_surf / (3.085462e-6 + 2.27e-9 * c2) * 1.0e-3;
    let g = g_surf / (1.0 + alt / r_e).powi(2);
    R_GAS * temp / (g * molw)
}

/// Broadcasting form of [`scale_height`], evaluated in parallel.
pub fn scale_height_nd(
    alt: ArrayViewD<f64>,
    lat: ArrayViewD<f64>,
    molw: ArrayViewD<f64>,
    temp: ArrayViewD<f64>,
) -> Result<ArrayD<f64>> {
    let shape = broadcast_shapes(&[alt.shape(), lat.shape(), molw.shape(), temp.shape()])?;
    let alt = broadcast_to(&alt, &shape)?;
    let lat = broadcast_to(&lat, &shape)?;
    let molw = broadcast_to(&molw, &shape)?;
    let temp = broadcast_to(&temp, &shape)?;

    Ok(Zip::from(&alt)
        .and(&lat)
        .and(&molw)
        .and(&temp)
        .par_map_collect(|&a, &l, &m, &t| scale_height(a, l, m, t)))
}

fn broadcast_to<'a>(a: &'a ArrayViewD<'_, f64>, shape: &[usize]) -> Result<ArrayViewD<'a, f64>> {
    a.broadcast(IxDyn(shape))
        .ok_or_else(|| MsisError::shape_mismatch("argument", a.shape(), format!("{shape:?}")))
}
