//! NRLMSISE-00 style model atmosphere on time × altitude × latitude ×
//! longitude grids.
//!
//! The point-wise model is pluggable through [`PointModel`]; this crate
//! handles input normalisation, driver lookup, local solar time, parallel
//! broadcasting evaluation and assembly of the labelled [`Dataset`].

pub mod dataset;
pub mod drivers;
pub mod error;
pub mod grid;
pub mod local_time;
pub mod model;
pub mod scale_height;
pub mod shape;
pub mod vectorize;

#[cfg(feature = "python")]
mod python;
#[cfg(test)]
mod test_support;

pub use dataset::{Coords, Dataset, OutputField, Variable, MSIS_OUTPUT};
pub use drivers::{DailyIndexTable, DailyIndices, DriverIndex, DriverTable};
pub use error::{MsisError, Result};
pub use grid::{msise_4d, DriverOffsets, GridOptions, GridRequest};
pub use model::{msise_model, Aux, AuxArgs, Method, PointInput, PointModel, PointOutput};
pub use shape::NdInput;
pub use vectorize::{gtd7_flat, gtd7d_flat, msise_flat, FlatArgs, MsisArgs};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn msisgrid(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    register_grid_module(py_module)?;
    register_utils_module(py_module)?;

    py_module.add("__doc__", "Model atmosphere grids implemented in Rust.")?;

    Ok(())
}

#[cfg(feature = "python")]
fn register_grid_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "grid")?;
    submodule.add("__doc__", "4-D (time, alt, lat, lon) model evaluation.")?;
    submodule.add_function(wrap_pyfunction!(python::msise_4d, &submodule)?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}

#[cfg(feature = "python")]
fn register_utils_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "utils")?;
    submodule.add("__doc__", "Atmospheric helpers.")?;
    submodule.add_function(wrap_pyfunction!(python::scale_height, &submodule)?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}
