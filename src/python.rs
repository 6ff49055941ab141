//! Python surface: grid evaluation over a Python point-model callable.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use numpy::{AllowTypeChange, IntoPyArray, PyArrayDyn, PyArrayLikeDyn};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyTuple};

use crate::dataset::Dataset;
use crate::drivers::{DailyIndexTable, DailyIndices, DriverTable};
use crate::error::{MsisError, Result};
use crate::grid::{self, GridOptions, GridRequest};
use crate::model::{
    Aux, AuxKeyword, Method, PointInput, PointModel, PointOutput, N_DENSITIES, N_TEMPERATURES,
};
use crate::scale_height::scale_height_nd;
use crate::shape::NdInput;

/// Point model backed by Python callables with the
/// `f(year, doy, sec, alt, g_lat, g_long, lst, f107A, f107, ap, ap_a=, flags=)`
/// signature, returning `(densities[9], temperatures[2])`.
pub struct PyKernel {
    gtd7: Py<PyAny>,
    gtd7d: Option<Py<PyAny>>,
}

impl PyKernel {
    fn callable(&self, method: Method) -> Result<&Py<PyAny>> {
        match method {
            Method::Gtd7 => Ok(&self.gtd7),
            Method::Gtd7d => self
                .gtd7d
                .as_ref()
                .ok_or_else(|| MsisError::Model("no gtd7d callable given".into())),
        }
    }

    fn call(
        &self,
        py: Python<'_>,
        method: Method,
        input: &PointInput,
        aux: &Aux,
    ) -> PyResult<PointOutput> {
        let args = (
            input.year,
            input.doy,
            input.sec,
            input.alt,
            input.g_lat,
            input.g_long,
            input.lst,
            input.f107a,
            input.f107,
            input.ap,
        );
        let kwargs = PyDict::new(py);
        for kw in aux.keywords() {
            match kw {
                AuxKeyword::ApA(ap_a) => kwargs.set_item(kw.name(), ap_a.0.to_vec())?,
                AuxKeyword::Flags(flags) => kwargs.set_item(kw.name(), flags.0.to_vec())?,
            }
        }

        let callable = self.callable(method).map_err(PyErr::from)?;
        let (d, t): (Vec<f64>, Vec<f64>) = callable.bind(py).call(args, Some(&kwargs))?.extract()?;
        let d = d.try_into().map_err(|d: Vec<f64>| {
            PyValueError::new_err(format!("expected {N_DENSITIES} densities, got {}", d.len()))
        })?;
        let t = t.try_into().map_err(|t: Vec<f64>| {
            PyValueError::new_err(format!("expected {N_TEMPERATURES} temperatures, got {}", t.len()))
        })?;
        Ok(PointOutput { d, t })
    }
}

impl PointModel for PyKernel {
    fn evaluate(&self, method: Method, input: &PointInput, aux: &Aux) -> Result<PointOutput> {
        Python::with_gil(|py| self.call(py, method, input, aux))
            .map_err(|e| MsisError::Model(e.to_string()))
    }
}

/// Aware datetimes are converted to UTC, naive ones are taken as UTC.
fn extract_time(obj: &Bound<'_, PyAny>) -> PyResult<DateTime<Utc>> {
    obj.extract::<DateTime<FixedOffset>>()
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| obj.extract::<NaiveDateTime>().map(|t| t.and_utc()))
}

/// A single datetime or a sequence of datetimes.
fn extract_times(obj: &Bound<'_, PyAny>) -> PyResult<NdInput<DateTime<Utc>>> {
    if let Ok(items) = obj.extract::<Vec<Bound<'_, PyAny>>>() {
        let times = items.iter().map(extract_time).collect::<PyResult<Vec<_>>>()?;
        return Ok(NdInput::from(times));
    }
    Ok(NdInput::from(extract_time(obj)?))
}

fn nd(values: PyArrayLikeDyn<'_, f64, AllowTypeChange>) -> NdInput<f64> {
    NdInput(values.as_array().to_owned())
}

fn variable<'py>(
    py: Python<'py>,
    dims: &[&str],
    data: Bound<'py, PyAny>,
    attrs: Option<(&str, &str)>,
) -> PyResult<Bound<'py, PyDict>> {
    let var = PyDict::new(py);
    var.set_item("dims", PyTuple::new(py, dims.iter().copied())?)?;
    var.set_item("data", data)?;
    if let Some((long_name, units)) = attrs {
        let a = PyDict::new(py);
        a.set_item("long_name", long_name)?;
        a.set_item("units", units)?;
        var.set_item("attrs", a)?;
    }
    Ok(var)
}

/// Dict layout accepted by `xarray.Dataset.from_dict`.
fn dataset_to_dict<'py>(py: Python<'py>, ds: Dataset) -> PyResult<Bound<'py, PyDict>> {
    let coords = PyDict::new(py);
    let times: Vec<NaiveDateTime> = ds.coords.time.iter().map(|t| t.naive_utc()).collect();
    coords.set_item("time", variable(py, &["time"], times.into_pyobject(py)?.into_any(), None)?)?;
    for (name, axis) in [("alt", &ds.coords.alt), ("lat", &ds.coords.lat), ("lon", &ds.coords.lon)] {
        let data = axis.clone().into_pyarray(py).into_any();
        coords.set_item(name, variable(py, &[name], data, None)?)?;
    }

    let data_vars = PyDict::new(py);
    for var in ds.data_vars() {
        let data = var.data.clone().into_pyarray(py).into_any();
        let entry = variable(py, &var.dims, data, Some((var.long_name, var.units)))?;
        data_vars.set_item(var.name, entry)?;
    }

    let out = PyDict::new(py);
    out.set_item("coords", coords)?;
    out.set_item("data_vars", data_vars)?;
    Ok(out)
}

/// Model atmosphere on the (time, alt, lat, lon) outer-product grid.
///
/// `gtd7` (and `gtd7d` for `method="gtd7d"`) are called once per grid cell.
/// Missing drivers are looked up in `drivers`, a list of
/// `(date, Apavg, f107_obs, f107_81ctr_obs)` rows. Returns a dict for
/// `xarray.Dataset.from_dict`.
#[pyfunction]
#[pyo3(signature = (
    gtd7, time, alt, lat, lon,
    f107a=None, f107=None, ap=None, lst=None, ap_a=None, flags=None,
    method="gtd7", drivers=None, gtd7d=None,
))]
#[allow(clippy::too_many_arguments)]
pub fn msise_4d<'py>(
    py: Python<'py>,
    gtd7: Py<PyAny>,
    time: &Bound<'py, PyAny>,
    alt: PyArrayLikeDyn<'py, f64, AllowTypeChange>,
    lat: PyArrayLikeDyn<'py, f64, AllowTypeChange>,
    lon: PyArrayLikeDyn<'py, f64, AllowTypeChange>,
    f107a: Option<PyArrayLikeDyn<'py, f64, AllowTypeChange>>,
    f107: Option<PyArrayLikeDyn<'py, f64, AllowTypeChange>>,
    ap: Option<PyArrayLikeDyn<'py, f64, AllowTypeChange>>,
    lst: Option<PyArrayLikeDyn<'py, f64, AllowTypeChange>>,
    ap_a: Option<&Bound<'py, PyAny>>,
    flags: Option<&Bound<'py, PyAny>>,
    method: &str,
    drivers: Option<Vec<(NaiveDate, f64, f64, f64)>>,
    gtd7d: Option<Py<PyAny>>,
) -> PyResult<Bound<'py, PyDict>> {
    let options = GridOptions {
        method: method.parse::<Method>()?,
        ..GridOptions::default()
    };
    let mut request = GridRequest::new(extract_times(time)?, nd(alt), nd(lat), nd(lon));
    request.f107a = f107a.map(nd);
    request.f107 = f107.map(nd);
    request.ap = ap.map(nd);
    request.lst = lst.map(nd);
    request.aux.ap_a = ap_a
        .map(|a| a.extract::<Vec<f64>>())
        .transpose()
        .map_err(|_| MsisError::auxiliary("ap list has invalid element, must be float"))?;
    request.aux.flags = flags
        .map(|f| f.extract::<Vec<i64>>())
        .transpose()
        .map_err(|_| MsisError::auxiliary("flags list has invalid element, must be int"))?;

    let table = drivers.map(|rows| {
        DailyIndexTable::from_records(rows.into_iter().map(|(date, ap_avg, f107_obs, f107_81ctr_obs)| {
            DailyIndices {
                date,
                ap_avg,
                f107_obs,
                f107_81ctr_obs,
            }
        }))
    });

    let kernel = PyKernel { gtd7, gtd7d };
    let ds = py.allow_threads(|| {
        grid::msise_4d(
            &kernel,
            request,
            table.as_ref().map(|t| t as &dyn DriverTable),
            &options,
        )
    })?;
    dataset_to_dict(py, ds)
}

/// Atmospheric scale height in [m], broadcasting over its arguments.
#[pyfunction]
pub fn scale_height<'py>(
    py: Python<'py>,
    alt: PyArrayLikeDyn<'py, f64, AllowTypeChange>,
    lat: PyArrayLikeDyn<'py, f64, AllowTypeChange>,
    molw: PyArrayLikeDyn<'py, f64, AllowTypeChange>,
    temp: PyArrayLikeDyn<'py, f64, AllowTypeChange>,
) -> PyResult<Bound<'py, PyArrayDyn<f64>>> {
    let h = scale_height_nd(alt.as_array(), lat.as_array(), molw.as_array(), temp.as_array())?;
    Ok(h.into_pyarray(py))
}
