//! Labelled 4-D result of a grid evaluation.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Array4, ArrayD, ArrayView1, ArrayView2, ArrayView4, Ix1, Ix2, Ix4};

use crate::drivers::DriverIndex;

/// Name, long name and unit of one model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputField {
    pub name: &'static str,
    pub long_name: &'static str,
    pub units: &'static str,
}

const fn field(name: &'static str, long_name: &'static str, units: &'static str) -> OutputField {
    OutputField {
        name,
        long_name,
        units,
    }
}

/// Model outputs in the order of the flattened output vector.
pub const MSIS_OUTPUT: [OutputField; 11] = [
    field("He", "He number density", "cm^-3"),
    field("O", "O number density", "cm^-3"),
    field("N2", "N2 number density", "cm^-3"),
    field("O2", "O2 number density", "cm^-3"),
    field("Ar", "AR number density", "cm^-3"),
    // includes AnomO with gtd7d
    field("rho", "total mass density", "g cm^-3"),
    field("H", "H number density", "cm^-3"),
    field("N", "N number density", "cm^-3"),
    field("AnomO", "Anomalous oxygen number density", "cm^-3"),
    field("Texo", "Exospheric temperature", "K"),
    field("Talt", "Temperature at alt", "K"),
];

pub const LST_FIELD: OutputField = field("lst", "Mean Local Solar Time", "h");

/// Dimension names of the 4-D variables.
pub const GRID_DIMS: [&str; 4] = ["time", "alt", "lat", "lon"];

/// A named array with its dimension names and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: &'static str,
    pub dims: Vec<&'static str>,
    pub data: ArrayD<f64>,
    pub long_name: &'static str,
    pub units: &'static str,
}

impl Variable {
    fn new(meta: OutputField, dims: &[&'static str], data: ArrayD<f64>) -> Self {
        Self {
            name: meta.name,
            dims: dims.to_vec(),
            data,
            long_name: meta.long_name,
            units: meta.units,
        }
    }
}

/// Coordinate axes of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Coords {
    pub time: Array1<DateTime<Utc>>,
    pub alt: Array1<f64>,
    pub lat: Array1<f64>,
    pub lon: Array1<f64>,
}

impl Coords {
    /// Sizes (I, J, K, L) of the outer-product grid.
    pub fn shape(&self) -> [usize; 4] {
        [self.time.len(), self.alt.len(), self.lat.len(), self.lon.len()]
    }
}

/// Model atmosphere on a (time, alt, lat, lon) grid.
///
/// Holds the 11 model outputs shaped (time, alt, lat, lon), the local solar
/// time shaped (time, lon) and the driver values shaped (time,).
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub coords: Coords,
    data_vars: Vec<Variable>,
}

impl Dataset {
    /// `drivers` are ordered as [`DriverIndex::ALL`].
    pub(crate) fn new(
        coords: Coords,
        outputs: Vec<Array4<f64>>,
        lst: Array2<f64>,
        drivers: Vec<Array1<f64>>,
    ) -> Self {
        let mut data_vars: Vec<Variable> = MSIS_OUTPUT
            .iter()
            .zip(outputs)
            .map(|(meta, data)| Variable::new(*meta, &GRID_DIMS, data.into_dyn()))
            .collect();
        data_vars.push(Variable::new(LST_FIELD, &["time", "lon"], lst.into_dyn()));
        for (index, data) in DriverIndex::ALL.into_iter().zip(drivers) {
            let meta = field(index.name(), index.long_name(), index.units());
            data_vars.push(Variable::new(meta, &["time"], data.into_dyn()));
        }
        Self { coords, data_vars }
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.data_vars.iter().find(|v| v.name == name)
    }

    /// One of the 4-D model outputs, e.g. `"rho"`.
    pub fn output(&self, name: &str) -> Option<ArrayView4<'_, f64>> {
        self.get(name)?.data.view().into_dimensionality::<Ix4>().ok()
    }

    /// Local solar time, shaped (time, lon).
    pub fn lst(&self) -> Option<ArrayView2<'_, f64>> {
        self.get(LST_FIELD.name)?.data.view().into_dimensionality::<Ix2>().ok()
    }

    /// Driver values used, shaped (time,).
    pub fn driver(&self, index: DriverIndex) -> Option<ArrayView1<'_, f64>> {
        self.get(index.name())?.data.view().into_dimensionality::<Ix1>().ok()
    }

    pub fn data_vars(&self) -> &[Variable] {
        &self.data_vars
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_vars.iter().map(|v| v.name)
    }

    /// Dimension sizes by name.
    pub fn dims(&self) -> [(&'static str, usize); 4] {
        let shape = self.coords.shape();
        [
            (GRID_DIMS[0], shape[0]),
            (GRID_DIMS[1], shape[1]),
            (GRID_DIMS[2], shape[2]),
            (GRID_DIMS[3], shape[3]),
        ]
    }
}
