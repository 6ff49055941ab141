//! Contract of the point-wise atmosphere model.
//!
//! The physics kernel is external: anything implementing [`PointModel`]
//! maps one space-time point to 9 densities and 2 temperatures. This module
//! owns the argument types, validation of the two auxiliary arrays, and the
//! single-point call that converts a UTC timestamp to model arguments.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MsisError, Result};

/// Number of densities returned per point.
pub const N_DENSITIES: usize = 9;
/// Number of temperatures returned per point.
pub const N_TEMPERATURES: usize = 2;
/// Length of the flattened output vector.
pub const N_OUTPUT: usize = N_DENSITIES + N_TEMPERATURES;

/// Length of the Ap history array.
pub const AP_ARRAY_LEN: usize = 7;
/// Number of model switches.
pub const N_SWITCHES: usize = 24;

/// Which native routine computes the total mass density.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Total mass density without anomalous oxygen.
    #[default]
    Gtd7,
    /// Total mass density including anomalous oxygen.
    Gtd7d,
}

impl std::str::FromStr for Method {
    type Err = MsisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gtd7" => Ok(Method::Gtd7),
            "gtd7d" => Ok(Method::Gtd7d),
            other => Err(MsisError::Model(format!(
                "unknown method {other:?}, expected \"gtd7\" or \"gtd7d\""
            ))),
        }
    }
}

/// Scalar arguments of one model evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointInput {
    /// Year, currently without effect in the model.
    pub year: i32,
    /// Day of year, 1..=366.
    pub doy: i32,
    /// Seconds in day (UT).
    pub sec: f64,
    /// Altitude [km].
    pub alt: f64,
    /// Geodetic latitude [°N].
    pub g_lat: f64,
    /// Geodetic longitude [°E].
    pub g_long: f64,
    /// Local apparent solar time [h].
    pub lst: f64,
    /// 81-day average of F10.7 centred on `doy`.
    pub f107a: f64,
    /// Daily F10.7 of the previous day.
    pub f107: f64,
    /// Daily magnetic index.
    pub ap: f64,
}

/// Seconds since midnight UT including the sub-second part.
pub fn seconds_of_day(t: &DateTime<Utc>) -> f64 {
    f64::from(t.num_seconds_from_midnight()) + f64::from(t.nanosecond()) * 1e-9
}

/// Mean local solar time [h] at longitude `lon` [°E].
pub fn local_solar_time(t: &DateTime<Utc>, lon: f64) -> f64 {
    seconds_of_day(t) / 3600.0 + lon / 15.0
}

impl PointInput {
    /// Builds the model arguments for `time`; `lst` defaults to the mean
    /// local solar time at `lon`.
    #[allow(clippy::too_many_arguments)]
    pub fn at(
        time: &DateTime<Utc>,
        alt: f64,
        lat: f64,
        lon: f64,
        f107a: f64,
        f107: f64,
        ap: f64,
        lst: Option<f64>,
    ) -> Self {
        Self {
            year: time.year(),
            doy: time.ordinal() as i32,
            sec: seconds_of_day(time),
            alt,
            g_lat: lat,
            g_long: lon,
            lst: lst.unwrap_or_else(|| local_solar_time(time, lon)),
            f107a,
            f107,
            ap,
        }
    }
}

/// Ap history used when switch 9 is set to -1.
///
/// 0: daily Ap, 1: 3 hr index for current time, 2-4: 3 hr index 3, 6 and
/// 9 hrs before, 5: average of eight 3 hr indices 12-33 hrs before,
/// 6: average of eight 3 hr indices 36-57 hrs before.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApArray(pub [f64; AP_ARRAY_LEN]);

impl TryFrom<&[f64]> for ApArray {
    type Error = MsisError;

    fn try_from(values: &[f64]) -> Result<Self> {
        let a: [f64; AP_ARRAY_LEN] = values.try_into().map_err(|_| {
            MsisError::auxiliary(format!(
                "ap list has wrong size, must contain 7 elements, got {}.",
                values.len()
            ))
        })?;
        Ok(Self(a))
    }
}

/// Model switches: 0 turns a variation off, 1 on, 2 keeps main effects
/// but turns cross terms off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switches(pub [i32; N_SWITCHES]);

impl Default for Switches {
    fn default() -> Self {
        let mut sw = [1; N_SWITCHES];
        sw[0] = 0;
        Self(sw)
    }
}

impl Switches {
    /// Switch 9 at -1 selects the Ap history array.
    pub fn uses_ap_array(&self) -> bool {
        self.0[9] == -1
    }
}

impl TryFrom<&[i64]> for Switches {
    type Error = MsisError;

    fn try_from(values: &[i64]) -> Result<Self> {
        if values.len() != N_SWITCHES {
            return Err(MsisError::auxiliary(format!(
                "flags list has wrong size, expected 24 elements, got {}",
                values.len()
            )));
        }
        let mut sw = [0; N_SWITCHES];
        for (slot, &v) in sw.iter_mut().zip(values) {
            *slot = i32::try_from(v).map_err(|_| {
                MsisError::auxiliary("flags list has an invalid element, must be int.")
            })?;
        }
        Ok(Self(sw))
    }
}

/// Raw auxiliary arguments as supplied by the caller.
///
/// These are never broadcast: the same values reach every point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxArgs {
    pub ap_a: Option<Vec<f64>>,
    pub flags: Option<Vec<i64>>,
}

impl AuxArgs {
    pub fn validate(&self) -> Result<Aux> {
        Ok(Aux {
            ap_a: self.ap_a.as_deref().map(ApArray::try_from).transpose()?,
            flags: self.flags.as_deref().map(Switches::try_from).transpose()?,
        })
    }
}

/// Validated auxiliary arguments handed to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aux {
    pub ap_a: Option<ApArray>,
    pub flags: Option<Switches>,
}

impl Aux {
    /// Explicit switches, or the model defaults.
    pub fn switches(&self) -> Switches {
        self.flags.unwrap_or_default()
    }

    /// Keyword arguments for a native-style call. Arrays that were not
    /// given are left out, the native routines accept lists only.
    pub fn keywords(&self) -> Vec<AuxKeyword> {
        let mut kw = Vec::with_capacity(2);
        if let Some(ap_a) = self.ap_a {
            kw.push(AuxKeyword::ApA(ap_a));
        }
        if let Some(flags) = self.flags {
            kw.push(AuxKeyword::Flags(flags));
        }
        kw
    }
}

/// One auxiliary keyword argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuxKeyword {
    ApA(ApArray),
    Flags(Switches),
}

impl AuxKeyword {
    pub fn name(&self) -> &'static str {
        match self {
            AuxKeyword::ApA(_) => "ap_a",
            AuxKeyword::Flags(_) => "flags",
        }
    }
}

/// Densities and temperatures at one point.
///
/// `d`: He, O, N2, O2, Ar number densities [cm^-3], total mass density
/// [g cm^-3], H, N, anomalous O number densities [cm^-3].
/// `t`: exospheric temperature and temperature at altitude [K].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointOutput {
    pub d: [f64; N_DENSITIES],
    pub t: [f64; N_TEMPERATURES],
}

impl PointOutput {
    pub fn to_flat(&self) -> [f64; N_OUTPUT] {
        let mut out = [0.0; N_OUTPUT];
        out[..N_DENSITIES].copy_from_slice(&self.d);
        out[N_DENSITIES..].copy_from_slice(&self.t);
        out
    }
}

/// Point-wise atmosphere model.
///
/// Implementations must be safe to call concurrently on disjoint inputs.
pub trait PointModel: Send + Sync {
    fn evaluate(&self, method: Method, input: &PointInput, aux: &Aux) -> Result<PointOutput>;
}

/// Evaluates the model at a single time and location.
#[allow(clippy::too_many_arguments)]
pub fn msise_model<M: PointModel + ?Sized>(
    model: &M,
    time: &DateTime<Utc>,
    alt: f64,
    lat: f64,
    lon: f64,
    f107a: f64,
    f107: f64,
    ap: f64,
    lst: Option<f64>,
    aux: &AuxArgs,
    method: Method,
) -> Result<PointOutput> {
    let aux = aux.validate()?;
    let input = PointInput::at(time, alt, lat, lon, f107a, f107, ap, lst);
    model.evaluate(method, &input, &aux)
}
