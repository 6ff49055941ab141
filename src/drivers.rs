//! Geophysical driver indices (Ap, F10.7, F10.7a) aligned with the time axis.
//!
//! Drivers are either supplied explicitly (scalar or one value per time)
//! or looked up per timestamp in a day-indexed [`DriverTable`]. The table
//! is always passed in by the caller; nothing is fetched implicitly.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use ndarray::{Array1, ArrayD, ArrayView1, Ix1};
use serde::{Deserialize, Serialize};

use crate::error::{MsisError, Result};
use crate::shape::check_nd;

/// The three daily driver series consumed by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverIndex {
    /// Daily geomagnetic Ap index.
    Ap,
    /// Observed F10.7 radio flux.
    F107,
    /// 81-day centred running average of the observed F10.7 flux.
    F107a,
}

impl DriverIndex {
    pub const ALL: [DriverIndex; 3] = [DriverIndex::Ap, DriverIndex::F107, DriverIndex::F107a];

    /// Variable name in the result dataset.
    pub fn name(self) -> &'static str {
        match self {
            DriverIndex::Ap => "Ap",
            DriverIndex::F107 => "f107",
            DriverIndex::F107a => "f107a",
        }
    }

    pub fn long_name(self) -> &'static str {
        match self {
            DriverIndex::Ap => "Daily Ap index",
            DriverIndex::F107 => "Observed solar f10.7 cm radio flux of the previous day",
            DriverIndex::F107a => {
                "Observed 81-day running average of the solar f10.7 cm radio flux centred on day"
            }
        }
    }

    pub fn units(self) -> &'static str {
        match self {
            DriverIndex::Ap => "nT",
            DriverIndex::F107 | DriverIndex::F107a => "sfu, 10^-22 W m^-2 Hz^-1",
        }
    }

    /// Column of the daily space weather table holding this series.
    pub fn column(self) -> &'static str {
        match self {
            DriverIndex::Ap => "Apavg",
            DriverIndex::F107 => "f107_obs",
            DriverIndex::F107a => "f107_81ctr_obs",
        }
    }
}

impl fmt::Display for DriverIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only day-indexed source of driver values.
pub trait DriverTable: Send + Sync {
    /// Value of `index` on calendar day `day`, if the table covers it.
    fn daily_value(&self, index: DriverIndex, day: NaiveDate) -> Option<f64>;
}

/// One row of daily space weather indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyIndices {
    pub date: NaiveDate,
    #[serde(rename = "Apavg")]
    pub ap_avg: f64,
    pub f107_obs: f64,
    pub f107_81ctr_obs: f64,
}

impl DailyIndices {
    pub fn get(&self, index: DriverIndex) -> f64 {
        match index {
            DriverIndex::Ap => self.ap_avg,
            DriverIndex::F107 => self.f107_obs,
            DriverIndex::F107a => self.f107_81ctr_obs,
        }
    }
}

/// In-memory daily index table keyed by calendar day.
#[derive(Debug, Clone, Default)]
pub struct DailyIndexTable {
    rows: BTreeMap<NaiveDate, DailyIndices>,
}

impl DailyIndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from rows; later rows replace earlier ones for the same day.
    pub fn from_records(records: impl IntoIterator<Item = DailyIndices>) -> Self {
        let mut table = Self::new();
        for record in records {
            table.insert(record);
        }
        table
    }

    pub fn insert(&mut self, record: DailyIndices) {
        self.rows.insert(record.date, record);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First and last covered day.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.rows.keys().next()?;
        let last = self.rows.keys().next_back()?;
        Some((*first, *last))
    }
}

impl DriverTable for DailyIndexTable {
    fn daily_value(&self, index: DriverIndex, day: NaiveDate) -> Option<f64> {
        self.rows.get(&day).map(|row| row.get(index))
    }
}

/// Floors `t + offset_days` to its calendar day.
pub fn floor_day(t: &DateTime<Utc>, offset_days: i64) -> Option<NaiveDate> {
    t.date_naive()
        .checked_add_signed(Duration::try_days(offset_days)?)
}

/// Resolves one driver to shape `(times.len(),)`.
///
/// An explicit value wins and is broadcast against the time axis. Without
/// one, every timestamp is shifted by `offset_days`, floored to its day and
/// looked up in `table`.
pub fn resolve_driver(
    index: DriverIndex,
    explicit: Option<ArrayD<f64>>,
    times: ArrayView1<DateTime<Utc>>,
    table: Option<&dyn DriverTable>,
    offset_days: i64,
) -> Result<Array1<f64>> {
    match (explicit, table) {
        (Some(values), _) => {
            let values = check_nd(values, 1)?;
            if values.shape() == times.shape() {
                return values
                    .into_dimensionality::<Ix1>()
                    .map_err(|e| MsisError::shape_mismatch(index.name(), &[], e.to_string()));
            }
            let shape = values.shape().to_vec();
            values
                .broadcast(times.len())
                .map(|v| v.to_owned())
                .ok_or_else(|| {
                    MsisError::shape_mismatch(
                        index.name(),
                        &shape,
                        format!("a scalar or the time axis ({},)", times.len()),
                    )
                })
        }
        (None, Some(table)) => {
            tracing::debug!(index = %index, n = times.len(), "looking up driver in daily table");
            times
                .iter()
                .map(|t| {
                    let day = floor_day(t, offset_days).ok_or(MsisError::DriverUnavailable {
                        index,
                        day: t.date_naive(),
                    })?;
                    table
                        .daily_value(index, day)
                        .ok_or(MsisError::DriverUnavailable { index, day })
                })
                .collect::<Result<Vec<f64>>>()
                .map(Array1::from_vec)
        }
        (None, None) => Err(MsisError::MissingDriver { index }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::NdInput;
    use chrono::TimeZone;
    use ndarray::{array, Array2};

    fn table() -> DailyIndexTable {
        DailyIndexTable::from_records([
            DailyIndices {
                date: NaiveDate::from_ymd_opt(2009, 6, 20).unwrap(),
                ap_avg: 5.0,
                f107_obs: 66.0,
                f107_81ctr_obs: 68.5,
            },
            DailyIndices {
                date: NaiveDate::from_ymd_opt(2009, 6, 21).unwrap(),
                ap_avg: 6.0,
                f107_obs: 66.7,
                f107_81ctr_obs: 69.0,
            },
        ])
    }

    fn times() -> Array1<DateTime<Utc>> {
        array![
            Utc.with_ymd_and_hms(2009, 6, 21, 8, 3, 20).unwrap(),
            Utc.with_ymd_and_hms(2009, 6, 21, 23, 59, 59).unwrap(),
        ]
    }

    #[test]
    fn test_scalar_is_broadcast() {
        let t = times();
        let ap = resolve_driver(
            DriverIndex::Ap,
            Some(NdInput::from(4.0).into_inner()),
            t.view(),
            None,
            0,
        )
        .unwrap();
        assert_eq!(ap, array![4.0, 4.0]);
    }

    #[test]
    fn test_matching_array_is_identity() {
        let t = times();
        let f107 = resolve_driver(
            DriverIndex::F107,
            Some(NdInput::from(vec![150.0, 151.5]).into_inner()),
            t.view(),
            Some(&table()),
            -1,
        )
        .unwrap();
        assert_eq!(f107, array![150.0, 151.5]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let t = times();
        let err = resolve_driver(
            DriverIndex::Ap,
            Some(NdInput::from(vec![1.0, 2.0, 3.0]).into_inner()),
            t.view(),
            None,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, MsisError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_2d_driver_rejected() {
        let t = times();
        let err = resolve_driver(
            DriverIndex::Ap,
            Some(Array2::<f64>::zeros((2, 1)).into_dyn()),
            t.view(),
            None,
            0,
        )
        .unwrap_err();
        assert_eq!(err, MsisError::InvalidShape { ndim: 2, max_ndim: 1 });
    }

    #[test]
    fn test_lookup_floors_to_day() {
        let t = times();
        let ap = resolve_driver(DriverIndex::Ap, None, t.view(), Some(&table()), 0).unwrap();
        assert_eq!(ap, array![6.0, 6.0]);
    }

    #[test]
    fn test_lookup_previous_day_offset() {
        let t = times();
        let f107 = resolve_driver(DriverIndex::F107, None, t.view(), Some(&table()), -1).unwrap();
        assert_eq!(f107, array![66.0, 66.0]);
    }

    #[test]
    fn test_missing_day_reported() {
        let t = array![Utc.with_ymd_and_hms(2009, 12, 21, 16, 0, 0).unwrap()];
        let err = resolve_driver(DriverIndex::F107a, None, t.view(), Some(&table()), 0).unwrap_err();
        assert_eq!(
            err,
            MsisError::DriverUnavailable {
                index: DriverIndex::F107a,
                day: NaiveDate::from_ymd_opt(2009, 12, 21).unwrap(),
            }
        );
    }

    #[test]
    fn test_no_source_is_error() {
        let t = times();
        let err = resolve_driver(DriverIndex::Ap, None, t.view(), None, 0).unwrap_err();
        assert_eq!(err, MsisError::MissingDriver { index: DriverIndex::Ap });
    }

    #[test]
    fn test_table_records_from_json() {
        let rows: Vec<DailyIndices> = serde_json::from_str(
            r#"[{"date": "2009-06-21", "Apavg": 6.0, "f107_obs": 66.7, "f107_81ctr_obs": 69.0}]"#,
        )
        .unwrap();
        assert!(DailyIndexTable::new().is_empty());
        let table = DailyIndexTable::from_records(rows);
        let day = NaiveDate::from_ymd_opt(2009, 6, 21).unwrap();
        assert!(!table.is_empty());
        assert_eq!(table.len(), 1);
        assert_eq!(table.span(), Some((day, day)));
        assert_eq!(table.daily_value(DriverIndex::F107a, day), Some(69.0));
    }

    #[test]
    fn test_record_fields_match_table_columns() {
        let row = table().rows.values().next().copied().unwrap();
        let json = serde_json::to_value(row).unwrap();
        for index in DriverIndex::ALL {
            assert_eq!(json[index.column()], row.get(index), "{index}");
        }
    }
}
