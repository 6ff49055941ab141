//! 4-D grid evaluation: time × altitude × latitude × longitude.
//!
//! The grid is always the outer product of the four axes. Drivers vary
//! along time only, local solar time along time and longitude only.

use chrono::{DateTime, Utc};
use ndarray::{Array4, ArrayD, ArrayView1, ArrayView2, ArrayView4, Axis, Ix4};
use serde::{Deserialize, Serialize};

use crate::dataset::{Coords, Dataset, MSIS_OUTPUT};
use crate::drivers::{resolve_driver, DriverIndex, DriverTable};
use crate::error::{MsisError, Result};
use crate::local_time::resolve_lst;
use crate::model::{AuxArgs, Method, PointModel};
use crate::shape::{check_axis, NdInput};
use crate::vectorize::{msise_flat, MsisArgs};

/// Day offsets applied to each timestamp before looking up a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOffsets {
    pub ap: i64,
    pub f107: i64,
    pub f107a: i64,
}

impl Default for DriverOffsets {
    fn default() -> Self {
        Self {
            ap: 0,
            f107: -1,
            f107a: 0,
        }
    }
}

impl DriverOffsets {
    pub fn get(&self, index: DriverIndex) -> i64 {
        match index {
            DriverIndex::Ap => self.ap,
            DriverIndex::F107 => self.f107,
            DriverIndex::F107a => self.f107a,
        }
    }
}

/// Options for a grid evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOptions {
    pub method: Method,
    pub offsets: DriverOffsets,
}

/// Inputs of one grid evaluation.
///
/// Axes are scalars or 1-D. Drivers are scalars or one value per time;
/// when absent they are looked up in the driver table. The local time
/// override is a scalar, 1-D (time or lon) or 2-D (time, lon)/(lon, time).
#[derive(Debug, Clone)]
pub struct GridRequest {
    pub time: NdInput<DateTime<Utc>>,
    pub alt: NdInput<f64>,
    pub lat: NdInput<f64>,
    pub lon: NdInput<f64>,
    pub f107a: Option<NdInput<f64>>,
    pub f107: Option<NdInput<f64>>,
    pub ap: Option<NdInput<f64>>,
    pub lst: Option<NdInput<f64>>,
    pub aux: AuxArgs,
}

impl GridRequest {
    pub fn new(
        time: impl Into<NdInput<DateTime<Utc>>>,
        alt: impl Into<NdInput<f64>>,
        lat: impl Into<NdInput<f64>>,
        lon: impl Into<NdInput<f64>>,
    ) -> Self {
        Self {
            time: time.into(),
            alt: alt.into(),
            lat: lat.into(),
            lon: lon.into(),
            f107a: None,
            f107: None,
            ap: None,
            lst: None,
            aux: AuxArgs::default(),
        }
    }

    pub fn f107a(mut self, values: impl Into<NdInput<f64>>) -> Self {
        self.f107a = Some(values.into());
        self
    }

    pub fn f107(mut self, values: impl Into<NdInput<f64>>) -> Self {
        self.f107 = Some(values.into());
        self
    }

    pub fn ap(mut self, values: impl Into<NdInput<f64>>) -> Self {
        self.ap = Some(values.into());
        self
    }

    pub fn lst(mut self, values: impl Into<NdInput<f64>>) -> Self {
        self.lst = Some(values.into());
        self
    }

    pub fn ap_a(mut self, ap_a: Vec<f64>) -> Self {
        self.aux.ap_a = Some(ap_a);
        self
    }

    pub fn flags(mut self, flags: Vec<i64>) -> Self {
        self.aux.flags = Some(flags);
        self
    }
}

/// Views of the four axes with unit dimensions inserted so that they
/// broadcast to the outer-product grid (I, J, K, L).
pub struct OuterGrid<'a> {
    pub time: ArrayView4<'a, DateTime<Utc>>,
    pub alt: ArrayView4<'a, f64>,
    pub lat: ArrayView4<'a, f64>,
    pub lon: ArrayView4<'a, f64>,
}

/// Expands four 1-D axes to shapes (I,1,1,1), (1,J,1,1), (1,1,K,1) and (1,1,1,L).
pub fn outer_grid<'a>(
    time: ArrayView1<'a, DateTime<Utc>>,
    alt: ArrayView1<'a, f64>,
    lat: ArrayView1<'a, f64>,
    lon: ArrayView1<'a, f64>,
) -> OuterGrid<'a> {
    OuterGrid {
        time: along_time(time),
        alt: alt
            .insert_axis(Axis(0))
            .insert_axis(Axis(2))
            .insert_axis(Axis(3)),
        lat: lat
            .insert_axis(Axis(0))
            .insert_axis(Axis(1))
            .insert_axis(Axis(3)),
        lon: lon
            .insert_axis(Axis(0))
            .insert_axis(Axis(1))
            .insert_axis(Axis(2)),
    }
}

/// (I,) → (I,1,1,1)
fn along_time<A>(a: ArrayView1<'_, A>) -> ArrayView4<'_, A> {
    a.insert_axis(Axis(1))
        .insert_axis(Axis(2))
        .insert_axis(Axis(3))
}

/// (I, L) → (I,1,1,L)
fn along_time_lon<A>(a: ArrayView2<'_, A>) -> ArrayView4<'_, A> {
    a.insert_axis(Axis(1)).insert_axis(Axis(2))
}

/// Evaluates `model` on the outer-product grid of the request axes.
///
/// Drivers missing from the request are looked up in `drivers`.
pub fn msise_4d<M: PointModel + ?Sized>(
    model: &M,
    request: GridRequest,
    drivers: Option<&dyn DriverTable>,
    options: &GridOptions,
) -> Result<Dataset> {
    let time = check_axis(request.time.into_inner())?;
    let alt = check_axis(request.alt.into_inner())?;
    let lat = check_axis(request.lat.into_inner())?;
    let lon = check_axis(request.lon.into_inner())?;
    tracing::debug!(
        time = time.len(),
        alt = alt.len(),
        lat = lat.len(),
        lon = lon.len(),
        method = ?options.method,
        "assembling model grid"
    );

    let explicit = [request.ap, request.f107, request.f107a];
    let driver_values = DriverIndex::ALL
        .into_iter()
        .zip(explicit)
        .map(|(index, explicit)| {
            resolve_driver(
                index,
                explicit.map(NdInput::into_inner),
                time.view(),
                drivers,
                options.offsets.get(index),
            )
        })
        .collect::<Result<Vec<_>>>()?;
    let along = |index: DriverIndex| along_time(driver_values[index as usize].view()).into_dyn();

    // Without an override the evaluator derives lst per point from the
    // full timestamp; the reported field uses whole seconds.
    let lst_override = request.lst.map(NdInput::into_inner);
    let evaluate_lst = lst_override.is_some();
    let lst = resolve_lst(lst_override, time.view(), lon.view())?;

    let grid = outer_grid(time.view(), alt.view(), lat.view(), lon.view());
    let args = MsisArgs {
        time: grid.time.into_dyn(),
        alt: grid.alt.into_dyn(),
        lat: grid.lat.into_dyn(),
        lon: grid.lon.into_dyn(),
        f107a: along(DriverIndex::F107a),
        f107: along(DriverIndex::F107),
        ap: along(DriverIndex::Ap),
        lst: evaluate_lst.then(|| along_time_lon(lst.view()).into_dyn()),
    };
    let raw = msise_flat(model, &args, &request.aux, options.method)?;

    let outputs = split_outputs(raw)?;
    let coords = Coords {
        time,
        alt,
        lat,
        lon,
    };
    Ok(Dataset::new(coords, outputs, lst, driver_values))
}

/// Splits the trailing output axis of a (I, J, K, L, 11) array.
fn split_outputs(raw: ArrayD<f64>) -> Result<Vec<Array4<f64>>> {
    if raw.ndim() != 5 || raw.shape()[4] != MSIS_OUTPUT.len() {
        return Err(MsisError::shape_mismatch(
            "model output",
            raw.shape(),
            format!("(time, alt, lat, lon, {})", MSIS_OUTPUT.len()),
        ));
    }
    raw.axis_iter(Axis(4))
        .map(|v| {
            v.to_owned()
                .into_dimensionality::<Ix4>()
                .map_err(|e| MsisError::shape_mismatch("model output", v.shape(), e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::GRID_DIMS;
    use crate::drivers::{DailyIndexTable, DailyIndices};
    use crate::model::{msise_model, N_OUTPUT};
    use crate::test_support::{CountingModel, LinearModel};
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, TimeZone};
    use ndarray::{array, Array2};

    fn t(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn scenario_times() -> Vec<DateTime<Utc>> {
        vec![t(2009, 6, 21, 8, 3, 20), t(2009, 12, 21, 16, 3, 20)]
    }

    fn space_weather() -> DailyIndexTable {
        let row = |y, m, d, ap, f107, f107a| DailyIndices {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            ap_avg: ap,
            f107_obs: f107,
            f107_81ctr_obs: f107a,
        };
        DailyIndexTable::from_records([
            row(2009, 6, 20, 5.0, 66.0, 68.8),
            row(2009, 6, 21, 6.0, 66.7, 69.0),
            row(2009, 12, 20, 2.0, 75.2, 73.1),
            row(2009, 12, 21, 1.0, 76.0, 73.3),
        ])
    }

    fn scenario(lon: impl Into<NdInput<f64>>) -> GridRequest {
        GridRequest::new(
            scenario_times(),
            vec![400.0, 200.0, 100.0],
            vec![60.0, 30.0, 0.0, -30.0, -60.0],
            lon,
        )
        .f107a(150.0)
        .f107(150.0)
    }

    #[test]
    fn test_end_to_end_shapes() {
        let table = space_weather();
        let ds = msise_4d(
            &LinearModel,
            scenario(vec![-70.0, 0.0, 70.0]),
            Some(&table),
            &GridOptions::default(),
        )
        .unwrap();
        for field in MSIS_OUTPUT.iter() {
            let var = ds.get(field.name).unwrap();
            assert_eq!(var.data.shape(), &[2, 3, 5, 3], "{}", field.name);
            assert_eq!(var.dims, GRID_DIMS);
            assert_eq!(var.units, field.units);
        }
        assert_eq!(ds.get("lst").unwrap().data.shape(), &[2, 3]);
        for name in ["Ap", "f107", "f107a"] {
            assert_eq!(ds.get(name).unwrap().data.shape(), &[2]);
        }
        assert_eq!(ds.data_vars().len(), N_OUTPUT + 4);
        let names: Vec<_> = ds.names().collect();
        assert_eq!(&names[N_OUTPUT..], ["lst", "Ap", "f107", "f107a"]);
        assert_eq!(
            ds.dims(),
            [("time", 2), ("alt", 3), ("lat", 5), ("lon", 3)]
        );
    }

    #[test]
    fn test_ap_from_table_explicit_fluxes_kept() {
        let table = space_weather();
        let ds = msise_4d(&LinearModel, scenario(-70.0), Some(&table), &GridOptions::default())
            .unwrap();
        assert_eq!(ds.driver(DriverIndex::Ap).unwrap(), array![6.0, 1.0]);
        assert_eq!(ds.driver(DriverIndex::F107).unwrap(), array![150.0, 150.0]);
        assert_eq!(ds.driver(DriverIndex::F107a).unwrap(), array![150.0, 150.0]);
    }

    #[test]
    fn test_all_drivers_from_table() {
        let table = space_weather();
        let request = GridRequest::new(scenario_times(), 400.0, 60.0, -70.0);
        let ds = msise_4d(&LinearModel, request, Some(&table), &GridOptions::default()).unwrap();
        assert_eq!(ds.driver(DriverIndex::Ap).unwrap(), array![6.0, 1.0]);
        // previous day
        assert_eq!(ds.driver(DriverIndex::F107).unwrap(), array![66.0, 75.2]);
        assert_eq!(ds.driver(DriverIndex::F107a).unwrap(), array![69.0, 73.3]);
    }

    #[test]
    fn test_driver_offsets_configurable() {
        let table = space_weather();
        let options: GridOptions =
            serde_json::from_str(r#"{"offsets": {"f107": 0, "f107a": -1}}"#).unwrap();
        assert_eq!(options.method, Method::Gtd7);
        assert_eq!(options.offsets.ap, 0);
        let request = GridRequest::new(scenario_times(), 400.0, 60.0, -70.0);
        let ds = msise_4d(&LinearModel, request, Some(&table), &options).unwrap();
        assert_eq!(ds.driver(DriverIndex::F107).unwrap(), array![66.7, 76.0]);
        assert_eq!(ds.driver(DriverIndex::F107a).unwrap(), array![68.8, 73.1]);
    }

    #[test]
    fn test_missing_driver_without_table() {
        let err = msise_4d(&LinearModel, scenario(-70.0), None, &GridOptions::default())
            .unwrap_err();
        assert_eq!(err, MsisError::MissingDriver { index: DriverIndex::Ap });
    }

    #[test]
    fn test_scalar_and_array_drivers() {
        let request = scenario(-70.0).ap(vec![5.0, 6.0]).lst(vec![6.0, 18.0]);
        let ds = msise_4d(&LinearModel, request, None, &GridOptions::default()).unwrap();
        assert_eq!(ds.driver(DriverIndex::Ap).unwrap(), array![5.0, 6.0]);
        assert_eq!(ds.lst().unwrap(), array![[6.0], [18.0]]);
    }

    #[test]
    fn test_2d_axis_rejected() {
        let request = GridRequest::new(t(2009, 6, 21, 8, 0, 0), array![[200.0]], 60.0, -70.0)
            .f107a(150.0)
            .f107(150.0)
            .ap(4.0);
        let err = msise_4d(&LinearModel, request, None, &GridOptions::default()).unwrap_err();
        assert_eq!(err, MsisError::InvalidShape { ndim: 2, max_ndim: 1 });
        assert!(err
            .to_string()
            .starts_with("Only scalars and up to 1-D arrays are currently supported"));
    }

    #[test]
    fn test_outer_product_not_zip() {
        let request = GridRequest::new(
            vec![t(2009, 6, 21, 8, 0, 0), t(2009, 12, 21, 16, 0, 0)],
            vec![100.0, 200.0],
            vec![10.0, 20.0],
            vec![30.0, 40.0],
        )
        .f107a(150.0)
        .f107(150.0)
        .ap(4.0);
        let ds = msise_4d(&LinearModel, request, None, &GridOptions::default()).unwrap();
        let talt = ds.output("Talt").unwrap();
        assert_eq!(talt.shape(), &[2, 2, 2, 2]);
        let alt = array![100.0, 200.0];
        let lat = array![10.0, 20.0];
        let lon = array![30.0, 40.0];
        let lst = ds.lst().unwrap();
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..2 {
                    for l in 0..2 {
                        let base = alt[j] * 1e3 + lat[k] * 10.0 + lon[l] + lst[[i, l]] * 1e-2;
                        assert_relative_eq!(
                            talt[[i, j, k, l]],
                            500.0 + base,
                            max_relative = 1e-12
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_one_evaluation_per_cell() {
        let model = CountingModel::new(LinearModel);
        let table = space_weather();
        msise_4d(
            &model,
            scenario(vec![-70.0, 0.0, 70.0]),
            Some(&table),
            &GridOptions::default(),
        )
        .unwrap();
        assert_eq!(model.calls(), 2 * 3 * 5 * 3);
    }

    #[test]
    fn test_default_lst() {
        let request = GridRequest::new(
            vec![t(2009, 6, 21, 8, 0, 0), t(2009, 12, 21, 16, 0, 0)],
            vec![400.0, 200.0, 100.0],
            vec![60.0, 30.0, 0.0, -30.0, -60.0],
            0.0,
        )
        .f107a(150.0)
        .f107(150.0)
        .ap(4.0);
        let ds = msise_4d(&LinearModel, request, None, &GridOptions::default()).unwrap();
        assert_eq!(ds.lst().unwrap(), array![[8.0], [16.0]]);
    }

    #[test]
    fn test_lst_per_longitude() {
        let request = GridRequest::new(
            vec![t(2009, 6, 21, 8, 0, 0), t(2009, 12, 21, 16, 0, 0)],
            400.0,
            60.0,
            vec![30.0, 120.0, 150.0],
        )
        .f107a(150.0)
        .f107(150.0)
        .ap(4.0)
        .lst(vec![10.0, 16.0, 18.0]);
        let ds = msise_4d(&LinearModel, request, None, &GridOptions::default()).unwrap();
        let lst = ds.lst().unwrap();
        assert_eq!(lst, array![[10.0, 16.0, 18.0], [10.0, 16.0, 18.0]]);
        assert_eq!(lst.row(0), lst.row(1));
    }

    #[test]
    fn test_lst_orientations_give_same_dataset() {
        let run = |lst: Array2<f64>| {
            let request = scenario(vec![-70.0, 0.0, 70.0]).ap(4.0).lst(lst);
            msise_4d(&LinearModel, request, None, &GridOptions::default()).unwrap()
        };
        let a = run(array![[5.0, 17.0], [6.0, 18.0], [7.0, 19.0]]);
        let b = run(array![[5.0, 6.0, 7.0], [17.0, 18.0, 19.0]]);
        assert_eq!(a.lst(), b.lst());
        assert_eq!(a, b);
    }

    #[test]
    fn test_grid_point_matches_single_point() {
        let time = t(2009, 6, 21, 8, 3, 20);
        for method in [Method::Gtd7, Method::Gtd7d] {
            let request = GridRequest::new(time, 400.0, 60.0, -70.0)
                .f107a(150.0)
                .f107(150.0)
                .ap(4.0);
            let options = GridOptions {
                method,
                ..GridOptions::default()
            };
            let ds = msise_4d(&LinearModel, request, None, &options).unwrap();
            let single = msise_model(
                &LinearModel,
                &time,
                400.0,
                60.0,
                -70.0,
                150.0,
                150.0,
                4.0,
                None,
                &AuxArgs::default(),
                method,
            )
            .unwrap()
            .to_flat();
            for (field, expected) in MSIS_OUTPUT.iter().zip(single) {
                let got = ds.output(field.name).unwrap()[[0, 0, 0, 0]];
                assert_relative_eq!(got, expected, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn test_bad_aux_arrays_rejected() {
        let bad_ap = scenario(-70.0).ap(4.0).ap_a(vec![0.0, 1.0, 2.0, 3.0]);
        let err = msise_4d(&LinearModel, bad_ap, None, &GridOptions::default()).unwrap_err();
        assert!(matches!(err, MsisError::AuxiliaryArray(_)));

        let bad_flags = scenario(-70.0).ap(4.0).flags(vec![0, 1, 2, 3]);
        let err = msise_4d(&LinearModel, bad_flags, None, &GridOptions::default()).unwrap_err();
        assert!(matches!(err, MsisError::AuxiliaryArray(_)));
    }

    #[test]
    fn test_empty_axis_rejected() {
        let request = GridRequest::new(t(2009, 6, 21, 8, 0, 0), Vec::<f64>::new(), 60.0, -70.0)
            .f107a(150.0)
            .f107(150.0)
            .ap(4.0);
        let err = msise_4d(&LinearModel, request, None, &GridOptions::default()).unwrap_err();
        assert!(matches!(err, MsisError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_sub_second_time() {
        let time = t(2009, 6, 21, 8, 0, 0) + chrono::Duration::milliseconds(900);
        let request = GridRequest::new(time, 400.0, 60.0, 0.0)
            .f107a(150.0)
            .f107(150.0)
            .ap(4.0);
        let ds = msise_4d(&LinearModel, request, None, &GridOptions::default()).unwrap();
        assert_eq!(ds.lst().unwrap(), array![[8.0]]);

        let single = msise_model(
            &LinearModel,
            &time,
            400.0,
            60.0,
            0.0,
            150.0,
            150.0,
            4.0,
            None,
            &AuxArgs::default(),
            Method::Gtd7,
        )
        .unwrap();
        assert_eq!(ds.output("Talt").unwrap()[[0, 0, 0, 0]], single.t[1]);
    }

    #[test]
    fn test_outer_grid_shapes() {
        let time = array![t(2009, 6, 21, 8, 0, 0), t(2009, 12, 21, 16, 0, 0)];
        let alt = array![1.0, 2.0, 3.0];
        let lat = array![1.0, 2.0, 3.0, 4.0];
        let lon = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let grid = outer_grid(time.view(), alt.view(), lat.view(), lon.view());
        assert_eq!(grid.time.shape(), &[2, 1, 1, 1]);
        assert_eq!(grid.alt.shape(), &[1, 3, 1, 1]);
        assert_eq!(grid.lat.shape(), &[1, 1, 4, 1]);
        assert_eq!(grid.lon.shape(), &[1, 1, 1, 5]);
    }
}
