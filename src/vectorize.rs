//! Broadcasting evaluator over the point-wise model.
//!
//! The positional arguments are broadcast against each other (numpy rules:
//! trailing dimensions equal or 1) and the model is called once per element
//! of the broadcast shape, in parallel. The output gets one trailing axis of
//! length [`N_OUTPUT`]. `ap_a` and `flags` are excluded from broadcasting
//! and reach every call unchanged.

use chrono::{DateTime, Utc};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use rayon::prelude::*;

use crate::error::{MsisError, Result};
use crate::model::{AuxArgs, Method, PointInput, PointModel, PointOutput, N_OUTPUT};

/// Broadcast shape of `shapes`, or an error naming the first conflict.
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Vec<usize>> {
    let ndim = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![1usize; ndim];
    for shape in shapes {
        let offset = ndim - shape.len();
        for (i, &n) in shape.iter().enumerate() {
            let slot = &mut out[offset + i];
            if *slot == 1 {
                *slot = n;
            } else if n != 1 && n != *slot {
                return Err(MsisError::shape_mismatch(
                    "argument",
                    shape,
                    format!("broadcast shape {out:?}"),
                ));
            }
        }
    }
    Ok(out)
}

/// Elements of `a` broadcast to `shape`, in logical row-major order.
fn broadcast_flat<T: Clone>(a: &ArrayViewD<T>, shape: &[usize]) -> Result<Vec<T>> {
    a.broadcast(IxDyn(shape))
        .map(|v| v.iter().cloned().collect())
        .ok_or_else(|| MsisError::shape_mismatch("argument", a.shape(), format!("{shape:?}")))
}

/// Calls `eval` for every flat index of `shape` and stacks the outputs
/// along a new trailing axis.
fn map_points<F>(shape: &[usize], eval: F) -> Result<ArrayD<f64>>
where
    F: Fn(usize) -> Result<PointOutput> + Sync + Send,
{
    let n: usize = shape.iter().product();
    tracing::debug!(?shape, points = n, "evaluating point model");
    let rows = (0..n)
        .into_par_iter()
        .map(|i| eval(i).map(|out| out.to_flat()))
        .collect::<Result<Vec<[f64; N_OUTPUT]>>>()?;

    let mut out_shape = shape.to_vec();
    out_shape.push(N_OUTPUT);
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    ArrayD::from_shape_vec(IxDyn(&out_shape), flat)
        .map_err(|e| MsisError::shape_mismatch("output", &out_shape, e.to_string()))
}

/// The ten raw model arguments, each of any broadcast-compatible shape.
#[derive(Debug, Clone)]
pub struct FlatArgs<'a> {
    pub year: ArrayViewD<'a, i32>,
    pub doy: ArrayViewD<'a, i32>,
    pub sec: ArrayViewD<'a, f64>,
    pub alt: ArrayViewD<'a, f64>,
    pub g_lat: ArrayViewD<'a, f64>,
    pub g_long: ArrayViewD<'a, f64>,
    pub lst: ArrayViewD<'a, f64>,
    pub f107a: ArrayViewD<'a, f64>,
    pub f107: ArrayViewD<'a, f64>,
    pub ap: ArrayViewD<'a, f64>,
}

/// Vectorized call over raw model arguments with the given `method`.
pub fn evaluate_flat<M: PointModel + ?Sized>(
    model: &M,
    args: &FlatArgs<'_>,
    aux: &AuxArgs,
    method: Method,
) -> Result<ArrayD<f64>> {
    let aux = aux.validate()?;
    let shape = broadcast_shapes(&[
        args.year.shape(),
        args.doy.shape(),
        args.sec.shape(),
        args.alt.shape(),
        args.g_lat.shape(),
        args.g_long.shape(),
        args.lst.shape(),
        args.f107a.shape(),
        args.f107.shape(),
        args.ap.shape(),
    ])?;
    let year = broadcast_flat(&args.year, &shape)?;
    let doy = broadcast_flat(&args.doy, &shape)?;
    let sec = broadcast_flat(&args.sec, &shape)?;
    let alt = broadcast_flat(&args.alt, &shape)?;
    let g_lat = broadcast_flat(&args.g_lat, &shape)?;
    let g_long = broadcast_flat(&args.g_long, &shape)?;
    let lst = broadcast_flat(&args.lst, &shape)?;
    let f107a = broadcast_flat(&args.f107a, &shape)?;
    let f107 = broadcast_flat(&args.f107, &shape)?;
    let ap = broadcast_flat(&args.ap, &shape)?;

    map_points(&shape, |i| {
        let input = PointInput {
            year: year[i],
            doy: doy[i],
            sec: sec[i],
            alt: alt[i],
            g_lat: g_lat[i],
            g_long: g_long[i],
            lst: lst[i],
            f107a: f107a[i],
            f107: f107[i],
            ap: ap[i],
        };
        model.evaluate(method, &input, &aux)
    })
}

/// Vectorized `gtd7`: total mass density without anomalous oxygen.
pub fn gtd7_flat<M: PointModel + ?Sized>(
    model: &M,
    args: &FlatArgs<'_>,
    aux: &AuxArgs,
) -> Result<ArrayD<f64>> {
    evaluate_flat(model, args, aux, Method::Gtd7)
}

/// Vectorized `gtd7d`: total mass density including anomalous oxygen.
pub fn gtd7d_flat<M: PointModel + ?Sized>(
    model: &M,
    args: &FlatArgs<'_>,
    aux: &AuxArgs,
) -> Result<ArrayD<f64>> {
    evaluate_flat(model, args, aux, Method::Gtd7d)
}

/// Timestamp-based model arguments, each of any broadcast-compatible shape.
///
/// Without `lst` the mean local solar time is derived per point.
#[derive(Debug, Clone)]
pub struct MsisArgs<'a> {
    pub time: ArrayViewD<'a, DateTime<Utc>>,
    pub alt: ArrayViewD<'a, f64>,
    pub lat: ArrayViewD<'a, f64>,
    pub lon: ArrayViewD<'a, f64>,
    pub f107a: ArrayViewD<'a, f64>,
    pub f107: ArrayViewD<'a, f64>,
    pub ap: ArrayViewD<'a, f64>,
    pub lst: Option<ArrayViewD<'a, f64>>,
}

/// Vectorized single-point call over timestamps.
pub fn msise_flat<M: PointModel + ?Sized>(
    model: &M,
    args: &MsisArgs<'_>,
    aux: &AuxArgs,
    method: Method,
) -> Result<ArrayD<f64>> {
    let aux = aux.validate()?;
    let mut shapes = vec![
        args.time.shape(),
        args.alt.shape(),
        args.lat.shape(),
        args.lon.shape(),
        args.f107a.shape(),
        args.f107.shape(),
        args.ap.shape(),
    ];
    if let Some(lst) = &args.lst {
        shapes.push(lst.shape());
    }
    let shape = broadcast_shapes(&shapes)?;
    let time = broadcast_flat(&args.time, &shape)?;
    let alt = broadcast_flat(&args.alt, &shape)?;
    let lat = broadcast_flat(&args.lat, &shape)?;
    let lon = broadcast_flat(&args.lon, &shape)?;
    let f107a = broadcast_flat(&args.f107a, &shape)?;
    let f107 = broadcast_flat(&args.f107, &shape)?;
    let ap = broadcast_flat(&args.ap, &shape)?;
    let lst = args
        .lst
        .as_ref()
        .map(|lst| broadcast_flat(lst, &shape))
        .transpose()?;

    map_points(&shape, |i| {
        let input = PointInput::at(
            &time[i],
            alt[i],
            lat[i],
            lon[i],
            f107a[i],
            f107[i],
            ap[i],
            lst.as_ref().map(|l| l[i]),
        );
        model.evaluate(method, &input, &aux)
    })
}
