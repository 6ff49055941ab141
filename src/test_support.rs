//! Deterministic point models for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;
use crate::model::{Aux, Method, PointInput, PointModel, PointOutput};

/// Each output is a distinct linear combination of the inputs, so every
/// grid cell carries a checkable fingerprint of the arguments it received.
pub(crate) struct LinearModel;

impl PointModel for LinearModel {
    fn evaluate(&self, method: Method, input: &PointInput, aux: &Aux) -> Result<PointOutput> {
        let ap = match (aux.switches().uses_ap_array(), aux.ap_a) {
            (true, Some(a)) => a.0[0],
            _ => input.ap,
        };
        let base = input.alt * 1e3 + input.g_lat * 10.0 + input.g_long + input.lst * 1e-2;
        let drivers = input.f107a * 1e-3 + input.f107 * 1e-4 + ap * 1e-5;
        let time = f64::from(input.doy) * 1e-6 + input.sec * 1e-9;
        let mut d = [0.0; 9];
        for (i, slot) in d.iter_mut().enumerate() {
            *slot = (i as f64 + 1.0) * base + drivers + time;
        }
        if method == Method::Gtd7d {
            d[5] += d[8] * 1e-3;
        }
        Ok(PointOutput {
            d,
            t: [1000.0 + drivers, 500.0 + base],
        })
    }
}

/// Wraps a model and counts evaluations.
pub(crate) struct CountingModel<M> {
    pub inner: M,
    pub calls: AtomicUsize,
}

impl<M> CountingModel<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl<M: PointModel> PointModel for CountingModel<M> {
    fn evaluate(&self, method: Method, input: &PointInput, aux: &Aux) -> Result<PointOutput> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.evaluate(method, input, aux)
    }
}
