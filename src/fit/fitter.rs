//! Single-partition curve fitting.
//!
//! Given the `(duration, yield)` observations of one partition (a sector or an
//! issuer) and a model kind, dispatch to the matching strategy and wrap the
//! parameters in a [`CurveFitResult`] with quality diagnostics.
//!
//! Both strategies share the same result shape, so callers never branch on the
//! model kind after fitting.

use serde::{Deserialize, Serialize};

use crate::domain::{CurveFitResult, FitQuality, ModelKind, NelsonSiegelConfig};
use crate::error::EngineError;
use crate::fit::nelson_siegel::fit_nelson_siegel;
use crate::fit::quadratic::fit_quadratic;
use crate::math::{r_squared, sample_std, sse};
use crate::models::predict;

/// One fitting observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub duration: f64,
    pub yield_: f64,
}

/// Fit `model` to `obs`.
///
/// `partition` only labels errors. Observations are used in the order given;
/// callers that need row-order invariance sort them first.
pub fn fit_curve(
    model: ModelKind,
    partition: &str,
    obs: &[Observation],
    ns: &NelsonSiegelConfig,
) -> Result<CurveFitResult, EngineError> {
    match model {
        ModelKind::Quadratic => fit_quadratic(partition, obs),
        ModelKind::NelsonSiegel => fit_nelson_siegel(partition, obs, ns),
    }
}

/// Count durations that differ by more than a rounding tolerance.
pub fn distinct_durations(obs: &[Observation]) -> usize {
    let mut d: Vec<f64> = obs.iter().map(|o| o.duration).collect();
    d.sort_by(f64::total_cmp);
    d.dedup_by(|a, b| (*a - *b).abs() <= 1e-9);
    d.len()
}

/// Build the result record for fitted parameters.
pub(crate) fn finalize(
    model: ModelKind,
    partition: &str,
    params: Vec<f64>,
    obs: &[Observation],
    iterations: Option<usize>,
) -> Result<CurveFitResult, EngineError> {
    let y: Vec<f64> = obs.iter().map(|o| o.yield_).collect();
    let residuals: Vec<f64> = obs
        .iter()
        .map(|o| o.yield_ - predict(model, o.duration, &params))
        .collect();
    if residuals.iter().any(|r| !r.is_finite()) {
        return Err(EngineError::curve_fit(partition, "non-finite model prediction"));
    }

    let n = obs.len();
    let sse = sse(&residuals);
    let (d_min, d_max) = obs.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), o| {
        (lo.min(o.duration), hi.max(o.duration))
    });

    Ok(CurveFitResult {
        model,
        params,
        quality: FitQuality {
            n,
            sse,
            rmse: (sse / n as f64).sqrt(),
            r_squared: r_squared(&y, &residuals),
            residual_std: sample_std(&residuals).unwrap_or(0.0),
        },
        duration_range: (d_min, d_max),
        iterations,
    })
}
