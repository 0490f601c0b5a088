//! Quadratic curve: `y = a·d² + b·d + c` by linear least squares.
//!
//! Closed form, no bounds, no iterations. With exactly three distinct
//! durations the least squares solution interpolates the points.

use nalgebra::{DMatrix, DVector};

use crate::domain::{CurveFitResult, ModelKind};
use crate::error::EngineError;
use crate::fit::fitter::{Observation, distinct_durations, finalize};
use crate::math::solve_least_squares;
use crate::models::fill_design_row;

pub fn fit_quadratic(partition: &str, obs: &[Observation]) -> Result<CurveFitResult, EngineError> {
    let model = ModelKind::Quadratic;
    let k = model.param_count();
    if obs.len() < k {
        return Err(EngineError::insufficient(partition, k, obs.len()));
    }
    let distinct = distinct_durations(obs);
    if distinct < k {
        return Err(EngineError::insufficient(partition, k, distinct));
    }

    let n = obs.len();
    let mut x = DMatrix::<f64>::zeros(n, k);
    let mut y = DVector::<f64>::zeros(n);
    let mut row = [0.0; 3];
    for (i, o) in obs.iter().enumerate() {
        fill_design_row(model, o.duration, 0.0, &mut row);
        for j in 0..k {
            x[(i, j)] = row[j];
        }
        y[i] = o.yield_;
    }

    let beta = solve_least_squares(&x, &y)
        .ok_or_else(|| EngineError::curve_fit(partition, "singular quadratic design matrix"))?;

    finalize(model, partition, beta.iter().copied().collect(), obs, None)
}
