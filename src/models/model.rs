//! Curve evaluation for the quadratic and Nelson–Siegel models.
//!
//! The fitters rely on two primitive operations:
//! - build a design row for a given duration (for the linear least squares step)
//! - predict `y(d)` given the parameter vector (for residuals and plotting)
//!
//! Parameter layouts:
//! - Quadratic: `[a, b, c]` with `y = a·d² + b·d + c`
//! - Nelson–Siegel: `[β0, β1, β2, λ]`

use crate::domain::ModelKind;
use crate::math::{f1, f2};

/// Fill a design row for the model's linear coefficients.
///
/// For Nelson–Siegel the row is `[1, f1, f2]` at the given decay `λ`; the
/// quadratic model ignores `lambda`.
///
/// # Panics
/// Panics if `out` has fewer than 3 elements.
pub fn fill_design_row(model: ModelKind, d: f64, lambda: f64, out: &mut [f64]) {
    match model {
        ModelKind::Quadratic => {
            out[0] = d * d;
            out[1] = d;
            out[2] = 1.0;
        }
        ModelKind::NelsonSiegel => {
            out[0] = 1.0;
            out[1] = f1(d, lambda);
            out[2] = f2(d, lambda);
        }
    }
}

/// Predict `y(d)` for the given model kind.
///
/// Parameter slices shorter than the model's layout yield `NaN`.
pub fn predict(model: ModelKind, d: f64, params: &[f64]) -> f64 {
    match (model, params) {
        (ModelKind::Quadratic, [a, b, c, ..]) => a * d * d + b * d + c,
        (ModelKind::NelsonSiegel, [b0, b1, b2, lambda, ..]) => {
            b0 + b1 * f1(d, *lambda) + b2 * f2(d, *lambda)
        }
        _ => f64::NAN,
    }
}

/// Evaluate a fitted curve on `n` evenly spaced durations in `[lo, hi]`.
pub fn curve_grid(model: ModelKind, params: &[f64], lo: f64, hi: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let d = lo + u * (hi - lo);
            (d, predict(model, d, params))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_matches_closed_form() {
        let y = predict(ModelKind::Quadratic, 5.0, &[0.001, 0.01, 0.03]);
        assert!((y - 0.105).abs() < 1e-12);
    }

    #[test]
    fn nelson_siegel_short_end_is_level_plus_slope() {
        let params = [0.04, 0.01, 0.02, 2.0];
        let y = predict(ModelKind::NelsonSiegel, 0.0001, &params);
        assert!((y - 0.05).abs() < 1e-6, "y(0.0001)={y}");
        let y0 = predict(ModelKind::NelsonSiegel, 0.0, &params);
        assert!(y0.is_finite());
        assert!((y0 - 0.05).abs() < 1e-15);
    }

    #[test]
    fn nelson_siegel_long_end_is_level() {
        let params = [0.04, 0.01, 0.02, 2.0];
        let y = predict(ModelKind::NelsonSiegel, 1e6, &params);
        assert!((y - 0.04).abs() < 1e-6, "y(inf)={y}");
    }

    #[test]
    fn short_params_predict_nan() {
        assert!(predict(ModelKind::NelsonSiegel, 1.0, &[0.04, 0.01]).is_nan());
    }

    #[test]
    fn grid_spans_endpoints() {
        let g = curve_grid(ModelKind::Quadratic, &[0.0, 1.0, 0.0], 1.0, 3.0, 5);
        assert_eq!(g.len(), 5);
        assert!((g[0].0 - 1.0).abs() < 1e-12);
        assert!((g[4].1 - 3.0).abs() < 1e-12);
    }
}
