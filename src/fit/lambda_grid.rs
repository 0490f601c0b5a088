//! Decay (λ) grid generation.
//!
//! The Nelson–Siegel solver is seeded from a deterministic grid search over λ:
//! for fixed λ the model is linear in the betas, so each grid point is one
//! small least squares solve.
//!
//! Why a grid seed?
//! - It avoids the local minima a single fixed starting point can fall into.
//! - It is deterministic given the same inputs and bounds (no random restarts).

use crate::error::EngineError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, EngineError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(EngineError::config(format!(
            "Invalid lambda range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(EngineError::config("Lambda grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    // Pin the upper endpoint exactly; exp(ln(x)) can drift by an ulp past a bound.
    if let Some(last) = out.last_mut() {
        *last = max;
    }
    out[0] = min;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 5.0, 5).unwrap();
        assert_eq!(v[0], 0.1);
        assert_eq!(v[v.len() - 1], 5.0);
        for w in v.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn log_space_rejects_bad_ranges() {
        assert!(log_space(0.0, 5.0, 5).is_err());
        assert!(log_space(5.0, 1.0, 5).is_err());
        assert!(log_space(0.1, 5.0, 1).is_err());
    }
}
