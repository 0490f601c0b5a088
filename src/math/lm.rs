//! Box-constrained Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `Σ r_i(p)^2` subject to `lower <= p <= upper`:
//!
//! ```text
//! (JᵀJ + μ·diag(JᵀJ)) δ = -Jᵀr
//! p_{n+1} = clamp(p_n + δ)
//! ```
//!
//! - Jacobian by forward differences (stepping inward at an active upper bound)
//! - Marquardt diagonal scaling, so parameters of different magnitude (β ~ 1e-2,
//!   λ ~ 1) share one damping factor
//! - bounds enforced by projection after every step
//!
//! The solver is deterministic: same inputs, same iterates.

use nalgebra::{DMatrix, DVector};

/// Solver settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmConfig {
    /// Outer iteration cap (Jacobian evaluations).
    pub max_iterations: usize,
    /// Stop when an accepted step improves SSE by less than this (relative).
    pub ftol: f64,
    /// Stop when the projected step is smaller than this (relative to `|p|`).
    pub xtol: f64,
    pub initial_damping: f64,
    pub damping_up: f64,
    pub damping_down: f64,
    /// Damping beyond which no descent direction exists; the iterate is stationary.
    pub max_damping: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-12,
            xtol: 1e-12,
            initial_damping: 1e-3,
            damping_up: 10.0,
            damping_down: 0.1,
            max_damping: 1e12,
        }
    }
}

/// Result of a solve, converged or not.
#[derive(Debug, Clone, PartialEq)]
pub struct LmOutcome {
    pub params: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize the squared norm of `residuals` inside `[lower, upper]`.
///
/// `x0` is clamped into the box before the first evaluation. Returns an outcome
/// with `converged = false` when the iteration cap is hit or the residuals
/// become non-finite.
pub fn solve_bounded<F>(
    residuals: F,
    x0: &[f64],
    lower: &[f64],
    upper: &[f64],
    cfg: &LmConfig,
) -> LmOutcome
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n_params = x0.len();
    let mut p = clamp(x0, lower, upper);
    let mut r = residuals(&p);
    let mut ss = sum_sq(&r);
    let mut mu = cfg.initial_damping;

    if !ss.is_finite() || r.is_empty() || n_params == 0 {
        return LmOutcome {
            params: p,
            sse: ss,
            iterations: 0,
            converged: false,
        };
    }

    for iteration in 0..cfg.max_iterations {
        if ss <= f64::MIN_POSITIVE {
            return done(p, ss, iteration, true);
        }

        let jac = forward_jacobian(&residuals, &p, &r, upper);
        let r_vec = DVector::from_column_slice(&r);
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &r_vec;

        if grad.amax() <= f64::EPSILON * ss {
            return done(p, ss, iteration, true);
        }

        // Inner loop: raise damping until a step reduces SSE.
        loop {
            let mut a = jtj.clone();
            for i in 0..n_params {
                a[(i, i)] += mu * jtj[(i, i)].max(1e-12);
            }

            let Some(chol) = a.cholesky() else {
                mu *= cfg.damping_up;
                if mu > cfg.max_damping {
                    return done(p, ss, iteration + 1, true);
                }
                continue;
            };
            let delta = chol.solve(&(-&grad));

            let trial: Vec<f64> = p.iter().zip(delta.iter()).map(|(pi, di)| pi + di).collect();
            let trial = clamp(&trial, lower, upper);

            let step_norm = trial
                .iter()
                .zip(&p)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt().max(1.0);
            if step_norm <= cfg.xtol * p_norm {
                return done(p, ss, iteration + 1, true);
            }

            let r_trial = residuals(&trial);
            let ss_trial = sum_sq(&r_trial);

            if ss_trial.is_finite() && ss_trial < ss {
                let rel_gain = (ss - ss_trial) / ss.max(f64::MIN_POSITIVE);
                p = trial;
                r = r_trial;
                ss = ss_trial;
                mu = (mu * cfg.damping_down).max(1e-15);
                if rel_gain <= cfg.ftol {
                    return done(p, ss, iteration + 1, true);
                }
                break;
            }

            mu *= cfg.damping_up;
            if mu > cfg.max_damping {
                // No damping level produces descent: stationary point (possibly on a bound).
                return done(p, ss, iteration + 1, true);
            }
        }
    }

    done(p, ss, cfg.max_iterations, false)
}

fn done(params: Vec<f64>, sse: f64, iterations: usize, converged: bool) -> LmOutcome {
    LmOutcome {
        params,
        sse,
        iterations,
        converged,
    }
}

fn forward_jacobian<F>(residuals: &F, p: &[f64], r0: &[f64], upper: &[f64]) -> DMatrix<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let m = r0.len();
    let n = p.len();
    let mut jac = DMatrix::<f64>::zeros(m, n);

    for j in 0..n {
        let mut h = 1e-7 * p[j].abs().max(1e-2);
        if p[j] + h > upper[j] {
            h = -h;
        }
        let mut shifted = p.to_vec();
        shifted[j] += h;
        let r_shift = residuals(&shifted);
        for i in 0..m {
            jac[(i, j)] = (r_shift[i] - r0[i]) / h;
        }
    }

    jac
}

fn clamp(p: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    p.iter()
        .zip(lower.iter().zip(upper))
        .map(|(&v, (&lo, &hi))| v.clamp(lo, hi))
        .collect()
}

#[inline]
fn sum_sq(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}
