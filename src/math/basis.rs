//! Stable Nelson–Siegel factor loadings.
//!
//! With duration `d` and decay `λ`:
//!
//! - `f1(d, λ) = (1 - exp(-d/λ)) / (d/λ)`
//! - `f2(d, λ) = f1(d, λ) - exp(-d/λ)`
//!
//! Numerical notes:
//! - For small `x = d/λ`, `1 - exp(-x)` suffers from catastrophic cancellation.
//!   We use `expm1`-based forms (and a series fallback) to maintain precision.
//! - For `d → 0`, the analytic limits are: `f1 → 1` and `f2 → 0`. A zero
//!   duration therefore never divides by zero.

/// Threshold below which we switch to a small-x series approximation.
const SMALL_X: f64 = 1e-6;

/// Compute `f1(d, λ)` in a numerically stable way.
pub fn f1(d: f64, lambda: f64) -> f64 {
    let x = d.max(0.0) / lambda;

    if x.abs() < SMALL_X {
        // Series: (1 - e^{-x}) / x ≈ 1 - x/2 + x^2/6
        return 1.0 - x / 2.0 + (x * x) / 6.0;
    }

    // 1 - exp(-x) computed as -expm1(-x).
    let numer = -(-x).exp_m1();
    numer / x
}

/// Compute `f2(d, λ)` in a numerically stable way.
pub fn f2(d: f64, lambda: f64) -> f64 {
    let x = d.max(0.0) / lambda;

    if x.abs() < SMALL_X {
        // f1 ≈ 1 - x/2 + x^2/6, exp(-x) ≈ 1 - x + x^2/2  =>  f2 ≈ x/2 - x^2/3
        return x / 2.0 - (x * x) / 3.0;
    }

    f1(d, lambda) - (-x).exp()
}
