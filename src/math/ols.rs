//! Linear least squares solver.
//!
//! Both curve models reduce to small linear regressions at some point:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! - the quadratic model is linear in `[a, b, c]` outright
//! - Nelson–Siegel is linear in `[β0, β1, β2]` once `λ` is fixed, which is how
//!   the λ grid seeds the nonlinear solver
//!
//! Implementation choices:
//! - SVD so tall design matrices (more rows than columns) solve robustly.
//!   (Nalgebra's `QR::solve` is intended for square systems.)
//! - Parameter dimension is tiny (3 columns), so SVD cost is irrelevant.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
