//! Curve fitting.
//!
//! - `quadratic` / `nelson_siegel`: one strategy per model kind
//! - `fitter`: single-partition dispatch and quality diagnostics
//! - `lambda_grid`: deterministic λ seeds for Nelson–Siegel
//! - `sector`: stratified per-sector pass with Z-scores

pub mod fitter;
pub mod lambda_grid;
pub mod nelson_siegel;
pub mod quadratic;
pub mod sector;

pub use fitter::*;
pub use lambda_grid::*;
pub use sector::*;
