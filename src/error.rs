//! Error types.
//!
//! Two layers:
//!
//! - [`EngineError`]: the fitting/scoring taxonomy. Per-partition failures
//!   (`InsufficientData`, `CurveFit`) are recorded in diagnostics and never
//!   abort a pass; only `Configuration` is returned to callers.
//! - [`AppError`]: what the `rv` binary reports, carrying a process exit code.

use thiserror::Error;

/// Fitting and scoring errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A sector/issuer has fewer usable observations than the model requires.
    #[error("insufficient data for '{partition}': need at least {required} observations, got {got}")]
    InsufficientData {
        partition: String,
        required: usize,
        got: usize,
    },

    /// The curve could not be fitted (degenerate inputs or no convergence).
    #[error("curve fit failed for '{partition}': {reason}")]
    CurveFit { partition: String, reason: String },

    /// Invalid thresholds or bounds supplied by the caller.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn insufficient(partition: impl Into<String>, required: usize, got: usize) -> Self {
        Self::InsufficientData {
            partition: partition.into(),
            required,
            got,
        }
    }

    pub fn curve_fit(partition: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CurveFit {
            partition: partition.into(),
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let exit_code = match err {
            EngineError::Configuration(_) => 2,
            EngineError::InsufficientData { .. } => 3,
            EngineError::CurveFit { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_exit_codes() {
        let e: AppError = EngineError::config("min_samples must be > 0").into();
        assert_eq!(e.exit_code(), 2);
        let e: AppError = EngineError::insufficient("MBS", 3, 2).into();
        assert_eq!(e.exit_code(), 3);
        let e: AppError = EngineError::curve_fit("Corps", "did not converge").into();
        assert_eq!(e.exit_code(), 4);
        assert!(e.to_string().contains("Corps"));
    }
}
