//! Engine configuration.
//!
//! Thresholds and bounds are business/risk decisions, so every one of them is a
//! configuration value. A config can be built in code (`EngineConfig::default()`),
//! read from TOML, and then overridden by CLI flags.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::ModelKind;
use crate::error::{AppError, EngineError};

/// Nelson-Siegel solver settings.
///
/// β bounds are expressed in percentage points (as quoted on a desk) and are
/// converted to decimal yield units by the fitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NelsonSiegelConfig {
    pub beta0_bounds_pct: (f64, f64),
    /// Shared by β1 and β2.
    pub beta_bounds_pct: (f64, f64),
    pub lambda_bounds: (f64, f64),
    pub max_iterations: usize,
    /// Log-spaced λ values scanned for the initial guess.
    pub lambda_grid_steps: usize,
    /// Relative SSE improvement below which the solver stops.
    pub tolerance: f64,
    /// Scan the λ grid on the rayon pool. Follows [`EngineConfig::parallel`]
    /// during a sector pass.
    #[serde(skip)]
    pub parallel_grid: bool,
}

impl Default for NelsonSiegelConfig {
    fn default() -> Self {
        Self {
            beta0_bounds_pct: (-10.0, 50.0),
            beta_bounds_pct: (-50.0, 50.0),
            lambda_bounds: (0.1, 5.0),
            max_iterations: 200,
            lambda_grid_steps: 25,
            tolerance: 1e-12,
            parallel_grid: true,
        }
    }
}

impl NelsonSiegelConfig {
    /// Lower/upper parameter bounds in fitting units (`[β0, β1, β2, λ]`).
    pub fn param_bounds(&self) -> ([f64; 4], [f64; 4]) {
        let (b0_lo, b0_hi) = self.beta0_bounds_pct;
        let (b_lo, b_hi) = self.beta_bounds_pct;
        let (l_lo, l_hi) = self.lambda_bounds;
        (
            [b0_lo / 100.0, b_lo / 100.0, b_lo / 100.0, l_lo],
            [b0_hi / 100.0, b_hi / 100.0, b_hi / 100.0, l_hi],
        )
    }
}

/// Full configuration surface of the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub model: ModelKind,
    /// Z-scores strictly below this are Rich (sell side).
    pub rich_threshold: f64,
    /// Z-scores strictly above this are Cheap (buy side).
    pub cheap_threshold: f64,
    /// Minimum eligible bonds per sector. The model's own minimum still applies.
    pub min_samples: usize,
    /// Sell candidates must carry strictly less than this (decimal), when set.
    pub sell_max_net_carry: Option<f64>,
    /// Buy candidates must carry strictly more than this (decimal), when set.
    pub buy_min_net_carry: Option<f64>,
    /// Nominal above which a position is in the high liquidity tier.
    pub liquidity_threshold: f64,
    /// Use the rayon pool, both across sectors and inside each
    /// Nelson–Siegel λ scan.
    pub parallel: bool,
    /// Minimum distinct durations for an issuer-local curve.
    pub issuer_min_bonds: usize,
    pub nelson_siegel: NelsonSiegelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Quadratic,
            rich_threshold: -1.5,
            cheap_threshold: 1.5,
            min_samples: 3,
            sell_max_net_carry: None,
            buy_min_net_carry: None,
            liquidity_threshold: 10_000_000.0,
            parallel: true,
            issuer_min_bonds: 3,
            nelson_siegel: NelsonSiegelConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::config(format!("invalid TOML: {e}")))
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(2, format!("Failed to read config '{}': {e}", path.display()))
        })?;
        Ok(Self::from_toml_str(&text)?)
    }

    /// Effective per-sector minimum for a model kind.
    pub fn min_samples_for(&self, model: ModelKind) -> usize {
        self.min_samples.max(model.min_observations())
    }

    /// Reject caller mistakes before any fitting begins.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_samples == 0 {
            return Err(EngineError::config("min_samples must be > 0"));
        }
        if !(self.rich_threshold.is_finite() && self.cheap_threshold.is_finite()) {
            return Err(EngineError::config("Z-score thresholds must be finite"));
        }
        if self.rich_threshold >= self.cheap_threshold {
            return Err(EngineError::config(format!(
                "rich_threshold ({}) must be below cheap_threshold ({})",
                self.rich_threshold, self.cheap_threshold
            )));
        }
        for (name, bound) in [
            ("sell_max_net_carry", self.sell_max_net_carry),
            ("buy_min_net_carry", self.buy_min_net_carry),
        ] {
            if bound.is_some_and(|v| !v.is_finite()) {
                return Err(EngineError::config(format!("{name} must be finite")));
            }
        }
        if !(self.liquidity_threshold.is_finite() && self.liquidity_threshold >= 0.0) {
            return Err(EngineError::config("liquidity_threshold must be finite and >= 0"));
        }
        if self.issuer_min_bonds < 2 {
            return Err(EngineError::config("issuer_min_bonds must be >= 2"));
        }

        let ns = &self.nelson_siegel;
        check_bounds("nelson_siegel.beta0_bounds_pct", ns.beta0_bounds_pct)?;
        check_bounds("nelson_siegel.beta_bounds_pct", ns.beta_bounds_pct)?;
        check_bounds("nelson_siegel.lambda_bounds", ns.lambda_bounds)?;
        if ns.lambda_bounds.0 <= 0.0 {
            return Err(EngineError::config("nelson_siegel.lambda_bounds lower bound must be > 0"));
        }
        if ns.max_iterations == 0 {
            return Err(EngineError::config("nelson_siegel.max_iterations must be > 0"));
        }
        if ns.lambda_grid_steps < 2 {
            return Err(EngineError::config("nelson_siegel.lambda_grid_steps must be >= 2"));
        }
        if !(ns.tolerance.is_finite() && ns.tolerance > 0.0) {
            return Err(EngineError::config("nelson_siegel.tolerance must be finite and > 0"));
        }
        Ok(())
    }
}

fn check_bounds(name: &str, (lo, hi): (f64, f64)) -> Result<(), EngineError> {
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(EngineError::config(format!(
            "{name} must be finite with lower < upper (got [{lo}, {hi}])"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
model = "nelson-siegel"
rich_threshold = -2.0

[nelson_siegel]
max_iterations = 50
"#,
        )
        .unwrap();
        assert_eq!(cfg.model, ModelKind::NelsonSiegel);
        assert_eq!(cfg.rich_threshold, -2.0);
        assert_eq!(cfg.cheap_threshold, 1.5);
        assert_eq!(cfg.nelson_siegel.max_iterations, 50);
        assert_eq!(cfg.nelson_siegel.lambda_bounds, (0.1, 5.0));
        assert_eq!(cfg.sell_max_net_carry, None);
    }

    #[test]
    fn carry_bounds_load_from_toml() {
        let cfg = EngineConfig::from_toml_str("sell_max_net_carry = 0.001\nbuy_min_net_carry = 0.0\n").unwrap();
        assert_eq!(cfg.sell_max_net_carry, Some(0.001));
        assert_eq!(cfg.buy_min_net_carry, Some(0.0));

        let bad = EngineConfig {
            buy_min_net_carry: Some(f64::NAN),
            ..EngineConfig::default()
        };
        assert!(matches!(bad.validate(), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("z_threshold = 1.0").unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let mut cfg = EngineConfig::default();
        cfg.min_samples = 0;
        assert!(matches!(cfg.validate(), Err(EngineError::Configuration(_))));

        let mut cfg = EngineConfig::default();
        cfg.rich_threshold = 2.0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.nelson_siegel.lambda_bounds = (0.0, 5.0);
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.nelson_siegel.beta_bounds_pct = (50.0, -50.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn model_minimum_dominates_small_min_samples() {
        let mut cfg = EngineConfig::default();
        cfg.min_samples = 1;
        assert_eq!(cfg.min_samples_for(ModelKind::Quadratic), 3);
        assert_eq!(cfg.min_samples_for(ModelKind::NelsonSiegel), 4);
        cfg.min_samples = 5;
        assert_eq!(cfg.min_samples_for(ModelKind::NelsonSiegel), 5);
    }

    #[test]
    fn beta_bounds_convert_to_decimal() {
        let (lo, hi) = NelsonSiegelConfig::default().param_bounds();
        assert!((lo[0] + 0.10).abs() < 1e-12);
        assert!((hi[0] - 0.50).abs() < 1e-12);
        assert!((lo[1] + 0.50).abs() < 1e-12);
        assert!((hi[3] - 5.0).abs() < 1e-12);
    }
}
