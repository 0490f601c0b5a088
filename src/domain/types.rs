//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting and scoring
//! - exported to JSON/CSV for the reporting layer
//! - handed to presentation code without exposing engine internals

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::predict;

/// Which curve model to fit per sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// `y = a·d² + b·d + c`
    Quadratic,
    /// `y = β0 + β1·f1(d) + β2·f2(d)` with decay `λ`.
    NelsonSiegel,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Quadratic => "Quadratic",
            ModelKind::NelsonSiegel => "Nelson-Siegel",
        }
    }

    /// Number of free parameters.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Quadratic => 3,
            ModelKind::NelsonSiegel => 4,
        }
    }

    /// Smallest observation count the model can be fitted on.
    pub fn min_observations(self) -> usize {
        self.param_count()
    }
}

/// Accounting classification of a holding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Accounting {
    #[serde(rename = "HTM")]
    Htm,
    #[serde(rename = "AFS")]
    Afs,
    #[serde(rename = "Fair Value")]
    FairValue,
    #[default]
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Accounting {
    /// Normalize a free-form accounting label.
    ///
    /// Common aliases and typos are accepted (`HM`, `HOLD TO MATURITY`, `FV`,
    /// `FVPL`, ...). `FVOCI` is treated as AFS. Anything unrecognized maps to
    /// `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect();
        match key.as_str() {
            "HTM" | "HM" | "HOLDTOMATURITY" => Accounting::Htm,
            "AFS" | "AVAILABLEFORSALE" | "FVOCI" => Accounting::Afs,
            "FAIRVALUE" | "FV" | "FVPL" | "FVTPL" => Accounting::FairValue,
            _ => Accounting::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Accounting::Htm => "HTM",
            Accounting::Afs => "AFS",
            Accounting::FairValue => "Fair Value",
            Accounting::Unknown => "Unknown",
        }
    }

    /// HTM positions cannot be sold.
    pub fn is_tradeable(self) -> bool {
        self != Accounting::Htm
    }
}

/// Discrete liquidity tier derived from position size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidityTier {
    Low,
    High,
}

impl LiquidityTier {
    /// Numeric score used by the original dashboards (5 = high, 3 = low).
    pub fn score(self) -> u8 {
        match self {
            LiquidityTier::Low => 3,
            LiquidityTier::High => 5,
        }
    }
}

/// Rich/cheap classification of a scored bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RvSignal {
    Rich,
    Fair,
    Cheap,
    /// No Z-score (sector unfit, zero variance, or bond not eligible).
    Unscored,
}

impl RvSignal {
    pub fn classify(z_score: Option<f64>, rich_threshold: f64, cheap_threshold: f64) -> Self {
        match z_score {
            Some(z) if z < rich_threshold => RvSignal::Rich,
            Some(z) if z > cheap_threshold => RvSignal::Cheap,
            Some(_) => RvSignal::Fair,
            None => RvSignal::Unscored,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RvSignal::Rich => "Rich",
            RvSignal::Fair => "Fair",
            RvSignal::Cheap => "Cheap",
            RvSignal::Unscored => "-",
        }
    }
}

/// One holding, as delivered by the data-loading layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BondRecord {
    pub ticker: String,
    pub sector: String,
    pub sub_sector: Option<String>,
    pub name: Option<String>,
    /// Duration in years.
    pub duration: Option<f64>,
    /// Yield as a decimal fraction (`0.045` = 4.5%).
    pub yield_: Option<f64>,
    /// Option-adjusted spread in bp.
    pub oas: Option<f64>,
    /// Funding (FTP) rate as a decimal fraction; missing means 0.
    pub ftp: Option<f64>,
    /// Nominal size (USD).
    pub nominal: Option<f64>,
    pub accounting: Accounting,
    pub issuer: Option<String>,
}

impl BondRecord {
    /// Whether the bond can take part in curve fitting.
    pub fn is_fit_eligible(&self) -> bool {
        matches!(
            (self.duration, self.yield_),
            (Some(d), Some(y)) if d.is_finite() && d >= 0.0 && y.is_finite()
        )
    }

    /// Issuer key: explicit issuer, else the first token of the ticker.
    pub fn issuer_key(&self) -> &str {
        if let Some(issuer) = self.issuer.as_deref() {
            let trimmed = issuer.trim();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        self.ticker.split_whitespace().next().unwrap_or("")
    }
}

/// A bond annotated with curve and carry analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredBond {
    pub bond: BondRecord,
    pub model_yield: Option<f64>,
    /// Actual minus model yield.
    pub residual: Option<f64>,
    pub z_score: Option<f64>,
    pub net_carry: Option<f64>,
    pub carry_efficiency: Option<f64>,
    pub liquidity: Option<LiquidityTier>,
    pub is_tradeable: bool,
    pub signal: RvSignal,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub n: usize,
    pub sse: f64,
    pub rmse: f64,
    pub r_squared: f64,
    /// Sample (n-1) standard deviation of the residuals.
    pub residual_std: f64,
}

/// Fitted curve for one partition (sector or issuer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFitResult {
    pub model: ModelKind,
    /// Quadratic: `[a, b, c]`. Nelson-Siegel: `[β0, β1, β2, λ]`.
    pub params: Vec<f64>,
    pub quality: FitQuality,
    pub duration_range: (f64, f64),
    /// Solver iterations (nonlinear models only).
    pub iterations: Option<usize>,
}

impl CurveFitResult {
    pub fn predict(&self, duration: f64) -> f64 {
        predict(self.model, duration, &self.params)
    }
}

/// Outcome of one partition in a fitting pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Fitted,
    InsufficientData,
    CurveFitFailed,
}

/// Per-sector audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorDiagnostics {
    pub sector: String,
    pub model: ModelKind,
    /// Bonds in the sector eligible for fitting.
    pub n_obs: usize,
    pub status: FitStatus,
    pub fit: Option<CurveFitResult>,
    pub message: Option<String>,
}

impl SectorDiagnostics {
    pub fn from_outcome(
        sector: &str,
        model: ModelKind,
        n_obs: usize,
        outcome: Result<CurveFitResult, EngineError>,
    ) -> Self {
        match outcome {
            Ok(fit) => Self {
                sector: sector.to_string(),
                model,
                n_obs,
                status: FitStatus::Fitted,
                fit: Some(fit),
                message: None,
            },
            Err(err) => {
                let status = match err {
                    EngineError::CurveFit { .. } => FitStatus::CurveFitFailed,
                    _ => FitStatus::InsufficientData,
                };
                Self {
                    sector: sector.to_string(),
                    model,
                    n_obs,
                    status,
                    fit: None,
                    message: Some(err.to_string()),
                }
            }
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.status == FitStatus::Fitted
    }
}
