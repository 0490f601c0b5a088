//! Issuer drill-down on top of a scored portfolio.
//!
//! - `curve`: monotone interpolation through the issuer's own bonds
//! - `fundamentals`: quarterly statements and derived ratios
//! - `peers`: issuer vs sector-peer comparison
//! - `profile`: pluggable qualitative profiler

pub mod curve;
pub mod fundamentals;
pub mod peers;
pub mod profile;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{CurveFitResult, FitStatus, ScoredBond};
use crate::error::EngineError;
use crate::math::mean;
use crate::portfolio::PortfolioAnalyzer;

pub use curve::MonotoneCurve;
pub use fundamentals::{FundamentalsIndex, IssuerFundamentals, IssuerLink, QuarterMetrics, QuarterlyStatement};
pub use peers::{FundamentalMetric, MetricComparison, PeerComparison, Verdict, peer_comparison};
pub use profile::{CreditProfile, CreditProfiler, ProfilerError, SignalProfiler};

/// Everything known about one issuer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuerView {
    pub issuer: String,
    /// Sector holding most of the issuer's bonds.
    pub sector: Option<String>,
    pub bonds: Vec<ScoredBond>,
    pub curve: Option<MonotoneCurve>,
    pub curve_status: FitStatus,
    pub curve_message: Option<String>,
    /// Mean of the defined Z-scores.
    pub average_z: Option<f64>,
    /// The sector curve, for overlay against the issuer curve.
    pub sector_fit: Option<CurveFitResult>,
    pub fundamentals: Option<PeerComparison>,
    pub profile: Option<CreditProfile>,
}

/// Builds [`IssuerView`]s from a fitted portfolio.
pub struct IssuerAnalyzer<'a> {
    portfolio: &'a PortfolioAnalyzer,
    fundamentals: Option<&'a FundamentalsIndex>,
    profiler: Option<Box<dyn CreditProfiler + 'a>>,
}

impl<'a> IssuerAnalyzer<'a> {
    pub fn new(portfolio: &'a PortfolioAnalyzer) -> Self {
        Self {
            portfolio,
            fundamentals: None,
            profiler: None,
        }
    }

    pub fn with_fundamentals(mut self, index: &'a FundamentalsIndex) -> Self {
        self.fundamentals = Some(index);
        self
    }

    pub fn with_profiler(mut self, profiler: Box<dyn CreditProfiler + 'a>) -> Self {
        debug!(profiler = profiler.name(), "credit profiler registered");
        self.profiler = Some(profiler);
        self
    }

    /// Issuer keys present in the portfolio, sorted.
    pub fn issuers(&self) -> Vec<String> {
        let keys: BTreeSet<&str> = self
            .portfolio
            .bonds()
            .iter()
            .map(|b| b.bond.issuer_key())
            .filter(|k| !k.is_empty())
            .collect();
        keys.into_iter().map(str::to_string).collect()
    }

    /// Build the view for `issuer` (matched case-insensitively on the issuer key).
    ///
    /// Fails with `InsufficientData` only when the portfolio holds no bond of
    /// that issuer. A curve that cannot be built, missing fundamentals, or a
    /// failing profiler degrade the view instead.
    pub fn issuer_view(&self, issuer: &str) -> Result<IssuerView, EngineError> {
        let bonds: Vec<ScoredBond> = self
            .portfolio
            .issuer_bonds(issuer)
            .into_iter()
            .cloned()
            .collect();
        if bonds.is_empty() {
            return Err(EngineError::insufficient(issuer, 1, 0));
        }
        let issuer = bonds[0].bond.issuer_key().to_string();
        let sector = dominant_sector(&bonds);

        let points: Vec<(f64, f64)> = bonds
            .iter()
            .filter(|b| b.bond.is_fit_eligible())
            .filter_map(|b| Some((b.bond.duration?, b.bond.yield_?)))
            .collect();
        let min_points = self.portfolio.config().issuer_min_bonds;
        let (curve, curve_status, curve_message) = match MonotoneCurve::fit(&issuer, &points, min_points) {
            Ok(c) => (Some(c), FitStatus::Fitted, None),
            Err(e) => {
                debug!(issuer = %issuer, reason = %e, "no issuer curve");
                (None, FitStatus::InsufficientData, Some(e.to_string()))
            }
        };

        let z: Vec<f64> = bonds.iter().filter_map(|b| b.z_score).collect();
        let sector_fit = sector
            .as_deref()
            .and_then(|s| self.portfolio.sector_fit(s))
            .cloned();

        let fundamentals = match (self.fundamentals, sector.as_deref()) {
            (Some(index), Some(s)) => {
                let peers = self.sector_issuers(s);
                let peers: Vec<&str> = peers.iter().map(String::as_str).collect();
                peer_comparison(&issuer, &peers, index)
            }
            (Some(index), None) => peer_comparison(&issuer, &[], index),
            (None, _) => None,
        };

        let mut view = IssuerView {
            issuer,
            sector,
            bonds,
            curve,
            curve_status,
            curve_message,
            average_z: mean(&z),
            sector_fit,
            fundamentals,
            profile: None,
        };

        if let Some(profiler) = self.profiler.as_ref() {
            match profiler.profile(&view) {
                Ok(p) => view.profile = Some(p),
                Err(e) => warn!(issuer = %view.issuer, error = %e, "credit profile unavailable"),
            }
        }
        Ok(view)
    }

    fn sector_issuers(&self, sector: &str) -> Vec<String> {
        let keys: BTreeSet<&str> = self
            .portfolio
            .bonds()
            .iter()
            .filter(|b| b.bond.sector == sector)
            .map(|b| b.bond.issuer_key())
            .collect();
        keys.into_iter().map(str::to_string).collect()
    }
}

fn dominant_sector(bonds: &[ScoredBond]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for b in bonds {
        *counts.entry(b.bond.sector.as_str()).or_default() += 1;
    }
    // Highest count; the lexicographically first sector on ties.
    let mut best: Option<(&str, usize)> = None;
    for (sector, n) in counts {
        if best.is_none_or(|(_, m)| n > m) {
            best = Some((sector, n));
        }
    }
    best.map(|(s, _)| s.to_string())
}
