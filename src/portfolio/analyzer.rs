//! Portfolio analyzer: fit once, then query the scored snapshot.
//!
//! An analyzer is immutable after construction. Switching the curve model
//! builds a new analyzer via [`PortfolioAnalyzer::refit`], so results from two
//! model kinds are never mixed in one snapshot.

use std::cmp::Ordering;

use tracing::info;

use crate::domain::{
    BondRecord, CurveFitResult, EngineConfig, LiquidityTier, ModelKind, RvSignal, ScoredBond,
    SectorDiagnostics,
};
use crate::error::EngineError;
use crate::fit::fit_sectors;
use crate::models::curve_grid;
use crate::portfolio::metrics::derive_metrics;
use crate::portfolio::summary::{
    PortfolioSummary, SectorSummary, SignalCounts, build_sector_summaries, build_summary,
};

#[derive(Debug, Clone)]
pub struct PortfolioAnalyzer {
    config: EngineConfig,
    bonds: Vec<ScoredBond>,
    diagnostics: Vec<SectorDiagnostics>,
}

impl PortfolioAnalyzer {
    /// Validate `config`, fit every sector with `config.model` and score all bonds.
    ///
    /// Only a configuration error is returned; sectors that cannot be fitted
    /// are reported in [`diagnostics`](Self::diagnostics).
    pub fn fit(bonds: Vec<BondRecord>, config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let fit = fit_sectors(&bonds, config.model, config);
        let scored: Vec<ScoredBond> = bonds
            .into_iter()
            .zip(fit.annotations)
            .map(|(bond, ann)| {
                let m = derive_metrics(&bond, config);
                ScoredBond {
                    signal: RvSignal::classify(ann.z_score, config.rich_threshold, config.cheap_threshold),
                    model_yield: ann.model_yield,
                    residual: ann.residual,
                    z_score: ann.z_score,
                    net_carry: m.net_carry,
                    carry_efficiency: m.carry_efficiency,
                    liquidity: m.liquidity,
                    is_tradeable: m.is_tradeable,
                    bond,
                }
            })
            .collect();

        info!(
            bonds = scored.len(),
            scored = scored.iter().filter(|b| b.z_score.is_some()).count(),
            model = config.model.display_name(),
            "portfolio scored"
        );

        Ok(Self {
            config: config.clone(),
            bonds: scored,
            diagnostics: fit.diagnostics,
        })
    }

    /// Re-run the whole pass with another model kind.
    pub fn refit(&self, model: ModelKind) -> Result<Self, EngineError> {
        let config = EngineConfig {
            model,
            ..self.config.clone()
        };
        let records = self.bonds.iter().map(|b| b.bond.clone()).collect();
        Self::fit(records, &config)
    }

    pub fn model(&self) -> ModelKind {
        self.config.model
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scored bonds in input order.
    pub fn bonds(&self) -> &[ScoredBond] {
        &self.bonds
    }

    pub fn diagnostics(&self) -> &[SectorDiagnostics] {
        &self.diagnostics
    }

    pub fn sector_fit(&self, sector: &str) -> Option<&CurveFitResult> {
        self.diagnostics
            .iter()
            .find(|d| d.sector == sector)
            .and_then(|d| d.fit.as_ref())
    }

    /// Tradeable bonds with Z below `z_threshold`, richest first.
    ///
    /// With `max_net_carry`, only bonds whose net carry is strictly below it
    /// qualify; a bond without carry is then excluded.
    pub fn sell_candidates(&self, z_threshold: f64, max_net_carry: Option<f64>) -> Vec<&ScoredBond> {
        let mut out: Vec<&ScoredBond> = self
            .bonds
            .iter()
            .filter(|b| b.is_tradeable && b.z_score.is_some_and(|z| z < z_threshold))
            .filter(|b| max_net_carry.is_none_or(|max| b.net_carry.is_some_and(|c| c < max)))
            .collect();
        out.sort_by(|a, b| by_z(a, b));
        out
    }

    /// Bonds with Z above `z_threshold`, cheapest first.
    pub fn cheap_candidates(&self, z_threshold: f64) -> Vec<&ScoredBond> {
        let mut out: Vec<&ScoredBond> = self
            .bonds
            .iter()
            .filter(|b| b.z_score.is_some_and(|z| z > z_threshold))
            .collect();
        out.sort_by(|a, b| {
            cmp_none_last(b.z_score, a.z_score).then_with(|| a.bond.ticker.cmp(&b.bond.ticker))
        });
        out
    }

    /// Cheap bonds whose liquidity tier is at least `min_liquidity` and, when
    /// `min_net_carry` is given, whose net carry is strictly above it.
    pub fn buy_candidates(
        &self,
        z_threshold: f64,
        min_net_carry: Option<f64>,
        min_liquidity: LiquidityTier,
    ) -> Vec<&ScoredBond> {
        self.cheap_candidates(z_threshold)
            .into_iter()
            .filter(|b| b.liquidity.is_some_and(|l| l >= min_liquidity))
            .filter(|b| min_net_carry.is_none_or(|min| b.net_carry.is_some_and(|c| c > min)))
            .collect()
    }

    /// Bonds funded above their yield (net carry strictly negative), worst
    /// carry efficiency first.
    pub fn bleeding_assets(&self) -> Vec<&ScoredBond> {
        let mut out: Vec<&ScoredBond> = self
            .bonds
            .iter()
            .filter(|b| b.net_carry.is_some_and(|c| c < 0.0))
            .collect();
        out.sort_by(|a, b| {
            cmp_none_last(a.carry_efficiency, b.carry_efficiency)
                .then_with(|| a.bond.ticker.cmp(&b.bond.ticker))
        });
        out
    }

    pub fn generate_summary(&self) -> PortfolioSummary {
        let counts = SignalCounts {
            sell: self
                .sell_candidates(self.config.rich_threshold, self.config.sell_max_net_carry)
                .len(),
            cheap: self.cheap_candidates(self.config.cheap_threshold).len(),
            bleeding: self.bleeding_assets().len(),
        };
        build_summary(self.model(), &self.bonds, &self.diagnostics, counts)
    }

    /// One row per sector, largest exposure first.
    pub fn sector_summary(&self) -> Vec<SectorSummary> {
        build_sector_summaries(&self.bonds, &self.diagnostics)
    }

    /// The `n` sectors with the lowest average Z.
    pub fn richest_sectors(&self, n: usize) -> Vec<SectorSummary> {
        let mut rows: Vec<SectorSummary> = self
            .sector_summary()
            .into_iter()
            .filter(|s| s.avg_z.is_some())
            .collect();
        rows.sort_by(|a, b| cmp_none_last(a.avg_z, b.avg_z).then_with(|| a.sector.cmp(&b.sector)));
        rows.truncate(n);
        rows
    }

    /// `n` evenly spaced points along a fitted sector curve, over the
    /// sector's observed duration range.
    pub fn curve_points(&self, sector: &str, n: usize) -> Option<Vec<(f64, f64)>> {
        let fit = self.sector_fit(sector)?;
        let (lo, hi) = fit.duration_range;
        Some(curve_grid(fit.model, &fit.params, lo, hi, n))
    }

    /// Scored bonds of one issuer, in input order.
    pub fn issuer_bonds(&self, issuer: &str) -> Vec<&ScoredBond> {
        self.bonds
            .iter()
            .filter(|b| b.bond.issuer_key().eq_ignore_ascii_case(issuer))
            .collect()
    }
}

fn by_z(a: &ScoredBond, b: &ScoredBond) -> Ordering {
    cmp_none_last(a.z_score, b.z_score).then_with(|| a.bond.ticker.cmp(&b.bond.ticker))
}

fn cmp_none_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Accounting, FitStatus};

    fn bond(ticker: &str, sector: &str, d: f64, y: f64) -> BondRecord {
        BondRecord {
            ticker: ticker.to_string(),
            sector: sector.to_string(),
            duration: Some(d),
            yield_: Some(y),
            ftp: Some(0.04),
            nominal: Some(20_000_000.0),
            accounting: Accounting::Afs,
            ..BondRecord::default()
        }
    }

    /// Eight Corps bonds on a smooth curve plus one rich and one cheap outlier.
    fn portfolio() -> Vec<BondRecord> {
        let mut out: Vec<BondRecord> = (0..8)
            .map(|i| {
                let d = 1.0 + i as f64;
                // Small alternating wiggle keeps the residual variance non-zero.
                let wiggle = if i % 2 == 0 { 0.0002 } else { -0.0002 };
                bond(&format!("C{i}"), "Corps", d, 0.04 + 0.002 * d + wiggle)
            })
            .collect();
        out.push(bond("RICH", "Corps", 4.5, 0.04 + 0.002 * 4.5 - 0.004));
        out.push(bond("CHEAP", "Corps", 5.5, 0.04 + 0.002 * 5.5 + 0.004));
        out
    }

    #[test]
    fn outliers_surface_as_sell_and_cheap_candidates() {
        let a = PortfolioAnalyzer::fit(portfolio(), &EngineConfig::default()).unwrap();
        let sells = a.sell_candidates(-1.5, None);
        let cheaps = a.cheap_candidates(1.5);
        assert_eq!(sells.first().map(|b| b.bond.ticker.as_str()), Some("RICH"));
        assert_eq!(cheaps.first().map(|b| b.bond.ticker.as_str()), Some("CHEAP"));
        assert_eq!(sells[0].signal, RvSignal::Rich);
        for w in sells.windows(2) {
            assert!(w[0].z_score <= w[1].z_score);
        }
    }

    #[test]
    fn htm_bond_is_never_a_sell_candidate() {
        let mut bonds = portfolio();
        bonds[8].accounting = Accounting::Htm;
        let a = PortfolioAnalyzer::fit(bonds, &EngineConfig::default()).unwrap();
        let rich = a.bonds().iter().find(|b| b.bond.ticker == "RICH").unwrap();
        assert!(rich.z_score.unwrap() < -1.5);
        assert!(a.sell_candidates(-1.5, None).iter().all(|b| b.bond.ticker != "RICH"));
    }

    #[test]
    fn buy_candidates_respect_liquidity_floor() {
        let mut bonds = portfolio();
        bonds[9].nominal = Some(1_000_000.0);
        let a = PortfolioAnalyzer::fit(bonds, &EngineConfig::default()).unwrap();
        assert!(a.buy_candidates(1.5, None, LiquidityTier::Low).iter().any(|b| b.bond.ticker == "CHEAP"));
        assert!(a.buy_candidates(1.5, None, LiquidityTier::High).iter().all(|b| b.bond.ticker != "CHEAP"));
    }

    #[test]
    fn sell_carry_cap_drops_rich_bond_with_high_carry() {
        let mut bonds = portfolio();
        // RICH yields about 4.5%; funded at 3% it carries about +150bp.
        bonds[8].ftp = Some(0.03);
        let a = PortfolioAnalyzer::fit(bonds, &EngineConfig::default()).unwrap();
        assert!(a.sell_candidates(-1.5, None).iter().any(|b| b.bond.ticker == "RICH"));
        assert!(a.sell_candidates(-1.5, Some(0.01)).iter().all(|b| b.bond.ticker != "RICH"));
        assert!(a.sell_candidates(-1.5, Some(0.02)).iter().any(|b| b.bond.ticker == "RICH"));
    }

    #[test]
    fn buy_carry_floor_drops_cheap_bond_with_negative_carry() {
        let mut bonds = portfolio();
        // CHEAP yields about 5.5%; funded at 6% it bleeds.
        bonds[9].ftp = Some(0.06);
        let a = PortfolioAnalyzer::fit(bonds, &EngineConfig::default()).unwrap();
        let cheap = a.bonds().iter().find(|b| b.bond.ticker == "CHEAP").unwrap();
        assert!(cheap.net_carry.unwrap() < 0.0);
        assert!(a.buy_candidates(1.5, None, LiquidityTier::Low).iter().any(|b| b.bond.ticker == "CHEAP"));
        assert!(
            a.buy_candidates(1.5, Some(0.0), LiquidityTier::Low)
                .iter()
                .all(|b| b.bond.ticker != "CHEAP")
        );
    }

    #[test]
    fn sell_carry_cap_counts_missing_ftp_as_unfunded() {
        let mut bonds = portfolio();
        bonds[8].ftp = None;
        let a = PortfolioAnalyzer::fit(bonds, &EngineConfig::default()).unwrap();
        // Carry is the full yield, about 4.5%.
        assert!(a.sell_candidates(-1.5, Some(0.05)).iter().any(|b| b.bond.ticker == "RICH"));
        assert!(a.sell_candidates(-1.5, Some(0.04)).iter().all(|b| b.bond.ticker != "RICH"));
    }

    #[test]
    fn bleeding_assets_sorted_by_carry_efficiency() {
        let mut bonds = portfolio();
        bonds[0].ftp = Some(0.06); // d=1, carry -0.0178
        bonds[3].ftp = Some(0.07); // d=4, carry -0.0222
        bonds[5].ftp = Some(0.06);
        bonds[5].duration = Some(0.0);
        let a = PortfolioAnalyzer::fit(bonds, &EngineConfig::default()).unwrap();
        let bleeding: Vec<&str> = a.bleeding_assets().iter().map(|b| b.bond.ticker.as_str()).collect();
        assert_eq!(bleeding, vec!["C0", "C3", "C5"]);
    }

    #[test]
    fn summary_weights_by_nominal() {
        let mut bonds = portfolio();
        for b in &mut bonds {
            b.nominal = Some(0.0);
        }
        bonds[0].nominal = Some(3.0);
        bonds[1].nominal = Some(1.0);
        let a = PortfolioAnalyzer::fit(bonds.clone(), &EngineConfig::default()).unwrap();
        let s = a.generate_summary();
        let expected = (3.0 * bonds[0].duration.unwrap() + bonds[1].duration.unwrap()) / 4.0;
        assert!((s.weighted_duration.unwrap() - expected).abs() < 1e-12);
        assert_eq!(s.total_bonds, 10);
        assert_eq!(s.sector_allocation.len(), 1);
        assert_eq!(s.sector_allocation[0].pct, Some(100.0));
        assert_eq!(s.sell_count, a.sell_candidates(-1.5, None).len());
    }

    #[test]
    fn zero_total_nominal_leaves_weighted_metrics_undefined() {
        let mut bonds = portfolio();
        for b in &mut bonds {
            b.nominal = Some(0.0);
        }
        let s = PortfolioAnalyzer::fit(bonds, &EngineConfig::default())
            .unwrap()
            .generate_summary();
        assert_eq!(s.weighted_duration, None);
        assert_eq!(s.weighted_yield, None);
        assert_eq!(s.sector_allocation[0].pct, None);
    }

    #[test]
    fn refit_switches_model_without_mixing() {
        let a = PortfolioAnalyzer::fit(portfolio(), &EngineConfig::default()).unwrap();
        let ns = a.refit(ModelKind::NelsonSiegel).unwrap();
        assert_eq!(ns.model(), ModelKind::NelsonSiegel);
        assert!(ns.diagnostics().iter().all(|d| d.model == ModelKind::NelsonSiegel));
        assert_eq!(a.model(), ModelKind::Quadratic);
        assert_eq!(ns.bonds().len(), a.bonds().len());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            rich_threshold: 2.0,
            cheap_threshold: 1.0,
            ..EngineConfig::default()
        };
        let err = PortfolioAnalyzer::fit(portfolio(), &config).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn sector_queries() {
        let mut bonds = portfolio();
        bonds.push(bond("M1", "MBS", 2.0, 0.05));
        let a = PortfolioAnalyzer::fit(bonds, &EngineConfig::default()).unwrap();

        let sectors = a.sector_summary();
        assert_eq!(sectors[0].sector, "Corps");
        assert_eq!(sectors[1].status, FitStatus::InsufficientData);
        assert_eq!(sectors[1].avg_z, None);

        let richest = a.richest_sectors(3);
        assert_eq!(richest.len(), 1);

        let pts = a.curve_points("Corps", 11).unwrap();
        assert_eq!(pts.len(), 11);
        assert!((pts[0].0 - 1.0).abs() < 1e-12);
        assert!((pts[10].0 - 8.0).abs() < 1e-12);
        assert!(a.curve_points("MBS", 11).is_none());
    }
}
