//! Portfolio and sector aggregates.
//!
//! Recomputed on demand from the scored snapshot; nothing here is cached.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{Accounting, FitStatus, LiquidityTier, ModelKind, ScoredBond, SectorDiagnostics};
use crate::math::{mean, sample_std, weighted_mean};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorAllocation {
    pub sector: String,
    pub nominal: f64,
    /// Share of total positive nominal, in percent.
    pub pct: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountingExposure {
    pub accounting: Accounting,
    pub nominal: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LiquidityProfile {
    pub high: usize,
    pub low: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub model: ModelKind,
    pub total_bonds: usize,
    /// Bonds with a defined Z-score.
    pub scored_bonds: usize,
    pub sectors_fitted: usize,
    pub sectors_skipped: usize,
    pub total_nominal: f64,
    pub weighted_duration: Option<f64>,
    pub weighted_yield: Option<f64>,
    pub weighted_net_carry: Option<f64>,
    /// Largest exposure first.
    pub sector_allocation: Vec<SectorAllocation>,
    pub accounting_breakdown: Vec<AccountingExposure>,
    pub sell_count: usize,
    pub cheap_count: usize,
    pub bleeding_count: usize,
    pub negative_carry_exposure: f64,
    pub htm_count: usize,
    pub htm_exposure: f64,
    pub tradeable_count: usize,
    pub tradeable_exposure: f64,
    pub liquidity: LiquidityProfile,
}

/// Per-sector descriptive statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorSummary {
    pub sector: String,
    pub status: FitStatus,
    pub count: usize,
    pub exposure: f64,
    pub avg_duration: Option<f64>,
    pub avg_yield: Option<f64>,
    pub avg_net_carry: Option<f64>,
    pub avg_z: Option<f64>,
    pub z_std: Option<f64>,
}

/// Counts of the candidate queries, filled in by the analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SignalCounts {
    pub sell: usize,
    pub cheap: usize,
    pub bleeding: usize,
}

fn exposure(b: &ScoredBond) -> f64 {
    b.bond.nominal.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn weighted<F>(bonds: &[ScoredBond], metric: F) -> Option<f64>
where
    F: Fn(&ScoredBond) -> Option<f64>,
{
    weighted_mean(
        bonds
            .iter()
            .filter_map(|b| Some((metric(b)?, b.bond.nominal?))),
    )
}

pub(crate) fn build_summary(
    model: ModelKind,
    bonds: &[ScoredBond],
    diagnostics: &[SectorDiagnostics],
    counts: SignalCounts,
) -> PortfolioSummary {
    let total_nominal: f64 = bonds.iter().map(exposure).sum();
    let positive_nominal: f64 = bonds.iter().map(exposure).filter(|n| *n > 0.0).sum();

    let mut by_sector: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    let mut by_accounting: BTreeMap<Accounting, (f64, usize)> = BTreeMap::new();
    let mut liquidity = LiquidityProfile::default();
    let mut negative_carry_exposure = 0.0;
    let (mut htm_count, mut htm_exposure) = (0, 0.0);
    let (mut tradeable_count, mut tradeable_exposure) = (0, 0.0);

    for b in bonds {
        let nominal = exposure(b);
        let s = by_sector.entry(b.bond.sector.as_str()).or_default();
        s.0 += nominal;
        s.1 += 1;
        let a = by_accounting.entry(b.bond.accounting).or_default();
        a.0 += nominal;
        a.1 += 1;

        match b.liquidity {
            Some(LiquidityTier::High) => liquidity.high += 1,
            Some(LiquidityTier::Low) => liquidity.low += 1,
            None => liquidity.unknown += 1,
        }
        if b.net_carry.is_some_and(|c| c < 0.0) {
            negative_carry_exposure += nominal;
        }
        if b.is_tradeable {
            tradeable_count += 1;
            tradeable_exposure += nominal;
        } else {
            htm_count += 1;
            htm_exposure += nominal;
        }
    }

    let mut sector_allocation: Vec<SectorAllocation> = by_sector
        .into_iter()
        .map(|(sector, (nominal, count))| SectorAllocation {
            sector: sector.to_string(),
            nominal,
            pct: (positive_nominal > 0.0).then(|| nominal / positive_nominal * 100.0),
            count,
        })
        .collect();
    sector_allocation.sort_by(|a, b| b.nominal.total_cmp(&a.nominal).then_with(|| a.sector.cmp(&b.sector)));

    let mut accounting_breakdown: Vec<AccountingExposure> = by_accounting
        .into_iter()
        .map(|(accounting, (nominal, count))| AccountingExposure {
            accounting,
            nominal,
            count,
        })
        .collect();
    accounting_breakdown.sort_by(|a, b| b.nominal.total_cmp(&a.nominal).then(a.accounting.cmp(&b.accounting)));

    let sectors_fitted = diagnostics.iter().filter(|d| d.is_fitted()).count();

    PortfolioSummary {
        model,
        total_bonds: bonds.len(),
        scored_bonds: bonds.iter().filter(|b| b.z_score.is_some()).count(),
        sectors_fitted,
        sectors_skipped: diagnostics.len() - sectors_fitted,
        total_nominal,
        weighted_duration: weighted(bonds, |b| b.bond.duration),
        weighted_yield: weighted(bonds, |b| b.bond.yield_),
        weighted_net_carry: weighted(bonds, |b| b.net_carry),
        sector_allocation,
        accounting_breakdown,
        sell_count: counts.sell,
        cheap_count: counts.cheap,
        bleeding_count: counts.bleeding,
        negative_carry_exposure,
        htm_count,
        htm_exposure,
        tradeable_count,
        tradeable_exposure,
        liquidity,
    }
}

pub(crate) fn build_sector_summaries(
    bonds: &[ScoredBond],
    diagnostics: &[SectorDiagnostics],
) -> Vec<SectorSummary> {
    let mut members: BTreeMap<&str, Vec<&ScoredBond>> = BTreeMap::new();
    for b in bonds {
        members.entry(b.bond.sector.as_str()).or_default().push(b);
    }

    let mut out: Vec<SectorSummary> = diagnostics
        .iter()
        .map(|diag| {
            let rows = members.get(diag.sector.as_str()).map(Vec::as_slice).unwrap_or_default();
            let collect = |f: fn(&ScoredBond) -> Option<f64>| -> Vec<f64> {
                rows.iter().copied().filter_map(f).filter(|v| v.is_finite()).collect()
            };
            let z = collect(|b| b.z_score);
            SectorSummary {
                sector: diag.sector.clone(),
                status: diag.status,
                count: rows.len(),
                exposure: rows.iter().copied().map(exposure).sum(),
                avg_duration: mean(&collect(|b| b.bond.duration)),
                avg_yield: mean(&collect(|b| b.bond.yield_)),
                avg_net_carry: mean(&collect(|b| b.net_carry)),
                avg_z: mean(&z),
                z_std: sample_std(&z),
            }
        })
        .collect();

    out.sort_by(|a, b| b.exposure.total_cmp(&a.exposure).then_with(|| a.sector.cmp(&b.sector)));
    out
}
