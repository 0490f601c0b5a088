//! Stratified per-sector fitting.
//!
//! Bonds are partitioned by sector, each sector gets its own curve, and every
//! eligible bond in a fitted sector is annotated with model yield, residual and
//! Z-score. A sector that cannot be fitted is recorded in the diagnostics and
//! its bonds keep empty curve fields; the pass itself never fails.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{BondRecord, EngineConfig, ModelKind, NelsonSiegelConfig, SectorDiagnostics};
use crate::error::EngineError;
use crate::fit::fitter::{Observation, fit_curve};
use crate::math::sample_std;

/// Residual standard deviations at or below this make Z undefined.
pub const MIN_RESIDUAL_STD: f64 = 1e-12;

/// Curve-derived fields for one bond.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CurveAnnotation {
    pub model_yield: Option<f64>,
    pub residual: Option<f64>,
    pub z_score: Option<f64>,
}

/// Output of one fitting pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorFitOutput {
    pub model: ModelKind,
    /// One entry per input bond, in input order.
    pub annotations: Vec<CurveAnnotation>,
    /// One entry per sector, in sector order.
    pub diagnostics: Vec<SectorDiagnostics>,
}

impl SectorFitOutput {
    pub fn fitted_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_fitted()).count()
    }
}

/// Fit one curve per sector and annotate the bonds.
///
/// Sector order is lexicographic. Observations inside a sector are sorted by
/// `(duration, yield, ticker)` first, so permuting the input rows changes
/// nothing but the order of `annotations`.
pub fn fit_sectors(bonds: &[BondRecord], model: ModelKind, config: &EngineConfig) -> SectorFitOutput {
    let min_samples = config.min_samples_for(model);

    let mut sectors: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, bond) in bonds.iter().enumerate() {
        let members = sectors.entry(bond.sector.as_str()).or_default();
        if bond.is_fit_eligible() {
            members.push(idx);
        }
    }
    for members in sectors.values_mut() {
        members.sort_by(|&a, &b| observation_order(&bonds[a], &bonds[b]));
    }

    let sectors: Vec<(&str, Vec<usize>)> = sectors.into_iter().collect();
    let fit_one = |(sector, members): &(&str, Vec<usize>)| {
        fit_sector(sector, members, bonds, model, min_samples, config)
    };
    let per_sector: Vec<(SectorDiagnostics, Vec<(usize, CurveAnnotation)>)> = if config.parallel {
        sectors.par_iter().map(fit_one).collect()
    } else {
        sectors.iter().map(fit_one).collect()
    };

    let mut annotations = vec![CurveAnnotation::default(); bonds.len()];
    let mut diagnostics = Vec::with_capacity(per_sector.len());
    for (diag, rows) in per_sector {
        for (idx, ann) in rows {
            annotations[idx] = ann;
        }
        diagnostics.push(diag);
    }

    let output = SectorFitOutput {
        model,
        annotations,
        diagnostics,
    };
    info!(
        model = model.display_name(),
        sectors = output.diagnostics.len(),
        fitted = output.fitted_count(),
        skipped = output.diagnostics.len() - output.fitted_count(),
        "sector fitting pass complete"
    );
    output
}

fn observation_order(a: &BondRecord, b: &BondRecord) -> std::cmp::Ordering {
    let key = |r: &BondRecord| (r.duration.unwrap_or(f64::NAN), r.yield_.unwrap_or(f64::NAN));
    let (da, ya) = key(a);
    let (db, yb) = key(b);
    da.total_cmp(&db)
        .then(ya.total_cmp(&yb))
        .then_with(|| a.ticker.cmp(&b.ticker))
}

fn fit_sector(
    sector: &str,
    members: &[usize],
    bonds: &[BondRecord],
    model: ModelKind,
    min_samples: usize,
    config: &EngineConfig,
) -> (SectorDiagnostics, Vec<(usize, CurveAnnotation)>) {
    let obs: Vec<Observation> = members
        .iter()
        .filter_map(|&i| {
            let b = &bonds[i];
            Some(Observation {
                duration: b.duration?,
                yield_: b.yield_?,
            })
        })
        .collect();

    let outcome = if obs.len() < min_samples {
        Err(EngineError::insufficient(sector, min_samples, obs.len()))
    } else {
        let ns = NelsonSiegelConfig {
            parallel_grid: config.parallel,
            ..config.nelson_siegel.clone()
        };
        fit_curve(model, sector, &obs, &ns)
    };

    let diag = SectorDiagnostics::from_outcome(sector, model, obs.len(), outcome);
    let Some(fit) = diag.fit.as_ref() else {
        warn!(
            sector,
            n_obs = obs.len(),
            reason = diag.message.as_deref().unwrap_or(""),
            "sector skipped"
        );
        return (diag, Vec::new());
    };

    debug!(
        sector,
        n_obs = obs.len(),
        params = ?fit.params,
        r_squared = fit.quality.r_squared,
        iterations = ?fit.iterations,
        "sector fitted"
    );

    let fitted: Vec<f64> = obs.iter().map(|o| fit.predict(o.duration)).collect();
    let residuals: Vec<f64> = obs.iter().zip(&fitted).map(|(o, f)| o.yield_ - f).collect();
    let std = sample_std(&residuals).filter(|s| *s > MIN_RESIDUAL_STD);

    let rows = members
        .iter()
        .zip(fitted.iter().zip(&residuals))
        .map(|(&idx, (&model_yield, &residual))| {
            (
                idx,
                CurveAnnotation {
                    model_yield: Some(model_yield),
                    residual: Some(residual),
                    z_score: std.map(|s| residual / s),
                },
            )
        })
        .collect();

    (diag, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitStatus;

    fn bond(ticker: &str, sector: &str, duration: f64, yield_: f64) -> BondRecord {
        BondRecord {
            ticker: ticker.to_string(),
            sector: sector.to_string(),
            duration: Some(duration),
            yield_: Some(yield_),
            ..BondRecord::default()
        }
    }

    fn corps() -> Vec<BondRecord> {
        vec![
            bond("A 1", "Corps", 1.0, 0.040),
            bond("A 2", "Corps", 2.0, 0.043),
            bond("A 3", "Corps", 3.5, 0.049),
            bond("A 4", "Corps", 5.0, 0.050),
            bond("A 5", "Corps", 7.0, 0.056),
            bond("A 6", "Corps", 9.0, 0.057),
        ]
    }

    #[test]
    fn small_sector_is_skipped_and_others_fit() {
        let mut bonds = corps();
        bonds.push(bond("X 1", "ABS", 1.0, 0.05));
        bonds.push(bond("X 2", "ABS", 2.0, 0.06));

        let out = fit_sectors(&bonds, ModelKind::Quadratic, &EngineConfig::default());
        assert_eq!(out.diagnostics.len(), 2);
        assert_eq!(out.diagnostics[0].sector, "ABS");
        assert_eq!(out.diagnostics[0].status, FitStatus::InsufficientData);
        assert_eq!(out.diagnostics[1].status, FitStatus::Fitted);

        for (b, ann) in bonds.iter().zip(&out.annotations) {
            if b.sector == "ABS" {
                assert_eq!(*ann, CurveAnnotation::default());
            } else {
                assert!(ann.z_score.is_some());
            }
        }
    }

    #[test]
    fn residuals_are_actual_minus_model_and_z_uses_sample_std() {
        let bonds = corps();
        let out = fit_sectors(&bonds, ModelKind::Quadratic, &EngineConfig::default());
        let residuals: Vec<f64> = out.annotations.iter().map(|a| a.residual.unwrap()).collect();
        let std = sample_std(&residuals).unwrap();
        for (b, a) in bonds.iter().zip(&out.annotations) {
            let expected = b.yield_.unwrap() - a.model_yield.unwrap();
            assert!((a.residual.unwrap() - expected).abs() < 1e-15);
            assert!((a.z_score.unwrap() - expected / std).abs() < 1e-9);
        }
    }

    #[test]
    fn perfect_fit_leaves_z_undefined() {
        let bonds: Vec<BondRecord> = (0..5)
            .map(|i| {
                let d = 1.0 + i as f64;
                bond(&format!("P {i}"), "Rates", d, 0.03 + 0.002 * d)
            })
            .collect();
        let out = fit_sectors(&bonds, ModelKind::Quadratic, &EngineConfig::default());
        assert!(out.diagnostics[0].is_fitted());
        assert!(out.annotations.iter().all(|a| a.model_yield.is_some() && a.z_score.is_none()));
    }

    #[test]
    fn ineligible_bonds_keep_null_fields() {
        let mut bonds = corps();
        bonds.push(BondRecord {
            ticker: "A 7".to_string(),
            sector: "Corps".to_string(),
            duration: None,
            yield_: Some(0.05),
            ..BondRecord::default()
        });
        let out = fit_sectors(&bonds, ModelKind::Quadratic, &EngineConfig::default());
        assert_eq!(out.diagnostics[0].n_obs, 6);
        assert_eq!(out.annotations[6], CurveAnnotation::default());
    }

    #[test]
    fn min_samples_raises_the_model_minimum() {
        let config = EngineConfig {
            min_samples: 10,
            ..EngineConfig::default()
        };
        let out = fit_sectors(&corps(), ModelKind::Quadratic, &config);
        assert_eq!(out.diagnostics[0].status, FitStatus::InsufficientData);
        assert!(out.diagnostics[0].message.as_deref().unwrap().contains("at least 10"));
    }

    #[test]
    fn parallel_and_sequential_passes_agree() {
        let mut bonds = corps();
        bonds.extend(corps().into_iter().map(|mut b| {
            b.sector = "Fins".to_string();
            b.yield_ = b.yield_.map(|y| y + 0.004);
            b
        }));
        let par = fit_sectors(&bonds, ModelKind::NelsonSiegel, &EngineConfig::default());
        let seq = fit_sectors(
            &bonds,
            ModelKind::NelsonSiegel,
            &EngineConfig {
                parallel: false,
                ..EngineConfig::default()
            },
        );
        assert_eq!(par, seq);
    }
}
