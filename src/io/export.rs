//! Exports: scored bonds to CSV, fit diagnostics to JSON.
//!
//! The CSV is one flat row per bond for spreadsheets. The JSON carries the
//! configuration, the portfolio summary and, per sector, the fit record plus a
//! precomputed curve grid for plotting.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{EngineConfig, ModelKind, ScoredBond, SectorDiagnostics};
use crate::error::AppError;
use crate::portfolio::{PortfolioAnalyzer, PortfolioSummary};

/// Points per sector curve in the diagnostics grid.
const GRID_POINTS: usize = 101;

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    ticker: &'a str,
    sector: &'a str,
    sub_sector: Option<&'a str>,
    issuer: &'a str,
    accounting: &'static str,
    duration: Option<f64>,
    #[serde(rename = "yield")]
    yield_: Option<f64>,
    oas: Option<f64>,
    ftp: Option<f64>,
    nominal: Option<f64>,
    model_yield: Option<f64>,
    residual: Option<f64>,
    z_score: Option<f64>,
    signal: &'static str,
    net_carry: Option<f64>,
    carry_efficiency: Option<f64>,
    liquidity_score: Option<u8>,
    tradeable: bool,
}

impl<'a> From<&'a ScoredBond> for ExportRow<'a> {
    fn from(s: &'a ScoredBond) -> Self {
        let b = &s.bond;
        Self {
            ticker: &b.ticker,
            sector: &b.sector,
            sub_sector: b.sub_sector.as_deref(),
            issuer: b.issuer_key(),
            accounting: b.accounting.label(),
            duration: b.duration,
            yield_: b.yield_,
            oas: b.oas,
            ftp: b.ftp,
            nominal: b.nominal,
            model_yield: s.model_yield,
            residual: s.residual,
            z_score: s.z_score,
            signal: s.signal.label(),
            net_carry: s.net_carry,
            carry_efficiency: s.carry_efficiency,
            liquidity_score: s.liquidity.map(|l| l.score()),
            tradeable: s.is_tradeable,
        }
    }
}

/// Write one row per scored bond.
pub fn write_scored_csv(path: &Path, bonds: &[ScoredBond]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    for b in bonds {
        writer
            .serialize(ExportRow::from(b))
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CurveGrid {
    pub duration: Vec<f64>,
    #[serde(rename = "yield")]
    pub yield_: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct SectorEntry<'a> {
    #[serde(flatten)]
    pub diagnostics: &'a SectorDiagnostics,
    pub grid: Option<CurveGrid>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsFile<'a> {
    pub tool: &'static str,
    pub generated_at: DateTime<Utc>,
    pub model: ModelKind,
    pub config: &'a EngineConfig,
    pub summary: PortfolioSummary,
    pub sectors: Vec<SectorEntry<'a>>,
}

impl<'a> DiagnosticsFile<'a> {
    pub fn new(analyzer: &'a PortfolioAnalyzer, generated_at: DateTime<Utc>) -> Self {
        let sectors = analyzer
            .diagnostics()
            .iter()
            .map(|d| SectorEntry {
                diagnostics: d,
                grid: analyzer.curve_points(&d.sector, GRID_POINTS).map(|points| {
                    let (duration, yield_) = points.into_iter().unzip();
                    CurveGrid { duration, yield_ }
                }),
            })
            .collect();
        Self {
            tool: "rv",
            generated_at,
            model: analyzer.model(),
            config: analyzer.config(),
            summary: analyzer.generate_summary(),
            sectors,
        }
    }
}

pub fn write_diagnostics_json(path: &Path, analyzer: &PortfolioAnalyzer) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create diagnostics JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, &DiagnosticsFile::new(analyzer, Utc::now()))
        .map_err(|e| AppError::new(2, format!("Failed to write diagnostics JSON: {e}")))?;
    Ok(())
}
