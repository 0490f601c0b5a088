//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the engine stays free of presentation concerns
//! - output changes are localized (important for future snapshot tests)
//!
//! Rates are stored as decimal fractions and printed as percentages; carry is
//! printed in basis points.

use crate::domain::{EngineConfig, LiquidityTier, ScoredBond, SectorDiagnostics};
use crate::io::IngestedPortfolio;
use crate::issuer::{IssuerView, MetricComparison};
use crate::portfolio::{PortfolioAnalyzer, PortfolioSummary, SectorSummary};

/// Header block: model, thresholds, portfolio aggregates and the sectors
/// trading richest to their curves.
pub fn format_run_summary(
    summary: &PortfolioSummary,
    richest: &[SectorSummary],
    config: &EngineConfig,
) -> String {
    let mut out = String::new();

    out.push_str("=== rv - Relative Value Signals ===\n");
    out.push_str(&format!(
        "Model: {} | rich < {:.2} | cheap > {:.2} | min samples {}\n",
        summary.model.display_name(),
        config.rich_threshold,
        config.cheap_threshold,
        config.min_samples,
    ));
    out.push_str(&format!(
        "Bonds: {} ({} scored) | sectors fitted {} / skipped {}\n",
        summary.total_bonds, summary.scored_bonds, summary.sectors_fitted, summary.sectors_skipped,
    ));
    out.push_str(&format!(
        "AUM: {} | dur {} | yield {} | net carry {}\n",
        fmt_money(summary.total_nominal),
        fmt_opt(summary.weighted_duration, 2),
        fmt_pct(summary.weighted_yield),
        fmt_bp(summary.weighted_net_carry),
    ));
    out.push_str(&format!(
        "Signals: sell {} | cheap {} | bleeding {} ({} at negative carry)\n",
        summary.sell_count,
        summary.cheap_count,
        summary.bleeding_count,
        fmt_money(summary.negative_carry_exposure),
    ));
    out.push_str(&format!(
        "HTM: {} bonds, {} | tradeable: {} bonds, {}\n",
        summary.htm_count,
        fmt_money(summary.htm_exposure),
        summary.tradeable_count,
        fmt_money(summary.tradeable_exposure),
    ));
    out.push_str(&format!(
        "Liquidity: high {} | low {} | unknown {}\n",
        summary.liquidity.high, summary.liquidity.low, summary.liquidity.unknown,
    ));

    if !summary.accounting_breakdown.is_empty() {
        let parts: Vec<String> = summary
            .accounting_breakdown
            .iter()
            .map(|a| format!("{} {} ({})", a.accounting.label(), fmt_money(a.nominal), a.count))
            .collect();
        out.push_str(&format!("Accounting: {}\n", parts.join(" | ")));
    }

    if !richest.is_empty() {
        out.push_str("Richest sectors:\n");
        for s in richest {
            let Some(z) = s.avg_z else { continue };
            push_row(&mut out, format!("  {:<14} {:>6.2}  {}", truncate(&s.sector, 14), z, richness_band(z)));
        }
    }
    out.push('\n');
    out
}

/// Qualitative band for a sector's average Z.
fn richness_band(avg_z: f64) -> &'static str {
    if avg_z < -1.0 {
        "Very Rich"
    } else if avg_z < -0.5 {
        "Moderately Rich"
    } else {
        "Slightly Rich"
    }
}

/// Ingest notes: dropped rows and defaulted fields.
pub fn format_ingest_notes(ingest: &IngestedPortfolio, max_errors: usize) -> String {
    let mut out = format!(
        "Input: {} rows read, {} used, {} skipped\n",
        ingest.rows_read,
        ingest.rows_used(),
        ingest.row_errors.len(),
    );
    if ingest.ftp_missing > 0 {
        out.push_str(&format!("  {} bonds without FTP (funding cost taken as 0)\n", ingest.ftp_missing));
    }
    if ingest.unknown_accounting > 0 {
        out.push_str(&format!("  {} bonds with unknown accounting\n", ingest.unknown_accounting));
    }
    for e in ingest.row_errors.iter().take(max_errors) {
        out.push_str(&format!(
            "  line {} [{}]: {}\n",
            e.line,
            e.id.as_deref().unwrap_or("?"),
            e.message
        ));
    }
    if ingest.row_errors.len() > max_errors {
        out.push_str(&format!("  ... {} more\n", ingest.row_errors.len() - max_errors));
    }
    out.push('\n');
    out
}

/// Per-sector fit status and parameters.
pub fn format_diagnostics(diagnostics: &[SectorDiagnostics]) -> String {
    let mut out = String::new();
    out.push_str("Sector diagnostics:\n");
    push_row(
        &mut out,
        format!("{:<14} {:>5} {:<18} {:>8} {:>8}  {}", "sector", "n", "status", "R2", "rmse", "params"),
    );
    push_row(&mut out, format!("{:-<14} {:-<5} {:-<18} {:-<8} {:-<8}  {:-<6}", "", "", "", "", "", ""));

    for d in diagnostics {
        let status = format!("{:?}", d.status);
        match &d.fit {
            Some(fit) => push_row(
                &mut out,
                format!(
                    "{:<14} {:>5} {:<18} {:>8.3} {:>8} {}",
                    truncate(&d.sector, 14),
                    d.n_obs,
                    status,
                    fit.quality.r_squared,
                    fmt_bp(Some(fit.quality.rmse)),
                    fmt_vec(&fit.params),
                ),
            ),
            None => push_row(
                &mut out,
                format!(
                    "{:<14} {:>5} {:<18} {:>8} {:>8}  {}",
                    truncate(&d.sector, 14),
                    d.n_obs,
                    status,
                    "-",
                    "-",
                    d.message.as_deref().unwrap_or(""),
                ),
            ),
        }
    }
    out.push('\n');
    out
}

/// Sector statistics, largest exposure first.
pub fn format_sector_table(rows: &[SectorSummary]) -> String {
    let mut out = String::new();
    out.push_str("Sectors:\n");
    push_row(
        &mut out,
        format!(
            "{:<14} {:>5} {:>14} {:>7} {:>8} {:>9} {:>7} {:>7}",
            "sector", "n", "exposure", "dur", "yield", "carry", "avg_z", "z_std"
        ),
    );
    push_row(
        &mut out,
        format!(
            "{:-<14} {:-<5} {:-<14} {:-<7} {:-<8} {:-<9} {:-<7} {:-<7}",
            "", "", "", "", "", "", "", ""
        ),
    );
    for s in rows {
        push_row(
            &mut out,
            format!(
                "{:<14} {:>5} {:>14} {:>7} {:>8} {:>9} {:>7} {:>7}",
                truncate(&s.sector, 14),
                s.count,
                fmt_money(s.exposure),
                fmt_opt(s.avg_duration, 2),
                fmt_pct(s.avg_yield),
                fmt_bp(s.avg_net_carry),
                fmt_opt(s.avg_z, 2),
                fmt_opt(s.z_std, 2),
            ),
        );
    }
    out.push('\n');
    out
}

/// Sell, cheap, buy and bleeding tables, `top` rows each.
pub fn format_candidates(analyzer: &PortfolioAnalyzer, top: usize) -> String {
    let config = analyzer.config();
    let mut out = String::new();

    out.push_str(&format!(
        "Sell candidates (tradeable, Z < {:.2}{}):\n",
        config.rich_threshold,
        carry_clause("<", config.sell_max_net_carry)
    ));
    out.push_str(&format_bond_table(
        &analyzer.sell_candidates(config.rich_threshold, config.sell_max_net_carry),
        top,
    ));
    out.push('\n');

    out.push_str(&format!("Cheap bonds (Z > {:.2}):\n", config.cheap_threshold));
    out.push_str(&format_bond_table(&analyzer.cheap_candidates(config.cheap_threshold), top));
    out.push('\n');

    out.push_str(&format!(
        "Buy candidates (Z > {:.2}, high liquidity{}):\n",
        config.cheap_threshold,
        carry_clause(">", config.buy_min_net_carry)
    ));
    out.push_str(&format_bond_table(
        &analyzer.buy_candidates(config.cheap_threshold, config.buy_min_net_carry, LiquidityTier::High),
        top,
    ));
    out.push('\n');

    out.push_str("Bleeding assets (net carry < 0):\n");
    out.push_str(&format_bond_table(&analyzer.bleeding_assets(), top));
    out
}

fn carry_clause(op: &str, bound: Option<f64>) -> String {
    bound.map_or_else(String::new, |b| format!(", carry {op} {}", fmt_bp(Some(b))))
}

pub fn format_bond_table(rows: &[&ScoredBond], top: usize) -> String {
    let mut out = String::new();
    if rows.is_empty() {
        out.push_str("  (none)\n");
        return out;
    }
    push_row(
        &mut out,
        format!(
            "{:<22} {:<10} {:>6} {:>8} {:>8} {:>7} {:>8} {:>8} {:<10}",
            "ticker", "sector", "dur", "yield", "model", "z", "carry", "eff", "acct"
        ),
    );
    push_row(
        &mut out,
        format!(
            "{:-<22} {:-<10} {:-<6} {:-<8} {:-<8} {:-<7} {:-<8} {:-<8} {:-<10}",
            "", "", "", "", "", "", "", "", ""
        ),
    );
    for s in rows.iter().take(top) {
        let b = &s.bond;
        push_row(
            &mut out,
            format!(
                "{:<22} {:<10} {:>6} {:>8} {:>8} {:>7} {:>8} {:>8} {:<10}",
                truncate(&b.ticker, 22),
                truncate(&b.sector, 10),
                fmt_opt(b.duration, 2),
                fmt_pct(b.yield_),
                fmt_pct(s.model_yield),
                fmt_opt(s.z_score, 2),
                fmt_bp(s.net_carry),
                fmt_bp(s.carry_efficiency),
                b.accounting.label(),
            ),
        );
    }
    if rows.len() > top {
        out.push_str(&format!("  ... {} more\n", rows.len() - top));
    }
    out
}

pub fn format_issuer_view(view: &IssuerView) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Issuer {} ===\n", view.issuer));
    out.push_str(&format!(
        "Sector: {} | bonds: {} | avg Z: {}\n",
        view.sector.as_deref().unwrap_or("-"),
        view.bonds.len(),
        fmt_opt(view.average_z, 2),
    ));

    match &view.curve {
        Some(curve) => {
            let (lo, hi) = curve.duration_range();
            out.push_str(&format!("Issuer curve: monotone, {} knots over [{lo:.2}, {hi:.2}]\n", curve.knots().count()));
            if let Some(sector_fit) = &view.sector_fit {
                out.push_str("  dur     issuer   sector   spread\n");
                for (d, y) in curve.grid(6) {
                    let s = sector_fit.predict(d);
                    out.push_str(&format!(
                        "  {d:>5.2} {:>8} {:>8} {:>8}\n",
                        fmt_pct(Some(y)),
                        fmt_pct(Some(s)),
                        fmt_bp(Some(y - s))
                    ));
                }
            }
        }
        None => out.push_str(&format!(
            "Issuer curve: {:?} ({})\n",
            view.curve_status,
            view.curve_message.as_deref().unwrap_or("no detail")
        )),
    }
    out.push('\n');

    let rows: Vec<&ScoredBond> = view.bonds.iter().collect();
    out.push_str("Bonds:\n");
    out.push_str(&format_bond_table(&rows, rows.len()));
    out.push('\n');

    if let Some(cmp) = &view.fundamentals {
        out.push_str(&format!(
            "Fundamentals ({}) vs {} peers:\n",
            cmp.period.as_deref().unwrap_or("n/a"),
            cmp.peers.len()
        ));
        for m in &cmp.metrics {
            push_row(
                &mut out,
                format!(
                    "  {:<20} {:>10} {:>10}  {}",
                    m.metric.label(),
                    fmt_opt(m.issuer_value, 2),
                    fmt_opt(m.peer_mean, 2),
                    m.verdict.map_or("-", |v| v.label()),
                ),
            );
        }
        if cmp.has_peer_data() {
            out.push_str(&format!(
                "  stronger: {} | weaker: {}\n",
                join_labels(cmp.strengths()),
                join_labels(cmp.weaknesses()),
            ));
        } else {
            out.push_str("  (no peer data; issuer figures only)\n");
        }
        out.push('\n');
    }

    if let Some(p) = &view.profile {
        out.push_str(&format!("Profile [{}] confidence {:.2}: {}\n", p.source, p.confidence, p.summary));
        for s in &p.key_strengths {
            out.push_str(&format!("  + {s}\n"));
        }
        for r in &p.key_risks {
            out.push_str(&format!("  - {r}\n"));
        }
    }
    out
}

fn join_labels<'a>(metrics: impl Iterator<Item = &'a MetricComparison>) -> String {
    let labels: Vec<&str> = metrics.map(|m| m.metric.label()).collect();
    if labels.is_empty() {
        "-".to_string()
    } else {
        labels.join(", ")
    }
}

fn push_row(out: &mut String, row: String) {
    out.push_str(row.trim_end());
    out.push('\n');
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.decimals$}"))
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{:.2}%", x * 100.0))
}

fn fmt_bp(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{:.1}bp", x * 10_000.0))
}

fn fmt_money(v: f64) -> String {
    let abs = v.abs();
    if abs >= 1e9 {
        format!("{:.2}bn", v / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}mm", v / 1e6)
    } else {
        format!("{v:.0}")
    }
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Accounting, BondRecord};

    fn analyzer() -> PortfolioAnalyzer {
        let curve = |d: f64| 0.04 + 0.002 * d;
        let mut bonds: Vec<BondRecord> = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]
            .iter()
            .enumerate()
            .map(|(i, &d)| BondRecord {
                ticker: format!("ABC {i}"),
                sector: "Corps".to_string(),
                duration: Some(d),
                yield_: Some(curve(d) + if i % 2 == 0 { 0.0001 } else { -0.0001 }),
                ftp: Some(0.045),
                nominal: Some(20e6),
                accounting: Accounting::Afs,
                ..BondRecord::default()
            })
            .collect();
        // One clearly rich bond.
        bonds[3].yield_ = Some(curve(4.0) - 0.004);
        PortfolioAnalyzer::fit(bonds, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn formatters_basic() {
        assert_eq!(fmt_pct(Some(0.0489)), "4.89%");
        assert_eq!(fmt_bp(Some(-0.0003)), "-3.0bp");
        assert_eq!(fmt_opt(None, 2), "-");
        assert_eq!(fmt_money(12_500_000.0), "12.5mm");
        assert_eq!(fmt_money(2.5e9), "2.50bn");
        assert_eq!(truncate("ABCDEFGHIJ", 5), "ABCD.");
        assert_eq!(truncate("ABC", 5), "ABC");
    }

    #[test]
    fn candidate_tables_list_the_rich_bond() {
        let a = analyzer();
        let out = format_candidates(&a, 5);
        let sell = out.split("Cheap bonds").next().unwrap();
        assert!(sell.contains("ABC 3"), "{out}");
        assert!(out.contains("Bleeding assets"));
        // No line carries trailing whitespace.
        assert!(out.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn summary_and_diagnostics_render() {
        let a = analyzer();
        let summary = format_run_summary(&a.generate_summary(), &a.richest_sectors(3), a.config());
        assert!(summary.contains("Model: Quadratic"));
        assert!(summary.contains("Bonds: 8 (8 scored)"));
        assert!(summary.contains("AUM: 160.0mm"));

        let diag = format_diagnostics(a.diagnostics());
        assert!(diag.contains("Corps"));
        assert!(diag.contains("Fitted"));

        let sectors = format_sector_table(&a.sector_summary());
        assert!(sectors.lines().nth(3).unwrap().starts_with("Corps"));
    }

    #[test]
    fn summary_lists_richest_sectors_with_band() {
        let a = analyzer();
        let richest = a.richest_sectors(3);
        assert_eq!(richest.len(), 1);
        let summary = format_run_summary(&a.generate_summary(), &richest, a.config());
        let section = summary.split("Richest sectors:\n").nth(1).unwrap();
        let line = section.lines().next().unwrap();
        assert!(line.trim_start().starts_with("Corps"), "{summary}");
        assert!(line.ends_with("Rich"), "{line}");

        assert_eq!(richness_band(-1.2), "Very Rich");
        assert_eq!(richness_band(-0.7), "Moderately Rich");
        assert_eq!(richness_band(-0.5), "Slightly Rich");
        assert_eq!(richness_band(0.3), "Slightly Rich");
    }

    #[test]
    fn candidate_tables_include_buy_section() {
        let curve = |d: f64| 0.04 + 0.002 * d;
        let mut bonds: Vec<BondRecord> = (0..8)
            .map(|i| {
                let d = 1.0 + i as f64;
                BondRecord {
                    ticker: format!("DEF {i}"),
                    sector: "Corps".to_string(),
                    duration: Some(d),
                    yield_: Some(curve(d) + if i % 2 == 0 { 0.0001 } else { -0.0001 }),
                    ftp: Some(0.045),
                    nominal: Some(20e6),
                    ..BondRecord::default()
                }
            })
            .collect();
        // One clearly cheap, liquid bond with positive carry.
        bonds[4].yield_ = Some(curve(5.0) + 0.004);
        let a = PortfolioAnalyzer::fit(bonds.clone(), &EngineConfig::default()).unwrap();

        let out = format_candidates(&a, 5);
        let buy = out.split("Buy candidates").nth(1).unwrap();
        let buy = buy.split("Bleeding assets").next().unwrap();
        assert!(buy.contains("high liquidity"), "{out}");
        assert!(buy.contains("DEF 4"), "{out}");

        // DEF 4 carries about 90bp.
        let config = EngineConfig {
            buy_min_net_carry: Some(0.02),
            ..EngineConfig::default()
        };
        let strict = PortfolioAnalyzer::fit(bonds, &config).unwrap();
        let out = format_candidates(&strict, 5);
        let buy = out.split("Buy candidates").nth(1).unwrap();
        let buy = buy.split("Bleeding assets").next().unwrap();
        assert!(buy.contains("carry > 200.0bp"), "{out}");
        assert!(!buy.contains("DEF 4"), "{out}");
    }

    #[test]
    fn issuer_view_names_strengths_and_weaknesses() {
        use crate::issuer::fundamentals::tests::{link, statement};
        use crate::issuer::{FundamentalsIndex, IssuerAnalyzer};

        let bond = |ticker: &str, d: f64, y: f64| BondRecord {
            ticker: ticker.to_string(),
            sector: "Corps".to_string(),
            duration: Some(d),
            yield_: Some(y),
            ftp: Some(0.042),
            nominal: Some(15e6),
            ..BondRecord::default()
        };
        let a = PortfolioAnalyzer::fit(
            vec![
                bond("AAPL 3.00 27", 2.1, 0.0410),
                bond("AAPL 4.00 31", 5.9, 0.0462),
                bond("MSFT 4.20 31", 6.1, 0.0470),
                bond("GOOG 4.90 39", 11.0, 0.0530),
            ],
            &EngineConfig::default(),
        )
        .unwrap();
        // Leverage 8 vs peer mean 10; coverage 2.5 vs 3.125.
        let index = FundamentalsIndex::build(
            &[link("AAPL", "AAPL"), link("MSFT", "MSFT"), link("GOOG", "GOOG")],
            &[
                statement("AAPL", 2024, 1, 100.0, 50.0),
                statement("MSFT", 2024, 1, 200.0, 100.0),
                statement("GOOG", 2024, 1, 50.0, 25.0),
            ],
        );
        let view = IssuerAnalyzer::new(&a).with_fundamentals(&index).issuer_view("AAPL").unwrap();
        let out = format_issuer_view(&view);
        assert!(out.contains("=== Issuer AAPL ==="), "{out}");
        assert!(out.contains("stronger: Net leverage | weaker: Interest coverage"), "{out}");
    }

    #[test]
    fn empty_table_says_none() {
        assert_eq!(format_bond_table(&[], 10), "  (none)\n");
    }
}
