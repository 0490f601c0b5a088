//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - loads or generates holdings and fits the sector curves
//! - prints reports
//! - writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, IssuerArgs, ScoreArgs};
use crate::error::AppError;
use crate::io::RowError;
use crate::issuer::{FundamentalsIndex, IssuerAnalyzer, SignalProfiler};

pub mod pipeline;

/// Row errors listed in the ingest notes before truncation.
const MAX_LISTED_ROW_ERRORS: usize = 10;

/// Sectors listed under "Richest sectors" in the run summary.
const RICHEST_SECTORS: usize = 3;

/// Entry point for the `rv` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Score(args) => handle_score(args, OutputMode::Full),
        Command::Candidates(args) => handle_score(args, OutputMode::CandidatesOnly),
        Command::Issuer(args) => handle_issuer(args),
    }
}

/// Logs go to stderr so stdout stays a clean report.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber may already be installed when embedded; keep the existing one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    CandidatesOnly,
}

fn handle_score(args: ScoreArgs, mode: OutputMode) -> Result<(), AppError> {
    let run = pipeline::run_score(&args.engine)?;
    let analyzer = &run.analyzer;

    if mode == OutputMode::Full {
        if let Some(ingest) = &run.ingest {
            print!("{}", crate::report::format_ingest_notes(ingest, MAX_LISTED_ROW_ERRORS));
        }
        print!(
            "{}",
            crate::report::format_run_summary(
                &analyzer.generate_summary(),
                &analyzer.richest_sectors(RICHEST_SECTORS),
                &run.config,
            )
        );
        print!("{}", crate::report::format_diagnostics(analyzer.diagnostics()));
        print!("{}", crate::report::format_sector_table(&analyzer.sector_summary()));
    }

    println!("{}", crate::report::format_candidates(analyzer, args.top));

    if let Some(path) = &args.export {
        crate::io::write_scored_csv(path, analyzer.bonds())?;
        eprintln!("Wrote {}", path.display());
    }
    if let Some(path) = &args.export_diagnostics {
        crate::io::write_diagnostics_json(path, analyzer)?;
        eprintln!("Wrote {}", path.display());
    }

    Ok(())
}

fn handle_issuer(args: IssuerArgs) -> Result<(), AppError> {
    let run = pipeline::run_score(&args.engine)?;

    let index = match (&args.links, &args.financials) {
        (Some(links), Some(financials)) => {
            let (links, link_errors) = crate::io::load_links(links)?;
            let (statements, statement_errors) = crate::io::load_statements(financials)?;
            report_row_errors("links", &link_errors);
            report_row_errors("financials", &statement_errors);
            Some(FundamentalsIndex::build(&links, &statements))
        }
        _ => None,
    };

    let mut issuers = IssuerAnalyzer::new(&run.analyzer);
    if let Some(index) = &index {
        issuers = issuers.with_fundamentals(index);
    }
    if !args.no_profile {
        issuers = issuers.with_profiler(Box::new(SignalProfiler));
    }

    let Some(issuer) = args.issuer.as_deref() else {
        println!("Issuers:");
        for key in issuers.issuers() {
            println!("  {key}");
        }
        return Ok(());
    };

    let view = issuers.issuer_view(issuer)?;
    println!("{}", crate::report::format_issuer_view(&view));
    Ok(())
}

fn report_row_errors(what: &str, errors: &[RowError]) {
    for e in errors.iter().take(MAX_LISTED_ROW_ERRORS) {
        eprintln!("{what}: line {}: {}", e.line, e.message);
    }
}
