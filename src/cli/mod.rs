//! Command-line parsing for the RV signal engine.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting/scoring code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ModelKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rv", version, about = "Fixed-Income Relative-Value Signal Engine")]
pub struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit sector curves, print summary, diagnostics and candidate tables, optionally export.
    Score(ScoreArgs),
    /// Print the candidate tables only (useful for scripting).
    Candidates(ScoreArgs),
    /// Drill into one issuer: monotone curve, Z-scores, fundamentals vs peers.
    Issuer(IssuerArgs),
}

/// Where the holdings come from.
#[derive(Debug, Args, Clone)]
#[group(required = true, multiple = false)]
pub struct InputArgs {
    /// Portfolio CSV.
    #[arg(short, long, value_name = "CSV")]
    pub input: Option<PathBuf>,

    /// Generate N synthetic bonds instead of reading a file.
    #[arg(long, value_name = "N")]
    pub sample: Option<usize>,
}

/// Engine options shared by all subcommands. Flags override the config file.
#[derive(Debug, Args, Clone)]
pub struct EngineArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Seed for `--sample`.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// TOML config file.
    #[arg(short, long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Curve model (overrides the config file).
    #[arg(short, long, value_enum)]
    pub model: Option<ModelKind>,

    /// Rich threshold on Z (overrides the config file).
    #[arg(long, allow_negative_numbers = true)]
    pub rich: Option<f64>,

    /// Cheap threshold on Z (overrides the config file).
    #[arg(long, allow_negative_numbers = true)]
    pub cheap: Option<f64>,

    /// Sell candidates need net carry below this, decimal (overrides the config file).
    #[arg(long, allow_negative_numbers = true)]
    pub max_sell_carry: Option<f64>,

    /// Buy candidates need net carry above this, decimal (overrides the config file).
    #[arg(long, allow_negative_numbers = true)]
    pub min_buy_carry: Option<f64>,

    /// Minimum bonds per sector (overrides the config file).
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Fit sectors sequentially.
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Rows per candidate table.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export scored bonds to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export config, summary and per-sector fits to JSON.
    #[arg(long = "export-diagnostics", value_name = "JSON")]
    pub export_diagnostics: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct IssuerArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Issuer key (first ticker token unless the input has an issuer column).
    /// Omit to list the issuers in the portfolio.
    #[arg(long)]
    pub issuer: Option<String>,

    /// Bond-issuer to equity-ticker map CSV.
    #[arg(long, value_name = "CSV", requires = "financials")]
    pub links: Option<PathBuf>,

    /// Quarterly financial statements CSV.
    #[arg(long, value_name = "CSV", requires = "links")]
    pub financials: Option<PathBuf>,

    /// Skip the qualitative credit profile.
    #[arg(long)]
    pub no_profile: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn score_flags_parse() {
        let cli = Cli::try_parse_from([
            "rv", "-v", "score", "--sample", "150", "--model", "nelson-siegel", "--rich", "-2", "--top", "5",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Score(args) = cli.command else {
            panic!("expected score");
        };
        assert_eq!(args.engine.input.sample, Some(150));
        assert_eq!(args.engine.model, Some(ModelKind::NelsonSiegel));
        assert_eq!(args.engine.rich, Some(-2.0));
        assert_eq!(args.top, 5);
        assert_eq!(args.engine.max_sell_carry, None);
    }

    #[test]
    fn carry_bounds_parse() {
        let cli = Cli::try_parse_from([
            "rv", "candidates", "--sample", "50", "--max-sell-carry", "0.002", "--min-buy-carry", "-0.001",
        ])
        .unwrap();
        let Command::Candidates(args) = cli.command else {
            panic!("expected candidates");
        };
        assert_eq!(args.engine.max_sell_carry, Some(0.002));
        assert_eq!(args.engine.min_buy_carry, Some(-0.001));
    }

    #[test]
    fn input_and_sample_are_exclusive() {
        assert!(Cli::try_parse_from(["rv", "score", "--input", "a.csv", "--sample", "10"]).is_err());
        assert!(Cli::try_parse_from(["rv", "score"]).is_err());
    }

    #[test]
    fn links_require_financials() {
        assert!(Cli::try_parse_from(["rv", "issuer", "--sample", "10", "--links", "l.csv"]).is_err());
    }
}
