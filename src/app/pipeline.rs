//! Shared "score pipeline" logic used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! config -> holdings (CSV or synthetic) -> sector fits -> scored snapshot
//!
//! The subcommands can then focus on presentation.

use tracing::info;

use crate::cli::EngineArgs;
use crate::data::{SampleConfig, generate_portfolio};
use crate::domain::EngineConfig;
use crate::error::AppError;
use crate::io::{IngestedPortfolio, load_portfolio};
use crate::portfolio::PortfolioAnalyzer;

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub config: EngineConfig,
    /// `None` when the holdings were generated.
    pub ingest: Option<IngestedPortfolio>,
    pub analyzer: PortfolioAnalyzer,
}

/// Config file (if any) with command-line overrides applied.
pub fn engine_config_from_args(args: &EngineArgs) -> Result<EngineConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(z) = args.rich {
        config.rich_threshold = z;
    }
    if let Some(z) = args.cheap {
        config.cheap_threshold = z;
    }
    if let Some(c) = args.max_sell_carry {
        config.sell_max_net_carry = Some(c);
    }
    if let Some(c) = args.min_buy_carry {
        config.buy_min_net_carry = Some(c);
    }
    if let Some(n) = args.min_samples {
        config.min_samples = n;
    }
    if args.sequential {
        config.parallel = false;
    }
    config.validate()?;
    Ok(config)
}

/// Execute the full pipeline and return the scored snapshot.
pub fn run_score(args: &EngineArgs) -> Result<RunOutput, AppError> {
    let config = engine_config_from_args(args)?;

    let (bonds, ingest) = match (&args.input.input, args.input.sample) {
        (Some(path), _) => {
            let ingest = load_portfolio(path)?;
            (ingest.bonds.clone(), Some(ingest))
        }
        (None, Some(n)) => {
            let bonds = generate_portfolio(&SampleConfig {
                bonds: n,
                seed: args.seed,
            })?;
            info!(bonds = bonds.len(), seed = args.seed, "synthetic portfolio generated");
            (bonds, None)
        }
        (None, None) => return Err(AppError::new(2, "Either --input or --sample is required.")),
    };

    let analyzer = PortfolioAnalyzer::fit(bonds, &config)?;
    Ok(RunOutput {
        config,
        ingest,
        analyzer,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::cli::InputArgs;
    use crate::domain::ModelKind;

    fn args() -> EngineArgs {
        EngineArgs {
            input: InputArgs {
                input: None,
                sample: Some(120),
            },
            seed: 42,
            config: None,
            model: None,
            rich: None,
            cheap: None,
            max_sell_carry: None,
            min_buy_carry: None,
            min_samples: None,
            sequential: false,
        }
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rv.toml");
        std::fs::write(&path, "model = \"nelson-siegel\"\nmin_samples = 6\nrich_threshold = -2.0\n").unwrap();

        let mut a = args();
        a.config = Some(path);
        a.min_samples = Some(4);
        a.sequential = true;
        a.max_sell_carry = Some(0.001);
        let config = engine_config_from_args(&a).unwrap();
        assert_eq!(config.model, ModelKind::NelsonSiegel);
        assert_eq!(config.min_samples, 4);
        assert_eq!(config.rich_threshold, -2.0);
        assert!(!config.parallel);
        assert_eq!(config.sell_max_net_carry, Some(0.001));
        assert_eq!(config.buy_min_net_carry, None);
    }

    #[test]
    fn invalid_overrides_are_configuration_errors() {
        let mut a = args();
        a.rich = Some(2.0);
        a.cheap = Some(1.0);
        assert_eq!(engine_config_from_args(&a).unwrap_err().exit_code(), 2);

        let mut a = args();
        a.config = Some(PathBuf::from("/nonexistent/rv.toml"));
        assert_eq!(engine_config_from_args(&a).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn sample_run_scores_bonds() {
        let run = run_score(&args()).unwrap();
        assert!(run.ingest.is_none());
        assert_eq!(run.analyzer.bonds().len(), 120);
        assert!(run.analyzer.diagnostics().iter().any(|d| d.is_fitted()));
    }
}
