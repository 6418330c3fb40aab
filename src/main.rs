use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::Read;
use std::path::{Path, PathBuf};

use skillscore::batch::{BatchScorer, CsvStatsReader};
use skillscore::config::AppConfig;
use skillscore::logging::{init_logging, LogFormat, LogLevel};
use skillscore::models::PerCategoryStats;
use skillscore::scoring::{Algorithm, ScoreCalculator};
use skillscore::{FormulaValidator, SkillScoreError};

/// skillscore - Competitor Rating Calculator
///
/// Validates operator-authored scoring formulas and calculates a single
/// internal rating from a competitor's per-category statistics.
#[derive(Parser)]
#[command(name = "skillscore")]
#[command(author = "skillscore Contributors")]
#[command(version)]
#[command(about = "Formula validation and score calculation", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format (pretty, json, compact)
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a formula is acceptable for custom scoring
    Validate {
        /// Formula text
        formula: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Calculate a competitor's score from a JSON stats file
    Calculate {
        /// Stats file (JSON), or `-` for stdin
        #[arg(short, long)]
        stats: PathBuf,

        /// Include raw score and contributing categories
        #[arg(short, long)]
        detailed: bool,
    },

    /// Try a formula against sample data
    TestFormula {
        /// Formula text
        formula: String,

        /// Stats file (JSON) to use instead of the built-in sample
        #[arg(short, long)]
        stats: Option<PathBuf>,
    },

    /// Score every competitor in a CSV file
    Batch {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of worker threads
        #[arg(short, long)]
        threads: Option<usize>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Manage the configuration file
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Write a configuration file with a built-in scoring template
        #[arg(long)]
        init: bool,

        /// Algorithm for --init
        #[arg(short, long, default_value = "weighted_average")]
        algorithm: String,

        /// Overwrite an existing file with --init
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let creating_config = matches!(cli.command, Commands::Config { init: true, .. });
    let mut app_config = match &cli.config {
        Some(path) if creating_config && !path.exists() => AppConfig::default(),
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    if cli.verbose > 0 {
        app_config.logging.level = LogLevel::from_verbosity(cli.verbose);
    }
    if let Some(format) = cli.log_format {
        app_config.logging.format = format;
    }
    init_logging(&app_config.logging)?;

    match cli.command {
        Commands::Validate { formula, json } => {
            let result = FormulaValidator::validate(&formula);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.valid {
                println!("{}", "✓ Formula is valid".green().bold());
            } else {
                println!("{}", "✗ Formula is invalid".red().bold());
                if let Some(error) = &result.error {
                    println!("  {}", error);
                }
            }
            if !result.valid {
                std::process::exit(1);
            }
        }

        Commands::Calculate { stats, detailed } => {
            let stats = read_stats(&stats)?;
            let scoring = app_config.scoring_config().map_err(report)?;
            let result = ScoreCalculator::calculate_detailed(&stats, Some(&scoring)).map_err(report)?;

            if detailed {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.score);
            }
        }

        Commands::TestFormula { formula, stats } => {
            let sample = stats.as_deref().map(read_stats).transpose()?;
            let result = ScoreCalculator::test_formula(&formula, sample.as_ref());
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.valid {
                std::process::exit(1);
            }
        }

        Commands::Batch {
            input,
            output,
            threads,
            no_progress,
        } => {
            let scoring = app_config.scoring_config().map_err(report)?;

            let mut batch_config = app_config.batch.clone();
            if threads.is_some() {
                batch_config.threads = threads;
            }
            if no_progress {
                batch_config.show_progress = false;
            }

            let records = CsvStatsReader::new()
                .read_path(&input)
                .map_err(report)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let scorer = BatchScorer::with_config(batch_config);
            let (results, summary) = scorer.score_records(&records, Some(&scoring)).map_err(report)?;

            match &output {
                Some(path) => BatchScorer::write_results_to_path(&results, path).map_err(report)?,
                None => BatchScorer::write_results(&results, std::io::stdout().lock()).map_err(report)?,
            }

            eprintln!("{}", summary.to_string_pretty());
            if summary.is_fully_successful() {
                eprintln!("{}", "✓ Batch scoring completed".green());
            } else {
                eprintln!(
                    "{}",
                    format!("⚠ {} record(s) could not be scored", summary.failed_records).yellow()
                );
            }
        }

        Commands::Config {
            show,
            init,
            algorithm,
            force,
        } => {
            if init {
                let algorithm = Algorithm::from_tag(&algorithm).map_err(report)?;
                let target = cli.config.clone().unwrap_or_else(AppConfig::default_config_path);
                if target.exists() && !force {
                    anyhow::bail!(
                        "Config file already exists: {} (use --force to overwrite)",
                        target.display()
                    );
                }
                let config = AppConfig::with_template(algorithm);
                let path = match &cli.config {
                    Some(path) => {
                        config.save_to_file(path)?;
                        path.clone()
                    }
                    None => config.save_default()?,
                };
                println!(
                    "{}",
                    format!("✓ Wrote {} configuration to {}", algorithm, path.display()).green()
                );
            } else if show {
                println!("{}", toml::to_string_pretty(&app_config)?);
            } else {
                println!(
                    "Config file: {}",
                    cli.config
                        .unwrap_or_else(AppConfig::default_config_path)
                        .display()
                );
                for algorithm in Algorithm::ALL {
                    println!("  {:<16} {}", algorithm.tag().cyan(), algorithm.description());
                }
            }
        }
    }

    Ok(())
}

/// Convert a library error into a CLI error carrying its user-facing message
fn report(err: impl Into<SkillScoreError>) -> anyhow::Error {
    let err = err.into();
    let severity = err.severity();
    tracing::debug!(
        error = ?err,
        ?severity,
        level = %severity.to_tracing_level(),
        "Command failed"
    );
    anyhow::anyhow!(err.user_message())
}

/// Read per-category stats from a JSON file, or stdin for `-`
fn read_stats(path: &Path) -> Result<PerCategoryStats> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stats from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read stats file: {}", path.display()))?
    };

    serde_json::from_str(&content).context("Failed to parse stats JSON")
}
