use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

use riskradar::config::AppConfig;
use riskradar::error::{ErrorSeverity, RiskRadarError};
use riskradar::export::ml::TrainingSetExporter;
use riskradar::export::{export_labeled, ExportFormat};
use riskradar::import::{athlete_history, ImportManager};
use riskradar::logging::init_logging;
use riskradar::pipeline::{LabelPipeline, LabelRun};
use riskradar::{FeatureEngine, TelemetryRecord};

/// RiskRadar - Athlete injury-risk feature engineering CLI
///
/// Turns daily athlete telemetry into load, recovery and variability features,
/// derives rule-based risk labels, and builds leakage-free training sets.
#[derive(Parser)]
#[command(name = "riskradar")]
#[command(version)]
#[command(about = "Athlete injury-risk feature engineering", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Engineer features for a telemetry history and attach risk labels
    Label {
        /// Telemetry file (CSV or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the labeled dataset
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (csv, json)
        #[arg(short = 'f', long, default_value = "csv")]
        format: String,

        /// Write a JSON diagnostic report of the run
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Build temporal train/test files for the classifier trainer
    Split {
        /// Telemetry file (CSV or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Train slice output (CSV)
        #[arg(long)]
        train: PathBuf,

        /// Test slice output (CSV)
        #[arg(long)]
        test: PathBuf,

        /// Share of each athlete's days used for training (default from config)
        #[arg(long)]
        train_fraction: Option<f64>,

        /// Keep rows with undefined features or Unknown labels
        #[arg(long)]
        keep_undefined: bool,
    },

    /// Compute the feature vector of one new day from stored history
    Features {
        /// Stored telemetry history (CSV or JSON)
        #[arg(long)]
        history: PathBuf,

        /// New day's telemetry (JSON object)
        #[arg(long)]
        today: PathBuf,
    },

    /// Manage configuration
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

#[derive(Tabled)]
struct ZoneRow {
    zone: &'static str,
    records: usize,
}

#[derive(Tabled)]
struct SplitRow {
    athlete: u32,
    train: usize,
    test: usize,
    train_end: String,
    test_start: String,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = execute(cli) {
        report_failure(&err);
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.logging.level = config.logging.level.raised_by(cli.verbose);
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Label {
            input,
            output,
            format,
            report,
        } => {
            let format: ExportFormat = format.parse()?;
            let telemetry = load_telemetry(&input)?;
            let run = LabelPipeline::from_config(&config)?.run(&telemetry)?;

            export_labeled(&run.labeled, &output, format)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_zone_summary(&run);

            if let Some(path) = report {
                run.report.save_to_file(&path)?;
            }
            println!(
                "{}",
                format!("✓ Labeled {} records -> {}", run.labeled.len(), output.display()).green()
            );
        }

        Commands::Split {
            input,
            train,
            test,
            train_fraction,
            keep_undefined,
        } => {
            if let Some(fraction) = train_fraction {
                config.partition.train_fraction = fraction;
                config.validate()?;
            }
            let telemetry = load_telemetry(&input)?;
            let run = LabelPipeline::from_config(&config)?.run(&telemetry)?;

            let exporter = TrainingSetExporter {
                skip_undefined: !keep_undefined,
            };
            let (train_rows, test_rows) = exporter.export_partition(&run.partition, &train, &test)?;

            print_zone_summary(&run);
            print_split_summary(&run);
            println!(
                "{}",
                format!("✓ Train: {} rows | Test: {} rows", train_rows, test_rows).green()
            );
        }

        Commands::Features { history, today } => {
            let stored = load_telemetry(&history)?;
            let mut new_days = load_telemetry(&today)?;
            if new_days.len() != 1 {
                anyhow::bail!("Expected exactly one new day in {}", today.display());
            }
            let today = new_days.remove(0);

            let engine = FeatureEngine::with_config(config.engine.clone())?;
            let athlete = athlete_history(&stored, today.athlete_id);
            let vector = engine
                .transform_incremental(&athlete, &today)
                .map_err(RiskRadarError::from)
                .with_context(|| format!("Feature engineering failed for athlete {}", today.athlete_id))?;

            let output = serde_json::json!({
                "athlete_id": today.athlete_id,
                "date": today.date,
                "features": vector,
                "model_features": vector.model_features(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Config { init } => {
            let path = cli.config.unwrap_or_else(AppConfig::default_config_path);
            if init {
                AppConfig::default().save_to_file(&path)?;
                println!("{}", format!("✓ Wrote default configuration to {}", path.display()).green());
            } else {
                println!("{}", format!("# {}", path.display()).dimmed());
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn load_telemetry(path: &Path) -> Result<Vec<TelemetryRecord>> {
    ImportManager::new()
        .import_file(path)
        .with_context(|| format!("Failed to import {}", path.display()))
}

/// Print a failure, using the library error's severity and wording when present
fn report_failure(err: &anyhow::Error) {
    let Some(cause) = err
        .chain()
        .find_map(|e| e.downcast_ref::<RiskRadarError>())
    else {
        eprintln!("{}", format!("✗ {:#}", err).red());
        return;
    };

    let line = if err.chain().count() > 1 {
        format!("{}: {}", err, cause.user_message())
    } else {
        cause.user_message()
    };
    match cause.severity() {
        ErrorSeverity::Warning => eprintln!("{}", format!("⚠ {}", line).yellow()),
        ErrorSeverity::Error => eprintln!("{}", format!("✗ {}", line).red()),
        ErrorSeverity::Critical => {
            eprintln!("{}", format!("✗ {}", line).red().bold());
            eprintln!("{}", "  Check the configuration and input before rerunning.".red());
        }
    }
}

fn print_zone_summary(run: &LabelRun) {
    let rows = vec![
        ZoneRow { zone: "Safe", records: run.zones.safe },
        ZoneRow { zone: "Moderate", records: run.zones.moderate },
        ZoneRow { zone: "High", records: run.zones.high },
        ZoneRow { zone: "Unknown", records: run.zones.unknown },
    ];
    println!("{}", "Risk label distribution".cyan().bold());
    println!("{}", Table::new(rows));

    for warning in &run.report.warnings {
        println!("{}", format!("⚠ {}", warning).yellow());
    }
}

fn print_split_summary(run: &LabelRun) {
    let rows: Vec<SplitRow> = run
        .partition
        .athletes
        .iter()
        .map(|a| SplitRow {
            athlete: a.athlete_id,
            train: a.train_len,
            test: a.test_len,
            train_end: a.train_end.map_or_else(|| "-".to_string(), |d| d.to_string()),
            test_start: a.test_start.map_or_else(|| "-".to_string(), |d| d.to_string()),
        })
        .collect();
    println!("{}", "Temporal split per athlete".cyan().bold());
    println!("{}", Table::new(rows));
}
