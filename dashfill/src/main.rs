use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dashfill_core::{AliasTable, ConfigSource, RunOptions, Transcriber, TransferConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod formatter;

const DEFAULT_CONFIG_FILE: &str = "config.json";
const DEFAULT_ALIASES_FILE: &str = "metric_aliases.json";

#[derive(Parser)]
#[command(name = "dashfill")]
#[command(about = "Fill a dashboard template from per-round financial summary workbooks", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the round workbooks, the template and the output
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    dir: PathBuf,

    /// Path to configuration file (JSON or TOML) [default: DIR/config.json]
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Path to metric alias file (JSON) [default: DIR/metric_aliases.json]
    #[arg(short, long, value_name = "ALIASES")]
    aliases: Option<PathBuf>,

    /// Output workbook [default: DIR/<output_dashboard_name>]
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Log progress for every round and firm
    #[arg(short, long)]
    verbose: bool,

    /// Extract and match without saving the dashboard
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output for scripting
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.dir.join(DEFAULT_CONFIG_FILE));
    let (config, source) = TransferConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    match source {
        ConfigSource::File(path) => tracing::info!("using config {}", path.display()),
        ConfigSource::Defaults => tracing::warn!(
            "config file {} not found, using defaults",
            config_path.display()
        ),
    }

    let aliases_path = cli
        .aliases
        .clone()
        .unwrap_or_else(|| cli.dir.join(DEFAULT_ALIASES_FILE));
    let aliases = AliasTable::load_or_empty(&aliases_path, config.match_case)
        .with_context(|| format!("Failed to load aliases from {}", aliases_path.display()))?;

    // Create transcriber and run
    let transcriber = Transcriber::new(config, aliases);
    let options = RunOptions {
        output: cli.output.clone(),
        dry_run: cli.dry_run,
    };

    let report = transcriber
        .run(&cli.dir, &options)
        .with_context(|| format!("Failed to fill dashboard from {}", cli.dir.display()))?;

    // Output results
    match cli.format {
        OutputFormat::Human => formatter::print_human(&cli.dir, &report),
        OutputFormat::Json => formatter::print_json(&cli.dir, &report)?,
    }

    // Skipped units are warnings and still exit 0
    let exit_code = if report.has_errors() { 1 } else { 0 };
    std::process::exit(exit_code);
}
