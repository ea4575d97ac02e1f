use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use scopemerge_core::{Reconciler, Settings};
use std::path::PathBuf;

mod formatter;

#[derive(Parser)]
#[command(name = "scopemerge")]
#[command(about = "Fill a summary workbook from per-entity scope workbooks", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the settings file (JSON)
    #[arg(short, long, value_name = "SETTINGS", default_value = "settings.json")]
    settings: PathBuf,

    /// Directory the input and output folders are relative to
    /// [default: parent of the settings file's directory]
    #[arg(short, long, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Special-case table (TOML), overriding the one named in the settings
    #[arg(long, value_name = "FILE")]
    special_cases: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Reconcile and report without saving the summary workbook
    #[arg(long)]
    dry_run: bool,

    /// Log every extraction and match decision
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output for further processing
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    // Load configuration
    let mut settings = Settings::from_file(&cli.settings)
        .with_context(|| format!("Failed to load settings from {}", cli.settings.display()))?;
    if let Some(path) = &cli.special_cases {
        settings.special_cases_file = Some(std::path::absolute(path)?);
    }
    let base_dir = cli
        .base_dir
        .clone()
        .unwrap_or_else(|| settings.default_base_dir());

    let reconciler = Reconciler::from_settings(&settings, &base_dir)?;

    let report = reconciler
        .run(cli.dry_run)
        .with_context(|| format!("Failed to fill {}", reconciler.paths().summary_file.display()))?;

    // Output results
    match cli.format {
        OutputFormat::Human => formatter::print_human(reconciler.paths(), &report),
        OutputFormat::Json => formatter::print_json(reconciler.paths(), &report)?,
    }

    Ok(())
}
