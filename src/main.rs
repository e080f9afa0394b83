use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use logsage::config::Config;
use logsage::logging;
use logsage::orchestrator::RunOrchestrator;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Command-line arguments for the recurring error analyzer
#[derive(Parser, Debug)]
#[command(
    name = "logsage",
    version,
    about = "Recurring error log analyzer - ranks repeated system errors and asks an LLM how to fix them",
    long_about = "Reads critical and error events from the systemd journal or JSON-lines exports, \
                  groups them by source and event ID, saves the ranked summary and raw records, \
                  and requests troubleshooting suggestions from an LLM backend."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging output (debug level)")]
    verbose: bool,

    /// Number of recurring error groups to report
    #[arg(short = 'n', long, value_name = "N")]
    top: Option<NonZeroUsize>,

    /// Maximum error records read per source
    #[arg(short, long, value_name = "N")]
    max_events: Option<NonZeroUsize>,

    /// Directory for exported artifacts and the log file
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// LLM provider (grok, openai, ollama, mock)
    #[arg(short, long, value_name = "NAME")]
    provider: Option<String>,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// Missing configuration files are allowed and fall back to defaults.
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if config_path.extension().map_or(true, |ext| ext != "toml") {
                    warn!(
                        "Configuration file does not have .toml extension: {}",
                        config_path.display()
                    );
                }
            }
        }

        Ok(())
    }

    /// Apply command-line overrides, the last configuration layer
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(top) = self.top {
            config.analysis.top_n = top.get();
        }
        if let Some(max_events) = self.max_events {
            config.analysis.max_events = max_events.get();
        }
        if let Some(ref dir) = self.output_dir {
            config.analysis.output_dir = dir.clone();
        }
        if let Some(ref provider) = self.provider {
            config.llm.provider = provider.to_lowercase();
        }
    }
}

/// Initialize env_logger from the configured level
///
/// `RUST_LOG` refines the configured level; `--verbose` forces debug. With a
/// log file configured, records go to both stderr and the rotating file.
fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(config.logging.level_filter());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }

    if let Some(path) = config.log_file_path() {
        let writer = logging::console_and_file(
            &path,
            config.logging.file_max_bytes,
            config.logging.file_backup_count,
        )
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(writer)));
    }

    builder.try_init().context("Failed to initialize logging")
}

fn run(cli: Cli) -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let mut config = Config::load(cli.config.as_deref());
    config.apply_env(std::env::vars());
    cli.apply_overrides(&mut config);

    init_logging(&config, cli.verbose)?;
    info!("Starting recurring error log analyzer");
    match dotenv {
        Ok(path) => info!("Loaded environment variables from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found, using process environment"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    }
    if let Some(path) = config.log_file_path() {
        info!(
            "Logging to {} (rotating at {} bytes, {} backups)",
            path.display(),
            config.logging.file_max_bytes,
            config.logging.file_backup_count
        );
    }

    cli.validate().map_err(anyhow::Error::msg)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    let mut orchestrator = RunOrchestrator::from_config(&config);
    let report = runtime.block_on(orchestrator.run());
    debug!(
        "Run report: {} records, {} groups, suggestion failed: {}",
        report.records_read,
        report.recurring.as_ref().map_or(0, |r| r.groups.len()),
        report.suggestion.as_ref().map_or(false, |s| s.is_failure())
    );

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
