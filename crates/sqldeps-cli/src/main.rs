use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sqldeps_core::{Config, DialectConfig};
use sqldeps_sql::{DependencyExtractor, ExtractError};

const DEFAULT_CONFIG: &str = "sqldeps.toml";

/// sqldeps - Table, column and filter dependencies of SQL scripts
#[derive(Parser)]
#[command(name = "sqldeps")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQL file to analyze (reads stdin when omitted)
    path: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(short, long)]
    pretty: bool,

    /// SQL dialect: ansi, snowflake, postgres, bigquery, mysql
    #[arg(short, long)]
    dialect: Option<String>,

    /// Path to config file (default: sqldeps.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a JSON error payload instead of failing on parse errors
    #[arg(long)]
    soft_errors: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    tracing::debug!(dialect = %config.dialect, pretty = config.pretty, "configuration loaded");

    let sql = match read_input(cli.path.as_deref()) {
        Ok(sql) if !sql.trim().is_empty() => sql,
        Ok(_) => {
            eprintln!("{}", "No SQL provided.".red());
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(2);
        }
    };

    let extractor = DependencyExtractor::from_config(&config);
    let report = match extractor.extract_source(&sql, cli.path.as_deref()) {
        Ok(report) => report,
        Err(e) if cli.soft_errors => {
            let payload = error_payload(&e);
            println!("{}", render(&payload, config.pretty)?);
            return Ok(());
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    if !report.warnings.is_empty() {
        tracing::debug!(count = report.warnings.len(), "report has warnings");
    }

    let json = if config.pretty {
        report.to_json_pretty()?
    } else {
        report.to_json()?
    };
    println!("{}", json);

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Config file (explicit or `sqldeps.toml`) with command line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG))?
    } else {
        tracing::debug!("no config file found, using defaults");
        Config::default()
    };

    if let Some(dialect) = &cli.dialect {
        config.dialect = dialect.parse::<DialectConfig>()?;
    }
    if cli.pretty {
        config.pretty = true;
    }

    Ok(config)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut sql = String::new();
            std::io::stdin()
                .read_to_string(&mut sql)
                .context("Failed to read stdin")?;
            Ok(sql)
        }
    }
}

/// `{"error": ..., "type": ...}` printed in soft-error mode
fn error_payload(error: &ExtractError) -> serde_json::Value {
    serde_json::json!({
        "error": error.to_string(),
        "type": error.kind(),
    })
}

fn render(value: &serde_json::Value, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}
