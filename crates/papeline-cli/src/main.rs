//! papeline - periodic arXiv fetch → dedup → deliver
//!
//! Fetches recent arXiv submissions over a rolling window, drops papers
//! already delivered, and writes the rest to dated JSONL files or POSTs
//! them (optionally signed) to a collection service.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::{Config, OutputMode};
use papeline_core::SharedProgress;

#[derive(Parser)]
#[command(name = "papeline")]
#[command(about = "Periodic arXiv fetch, dedup and delivery")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./papeline.toml or ~/.config/papeline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Read timeout in seconds for upstream requests
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Maximum attempts per request, including the first
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the current window once and deliver new papers
    Run(cmd::run::RunArgs),
    /// Generate an Ed25519 key pair for signed delivery
    Keygen(cmd::keygen::KeygenArgs),
    /// Check a delivery signature against a public key
    Verify(cmd::verify::VerifyArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(papeline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug (progress bars show activity)
    //   non-TTY: info unless --debug (logs are the only progress indicator)
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    papeline_core::init_logging(quiet, cli.debug, multi);

    dispatch(cli, &progress)
}

fn dispatch(cli: Cli, progress: &SharedProgress) -> Result<ExitCode> {
    // keygen and verify never read the configuration
    match cli.command {
        Command::Keygen(args) => cmd::keygen::run(args).map(|()| ExitCode::SUCCESS),
        Command::Verify(args) => cmd::verify::run(args),
        Command::Run(args) => match load_config(cli.config.as_deref(), cli.read_timeout, cli.max_retries) {
            Ok(config) => cmd::run::run(args, config, progress),
            Err(code) => Ok(code),
        },
        Command::Config => match load_config(cli.config.as_deref(), cli.read_timeout, cli.max_retries) {
            Ok(config) => {
                print_config(&config);
                Ok(ExitCode::SUCCESS)
            }
            Err(code) => Ok(code),
        },
    }
}

/// Configuration from file, then environment, then CLI flags.
/// A bad file or environment value maps to exit status 2.
fn load_config(
    path: Option<&Path>,
    read_timeout: Option<u64>,
    max_retries: Option<u32>,
) -> Result<Config, ExitCode> {
    let loaded = match path {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    };
    let mut config = loaded
        .and_then(|mut c| c.apply_env().map(|()| c))
        .map_err(|e| {
            log::error!("{e:#}");
            ExitCode::from(2)
        })?;
    if let Some(secs) = read_timeout {
        config.http.read_timeout = secs;
    }
    if let Some(n) = max_retries {
        config.http.max_retries = n;
    }
    Ok(config)
}

fn print_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    fn configured(set: bool) -> &'static str {
        if set { "configured" } else { "not set" }
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["arXiv base URL", &config.arxiv.base_url]);
    table.add_row(vec!["Categories", &config.arxiv.categories.join(", ")]);
    table.add_row(vec!["Fetch hours", &config.arxiv.fetch_hours.to_string()]);
    table.add_row(vec!["Page size", &config.arxiv.page_size.to_string()]);
    table.add_row(vec![
        "Max pages",
        &config
            .arxiv
            .max_pages
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string()),
    ]);
    table.add_row(vec![
        "Request interval",
        &format!("{}s", config.arxiv.request_interval_secs),
    ]);
    table.add_row(vec![
        "Output mode",
        match config.output.mode {
            OutputMode::Local => "local",
            OutputMode::Api => "api",
        },
    ]);
    table.add_row(vec!["Output directory", &config.output.dir.display().to_string()]);
    table.add_row(vec![
        "Service URL",
        config.remote.url.as_deref().unwrap_or("not set"),
    ]);
    table.add_row(vec!["Batch size", &config.remote.batch_size.to_string()]);
    table.add_row(vec![
        "Authentication",
        if config.remote.enable_auth { "enabled" } else { "disabled" },
    ]);
    table.add_row(vec!["API key", configured(config.remote.api_key.is_some())]);
    table.add_row(vec![
        "Signing",
        if config.signing.enabled { "enabled" } else { "disabled" },
    ]);
    table.add_row(vec![
        "Private key",
        configured(config.signing.private_key.is_some() || config.signing.private_key_path.is_some()),
    ]);
    table.add_row(vec![
        "Key id",
        config.signing.key_id.as_deref().unwrap_or("derived"),
    ]);
    table.add_row(vec!["State file", &config.state.path.display().to_string()]);
    table.add_row(vec!["Dedup policy", &config.state.policy]);
    table.add_row(vec![
        "Read timeout",
        &format!("{}s", config.http.read_timeout),
    ]);
    table.add_row(vec![
        "POST timeout",
        &format!("{}s", config.remote.timeout_secs),
    ]);
    table.add_row(vec!["Max retries", &config.http.max_retries.to_string()]);

    eprintln!("\n{table}");
}
