//! `papeline run` - fetch the current window once and deliver new papers

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use papeline_arxiv::Summary;
use papeline_core::{HttpTransport, ProgressContext, SharedProgress, fmt_num};
use papeline_store::JsonFileStore;

use crate::config::{Config, OutputMode};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Window length in hours, ending now
    #[arg(long)]
    pub hours: Option<u32>,

    /// Output directory (local mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Delivery mode: local or api
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<OutputMode>,

    /// Stop after this many result pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Dedup state file
    #[arg(long)]
    pub state: Option<PathBuf>,
}

fn parse_mode(s: &str) -> Result<OutputMode, String> {
    OutputMode::parse(s).ok_or_else(|| format!("unknown mode {s:?} (expected local or api)"))
}

pub fn run(args: RunArgs, mut config: Config, progress: &SharedProgress) -> Result<ExitCode> {
    if let Some(hours) = args.hours {
        config.arxiv.fetch_hours = hours;
    }
    if let Some(dir) = args.output {
        config.output.dir = dir;
    }
    if let Some(mode) = args.mode {
        config.output.mode = mode;
    }
    if let Some(n) = args.max_pages {
        config.arxiv.max_pages = Some(n);
    }
    if let Some(path) = args.state {
        config.state.path = path;
    }

    let pipeline = match config.resolve() {
        Ok(pipeline) => pipeline,
        Err(e) => {
            log::error!("{e}");
            return Ok(ExitCode::from(e.exit_code()));
        }
    };

    if let Err(e) = papeline_core::install_signal_handlers() {
        log::warn!("Failed to install signal handlers: {e}");
    }

    let transport =
        HttpTransport::new(&config.http_config()).context("Failed to build HTTP client")?;
    let mut store = JsonFileStore::new(&config.state.path);

    match papeline_arxiv::run(&pipeline, &transport, &mut store, Utc::now(), progress) {
        Ok(summary) => {
            print_summary(&summary, progress);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            log::error!("{e}");
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

/// Print the run summary table on stderr
fn print_summary(summary: &Summary, progress: &ProgressContext) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("arXiv run").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let rows: Vec<(&str, String)> = vec![
        ("Window", summary.window.to_string()),
        (
            "Total results",
            summary
                .total_results
                .map_or_else(|| "unknown".to_string(), fmt_num),
        ),
        (
            "Pages",
            format!(
                "{} fetched, {} failed",
                summary.pages_fetched, summary.pages_failed
            ),
        ),
        ("Entries", fmt_num(summary.entries)),
        ("Malformed", summary.malformed.to_string()),
        ("Outside window", summary.out_of_window.to_string()),
        ("Off-category", summary.off_category.to_string()),
        ("Duplicates", fmt_num(summary.duplicates)),
        ("Delivered", fmt_num(summary.delivered)),
        ("Destination", format!("{} ({})", summary.destination, summary.mode)),
        ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    progress.println(format!("\n{table}"));

    for warning in summary.warnings() {
        progress.println(format!("warning: {warning}"));
    }
}
