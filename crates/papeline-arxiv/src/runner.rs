//! Main runner for the arXiv pipeline
//!
//! One run: plan → fetch → normalize → filter → dedup → deliver → commit.
//! Delivery starts only after fetching finished, and the dedup state is
//! committed only after delivery succeeded.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use papeline_core::{ProgressContext, RateLimiter, Transport, fmt_num, is_shutdown_requested};
use papeline_store::DedupStore;

use crate::config::Config;
use crate::dedup::{Admission, Deduplicator};
use crate::delivery::Dispatcher;
use crate::error::PipelineError;
use crate::fetcher::Fetcher;
use crate::query::QueryPlan;
use crate::record::{PaperRecord, normalize};
use crate::window::FetchWindow;

/// Pipeline execution summary
#[derive(Debug, Clone)]
pub struct Summary {
    pub window: FetchWindow,
    pub mode: &'static str,
    pub destination: String,
    pub total_results: Option<usize>,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    /// Raw entries seen across all fetched pages
    pub entries: usize,
    pub malformed: usize,
    pub out_of_window: usize,
    pub off_category: usize,
    pub duplicates: usize,
    pub delivered: usize,
    pub committed: usize,
    pub elapsed: Duration,
}

impl Summary {
    fn new(window: FetchWindow, mode: &'static str, destination: String) -> Self {
        Self {
            window,
            mode,
            destination,
            total_results: None,
            pages_fetched: 0,
            pages_failed: 0,
            entries: 0,
            malformed: 0,
            out_of_window: 0,
            off_category: 0,
            duplicates: 0,
            delivered: 0,
            committed: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Partial-success conditions worth surfacing to the operator.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.pages_failed > 0 {
            warnings.push(format!(
                "{} page(s) dropped after retries; some papers may be missing",
                self.pages_failed
            ));
        }
        if self.malformed > 0 {
            warnings.push(format!("{} malformed record(s) skipped", self.malformed));
        }
        warnings
    }

    fn log(&self) {
        log::info!("=== arXiv Pipeline Summary ===");
        log::info!("Window: {}", self.window);
        log::info!(
            "Pages: {} fetched, {} failed (total results: {})",
            self.pages_fetched,
            self.pages_failed,
            self.total_results
                .map(fmt_num)
                .unwrap_or_else(|| "unknown".to_string())
        );
        log::info!(
            "Entries: {} ({} malformed, {} outside window, {} off-category, {} duplicates)",
            fmt_num(self.entries),
            self.malformed,
            self.out_of_window,
            self.off_category,
            fmt_num(self.duplicates)
        );
        log::info!(
            "Delivered: {} ({} → {})",
            fmt_num(self.delivered),
            self.mode,
            self.destination
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        for warning in self.warnings() {
            log::warn!("{warning}");
        }
    }
}

/// Run the pipeline once for the window ending at `now`.
pub fn run<T: Transport, S: DedupStore>(
    config: &Config,
    transport: &T,
    store: &mut S,
    now: DateTime<Utc>,
    progress: &ProgressContext,
) -> Result<Summary, PipelineError> {
    let start = Instant::now();

    let filter = config.validate()?;
    let window = FetchWindow::ending_at(now, config.fetch_hours)?;
    let dispatcher = Dispatcher::from_config(&config.delivery);
    let mut summary = Summary::new(
        window,
        config.delivery.mode(),
        dispatcher.describe(window.end()),
    );

    let mut dedup = Deduplicator::load(store, config.dedup_policy)?;
    log::info!(
        "Fetching {} for {window} ({} known identifiers, {} policy)",
        config.categories.join(","),
        fmt_num(dedup.known_len()),
        config.dedup_policy.as_str()
    );

    // Fetch
    let plan = QueryPlan::new(window, &filter, config.page_size, config.max_pages)?;
    log::debug!("search_query = {}", plan.search_query());
    let pb = progress.stage_line("fetch");
    let mut fresh: Vec<PaperRecord> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut fetcher = Fetcher::new(
        transport,
        config.base_url.clone(),
        plan,
        RateLimiter::new(config.min_request_interval),
        config.fetch_retry,
        pb.clone(),
    );

    for outcome in fetcher.by_ref() {
        let page = match outcome {
            Ok(page) => page,
            Err(_) => {
                summary.pages_failed += 1;
                continue;
            }
        };
        summary.pages_fetched += 1;
        if page.total_results.is_some() {
            summary.total_results = page.total_results;
        }

        for raw in page.entries {
            summary.entries += 1;
            let record = match normalize(raw) {
                Ok(record) => record,
                Err(e) => {
                    log::debug!("{e}");
                    summary.malformed += 1;
                    continue;
                }
            };
            if !window.contains(record.published_at) && !window.contains(record.updated_at) {
                summary.out_of_window += 1;
                continue;
            }
            if !filter.matches_any(&record.categories) {
                summary.off_category += 1;
                continue;
            }
            match dedup.admit(&record) {
                Admission::Fresh => {
                    positions.insert(record.id.clone(), fresh.len());
                    fresh.push(record);
                }
                Admission::Supersedes => {
                    if let Some(&i) = positions.get(&record.id) {
                        fresh[i] = record;
                    }
                    summary.duplicates += 1;
                }
                Admission::Seen => summary.duplicates += 1,
            }
        }
        pb.set_message(format!("{} new papers", fmt_num(fresh.len())));
    }
    let interrupted = fetcher.interrupted();
    drop(fetcher);
    pb.finish_and_clear();

    if interrupted || is_shutdown_requested() {
        log::warn!("Interrupted after {} pages, nothing delivered", summary.pages_fetched);
        return Err(PipelineError::Interrupted);
    }

    // Deliver
    let pb = progress.stage_line("deliver");
    summary.delivered = dispatcher.deliver(&fresh, window.end(), transport, &pb)?;
    pb.finish_and_clear();

    // Commit
    summary.committed = dedup.commit()?;
    summary.elapsed = start.elapsed();
    summary.log();
    Ok(summary)
}
