//! Paginated, rate-limited, retrying page fetcher

use indicatif::ProgressBar;
use papeline_core::{
    FetchError, RateLimiter, RetryPolicy, StreamError, Transport, is_shutdown_requested,
    retry_with_backoff,
};

use crate::parser::{Feed, RawEntry, parse_feed};
use crate::query::{QueryDescriptor, QueryPlan};

/// A page that was fetched and parsed.
#[derive(Debug)]
pub struct FetchedPage {
    pub descriptor: QueryDescriptor,
    pub total_results: Option<usize>,
    pub entries: Vec<RawEntry>,
}

/// A page dropped after its final attempt.
#[derive(Debug)]
pub struct PageFailure {
    pub descriptor: QueryDescriptor,
    pub error: FetchError,
}

/// Pulls descriptors from a [`QueryPlan`] one page at a time.
///
/// Yields `Ok(page)` or `Err(failure)` per issued page. Stops early, with
/// [`Fetcher::interrupted`] set, once shutdown has been requested.
pub struct Fetcher<'a, T: Transport> {
    transport: &'a T,
    base_url: String,
    plan: QueryPlan,
    limiter: RateLimiter,
    retry: RetryPolicy,
    pb: ProgressBar,
    interrupted: bool,
}

impl<'a, T: Transport> Fetcher<'a, T> {
    pub fn new(
        transport: &'a T,
        base_url: impl Into<String>,
        plan: QueryPlan,
        limiter: RateLimiter,
        retry: RetryPolicy,
        pb: ProgressBar,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            plan,
            limiter,
            retry,
            pb,
            interrupted: false,
        }
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    fn fetch_page(&mut self, descriptor: &QueryDescriptor) -> Result<Feed, FetchError> {
        let transport = self.transport;
        let base_url = self.base_url.as_str();
        let limiter = &mut self.limiter;
        let params = descriptor.params();
        let label = format!(
            "page {} (start={})",
            descriptor.page_number(),
            descriptor.start_offset
        );

        retry_with_backoff(&label, &self.retry, &self.pb, |_attempt| {
            limiter.acquire();
            let resp = transport.get(base_url, &params)?;
            if !resp.is_success() {
                return Err(StreamError::from_status(resp.status, &resp.body).into());
            }
            let feed =
                parse_feed(&resp.body).map_err(|e| FetchError::Malformed(format!("{e:#}")))?;
            if let Some(msg) = &feed.error {
                return Err(FetchError::Malformed(format!("API error: {msg}")));
            }
            Ok(feed)
        })
    }
}

impl<T: Transport> Iterator for Fetcher<'_, T> {
    type Item = Result<FetchedPage, PageFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.interrupted {
            return None;
        }
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping before next page");
            self.interrupted = true;
            return None;
        }
        let descriptor = self.plan.next_descriptor()?;
        self.pb.set_message(format!(
            "page {}{} (start={})",
            descriptor.page_number(),
            self.plan
                .expected_pages()
                .map(|n| format!("/{n}"))
                .unwrap_or_default(),
            descriptor.start_offset
        ));

        match self.fetch_page(&descriptor) {
            Ok(page) => {
                log::debug!(
                    "Page {}: {} entries (total {:?})",
                    descriptor.page_number(),
                    page.entries.len(),
                    page.total_results
                );
                self.plan.record_page(page.total_results, page.entries.len());
                Some(Ok(FetchedPage {
                    descriptor,
                    total_results: page.total_results,
                    entries: page.entries,
                }))
            }
            Err(error) => {
                log::warn!(
                    "Dropping page {} (start={}): {error}",
                    descriptor.page_number(),
                    descriptor.start_offset
                );
                self.plan.record_failure();
                Some(Err(PageFailure { descriptor, error }))
            }
        }
    }
}
