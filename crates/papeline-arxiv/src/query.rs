//! Query planning: paginated descriptors over one fetch window
//!
//! The plan is pulled one descriptor at a time and told what each page
//! returned, so it can stop as soon as the server-reported total is
//! exhausted or a page comes back empty.

use crate::category::CategoryFilter;
use crate::error::PipelineError;
use crate::window::FetchWindow;

/// Upper bound on `max_results` per request.
pub const MAX_PAGE_SIZE: usize = 100;

/// One page request against the upstream search API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    /// Category filter AND submission-date range
    pub search_query: String,
    pub window: FetchWindow,
    pub start_offset: usize,
    pub page_size: usize,
}

impl QueryDescriptor {
    /// 1-based page number, for logs
    pub fn page_number(&self) -> usize {
        self.start_offset / self.page_size + 1
    }

    /// Query string parameters, oldest submissions first so an interrupted
    /// run has fetched a contiguous prefix.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("search_query", self.search_query.clone()),
            ("start", self.start_offset.to_string()),
            ("max_results", self.page_size.to_string()),
            ("sortBy", "submittedDate".to_string()),
            ("sortOrder", "ascending".to_string()),
        ]
    }
}

/// Lazy pagination state for one run.
#[derive(Debug)]
pub struct QueryPlan {
    search_query: String,
    window: FetchWindow,
    page_size: usize,
    max_pages: Option<usize>,
    next_offset: usize,
    issued: usize,
    total: Option<usize>,
    done: bool,
}

impl QueryPlan {
    pub fn new(
        window: FetchWindow,
        categories: &CategoryFilter,
        page_size: usize,
        max_pages: Option<usize>,
    ) -> Result<Self, PipelineError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(PipelineError::Config(format!(
                "page_size must be within 1..={MAX_PAGE_SIZE}, got {page_size}"
            )));
        }
        Ok(Self {
            search_query: format!(
                "{} AND {}",
                categories.search_clause(),
                window.submitted_date_clause()
            ),
            window,
            page_size,
            max_pages,
            next_offset: 0,
            issued: 0,
            total: None,
            done: false,
        })
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Server-reported total, once a page has been seen.
    pub fn total_results(&self) -> Option<usize> {
        self.total
    }

    /// Pages this plan expects to issue, once the total is known.
    pub fn expected_pages(&self) -> Option<usize> {
        let pages = self.total?.div_ceil(self.page_size);
        Some(match self.max_pages {
            Some(max) => pages.min(max),
            None => pages,
        })
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Next descriptor, or `None` once the result set is covered.
    pub fn next_descriptor(&mut self) -> Option<QueryDescriptor> {
        if self.done {
            return None;
        }
        if self.max_pages.is_some_and(|max| self.issued >= max) {
            log::info!("Reached page limit ({})", self.issued);
            self.done = true;
            return None;
        }
        if let Some(total) = self.total {
            if self.next_offset >= total {
                self.done = true;
                return None;
            }
        }

        let descriptor = QueryDescriptor {
            search_query: self.search_query.clone(),
            window: self.window,
            start_offset: self.next_offset,
            page_size: self.page_size,
        };
        self.next_offset += self.page_size;
        self.issued += 1;
        Some(descriptor)
    }

    /// Feed back a fetched page: its total hint and how many entries it held.
    pub fn record_page(&mut self, total_results: Option<usize>, entries: usize) {
        if let Some(total) = total_results {
            self.total = Some(total);
        }
        if entries == 0 {
            // Empty page ends pagination even if the total says otherwise
            self.done = true;
        } else if self.total.is_none() && entries < self.page_size {
            self.done = true;
        }
    }

    /// Feed back a dropped page.
    ///
    /// Without a total the extent of the result set is unknown, so planning
    /// stops rather than probing offsets blindly.
    pub fn record_failure(&mut self) {
        if self.total.is_none() {
            log::warn!("Result total unknown after a failed page, stopping pagination");
            self.done = true;
        }
    }
}

impl Iterator for QueryPlan {
    type Item = QueryDescriptor;

    fn next(&mut self) -> Option<QueryDescriptor> {
        self.next_descriptor()
    }
}
