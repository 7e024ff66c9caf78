//! Shared fixtures: Atom feed builders and a scripted transport

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use papeline_arxiv::Config;
use papeline_core::{HttpResponse, RetryPolicy, StreamError, Transport};

/// End of the test window; with 24 fetch hours the window is all of 2024-03-01.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()
}

pub const IN_WINDOW: &str = "2024-03-01T12:00:00Z";

/// Local-mode config with no request spacing and millisecond backoff.
pub fn local_config(output_dir: &Path) -> Config {
    let mut config = Config::local(output_dir);
    config.fetch_hours = 24;
    config.min_request_interval = Duration::ZERO;
    config.fetch_retry = RetryPolicy::new(2, Duration::from_millis(1));
    config
}

pub fn paper_id(n: usize) -> String {
    format!("2403.{n:05}")
}

pub fn entry(id: &str, version: u32, published: &str, categories: &[&str]) -> String {
    let cats: String = categories
        .iter()
        .map(|c| format!("<category term=\"{c}\" scheme=\"http://arxiv.org/schemas/atom\"/>"))
        .collect();
    format!(
        "<entry>\
         <id>http://arxiv.org/abs/{id}v{version}</id>\
         <updated>{published}</updated>\
         <published>{published}</published>\
         <title>Paper {id}</title>\
         <summary>Abstract of {id}.</summary>\
         <author><name>Ada Lovelace</name></author>\
         <link href=\"http://arxiv.org/abs/{id}v{version}\" rel=\"alternate\" type=\"text/html\"/>\
         {cats}\
         </entry>"
    )
}

/// In-window cs.AI entries for paper numbers `range`.
pub fn entries(range: std::ops::Range<usize>) -> Vec<String> {
    range
        .map(|n| entry(&paper_id(n), 1, IN_WINDOW, &["cs.AI"]))
        .collect()
}

pub fn feed(total: usize, entries: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <feed xmlns=\"http://www.w3.org/2005/Atom\" \
         xmlns:opensearch=\"http://a9.com/-/spec/opensearch/1.1/\" \
         xmlns:arxiv=\"http://arxiv.org/schemas/atom\">\
         <title type=\"html\">ArXiv Query</title>\
         <opensearch:totalResults>{total}</opensearch:totalResults>\
         {}\
         </feed>",
        entries.concat()
    )
}

/// A POST the transport received.
#[derive(Debug, Clone)]
pub struct Posted {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Posted {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serves scripted responses keyed by the `start` query parameter.
///
/// Each offset holds a queue; the last response in a queue repeats forever.
/// POSTs answer with scripted statuses, then 200.
#[derive(Default)]
pub struct ScriptedTransport {
    pages: RefCell<HashMap<usize, VecDeque<HttpResponse>>>,
    post_statuses: RefCell<VecDeque<u16>>,
    pub gets: RefCell<Vec<(Instant, usize)>>,
    pub posts: RefCell<Vec<Posted>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, start: usize, body: String) -> Self {
        self.respond(start, 200, body)
    }

    pub fn respond(self, start: usize, status: u16, body: String) -> Self {
        self.pages
            .borrow_mut()
            .entry(start)
            .or_default()
            .push_back(HttpResponse { status, body });
        self
    }

    /// Split `total` entries into full pages of `page_size`.
    pub fn paged(mut self, total: usize, page_size: usize) -> Self {
        let mut start = 0;
        while start < total {
            let end = (start + page_size).min(total);
            self = self.page(start, feed(total, &entries(start..end)));
            start = end;
        }
        self
    }

    pub fn post_statuses(self, statuses: &[u16]) -> Self {
        self.post_statuses.borrow_mut().extend(statuses);
        self
    }

    pub fn get_count(&self) -> usize {
        self.gets.borrow().len()
    }

    pub fn gets_for(&self, start: usize) -> usize {
        self.gets.borrow().iter().filter(|(_, s)| *s == start).count()
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, _url: &str, query: &[(&str, String)]) -> Result<HttpResponse, StreamError> {
        let start = query
            .iter()
            .find(|(k, _)| *k == "start")
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(0);
        self.gets.borrow_mut().push((Instant::now(), start));

        let mut pages = self.pages.borrow_mut();
        let Some(queue) = pages.get_mut(&start) else {
            return Ok(HttpResponse {
                status: 200,
                body: feed(0, &[]),
            });
        };
        let resp = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(resp.unwrap_or(HttpResponse {
            status: 500,
            body: "no response scripted".to_string(),
        }))
    }

    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<HttpResponse, StreamError> {
        self.posts.borrow_mut().push(Posted {
            url: url.to_string(),
            headers: headers.to_vec(),
            body: body.to_vec(),
        });
        let status = self.post_statuses.borrow_mut().pop_front().unwrap_or(200);
        Ok(HttpResponse {
            status,
            body: if status == 200 { "{\"ok\":true}".into() } else { "rejected".into() },
        })
    }
}

pub fn read_jsonl(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}
