//! Papeline arXiv - periodic fetch → dedup → deliver pipeline for arXiv
//!
//! Pulls recent submissions from the arXiv Atom API over a rolling window,
//! normalizes them into [`PaperRecord`]s, drops anything already delivered,
//! and hands the rest to a dated JSONL file or a signed HTTP endpoint.

pub mod category;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod error;
pub mod fetcher;
pub mod parser;
pub mod query;
pub mod record;
pub mod runner;
pub mod signer;
pub mod window;

pub use category::{CategoryFilter, CategoryPattern};
pub use config::{Config, DedupPolicy, Delivery, LocalConfig, RemoteConfig};
pub use dedup::{Admission, Deduplicator};
pub use delivery::{Dispatcher, LocalSink, RemoteSink};
pub use error::{MalformedRecord, PipelineError};
pub use fetcher::{FetchedPage, Fetcher, PageFailure};
pub use parser::{Feed, RawEntry, parse_feed};
pub use query::{QueryDescriptor, QueryPlan};
pub use record::{PaperRecord, normalize};
pub use runner::{Summary, run};
pub use signer::{SignedPayload, Signer};
pub use window::FetchWindow;
