//! papeline-store: Persistent dedup state for pipeline runs
//!
//! Records which paper identifiers (and versions) were already delivered so
//! re-runs over an overlapping window stay idempotent. The medium is
//! pluggable behind [`DedupStore`]; [`JsonFileStore`] is the default.

pub mod file;
pub mod hash;
pub mod memory;
pub mod seen;

pub use file::JsonFileStore;
pub use hash::entries_checksum;
pub use memory::MemoryStore;
pub use seen::{DedupStore, SeenVersions};
