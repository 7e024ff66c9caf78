//! In-memory dedup store (tests, dry runs, ephemeral CI runners)

use anyhow::Result;

use crate::seen::{DedupStore, SeenVersions};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    seen: SeenVersions,
    commits: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(seen: SeenVersions) -> Self {
        Self { seen, commits: 0 }
    }

    pub fn snapshot(&self) -> &SeenVersions {
        &self.seen
    }

    /// Number of non-empty commits applied so far.
    pub fn commit_count(&self) -> usize {
        self.commits
    }
}

impl DedupStore for MemoryStore {
    fn load(&self) -> Result<SeenVersions> {
        Ok(self.seen.clone())
    }

    fn commit(&mut self, updates: &SeenVersions) -> Result<()> {
        if !updates.is_empty() {
            self.seen.merge(updates);
            self.commits += 1;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
