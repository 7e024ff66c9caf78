//! JSON file-backed dedup store
//!
//! Layout of the state file:
//! ```text
//! {
//!   "format_version": 1,
//!   "updated_at": "2026-10-19T06:00:00Z",
//!   "entry_count": 2,
//!   "checksum": "<blake3 of entries>",
//!   "entries": { "2401.00001": 1, "2401.00002": 3 }
//! }
//! ```
//!
//! Commits write `{path}.tmp`, fsync it, then rename over `{path}`, so a
//! crash leaves either the old state or the new one, never a torn file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::hash::entries_checksum;
use crate::seen::{DedupStore, SeenVersions};

/// Current state file format. Bump on incompatible changes.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    format_version: u32,
    updated_at: chrono::DateTime<chrono::Utc>,
    entry_count: usize,
    checksum: String,
    entries: BTreeMap<String, u32>,
}

/// Dedup state persisted as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "seen.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read_state(&self) -> Result<Option<SeenVersions>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", self.path.display()));
            }
        };

        let state: StateFile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;

        anyhow::ensure!(
            state.format_version == CURRENT_FORMAT_VERSION,
            "{}: format_version {} != supported {}",
            self.path.display(),
            state.format_version,
            CURRENT_FORMAT_VERSION
        );
        anyhow::ensure!(
            state.entry_count == state.entries.len(),
            "{}: entry_count {} does not match {} entries",
            self.path.display(),
            state.entry_count,
            state.entries.len()
        );
        let actual = entries_checksum(&state.entries);
        anyhow::ensure!(
            actual == state.checksum,
            "{}: checksum mismatch (expected {}, got {actual})",
            self.path.display(),
            state.checksum
        );

        Ok(Some(SeenVersions::from(state.entries)))
    }

    fn write_state(&self, seen: &SeenVersions) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state dir: {}", parent.display()))?;
        }

        let entries = seen.as_map();
        let state = StateFile {
            format_version: CURRENT_FORMAT_VERSION,
            updated_at: chrono::Utc::now(),
            entry_count: entries.len(),
            checksum: entries_checksum(entries),
            entries: entries.clone(),
        };
        let json = serde_json::to_string_pretty(&state).context("failed to serialize state")?;

        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            file.write_all(json.as_bytes())
                .with_context(|| format!("failed to write {}", tmp.display()))?;
            file.sync_all()
                .with_context(|| format!("failed to sync {}", tmp.display()))?;
        }

        fs::rename(&tmp, &self.path).with_context(|| {
            format!(
                "failed to rename {} → {}",
                tmp.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }
}

impl DedupStore for JsonFileStore {
    fn load(&self) -> Result<SeenVersions> {
        match self.read_state()? {
            Some(seen) => {
                log::info!(
                    "Loaded {} seen identifiers from {}",
                    seen.len(),
                    self.path.display()
                );
                Ok(seen)
            }
            None => {
                log::info!(
                    "No dedup state at {}, starting empty",
                    self.path.display()
                );
                Ok(SeenVersions::new())
            }
        }
    }

    fn commit(&mut self, updates: &SeenVersions) -> Result<()> {
        if updates.is_empty() {
            log::debug!("store: nothing to commit");
            return Ok(());
        }
        // Re-read so the commit merges with what is on disk, not a stale snapshot
        let mut seen = self.read_state()?.unwrap_or_default();
        seen.merge(updates);
        self.write_state(&seen)?;
        log::info!(
            "Committed {} identifiers to {} ({} total)",
            updates.len(),
            self.path.display(),
            seen.len()
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
