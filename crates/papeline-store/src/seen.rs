//! Seen-identifier state and the storage contract behind it

use std::collections::BTreeMap;

use anyhow::Result;

/// Mapping of paper identifier → highest version already delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenVersions {
    entries: BTreeMap<String, u32>,
}

impl SeenVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<u32> {
        self.entries.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Record `version` for `id`, keeping the higher of old and new.
    ///
    /// Returns true when the stored value changed.
    pub fn record(&mut self, id: &str, version: u32) -> bool {
        match self.entries.get_mut(id) {
            Some(v) if *v >= version => false,
            Some(v) => {
                *v = version;
                true
            }
            None => {
                self.entries.insert(id.to_string(), version);
                true
            }
        }
    }

    /// Merge another set into this one (max version wins).
    pub fn merge(&mut self, other: &SeenVersions) {
        for (id, version) in other.iter() {
            self.record(id, version);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub(crate) fn as_map(&self) -> &BTreeMap<String, u32> {
        &self.entries
    }
}

impl From<BTreeMap<String, u32>> for SeenVersions {
    fn from(entries: BTreeMap<String, u32>) -> Self {
        Self { entries }
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for SeenVersions {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        let mut seen = Self::new();
        for (id, version) in iter {
            let id: String = id.into();
            seen.record(&id, version);
        }
        seen
    }
}

/// Persistence medium for dedup state.
///
/// `load` is called once at the start of a run; `commit` once at the end of
/// a successful run with only the newly delivered pairs. A commit must be a
/// single durable write: either all updates land or none do.
pub trait DedupStore {
    fn load(&self) -> Result<SeenVersions>;

    fn commit(&mut self, updates: &SeenVersions) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}
