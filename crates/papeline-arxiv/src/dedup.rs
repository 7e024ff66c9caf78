//! Run-scoped duplicate suppression over a [`DedupStore`]

use papeline_store::{DedupStore, SeenVersions};

use crate::config::DedupPolicy;
use crate::error::PipelineError;
use crate::record::PaperRecord;

/// Outcome of [`Deduplicator::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Not delivered before; emit it
    Fresh,
    /// Newer version of a record already admitted this run
    Supersedes,
    /// Already delivered (per policy) or already admitted this run
    Seen,
}

/// Admits records not yet delivered, and remembers what it admitted.
///
/// Nothing reaches the store until [`Deduplicator::commit`], which the
/// runner calls only after delivery succeeded.
pub struct Deduplicator<'a, S: DedupStore> {
    store: &'a mut S,
    policy: DedupPolicy,
    known: SeenVersions,
    pending: SeenVersions,
}

impl<'a, S: DedupStore> Deduplicator<'a, S> {
    pub fn load(store: &'a mut S, policy: DedupPolicy) -> Result<Self, PipelineError> {
        let known = store.load().map_err(PipelineError::Store)?;
        log::debug!(
            "Loaded {} known identifiers from {}",
            known.len(),
            store.describe()
        );
        Ok(Self {
            store,
            policy,
            known,
            pending: SeenVersions::new(),
        })
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    /// Records admitted so far this run.
    pub fn pending(&self) -> &SeenVersions {
        &self.pending
    }

    /// Decide whether `record` should be delivered.
    ///
    /// Each identifier is emitted at most once per run: a higher version of
    /// an identifier already admitted this run yields [`Admission::Supersedes`]
    /// so the caller can swap the pending record in place.
    pub fn admit(&mut self, record: &PaperRecord) -> Admission {
        if let Some(pending) = self.pending.get(&record.id) {
            if self.policy == DedupPolicy::NewerVersion && record.version > pending {
                self.pending.record(&record.id, record.version);
                return Admission::Supersedes;
            }
            return Admission::Seen;
        }
        let delivered = match (self.policy, self.known.get(&record.id)) {
            (_, None) => false,
            (DedupPolicy::Presence, Some(_)) => true,
            (DedupPolicy::NewerVersion, Some(stored)) => stored >= record.version,
        };
        if delivered {
            return Admission::Seen;
        }
        self.pending.record(&record.id, record.version);
        Admission::Fresh
    }

    /// Persist everything admitted this run in one write.
    pub fn commit(self) -> Result<usize, PipelineError> {
        let n = self.pending.len();
        self.store
            .commit(&self.pending)
            .map_err(PipelineError::Store)?;
        Ok(n)
    }
}
