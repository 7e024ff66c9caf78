//! Blake3 checksums for state file integrity

use std::collections::BTreeMap;

/// Checksum over sorted `(id, version)` entries.
///
/// Independent of JSON formatting, so a pretty-printed or re-indented state
/// file still verifies; a dropped or edited entry does not.
pub fn entries_checksum(entries: &BTreeMap<String, u32>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (id, version) in entries {
        hasher.update(id.as_bytes());
        hasher.update(b"\t");
        hasher.update(&version.to_le_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
