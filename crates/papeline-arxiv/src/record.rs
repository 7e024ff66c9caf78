//! Normalized paper record and raw-entry normalization

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MalformedRecord;
use crate::parser::RawEntry;

/// One paper, as delivered downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Bare identifier without version suffix (`2403.01234`, `hep-th/9901001`)
    pub id: String,
    pub version: u32,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub categories: BTreeSet<String>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
}

impl PaperRecord {
    /// Canonical abstract page for this version.
    pub fn canonical_url(id: &str, version: u32) -> String {
        format!("https://arxiv.org/abs/{id}v{version}")
    }
}

/// Turn a raw feed entry into a [`PaperRecord`].
pub fn normalize(raw: RawEntry) -> Result<PaperRecord, MalformedRecord> {
    let raw_id = raw
        .id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed(None, "missing id"))?;
    let (id, version) = split_identifier(raw_id)
        .ok_or_else(|| malformed(Some(raw_id), "unrecognized identifier"))?;

    let title = raw.title.as_deref().map(collapse_whitespace).unwrap_or_default();
    if title.is_empty() {
        return Err(malformed(Some(&id), "missing title"));
    }

    let published_at = match raw.published.as_deref() {
        Some(s) => parse_timestamp(s)
            .ok_or_else(|| malformed(Some(&id), &format!("bad published timestamp {s:?}")))?,
        None => return Err(malformed(Some(&id), "missing published timestamp")),
    };
    let updated_at = match raw.updated.as_deref() {
        Some(s) => parse_timestamp(s)
            .ok_or_else(|| malformed(Some(&id), &format!("bad updated timestamp {s:?}")))?,
        None => published_at,
    };

    let url = raw
        .link
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| PaperRecord::canonical_url(&id, version));

    Ok(PaperRecord {
        version,
        title,
        abstract_text: raw.summary.as_deref().map(collapse_whitespace).unwrap_or_default(),
        authors: raw
            .authors
            .iter()
            .map(|a| collapse_whitespace(a))
            .filter(|a| !a.is_empty())
            .collect(),
        categories: raw.categories.into_iter().collect(),
        published_at,
        updated_at,
        url,
        id,
    })
}

fn malformed(id: Option<&str>, reason: &str) -> MalformedRecord {
    MalformedRecord {
        id: id.map(str::to_string),
        reason: reason.to_string(),
    }
}

/// Split `http://arxiv.org/abs/2403.01234v2` into (`2403.01234`, 2).
///
/// A missing version suffix means version 1.
pub fn split_identifier(raw: &str) -> Option<(String, u32)> {
    let tail = match raw.find("/abs/") {
        Some(pos) => &raw[pos + "/abs/".len()..],
        None => raw,
    };
    let tail = tail.trim_end_matches('/');
    if tail.is_empty() || tail.contains(char::is_whitespace) {
        return None;
    }

    if let Some(pos) = tail.rfind('v') {
        let digits = &tail[pos + 1..];
        if pos > 0 && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            let version = digits.parse().ok().filter(|v| *v > 0)?;
            return Some((tail[..pos].to_string(), version));
        }
    }
    Some((tail.to_string(), 1))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
