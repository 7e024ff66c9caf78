//! Subject category allow-list

use std::collections::BTreeSet;

/// One allow-list entry: `cs.*` (prefix) or `cs.LG` (exact).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryPattern {
    /// Matches tags starting with the stored prefix (including the dot)
    Prefix(String),
    Exact(String),
}

impl CategoryPattern {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return None;
        }
        match s.strip_suffix('*') {
            Some(prefix) if !prefix.is_empty() => Some(Self::Prefix(prefix.to_string())),
            Some(_) => None,
            None => Some(Self::Exact(s.to_string())),
        }
    }

    pub fn matches(&self, tag: &str) -> bool {
        match self {
            Self::Prefix(p) => tag.starts_with(p.as_str()),
            Self::Exact(e) => tag == e,
        }
    }

    /// arXiv search term (`cat:cs.*` / `cat:cs.LG`)
    fn search_term(&self) -> String {
        match self {
            Self::Prefix(p) => format!("cat:{p}*"),
            Self::Exact(e) => format!("cat:{e}"),
        }
    }
}

/// Non-empty set of category patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFilter {
    patterns: Vec<CategoryPattern>,
}

impl CategoryFilter {
    /// Parse an allow-list. Returns `None` if no usable pattern remains.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Option<Self> {
        let patterns: Vec<CategoryPattern> = patterns
            .iter()
            .filter_map(|p| CategoryPattern::parse(p.as_ref()))
            .collect();
        if patterns.is_empty() {
            None
        } else {
            Some(Self { patterns })
        }
    }

    pub fn matches_any(&self, tags: &BTreeSet<String>) -> bool {
        tags.iter()
            .any(|tag| self.patterns.iter().any(|p| p.matches(tag)))
    }

    /// Search clause: a single term, or several OR-ed in parentheses.
    pub fn search_clause(&self) -> String {
        let terms: Vec<String> = self.patterns.iter().map(|p| p.search_term()).collect();
        if terms.len() == 1 {
            terms.into_iter().next().unwrap_or_default()
        } else {
            format!("({})", terms.join(" OR "))
        }
    }
}
