//! arXiv Atom feed parser using quick-xml
//!
//! Extracts the OpenSearch total and the raw fields of each `<entry>`.
//! Element matching uses local names, so namespace prefixes do not matter.

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Entry fields as they appear in the feed, before normalization.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    /// `rel="alternate"` link
    pub link: Option<String>,
}

/// One parsed result page.
#[derive(Debug, Default)]
pub struct Feed {
    /// `opensearch:totalResults`, if present and numeric
    pub total_results: Option<usize>,
    pub entries: Vec<RawEntry>,
    /// Set when the API answered with its error feed instead of results
    pub error: Option<String>,
}

/// Error entries carry an id under this path instead of an abstract page.
const ERROR_ID_MARKER: &str = "/api/errors";

/// Parse one Atom response body.
pub fn parse_feed(xml: &str) -> Result<Feed> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feed = Feed::default();
    let mut saw_feed = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"feed" => saw_feed = true,
                b"totalResults" => {
                    let text = read_text(&mut reader)?;
                    feed.total_results = text.trim().parse().ok();
                    if feed.total_results.is_none() {
                        log::debug!("Ignoring non-numeric totalResults: {text:?}");
                    }
                }
                b"entry" => {
                    let entry = parse_entry(&mut reader)?;
                    if let Some(id) = entry.id.as_deref().filter(|id| id.contains(ERROR_ID_MARKER)) {
                        let detail = entry
                            .summary
                            .clone()
                            .unwrap_or_else(|| id.to_string());
                        feed.error = Some(detail.trim().to_string());
                    } else {
                        feed.entries.push(entry);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e).context("XML parse error"),
            _ => {}
        }
        buf.clear();
    }

    if !saw_feed {
        anyhow::bail!("response is not an Atom feed");
    }
    Ok(feed)
}

fn parse_entry(reader: &mut Reader<&[u8]>) -> Result<RawEntry> {
    let mut entry = RawEntry::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"id" => entry.id = Some(read_text(reader)?),
                b"title" => entry.title = Some(read_text(reader)?),
                b"summary" => entry.summary = Some(read_text(reader)?),
                b"published" => entry.published = Some(read_text(reader)?),
                b"updated" => entry.updated = Some(read_text(reader)?),
                b"author" => parse_author(reader, &mut entry.authors)?,
                b"category" => {
                    push_category(&e, &mut entry.categories);
                    skip_element(reader)?;
                }
                b"link" => {
                    take_alternate_link(&e, &mut entry.link);
                    skip_element(reader)?;
                }
                // arxiv:comment, arxiv:doi, arxiv:journal_ref, ...
                _ => skip_element(reader)?,
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"category" => push_category(&e, &mut entry.categories),
                b"link" => take_alternate_link(&e, &mut entry.link),
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"entry" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(entry)
}

fn parse_author(reader: &mut Reader<&[u8]>, authors: &mut Vec<String>) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"name" => {
                let name = read_text(reader)?;
                let name = name.trim();
                if !name.is_empty() {
                    authors.push(name.to_string());
                }
            }
            // arxiv:affiliation
            Event::Start(_) => skip_element(reader)?,
            Event::End(e) if e.local_name().as_ref() == b"author" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

/// `<category term="cs.AI"/>` (the `arxiv:primary_category` duplicate shares the local name)
fn push_category(e: &BytesStart<'_>, categories: &mut Vec<String>) {
    if let Some(term) = attr_value(e, b"term") {
        let term = term.trim();
        if !term.is_empty() && !categories.iter().any(|c| c == term) {
            categories.push(term.to_string());
        }
    }
}

fn take_alternate_link(e: &BytesStart<'_>, link: &mut Option<String>) {
    let rel = attr_value(e, b"rel");
    // Atom: a link without rel is an alternate link
    if rel.as_deref().is_none_or(|r| r == "alternate") {
        if let Some(href) = attr_value(e, b"href") {
            link.get_or_insert(href);
        }
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Read text content of the current element, including nested markup.
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::Start(_) => {
                // Inline markup inside titles or abstracts
                text.push(' ');
                text.push_str(&read_text(reader)?);
            }
            Event::End(_) => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

/// Consume events up to the end of the current element.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query</title>
  <id>http://arxiv.org/api/abc</id>
  <opensearch:totalResults>237</opensearch:totalResults>
  <opensearch:startIndex>0</opensearch:startIndex>
  <opensearch:itemsPerPage>100</opensearch:itemsPerPage>
  <entry>
    <id>http://arxiv.org/abs/2403.01234v2</id>
    <updated>2024-03-02T10:00:00Z</updated>
    <published>2024-03-01T09:30:00Z</published>
    <title>Sparse   Attention
      for Everyone</title>
    <summary>  We study &amp; improve attention.
    </summary>
    <author><name>Ada Lovelace</name><arxiv:affiliation>Analytical Engines</arxiv:affiliation></author>
    <author><name>Alan Turing</name></author>
    <arxiv:comment>12 pages</arxiv:comment>
    <link href="http://arxiv.org/abs/2403.01234v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2403.01234v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="stat.ML" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn parses_total_and_entry() {
        let feed = parse_feed(SAMPLE).unwrap();
        assert_eq!(feed.total_results, Some(237));
        assert!(feed.error.is_none());
        assert_eq!(feed.entries.len(), 1);

        let e = &feed.entries[0];
        assert_eq!(e.id.as_deref(), Some("http://arxiv.org/abs/2403.01234v2"));
        assert_eq!(e.published.as_deref(), Some("2024-03-01T09:30:00Z"));
        assert_eq!(e.updated.as_deref(), Some("2024-03-02T10:00:00Z"));
        assert!(e.title.as_deref().unwrap().starts_with("Sparse"));
        assert!(e.summary.as_deref().unwrap().contains("We study & improve"));
        assert_eq!(e.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(e.categories, vec!["cs.LG", "stat.ML"]);
        assert_eq!(e.link.as_deref(), Some("http://arxiv.org/abs/2403.01234v2"));
    }

    #[test]
    fn empty_feed_has_zero_entries() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">
  <opensearch:totalResults>0</opensearch:totalResults>
</feed>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.total_results, Some(0));
        assert!(feed.entries.is_empty());
    }

    #[test]
    fn missing_total_is_none() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry><id>http://arxiv.org/abs/2403.00001v1</id></entry></feed>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.total_results, None);
        assert_eq!(feed.entries.len(), 1);
    }

    #[test]
    fn error_feed_is_reported() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_1234</id>
    <title>Error</title>
    <summary>incorrect id format for 1234</summary>
  </entry>
</feed>"#;
        let feed = parse_feed(xml).unwrap();
        assert!(feed.entries.is_empty());
        assert_eq!(feed.error.as_deref(), Some("incorrect id format for 1234"));
    }

    #[test]
    fn non_feed_body_is_rejected() {
        assert!(parse_feed("<html><body>Service Unavailable</body></html>").is_err());
        assert!(parse_feed("").is_err());
    }

    #[test]
    fn truncated_xml_is_an_error_or_partial() {
        // quick-xml reports mismatched end tags as errors
        assert!(parse_feed("<feed><entry><id>x</id></feed>").is_err());
    }

    #[test]
    fn link_without_rel_counts_as_alternate() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
  <id>http://arxiv.org/abs/2403.00001v1</id>
  <link href="http://arxiv.org/abs/2403.00001v1"/>
</entry></feed>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(
            feed.entries[0].link.as_deref(),
            Some("http://arxiv.org/abs/2403.00001v1")
        );
    }
}
