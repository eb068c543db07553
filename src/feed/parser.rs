use anyhow::Result;
use feed_rs::parser;

use crate::util::strip_control_chars;

/// One item as it came out of a feed, before any normalization.
///
/// Every field may be missing; the pipeline decides what is storable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    /// Identity key of the entry
    pub link: Option<String>,
    /// Raw summary, may carry HTML
    pub summary: Option<String>,
    /// Raw date string
    pub published: Option<String>,
}

/// Parse RSS 0.9x/1.0/2.0, Atom or JSON Feed bytes into raw entries, in
/// feed order.
///
/// feed-rs parses dates itself, so `published` carries the RFC 2822
/// rendering of the published (or, failing that, updated) timestamp.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawEntry>> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty());
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            let title = entry
                .title
                .map(|t| strip_control_chars(t.content.trim()).into_owned());
            let published = entry.published.or(entry.updated).map(|dt| dt.to_rfc2822());

            RawEntry {
                title,
                link,
                summary,
                published,
            }
        })
        .collect();

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rss_item_fields() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>News</title>
  <item>
    <title>Storm hits coast</title>
    <link>https://news.example.com/storm</link>
    <description><![CDATA[<p>Storm</p>]]></description>
    <pubDate>Wed, 10 Jan 2024 10:00:00 +0000</pubDate>
  </item>
</channel></rss>"#;

        let entries = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(
            entries,
            vec![RawEntry {
                title: Some("Storm hits coast".to_string()),
                link: Some("https://news.example.com/storm".to_string()),
                summary: Some("<p>Storm</p>".to_string()),
                published: Some("Wed, 10 Jan 2024 10:00:00 +0000".to_string()),
            }]
        );
    }

    #[test]
    fn test_missing_fields_are_none() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>News</title>
  <item><guid>only-a-guid</guid></item>
</channel></rss>"#;

        let entries = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, None);
        assert_eq!(entries[0].link, None);
        assert_eq!(entries[0].summary, None);
        assert_eq!(entries[0].published, None);
    }

    #[test]
    fn test_atom_content_fallback_and_updated_date() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom News</title>
  <id>urn:feed</id>
  <updated>2024-03-15T08:30:00Z</updated>
  <entry>
    <title>Markets rally</title>
    <id>urn:entry:1</id>
    <link href="https://news.example.com/markets"/>
    <updated>2024-03-15T08:30:00Z</updated>
    <content type="html">&lt;b&gt;Stocks&lt;/b&gt; up</content>
  </entry>
</feed>"#;

        let entries = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.title.as_deref(), Some("Markets rally"));
        assert_eq!(entry.link.as_deref(), Some("https://news.example.com/markets"));
        assert_eq!(entry.summary.as_deref(), Some("<b>Stocks</b> up"));
        assert_eq!(
            entry.published.as_deref(),
            Some("Fri, 15 Mar 2024 08:30:00 +0000")
        );
    }

    #[test]
    fn test_entries_keep_feed_order() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>News</title>
  <item><title>First</title><link>https://e.com/1</link></item>
  <item><title>Second</title><link>https://e.com/2</link></item>
  <item><title>Third</title><link>https://e.com/3</link></item>
</channel></rss>"#;

        let titles: Vec<String> = parse_feed(rss.as_bytes())
            .unwrap()
            .into_iter()
            .filter_map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_invalid_xml_is_error() {
        assert!(parse_feed(b"<not valid xml").is_err());
    }
}
