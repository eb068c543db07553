use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Reasons a configured feed source is refused.
///
/// Sources come from the config file, the command line and OPML imports; the
/// checks keep the ingester from being pointed at internal services.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a feed source URL.
///
/// Rejects non-HTTP(S) schemes, localhost, and private/link-local address
/// ranges (SSRF protection). Hostnames are not resolved.
///
/// # Examples
///
/// ```
/// use newscat::util::validate_url;
///
/// let url = validate_url("https://feeds.example.com/world.xml").unwrap();
/// assert_eq!(url.host_str(), Some("feeds.example.com"));
///
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://192.168.1.1/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if let Some(host) = url.host_str() {
        if host.eq_ignore_ascii_case("localhost") {
            return Err(UrlValidationError::Localhost);
        }

        let bare = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = bare.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

/// Filters a list of source URLs down to the valid ones, preserving order.
///
/// Invalid entries are logged and dropped; exact repeats are dropped too so a
/// source listed both in the config file and an OPML import is fetched once.
pub fn validate_sources<I, S>(sources: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut accepted: Vec<String> = Vec::new();
    for source in sources {
        let source = source.as_ref();
        match validate_url(source) {
            Ok(url) => {
                let url = url.to_string();
                if !accepted.contains(&url) {
                    accepted.push(url);
                }
            }
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Skipping invalid feed source");
            }
        }
    }
    accepted
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() || v6.is_unspecified() {
                return true;
            }
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_feed_urls_accepted() {
        assert!(validate_url("https://rss.example.com/topstories.rss").is_ok());
        assert!(validate_url("http://news.example.org:8080/feed").is_ok());
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_url("ftp://example.com/feed").is_err());
    }

    #[test]
    fn test_loopback_rejected() {
        assert!(matches!(
            validate_url("http://LOCALHOST/feed"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(validate_url("http://127.0.0.1/feed").is_err());
        assert!(validate_url("http://[::1]/feed").is_err());
    }

    #[test]
    fn test_private_ranges_rejected() {
        for url in [
            "http://10.0.0.1/feed",
            "http://172.16.0.1/feed",
            "http://192.168.1.1:8080/feed",
            "http://169.254.1.1/feed",
            "http://0.0.0.0/feed",
            "http://[fe80::1]/feed",
            "http://[fd00::1]/feed",
        ] {
            assert!(validate_url(url).is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_validate_sources_filters_and_dedups() {
        let sources = validate_sources([
            "https://a.example.com/rss",
            "not a url",
            "http://localhost/rss",
            "https://a.example.com/rss",
            "https://b.example.com/rss",
        ]);
        assert_eq!(
            sources,
            vec![
                "https://a.example.com/rss".to_string(),
                "https://b.example.com/rss".to_string()
            ]
        );
    }
}
