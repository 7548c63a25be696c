use thiserror::Error;
use url::Url;

/// Errors that can occur during feed URL validation.
///
/// All of these are detected locally, before any network activity.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// No scheme, e.g. `example.com/rss`.
    #[error("Invalid URL '{0}': no scheme supplied. Perhaps you meant http://{0}")]
    MissingScheme(String),
    /// Scheme present but no host, e.g. `http://` or `localhost:8080/rss`.
    #[error("Invalid URL '{0}': no host supplied")]
    MissingHost(String),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// A non-ASCII hostname could not be converted with IDNA.
    #[error("Invalid URL '{0}': hostname cannot be IDNA-encoded")]
    HostEncoding(String),
    /// Any other parse failure.
    #[error("Invalid URL '{url}': {source}")]
    Invalid {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Validates a feed source URL and converts it to its ASCII form.
///
/// Parsing follows the WHATWG URL standard, so a non-ASCII hostname comes
/// back IDNA-encoded (`пример.рф` → `xn--e1afmkfd.xn--p1ai`) and non-ASCII
/// path/query characters come back percent-encoded. The returned [`Url`] is
/// what goes on the wire.
///
/// # Errors
///
/// - [`UrlValidationError::MissingScheme`] for scheme-less input
/// - [`UrlValidationError::MissingHost`] when there is no host
/// - [`UrlValidationError::UnsupportedScheme`] for anything but http/https
/// - [`UrlValidationError::HostEncoding`] when IDNA conversion fails
///
/// # Examples
///
/// ```
/// use rss_reader::util::validate_feed_url;
///
/// let url = validate_feed_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_feed_url("example.com/feed.xml").is_err());
/// assert!(validate_feed_url("ftp://example.com/feed.xml").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => {
            UrlValidationError::MissingScheme(url_str.to_owned())
        }
        url::ParseError::EmptyHost => UrlValidationError::MissingHost(url_str.to_owned()),
        url::ParseError::IdnaError => UrlValidationError::HostEncoding(url_str.to_owned()),
        source => UrlValidationError::Invalid {
            url: url_str.to_owned(),
            source,
        },
    })?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost(url_str.to_owned()));
    }

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
        assert!(validate_feed_url("http://news.example.org").is_ok());
        assert!(validate_feed_url("http://127.0.0.1:8080/rss").is_ok());
    }

    #[test]
    fn test_missing_scheme() {
        let err = validate_feed_url("example.com/rss").unwrap_err();
        assert!(matches!(err, UrlValidationError::MissingScheme(_)));
        assert!(err.to_string().contains("Perhaps you meant http://example.com/rss"));
    }

    #[test]
    fn test_missing_host() {
        assert!(matches!(
            validate_feed_url("http://"),
            Err(UrlValidationError::MissingHost(_))
        ));
        assert!(matches!(
            validate_feed_url("localhost:8080/rss"),
            Err(UrlValidationError::MissingHost(_))
        ));
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(validate_feed_url("file:///etc/passwd").is_err());
        assert!(matches!(
            validate_feed_url("ftp://example.com/rss"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_non_ascii_host_is_idna_encoded() {
        let url = validate_feed_url("http://пример.рф/rss").unwrap();
        assert_eq!(url.host_str(), Some("xn--e1afmkfd.xn--p1ai"));
        assert!(url.as_str().is_ascii());
    }

    #[test]
    fn test_non_ascii_path_is_percent_encoded() {
        let url = validate_feed_url("https://example.com/новости").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/%D0%BD%D0%BE%D0%B2%D0%BE%D1%81%D1%82%D0%B8"
        );
    }
}
