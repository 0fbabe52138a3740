use url::Url;

/// Extracts the bare domain from a URL
///
/// The host is lowercased and a leading `www.` label is dropped, so
/// `https://WWW.Example.cz/kontakt` and `http://example.cz` both key to
/// `example.cz`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use leadscope::url::extract_domain;
///
/// let url = Url::parse("https://www.example.cz/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.cz".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let host = h.to_lowercase();
        match host.strip_prefix("www.") {
            Some(bare) if !bare.is_empty() => bare.to_string(),
            _ => host,
        }
    })
}

/// Extracts the bare domain from a URL string, returning None when it does not parse
pub fn domain_of(url_str: &str) -> Option<String> {
    Url::parse(url_str).ok().as_ref().and_then(extract_domain)
}
