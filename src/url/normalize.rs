use crate::UrlError;
use url::Url;

/// Turns a user-supplied scan target into an absolute URL
///
/// # Normalization Steps
///
/// 1. Trim whitespace; reject empty input
/// 2. Prefix `https://` when the input carries no `http`/`https` scheme
/// 3. Parse; reject non-HTTP(S) schemes and hostless URLs
/// 4. Drop the fragment
///
/// The host keeps its `www.` label here. Only the derived domain drops it,
/// because some sites answer on `www.` alone.
///
/// # Examples
///
/// ```
/// use leadscope::url::normalize_target;
///
/// let url = normalize_target("example-stale-biz.cz").unwrap();
/// assert_eq!(url.as_str(), "https://example-stale-biz.cz/");
/// ```
pub fn normalize_target(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else if lower.contains("://") {
        let scheme = trimmed.split("://").next().unwrap_or_default();
        return Err(UrlError::InvalidScheme(scheme.to_string()));
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&candidate).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlError::MissingDomain),
    }

    url.set_fragment(None);

    Ok(url)
}

/// Returns a copy of the URL using the given scheme (`http` or `https`)
///
/// Used by the fetcher to derive the HTTPS attempt and the plain HTTP
/// fallback from the same target. Explicit non-default ports are kept.
pub fn with_scheme(url: &Url, scheme: &str) -> Url {
    if url.scheme() == scheme {
        return url.clone();
    }

    let rest = &url.as_str()[url.scheme().len()..];
    match Url::parse(&format!("{}{}", scheme, rest)) {
        Ok(switched) => switched,
        Err(_) => url.clone(),
    }
}
