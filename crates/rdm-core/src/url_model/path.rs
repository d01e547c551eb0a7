//! URL validation and filename extraction from the URL path.

use crate::error::TransferError;

/// Parses `url` and accepts only absolute `http`/`https` URLs with a host.
pub fn validate_url(url: &str) -> Result<url::Url, TransferError> {
    let parsed =
        url::Url::parse(url.trim()).map_err(|e| TransferError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TransferError::InvalidUrl(format!(
                "{url}: unsupported scheme {other:?}"
            )))
        }
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(TransferError::InvalidUrl(format!("{url}: missing host")));
    }
    Ok(parsed)
}

/// Last non-empty path segment, percent-decoded.
///
/// Returns `None` if the URL cannot be parsed or the path is empty/root.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?;
    let decoded = urlencoding::decode(segment)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    if decoded.is_empty() || decoded == "." || decoded == ".." {
        return None;
    }
    Some(decoded)
}
