//! HTTP adapters 共通の client 構築

use std::time::Duration;

use crate::domain::ConfigError;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::Zero("http timeout"));
    }
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("pacer/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Validate `base` as an absolute http(s) url and strip any trailing slash.
pub(crate) fn normalize_base_url(base: &str) -> Result<String, ConfigError> {
    let parsed = reqwest::Url::parse(base).map_err(|e| ConfigError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: base.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(base.trim_end_matches('/').to_string())
}

/// First `max` characters of a response body, for error messages.
pub(crate) fn snippet(body: &str, max: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_urls_lose_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://connect.example.com/").unwrap(),
            "https://connect.example.com"
        );
        assert!(normalize_base_url("ftp://example.com").is_err());
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn snippets_are_truncated_on_char_boundaries() {
        assert_eq!(snippet("  short  ", 10), "short");
        assert_eq!(snippet("ééééé", 2), "éé...");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert_eq!(
            build_client(Duration::ZERO).unwrap_err(),
            ConfigError::Zero("http timeout")
        );
    }
}
