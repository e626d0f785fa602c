use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

fn tracking_param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[?&](?:utm_source|utm_medium|utm_campaign|ref|source)=[^&]*")
            .expect("static regex")
    })
}

/// Canonical form used for deduplication.
///
/// Lowercases, trims, drops trailing slashes and the common tracking parameters.
/// Two URLs that differ only in those respects normalize identically.
pub fn normalize_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let had_query = lowered.contains('?');
    let mut normalized = tracking_param_re()
        .replace_all(lowered.trim_end_matches('/'), "")
        .into_owned();

    // Removing the first parameter can orphan the ones after it.
    if had_query && !normalized.contains('?') {
        if let Some(idx) = normalized.find('&') {
            normalized.replace_range(idx..idx + 1, "?");
        }
    }

    let normalized = normalized.replace("?&", "?");
    normalized
        .trim_end_matches('?')
        .trim_end_matches('/')
        .to_string()
}

/// SHA-256 of the normalized URL as 64 lowercase hex characters.
pub fn fingerprint(url: &str) -> String {
    let digest = Sha256::digest(normalize_url(url).as_bytes());
    hex::encode(digest)
}

/// Accepts only absolute http(s) URLs with a host.
pub fn validate_url(raw: &str) -> Option<Url> {
    let parsed = Url::parse(raw.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_64_hex_chars() {
        let hash = fingerprint("https://example.com/story");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn trailing_slash_case_and_tracking_params_collide() {
        let base = fingerprint("https://X.com/a");
        assert_eq!(fingerprint("https://x.com/a/?utm_source=y"), base);
        assert_eq!(fingerprint("  https://x.com/a/  "), base);
        assert_eq!(
            fingerprint("https://x.com/a?utm_source=feed&utm_medium=rss&utm_campaign=launch"),
            base
        );
        assert_eq!(fingerprint("https://x.com/a?ref=homepage"), base);
    }

    #[test]
    fn meaningful_query_params_survive() {
        assert_eq!(
            normalize_url("https://x.com/a?id=7&utm_source=y"),
            "https://x.com/a?id=7"
        );
        assert_eq!(
            normalize_url("https://x.com/a?utm_source=y&id=7"),
            "https://x.com/a?id=7"
        );
        assert_ne!(fingerprint("https://x.com/a?id=7"), fingerprint("https://x.com/a?id=8"));
    }

    #[test]
    fn resource_param_is_not_mistaken_for_source() {
        assert_eq!(
            normalize_url("https://x.com/a?resource=1"),
            "https://x.com/a?resource=1"
        );
    }

    #[test]
    fn validate_url_rejects_non_http() {
        assert!(validate_url("https://example.com/x").is_some());
        assert!(validate_url("http://example.com").is_some());
        assert!(validate_url("ftp://example.com/file").is_none());
        assert!(validate_url("not a url").is_none());
        assert!(validate_url("").is_none());
        assert!(validate_url("/relative/path").is_none());
    }
}
