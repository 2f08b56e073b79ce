//! URL validation and domain folder naming.

use std::sync::LazyLock;

use regex::Regex;
use url::{Host, Url};

use crate::error::{HarvestError, Result};

/// Parse a user-supplied article URL. Only `http`/`https` URLs with a host are accepted.
pub fn parse_article_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed)
        .map_err(|e| HarvestError::validation(format!("invalid URL '{trimmed}': {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(HarvestError::validation(format!(
                "unsupported URL scheme '{other}' in '{trimmed}'"
            )));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(HarvestError::validation(format!("URL '{trimmed}' has no host")));
    }

    Ok(url)
}

/// Derive the filesystem-safe domain folder name for a URL.
///
/// `https://www.example.com/a` → `example`, `https://blog.rust-lang.org/` → `blog.rust-lang`.
/// The port is ignored. IP hosts keep the whole address.
pub fn domain_slug(url: &Url) -> String {
    static UNSAFE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9._-]").expect("valid regex"));

    let host = url.host_str().unwrap_or("").to_lowercase();
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = host.strip_prefix("www.").unwrap_or(host);

    let is_ip = matches!(url.host(), Some(Host::Ipv4(_) | Host::Ipv6(_)));
    let without_tld = match host.rfind('.') {
        Some(idx) if idx > 0 && !is_ip => &host[..idx],
        _ => host,
    };

    let slug = UNSAFE_RE.replace_all(without_tld, "_").to_string();
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slug(raw: &str) -> String {
        domain_slug(&Url::parse(raw).unwrap())
    }

    #[test]
    fn strips_www_and_tld() {
        assert_eq!(slug("https://www.example.com/some/article"), "example");
        assert_eq!(slug("https://example.com"), "example");
    }

    #[test]
    fn keeps_subdomains() {
        assert_eq!(slug("https://blog.rust-lang.org/2024/01/01/post.html"), "blog.rust-lang");
        assert_eq!(slug("https://news.bbc.co.uk/x"), "news.bbc.co");
    }

    #[test]
    fn ignores_port_and_case() {
        assert_eq!(slug("http://WWW.Example.COM:8080/a"), "example");
        assert_eq!(slug("http://localhost:3000/a"), "localhost");
    }

    #[test]
    fn is_deterministic() {
        let a = slug("https://medium.com/@someone/a-title-123");
        let b = slug("https://medium.com/@someone/a-title-123");
        assert_eq!(a, b);
        assert_eq!(a, "medium");
    }

    #[test]
    fn ipv4_host_keeps_every_octet() {
        assert_eq!(slug("http://127.0.0.1:4000/post"), "127.0.0.1");
    }

    #[test]
    fn ipv6_host_is_filesystem_safe() {
        let s = slug("http://[::1]:8080/");
        assert!(!s.contains(':'));
        assert!(!s.contains('['));
    }

    #[test]
    fn parse_accepts_http_and_https() {
        assert!(parse_article_url("https://example.com/post").is_ok());
        assert!(parse_article_url("  http://example.com/post  ").is_ok());
    }

    #[test]
    fn parse_rejects_other_schemes_and_garbage() {
        assert!(parse_article_url("ftp://example.com/file").is_err());
        assert!(parse_article_url("file:///etc/passwd").is_err());
        assert!(parse_article_url("not a url").is_err());
        assert!(parse_article_url("").is_err());
    }
}
