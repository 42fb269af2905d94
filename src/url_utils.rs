//! URL utilities shared by the frontier, analyzer, and runner.

use sha2::{Digest, Sha256};
use url::Url;

use crate::config::CrawlConfig;

/// Canonical form of a URL used as the visited-set / dedup key.
///
/// Lowercased scheme and host (via `url` parsing), fragment stripped, query
/// preserved, trailing slash removed from non-root paths. Returns `None` for
/// unparsable input.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut parsed = Url::parse(raw.trim()).ok()?;
    parsed.set_fragment(None);

    let path = parsed.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        parsed.set_path(&trimmed);
    }

    Some(parsed.to_string())
}

/// Stable short hash of a normalized URL, used in result storage keys.
pub fn url_hash(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_ascii_lowercase()))
}

fn fallback_root_domain(hostname: &str) -> String {
    let parts: Vec<&str> = hostname.split('.').collect();
    if parts.len() >= 2 {
        format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1])
    } else {
        hostname.to_string()
    }
}

/// Registrable domain (eTLD+1) via the Public Suffix List.
/// Handles multi-label TLDs: www.example.co.uk -> example.co.uk
pub fn get_registrable_domain(hostname: &str) -> String {
    match psl::domain(hostname.as_bytes()) {
        Some(domain) => String::from_utf8_lossy(domain.as_bytes()).to_string(),
        None => fallback_root_domain(hostname), // localhost, IPs
    }
}

/// Strict host equality, case-insensitive.
pub fn is_same_host(host: &str, other: &str) -> bool {
    host.eq_ignore_ascii_case(other)
}

/// True when both hosts share a registrable domain (subdomain policy).
pub fn is_same_site(host: &str, other: &str) -> bool {
    if is_same_host(host, other) {
        return true;
    }
    get_registrable_domain(host) == get_registrable_domain(other)
}

/// Resolve a possibly-relative href against the page it appeared on.
pub fn resolve_link(href: &str, base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    let absolute = base.join(href.trim()).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute.to_string()),
        _ => None,
    }
}

/// robots.txt location for the host serving `url`, port preserved.
pub fn robots_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str()?;
    parsed.join("/robots.txt").ok().map(|u| u.to_string())
}

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".ico", ".bmp", ".avif",
];

const STYLE_EXTENSIONS: &[&str] = &[".css"];

const SCRIPT_EXTENSIONS: &[&str] = &[".js", ".mjs"];

const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".zip", ".mp4", ".avi", ".mov", ".mp3", ".wav", ".doc", ".docx",
    ".xls", ".xlsx", ".ppt", ".pptx", ".tar", ".gz", ".tgz", ".bz2", ".7z",
    ".rar", ".exe", ".msi", ".dmg", ".iso", ".apk", ".woff", ".woff2", ".ttf",
];

fn path_ends_with_any(path: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| path.ends_with(ext))
}

/// Whether a discovered URL is worth fetching at all: HTTP(S) only, binary
/// downloads always skipped, asset types gated by the job's include flags.
pub fn should_fetch_url(url: &str, config: &CrawlConfig) -> bool {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return false,
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let path = parsed.path().to_ascii_lowercase();
    if path_ends_with_any(&path, SKIP_EXTENSIONS) {
        return false;
    }
    if !config.include_images && path_ends_with_any(&path, IMAGE_EXTENSIONS) {
        return false;
    }
    if !config.include_css && path_ends_with_any(&path, STYLE_EXTENSIONS) {
        return false;
    }
    if !config.include_js && path_ends_with_any(&path, SCRIPT_EXTENSIONS) {
        return false;
    }

    true
}

/// Add https:// for bare domains typed on the command line.
pub fn normalize_url_for_cli(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    format!("https://{}", trimmed)
}

pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.starts_with("text/html") || lower.starts_with("application/xhtml+xml")
}

/// Compare two URLs ignoring trailing slash and fragment, for
/// canonical-is-self checks.
pub fn urls_equivalent(a: &str, b: &str) -> bool {
    match (normalize_url(a), normalize_url(b)) {
        (Some(na), Some(nb)) => na == nb,
        _ => false,
    }
}
