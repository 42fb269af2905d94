//! Job configuration: per-crawl options, issue thresholds, and fixed limits.

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Fixed operational limits - single source of truth
pub struct Limits;

impl Limits {
    // HTTP/Network
    pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024; // 10MB
    pub const MAX_REDIRECT_HOPS: usize = 10;
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const POOL_IDLE_PER_HOST: usize = 16;
    pub const POOL_IDLE_TIMEOUT_SECS: u64 = 30;
    pub const ROBOTS_TIMEOUT_SECS: u64 = 10;

    // Reporting
    pub const MAX_SAMPLE_URLS: usize = 5;
    pub const PROGRESS_POLL_MS: u64 = 500;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid target URL '{url}': {reason}")]
    InvalidTargetUrl { url: String, reason: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Character-count and length thresholds used by issue classification.
/// Kept out of the analyzer so report tuning never touches extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueThresholds {
    pub title_min_chars: usize,
    pub title_max_chars: usize,
    pub meta_description_min_chars: usize,
    pub meta_description_max_chars: usize,
    pub thin_content_words: usize,
    pub max_redirect_hops: usize,
}

impl Default for IssueThresholds {
    fn default() -> Self {
        Self {
            title_min_chars: 30,
            title_max_chars: 60,
            meta_description_min_chars: 50,
            meta_description_max_chars: 160,
            thin_content_words: 250,
            max_redirect_hops: 2,
        }
    }
}

/// Per-job configuration snapshot. Serialized onto the job row so a stored
/// audit always records the options it ran with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub max_pages: usize,
    pub max_depth: u32,
    pub crawl_delay_ms: u64,
    pub respect_robots_txt: bool,
    pub follow_external_links: bool,
    pub follow_subdomains: bool,
    pub include_images: bool,
    pub include_css: bool,
    pub include_js: bool,
    pub check_canonical: bool,
    pub check_hreflang: bool,
    pub extract_structured_data: bool,
    pub check_accessibility: bool,
    pub workers: usize,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    /// Operator-supplied robots.txt content; bypasses the network fetch.
    pub robots_override: Option<String>,
    /// Explicit URLs to audit instead of link-discovery crawling.
    pub url_list: Option<Vec<String>>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub thresholds: IssueThresholds,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 500,
            max_depth: 10,
            crawl_delay_ms: 200,
            respect_robots_txt: true,
            follow_external_links: false,
            follow_subdomains: false,
            include_images: true,
            include_css: false,
            include_js: false,
            check_canonical: true,
            check_hreflang: true,
            extract_structured_data: true,
            check_accessibility: false,
            workers: 4,
            timeout_secs: 30,
            user_agent: None,
            robots_override: None,
            url_list: None,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            thresholds: IssueThresholds::default(),
        }
    }
}

impl CrawlConfig {
    pub const DEFAULT_USER_AGENT: &'static str = "SiteAuditBot/1.0";

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(Self::DEFAULT_USER_AGENT)
    }

    /// Rejects bad configuration synchronously, before any network activity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_pages",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        compile_patterns(&self.include_patterns)?;
        compile_patterns(&self.exclude_patterns)?;
        if let Some(urls) = &self.url_list {
            if urls.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "url_list",
                    reason: "must contain at least one URL".to_string(),
                });
            }
            for url in urls {
                validate_target_url(url)?;
            }
        }
        Ok(())
    }
}

/// The target must parse as an absolute http(s) URL with a host.
pub fn validate_target_url(url: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidTargetUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidTargetUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidTargetUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(())
}

/// Compile user-supplied URL patterns, surfacing the first bad one.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::InvalidPattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let cfg = CrawlConfig::default();
        assert_eq!(cfg.max_pages, 500);
        assert_eq!(cfg.max_depth, 10);
        assert_eq!(cfg.crawl_delay_ms, 200);
        assert!(cfg.respect_robots_txt);
        assert!(!cfg.follow_external_links);
        assert!(!cfg.follow_subdomains);
        assert!(cfg.include_images);
        assert!(!cfg.include_css);
        assert!(!cfg.include_js);
        assert!(cfg.check_canonical);
        assert!(cfg.check_hreflang);
        assert!(cfg.extract_structured_data);
        assert!(!cfg.check_accessibility);
        assert_eq!(cfg.user_agent(), "SiteAuditBot/1.0");
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut cfg = CrawlConfig::default();
        cfg.max_pages = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CrawlConfig::default();
        cfg.workers = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_patterns() {
        let mut cfg = CrawlConfig::default();
        cfg.exclude_patterns = vec!["([unclosed".to_string()];
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_validate_checks_url_list_entries() {
        let mut cfg = CrawlConfig::default();
        cfg.url_list = Some(vec!["https://ok.example/a".to_string(), "nope".to_string()]);
        assert!(cfg.validate().is_err());

        cfg.url_list = Some(vec![]);
        assert!(cfg.validate().is_err());

        cfg.url_list = Some(vec!["https://ok.example/a".to_string()]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_target_url() {
        assert!(validate_target_url("https://example.com").is_ok());
        assert!(validate_target_url("http://example.com/path?q=1").is_ok());
        assert!(validate_target_url("ftp://example.com").is_err());
        assert!(validate_target_url("example.com").is_err());
        assert!(validate_target_url("").is_err());
    }

    #[test]
    fn test_config_snapshot_round_trips() {
        let cfg = CrawlConfig {
            include_patterns: vec!["^/blog/".to_string()],
            user_agent: Some("CustomBot/2.0".to_string()),
            ..CrawlConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: CrawlConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.include_patterns, vec!["^/blog/".to_string()]);
        assert_eq!(back.user_agent.as_deref(), Some("CustomBot/2.0"));
        assert_eq!(back.thresholds, cfg.thresholds);
    }
}
