//! robots.txt parsing and per-job policy resolution.
//!
//! Allow/Disallow precedence is longest-match-wins (the de facto standard):
//! among all rules whose pattern matches a path, the longest pattern decides,
//! and on a length tie Allow beats Disallow. A missing, unreachable, or
//! unparsable robots.txt fails open.

use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::config::{CrawlConfig, Limits};
use crate::network::HttpClient;
use crate::url_utils;

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    path: String,
    regex: Option<Regex>,
}

impl Rule {
    fn new(allow: bool, path: &str) -> Self {
        Self {
            allow,
            path: path.to_string(),
            regex: create_rule_regex(path),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(path),
            None => path.starts_with(&self.path),
        }
    }

    /// Pattern length stands in for specificity, wildcards included.
    fn specificity(&self) -> usize {
        self.path.len()
    }
}

fn create_rule_regex(pattern: &str) -> Option<Regex> {
    if !pattern.contains('*') && !pattern.contains('$') {
        return None;
    }

    let mut regex_pattern = regex::escape(pattern);
    regex_pattern = regex_pattern.replace("\\*", ".*");
    regex_pattern = regex_pattern.replace("\\$", "$");

    if !regex_pattern.starts_with('^') {
        regex_pattern = format!("^{}", regex_pattern);
    }

    Regex::new(&regex_pattern).ok()
}

#[derive(Debug, Clone, Default)]
struct AgentGroup {
    rules: Vec<Rule>,
    crawl_delay_ms: Option<u64>,
}

/// Parsed robots policy for one crawl's user agent.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    groups: HashMap<String, AgentGroup>,
    user_agent: String,
}

impl RobotsPolicy {
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let mut policy = Self {
            groups: HashMap::new(),
            user_agent: user_agent.to_ascii_lowercase(),
        };
        policy.parse_content(content);
        policy
    }

    /// Policy with no rules: everything allowed, no delay hint. Used when
    /// `respect_robots_txt` is off and when resolution fails open.
    pub fn allow_all(user_agent: &str) -> Self {
        Self {
            groups: HashMap::new(),
            user_agent: user_agent.to_ascii_lowercase(),
        }
    }

    fn parse_content(&mut self, content: &str) {
        let mut agents: Vec<String> = Vec::new();
        let mut group = AgentGroup::default();
        let mut group_open = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if group_open {
                        self.flush_group(&agents, group);
                        agents.clear();
                        group = AgentGroup::default();
                        group_open = false;
                    }
                    agents.push(value.to_ascii_lowercase());
                }
                "disallow" => {
                    group_open = true;
                    if !value.is_empty() {
                        group.rules.push(Rule::new(false, value));
                    }
                }
                "allow" => {
                    group_open = true;
                    if !value.is_empty() {
                        group.rules.push(Rule::new(true, value));
                    }
                }
                "crawl-delay" => {
                    group_open = true;
                    if let Some(secs) = value.split_whitespace().next() {
                        if let Ok(secs) = secs.parse::<f64>() {
                            if secs >= 0.0 {
                                group.crawl_delay_ms = Some((secs * 1000.0).ceil() as u64);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        if !agents.is_empty() {
            self.flush_group(&agents, group);
        }
    }

    fn flush_group(&mut self, agents: &[String], group: AgentGroup) {
        for agent in agents {
            self.groups.insert(agent.clone(), group.clone());
        }
    }

    /// The group for our user agent: longest agent token that prefixes the
    /// UA string, falling back to `*`.
    fn matched_group(&self) -> Option<&AgentGroup> {
        self.groups
            .iter()
            .filter(|(agent, _)| agent.as_str() != "*" && self.user_agent.starts_with(agent.as_str()))
            .max_by_key(|(agent, _)| agent.len())
            .map(|(_, group)| group)
            .or_else(|| self.groups.get("*"))
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => self.is_path_allowed(parsed.path()),
            Err(_) => true,
        }
    }

    pub fn is_path_allowed(&self, path: &str) -> bool {
        let Some(group) = self.matched_group() else {
            return true;
        };

        let mut best: Option<&Rule> = None;
        for rule in &group.rules {
            if !rule.matches(path) {
                continue;
            }
            best = match best {
                None => Some(rule),
                Some(current) => {
                    if rule.specificity() > current.specificity()
                        || (rule.specificity() == current.specificity() && rule.allow)
                    {
                        Some(rule)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        best.map(|rule| rule.allow).unwrap_or(true)
    }

    /// Crawl-delay hint for our agent group, in milliseconds.
    pub fn crawl_delay_ms(&self) -> Option<u64> {
        self.matched_group().and_then(|g| g.crawl_delay_ms)
    }
}

/// Resolve the robots policy for the host serving `target_url`.
///
/// Consulted once per job per host. An operator override skips the network;
/// with `respect_robots_txt` off no fetch happens and everything is allowed.
/// Fetch failures, non-2xx answers, and empty bodies all fail open.
pub async fn resolve_for_host(
    http: &HttpClient,
    target_url: &str,
    config: &CrawlConfig,
) -> RobotsPolicy {
    let user_agent = config.user_agent();

    if !config.respect_robots_txt {
        return RobotsPolicy::allow_all(user_agent);
    }

    if let Some(content) = &config.robots_override {
        return RobotsPolicy::parse(content, user_agent);
    }

    let Some(robots_url) = url_utils::robots_url(target_url) else {
        return RobotsPolicy::allow_all(user_agent);
    };

    let timeout = Duration::from_secs(Limits::ROBOTS_TIMEOUT_SECS);
    match http.fetch_with_timeout(&robots_url, timeout).await {
        Ok(page) if (200..300).contains(&page.status) => {
            tracing::debug!(url = %robots_url, bytes = page.body.len(), "parsed robots.txt");
            RobotsPolicy::parse(&page.body, user_agent)
        }
        Ok(page) => {
            tracing::debug!(url = %robots_url, status = page.status, "robots.txt not available, allowing all");
            RobotsPolicy::allow_all(user_agent)
        }
        Err(e) => {
            tracing::debug!(url = %robots_url, error = %e, "robots.txt fetch failed, allowing all");
            RobotsPolicy::allow_all(user_agent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_groups() {
        let content = r#"
User-agent: *
Disallow: /private/
Disallow: /admin/
Allow: /public/

User-agent: Googlebot
Disallow: /secret/
"#;

        let robots = RobotsPolicy::parse(content, "TestBot/1.0");
        assert!(!robots.is_path_allowed("/private/secret"));
        assert!(!robots.is_path_allowed("/admin/dashboard"));
        assert!(robots.is_path_allowed("/public/info"));
        assert!(robots.is_path_allowed("/other/page"));

        let google = RobotsPolicy::parse(content, "Googlebot");
        assert!(!google.is_path_allowed("/secret/data"));
        assert!(google.is_path_allowed("/private/secret"));
    }

    #[test]
    fn test_longest_match_wins() {
        let content = r#"
User-agent: *
Disallow: /shop/
Allow: /shop/catalog/
"#;

        let robots = RobotsPolicy::parse(content, "TestBot/1.0");
        assert!(!robots.is_path_allowed("/shop/cart"));
        assert!(robots.is_path_allowed("/shop/catalog/widgets"));
    }

    #[test]
    fn test_tie_goes_to_allow() {
        let content = r#"
User-agent: *
Disallow: /p
Allow: /p
"#;

        let robots = RobotsPolicy::parse(content, "TestBot/1.0");
        assert!(robots.is_path_allowed("/page"));
    }

    #[test]
    fn test_wildcards_and_anchors() {
        let content = r#"
User-agent: *
Disallow: /*.pdf$
Disallow: /temp*
Allow: /temp/public/
"#;

        let robots = RobotsPolicy::parse(content, "TestBot/1.0");
        assert!(!robots.is_path_allowed("/docs/file.pdf"));
        assert!(robots.is_path_allowed("/docs/file.pdfx"));
        assert!(!robots.is_path_allowed("/temp123"));
        assert!(!robots.is_path_allowed("/temp/old"));
        // "/temp/public/" is longer than "/temp*", so it wins
        assert!(robots.is_path_allowed("/temp/public/page"));
    }

    #[test]
    fn test_empty_disallow_allows_everything() {
        let content = r#"
User-agent: *
Disallow:
"#;

        let robots = RobotsPolicy::parse(content, "TestBot/1.0");
        assert!(robots.is_path_allowed("/anything"));
    }

    #[test]
    fn test_no_rules_allows_everything() {
        let robots = RobotsPolicy::allow_all("TestBot/1.0");
        assert!(robots.is_path_allowed("/anything"));
        assert!(robots.crawl_delay_ms().is_none());

        let garbage = RobotsPolicy::parse("<html>not robots</html>", "TestBot/1.0");
        assert!(garbage.is_path_allowed("/anything"));
    }

    #[test]
    fn test_agent_prefix_matching() {
        let content = r#"
User-agent: siteauditbot
Disallow: /only-for-us/
"#;

        let robots = RobotsPolicy::parse(content, "SiteAuditBot/1.0");
        assert!(!robots.is_path_allowed("/only-for-us/page"));

        let other = RobotsPolicy::parse(content, "OtherBot/1.0");
        assert!(other.is_path_allowed("/only-for-us/page"));
    }

    #[test]
    fn test_crawl_delay_per_group() {
        let content = r#"
User-agent: *
Crawl-delay: 2.5
Disallow: /x/

User-agent: fastbot
Crawl-delay: 0
"#;

        let robots = RobotsPolicy::parse(content, "TestBot/1.0");
        assert_eq!(robots.crawl_delay_ms(), Some(2500));

        let fast = RobotsPolicy::parse(content, "fastbot");
        assert_eq!(fast.crawl_delay_ms(), Some(0));
    }

    #[test]
    fn test_consecutive_agent_lines_share_rules() {
        let content = r#"
User-agent: abot
User-agent: bbot
Disallow: /shared/
"#;

        let a = RobotsPolicy::parse(content, "abot");
        let b = RobotsPolicy::parse(content, "bbot");
        assert!(!a.is_path_allowed("/shared/x"));
        assert!(!b.is_path_allowed("/shared/x"));
    }

    #[test]
    fn test_is_allowed_parses_url() {
        let content = "User-agent: *\nDisallow: /private/";
        let robots = RobotsPolicy::parse(content, "TestBot/1.0");
        assert!(!robots.is_allowed("https://example.com/private/secret"));
        assert!(robots.is_allowed("https://example.com/public/info"));
        assert!(robots.is_allowed("not a url"));
    }

    #[tokio::test]
    async fn test_resolve_respects_override_without_network() {
        let http = HttpClient::new("TestBot/1.0", Duration::from_secs(5))
            .expect("client should build");
        let config = CrawlConfig {
            robots_override: Some("User-agent: *\nDisallow: /blocked/".to_string()),
            ..CrawlConfig::default()
        };

        let policy = resolve_for_host(&http, "https://unreachable.invalid/", &config).await;
        assert!(!policy.is_path_allowed("/blocked/page"));
        assert!(policy.is_path_allowed("/open/page"));
    }

    #[tokio::test]
    async fn test_resolve_disabled_never_fetches() {
        let http = HttpClient::new("TestBot/1.0", Duration::from_secs(5))
            .expect("client should build");
        let config = CrawlConfig {
            respect_robots_txt: false,
            robots_override: Some("User-agent: *\nDisallow: /".to_string()),
            ..CrawlConfig::default()
        };

        // Even with an override present, a disabled check allows everything.
        let policy = resolve_for_host(&http, "https://unreachable.invalid/", &config).await;
        assert!(policy.is_path_allowed("/anything"));
    }

    #[tokio::test]
    async fn test_resolve_fails_open_on_fetch_error() {
        let http = HttpClient::new("TestBot/1.0", Duration::from_secs(2))
            .expect("client should build");
        let config = CrawlConfig::default();

        let policy = resolve_for_host(&http, "https://unreachable.invalid/", &config).await;
        assert!(policy.is_path_allowed("/anything"));
    }

    #[tokio::test]
    async fn test_resolve_from_mock_server() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /private/\nCrawl-delay: 1"),
            )
            .mount(&server)
            .await;

        let http = HttpClient::new("TestBot/1.0", Duration::from_secs(5))
            .expect("client should build");
        let config = CrawlConfig::default();

        let policy = resolve_for_host(&http, &format!("{}/home", server.uri()), &config).await;
        assert!(!policy.is_path_allowed("/private/x"));
        assert!(policy.is_path_allowed("/home"));
        assert_eq!(policy.crawl_delay_ms(), Some(1000));
    }

    #[tokio::test]
    async fn test_resolve_fails_open_on_404() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let http = HttpClient::new("TestBot/1.0", Duration::from_secs(5))
            .expect("client should build");
        let policy = resolve_for_host(&http, &server.uri(), &CrawlConfig::default()).await;
        assert!(policy.is_path_allowed("/anything"));
    }
}
