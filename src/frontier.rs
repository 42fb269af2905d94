//! URL frontier and visited set: breadth-first scheduling with policy gates.
//!
//! The frontier is owned by exactly one job's runner; nothing is shared
//! across jobs. Dequeue order is FIFO on purpose: shallow pages surface
//! first, so when `max_pages` cuts a crawl short the most important pages
//! are already in.

use parking_lot::Mutex;
use regex::Regex;
use std::collections::{HashSet, VecDeque};

use crate::config::{compile_patterns, ConfigError, CrawlConfig};
use crate::url_utils;

/// One not-yet-fetched URL with its discovery context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub normalized: String,
    pub parent: Option<String>,
    pub depth: u32,
}

/// Why an enqueue attempt did or did not add an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    AlreadyVisited,
    TooDeep,
    OutOfScope,
    ExcludedByPattern,
    NotFetchable,
    InvalidUrl,
    DiscoveryDisabled,
}

/// Host and pattern gates compiled once per job.
struct ScopePolicy {
    seed_host: String,
    follow_external: bool,
    follow_subdomains: bool,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ScopePolicy {
    fn allows_host(&self, host: &str) -> bool {
        if url_utils::is_same_host(host, &self.seed_host) {
            return true;
        }
        if self.follow_subdomains && url_utils::is_same_site(host, &self.seed_host) {
            return true;
        }
        self.follow_external
    }

    /// Include patterns are an allow-list (non-empty means a URL must match
    /// at least one); exclude patterns are evaluated after include.
    fn allows_url(&self, url: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(url)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(url))
    }
}

pub struct Frontier {
    queue: Mutex<VecDeque<FrontierEntry>>,
    /// Normalized URLs ever accepted; single source of truth for "seen".
    visited: Mutex<HashSet<String>>,
    policy: ScopePolicy,
    config: CrawlConfig,
    /// False for explicit URL-list jobs, which never expand links.
    discovery_enabled: bool,
}

impl Frontier {
    pub fn new(seed_url: &str, config: &CrawlConfig) -> Result<Self, ConfigError> {
        let seed_host =
            url_utils::extract_host(seed_url).ok_or_else(|| ConfigError::InvalidTargetUrl {
                url: seed_url.to_string(),
                reason: "missing host".to_string(),
            })?;

        let policy = ScopePolicy {
            seed_host,
            follow_external: config.follow_external_links,
            follow_subdomains: config.follow_subdomains,
            include: compile_patterns(&config.include_patterns)?,
            exclude: compile_patterns(&config.exclude_patterns)?,
        };

        Ok(Self {
            queue: Mutex::new(VecDeque::new()),
            visited: Mutex::new(HashSet::new()),
            policy,
            config: config.clone(),
            discovery_enabled: config.url_list.is_none(),
        })
    }

    /// Enqueue a job seed. Seeds skip scope and pattern gates (the operator
    /// asked for them explicitly) but still deduplicate.
    pub fn enqueue_seed(&self, url: &str) -> EnqueueOutcome {
        let Some(normalized) = url_utils::normalize_url(url) else {
            return EnqueueOutcome::InvalidUrl;
        };
        if !self.visited.lock().insert(normalized.clone()) {
            return EnqueueOutcome::AlreadyVisited;
        }
        self.queue.lock().push_back(FrontierEntry {
            url: url.to_string(),
            normalized,
            parent: None,
            depth: 0,
        });
        EnqueueOutcome::Enqueued
    }

    /// Enqueue a discovered link. Gate order: parse, host scope, depth,
    /// patterns, then the visited check - a URL rejected by policy never
    /// enters the visited set, so pattern tuning cannot poison dedup.
    pub fn try_enqueue(&self, url: &str, parent: &str, depth: u32) -> EnqueueOutcome {
        if !self.discovery_enabled {
            return EnqueueOutcome::DiscoveryDisabled;
        }

        let Some(normalized) = url_utils::normalize_url(url) else {
            return EnqueueOutcome::InvalidUrl;
        };
        let Some(host) = url_utils::extract_host(&normalized) else {
            return EnqueueOutcome::InvalidUrl;
        };

        if !self.policy.allows_host(&host) {
            return EnqueueOutcome::OutOfScope;
        }
        if depth > self.config.max_depth {
            return EnqueueOutcome::TooDeep;
        }
        if !self.policy.allows_url(&normalized) {
            return EnqueueOutcome::ExcludedByPattern;
        }
        if !url_utils::should_fetch_url(&normalized, &self.config) {
            return EnqueueOutcome::NotFetchable;
        }

        if !self.visited.lock().insert(normalized.clone()) {
            return EnqueueOutcome::AlreadyVisited;
        }

        self.queue.lock().push_back(FrontierEntry {
            url: url.to_string(),
            normalized,
            parent: Some(parent.to_string()),
            depth,
        });
        EnqueueOutcome::Enqueued
    }

    /// FIFO dequeue (breadth-first traversal).
    pub fn dequeue(&self) -> Option<FrontierEntry> {
        self.queue.lock().pop_front()
    }

    /// Record a URL as seen without queueing it. Used for redirect landing
    /// URLs so the final target is not fetched a second time later.
    pub fn mark_visited(&self, url: &str) -> bool {
        match url_utils::normalize_url(url) {
            Some(normalized) => self.visited.lock().insert(normalized),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Unique URLs ever accepted (seeds, queued links, redirect targets).
    pub fn discovered_count(&self) -> usize {
        self.visited.lock().len()
    }

    /// Drop all pending entries. Used when the page budget is exhausted or
    /// the job is cancelled.
    pub fn clear_pending(&self) {
        self.queue.lock().clear();
    }
}
