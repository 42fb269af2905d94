//! Post-crawl analytics computed from stored results.
//!
//! Everything here is derived at read time; stored results are never
//! touched. Broken-link findings in particular come from joining each
//! error-status result back to the page that linked to it, which is why
//! they appear in reports but not on the stored rows.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::Limits;
use crate::models::{CrawlResult, IssueSeverity, IssueType, RedirectHop};

/// Two or more pages whose normalized visible text hashed identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCluster {
    pub content_hash: String,
    pub urls: Vec<String>,
}

/// One redirecting page, worst chains first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectEntry {
    /// URL as it was enqueued.
    pub requested_url: String,
    pub final_url: String,
    pub hops: usize,
    pub chain: Vec<RedirectHop>,
}

/// A link from a crawled page to a target that answered with an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokenLinkEntry {
    /// Page the link was found on.
    pub source_url: String,
    pub target_url: String,
    /// HTTP status of the target, 0 when the fetch failed outright.
    pub status: u16,
    pub fetch_error: Option<String>,
}

/// Aggregated issue counts with a few example URLs per row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSummaryRow {
    pub issue_type: IssueType,
    pub severity: IssueSeverity,
    pub count: u64,
    pub sample_urls: Vec<String>,
}

/// Per-URL differences between two runs over the same site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDiff {
    pub url: String,
    pub status: (u16, u16),
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<(Option<String>, Option<String>)>,
    pub word_count_delta: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexable: Option<(bool, bool)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobComparison {
    pub only_in_first: Vec<String>,
    pub only_in_second: Vec<String>,
    pub changed: Vec<PageDiff>,
    pub unchanged: usize,
}

/// Group successful HTML pages by content hash; clusters of one are not
/// duplicates and are dropped. Largest clusters first.
pub fn duplicate_clusters(results: &[CrawlResult]) -> Vec<DuplicateCluster> {
    let mut by_hash: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for result in results {
        if let Some(hash) = result.content_hash.as_deref() {
            by_hash.entry(hash).or_default().push(result.url.as_str());
        }
    }

    let mut clusters: Vec<DuplicateCluster> = by_hash
        .into_iter()
        .filter(|(_, urls)| urls.len() >= 2)
        .map(|(hash, mut urls)| {
            urls.sort_unstable();
            DuplicateCluster {
                content_hash: hash.to_string(),
                urls: urls.into_iter().map(String::from).collect(),
            }
        })
        .collect();
    clusters.sort_by(|a, b| {
        b.urls
            .len()
            .cmp(&a.urls.len())
            .then_with(|| a.content_hash.cmp(&b.content_hash))
    });
    clusters
}

/// Every page that redirected, longest chains first.
pub fn redirect_report(results: &[CrawlResult]) -> Vec<RedirectEntry> {
    let mut entries: Vec<RedirectEntry> = results
        .iter()
        .filter(|r| !r.redirect_chain.is_empty())
        .map(|r| RedirectEntry {
            requested_url: r
                .redirect_chain
                .first()
                .map(|hop| hop.from.clone())
                .unwrap_or_else(|| r.url.clone()),
            final_url: r.url.clone(),
            hops: r.redirect_chain.len(),
            chain: r.redirect_chain.clone(),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.hops
            .cmp(&a.hops)
            .then_with(|| a.requested_url.cmp(&b.requested_url))
    });
    entries
}

/// Join error-status results back to the pages that linked to them.
pub fn broken_links(results: &[CrawlResult]) -> Vec<BrokenLinkEntry> {
    let mut entries: Vec<BrokenLinkEntry> = results
        .iter()
        .filter(|r| r.status == 0 || r.status >= 400)
        .filter_map(|r| {
            r.parent_url.as_ref().map(|source| BrokenLinkEntry {
                source_url: source.clone(),
                target_url: r.url.clone(),
                status: r.status,
                fetch_error: r.fetch_error.clone(),
            })
        })
        .collect();
    entries.sort_by(|a, b| {
        a.source_url
            .cmp(&b.source_url)
            .then_with(|| a.target_url.cmp(&b.target_url))
    });
    entries
}

/// Tally issues across all pages, folding in broken-link findings, with up
/// to a handful of sample URLs per row. Errors sort before warnings.
pub fn issue_summary(results: &[CrawlResult]) -> Vec<IssueSummaryRow> {
    let mut rows: HashMap<(IssueType, IssueSeverity), (u64, Vec<String>)> = HashMap::new();

    let mut record = |issue_type: IssueType, severity: IssueSeverity, url: &str| {
        let (count, samples) = rows.entry((issue_type, severity)).or_default();
        *count += 1;
        if samples.len() < Limits::MAX_SAMPLE_URLS && !samples.iter().any(|s| s == url) {
            samples.push(url.to_string());
        }
    };

    for result in results {
        for issue in &result.issues {
            record(issue.issue_type, issue.severity, &result.url);
        }
    }
    for broken in broken_links(results) {
        record(
            IssueType::BrokenLink,
            IssueSeverity::Error,
            &broken.source_url,
        );
    }

    let mut summary: Vec<IssueSummaryRow> = rows
        .into_iter()
        .map(|((issue_type, severity), (count, sample_urls))| IssueSummaryRow {
            issue_type,
            severity,
            count,
            sample_urls,
        })
        .collect();
    summary.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.issue_type.cmp(&b.issue_type))
    });
    summary
}

/// Diff two runs keyed by normalized URL: which pages appeared or vanished,
/// and which changed status, title, length, or indexability.
pub fn compare(first: &[CrawlResult], second: &[CrawlResult]) -> JobComparison {
    let first_by_url: BTreeMap<&str, &CrawlResult> = first
        .iter()
        .map(|r| (r.normalized_url.as_str(), r))
        .collect();
    let second_by_url: BTreeMap<&str, &CrawlResult> = second
        .iter()
        .map(|r| (r.normalized_url.as_str(), r))
        .collect();

    let only_in_first: Vec<String> = first_by_url
        .keys()
        .filter(|url| !second_by_url.contains_key(**url))
        .map(|url| url.to_string())
        .collect();
    let only_in_second: Vec<String> = second_by_url
        .keys()
        .filter(|url| !first_by_url.contains_key(**url))
        .map(|url| url.to_string())
        .collect();

    let mut changed = Vec::new();
    let mut unchanged = 0usize;
    for (url, a) in &first_by_url {
        let Some(b) = second_by_url.get(url) else {
            continue;
        };

        let title_diff = a.facts.title != b.facts.title;
        let indexable_diff = a.indexability.indexable != b.indexability.indexable;
        let word_count_delta = b.facts.word_count as i64 - a.facts.word_count as i64;
        if a.status == b.status && !title_diff && !indexable_diff && word_count_delta == 0 {
            unchanged += 1;
            continue;
        }

        changed.push(PageDiff {
            url: url.to_string(),
            status: (a.status, b.status),
            title: title_diff.then(|| (a.facts.title.clone(), b.facts.title.clone())),
            word_count_delta,
            indexable: indexable_diff
                .then(|| (a.indexability.indexable, b.indexability.indexable)),
        });
    }

    JobComparison {
        only_in_first,
        only_in_second,
        changed,
        unchanged,
    }
}
