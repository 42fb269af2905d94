//! Core data model: jobs, per-page results, extracted facts, and issues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::CrawlConfig;

/// Lifecycle of one audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One audit run over one target site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: Uuid,
    pub target_url: String,
    pub status: JobStatus,

    /// Options the run was started with, frozen for the job's lifetime.
    pub config: CrawlConfig,

    pub pages_crawled: u64,
    pub pages_discovered: u64,
    pub errors_count: u64,
    pub warnings_count: u64,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,

    /// Human-readable cause when status is `failed`.
    pub error: Option<String>,
}

impl CrawlJob {
    pub fn new(target_url: String, config: CrawlConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_url,
            status: JobStatus::Pending,
            config,
            pages_crawled: 0,
            pages_discovered: 0,
            errors_count: 0,
            warnings_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }
}

/// One hop of an HTTP redirect: the URL that answered, its status, and
/// where it pointed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectHop {
    pub from: String,
    pub status: u16,
    pub to: String,
}

/// A JSON-LD block found on a page. Malformed blocks are kept as data so a
/// broken script tag shows up in the audit instead of vanishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StructuredData {
    JsonLd(serde_json::Value),
    Invalid { raw: String, error: String },
}

/// Open Graph tags with the common fields typed and the rest preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenGraphFacts {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub url: Option<String>,
    pub site_name: Option<String>,
    pub og_type: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl OpenGraphFacts {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image.is_none()
            && self.url.is_none()
            && self.site_name.is_none()
            && self.og_type.is_none()
            && self.extra.is_empty()
    }
}

/// Twitter card tags, same layout as Open Graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwitterCardFacts {
    pub card: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl TwitterCardFacts {
    pub fn is_empty(&self) -> bool {
        self.card.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.image.is_none()
            && self.site.is_none()
            && self.extra.is_empty()
    }
}

/// An image reference and its alt text, kept for a bounded sample of images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAlt {
    pub src: String,
    pub alt: Option<String>,
}

/// SEO-relevant facts extracted from one HTML page. Link and image fields
/// hold counts, not full lists, to bound stored result size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoFacts {
    pub title: Option<String>,
    pub title_length: usize,
    pub meta_description: Option<String>,
    pub meta_description_length: usize,
    pub meta_keywords: Option<String>,

    /// Canonical href resolved to an absolute URL.
    pub canonical: Option<String>,
    /// Whether the canonical points back at the fetched URL (trailing slash
    /// and fragment ignored). `None` when no canonical tag is present.
    pub canonical_is_self: Option<bool>,

    pub h1: Option<String>,
    pub h1_count: usize,
    pub h2: Option<String>,
    pub h2_count: usize,

    pub internal_links: usize,
    pub external_links: usize,

    pub images: usize,
    pub images_missing_alt: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_alts: Vec<ImageAlt>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub hreflang: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "OpenGraphFacts::is_empty")]
    pub open_graph: OpenGraphFacts,
    #[serde(default, skip_serializing_if = "TwitterCardFacts::is_empty")]
    pub twitter_card: TwitterCardFacts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structured_data: Vec<StructuredData>,

    pub word_count: usize,
    /// Visible text length over raw HTML length, 0.0..=1.0.
    pub text_ratio: f32,
}

/// Whether a page may appear in search indexes, and which rule decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indexability {
    pub indexable: bool,
    pub reason: String,
}

impl Indexability {
    pub fn indexable() -> Self {
        Self {
            indexable: true,
            reason: "indexable".to_string(),
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            indexable: false,
            reason: reason.into(),
        }
    }
}

impl Default for Indexability {
    fn default() -> Self {
        Self::indexable()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Info => "info",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    MissingTitle,
    TitleTooShort,
    TitleTooLong,
    MissingMetaDescription,
    MetaDescriptionTooShort,
    MetaDescriptionTooLong,
    MissingH1,
    MultipleH1,
    MissingImageAlt,
    ThinContent,
    NotIndexable,
    HttpError,
    FetchFailed,
    BrokenLink,
    RedirectChainTooLong,
    MissingCanonical,
    CanonicalMismatch,
    MissingHreflang,
    InvalidStructuredData,
    MissingOgTags,
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IssueType::MissingTitle => "missing_title",
            IssueType::TitleTooShort => "title_too_short",
            IssueType::TitleTooLong => "title_too_long",
            IssueType::MissingMetaDescription => "missing_meta_description",
            IssueType::MetaDescriptionTooShort => "meta_description_too_short",
            IssueType::MetaDescriptionTooLong => "meta_description_too_long",
            IssueType::MissingH1 => "missing_h1",
            IssueType::MultipleH1 => "multiple_h1",
            IssueType::MissingImageAlt => "missing_image_alt",
            IssueType::ThinContent => "thin_content",
            IssueType::NotIndexable => "not_indexable",
            IssueType::HttpError => "http_error",
            IssueType::FetchFailed => "fetch_failed",
            IssueType::BrokenLink => "broken_link",
            IssueType::RedirectChainTooLong => "redirect_chain_too_long",
            IssueType::MissingCanonical => "missing_canonical",
            IssueType::CanonicalMismatch => "canonical_mismatch",
            IssueType::MissingHreflang => "missing_hreflang",
            IssueType::InvalidStructuredData => "invalid_structured_data",
            IssueType::MissingOgTags => "missing_og_tags",
        };
        f.write_str(s)
    }
}

/// One discrete finding on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub issue_type: IssueType,
    pub severity: IssueSeverity,
    pub message: String,
}

impl Issue {
    pub fn new(issue_type: IssueType, severity: IssueSeverity, message: impl Into<String>) -> Self {
        Self {
            issue_type,
            severity,
            message: message.into(),
        }
    }
}

/// One fetched-and-analyzed page. Append-only once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub job_id: Uuid,
    pub url: String,
    /// Canonical dedup form of `url` (see `url_utils::normalize_url`).
    pub normalized_url: String,
    /// Short stable hash of `normalized_url`, used in storage keys.
    pub url_hash: String,
    pub parent_url: Option<String>,
    pub depth: u32,

    /// HTTP status, or 0 when the fetch never produced a response.
    pub status: u16,
    /// Classified network failure when `status == 0`.
    pub fetch_error: Option<String>,
    pub content_type: Option<String>,
    pub response_time_ms: u64,
    pub content_length: usize,

    /// Digest of normalized visible text; `None` for non-HTML or failed
    /// fetches.
    pub content_hash: Option<String>,

    pub redirected_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirect_chain: Vec<RedirectHop>,

    pub facts: SeoFacts,
    pub indexability: Indexability,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,

    pub crawled_at: DateTime<Utc>,
}

impl CrawlResult {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(crate::url_utils::is_html_content_type)
            .unwrap_or(false)
    }
}
