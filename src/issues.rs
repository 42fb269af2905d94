//! Issue classification: turns extracted facts into typed, severity-tagged
//! findings using the job's thresholds.
//!
//! Broken-link detection is not here: it needs the whole job's results (a
//! deferred cross-reference of link targets against fetch outcomes) and is
//! computed as a reporting view in `reports`, keeping stored results
//! append-only.

use crate::config::CrawlConfig;
use crate::models::{Indexability, Issue, IssueSeverity, IssueType, SeoFacts, StructuredData};
use crate::url_utils;

/// Classify one page's findings. Pages that never produced a response get a
/// single fetch-failure issue; everything else is judged on its facts.
#[allow(clippy::too_many_arguments)]
pub fn classify(
    page_url: &str,
    status: u16,
    fetch_error: Option<&str>,
    is_html: bool,
    redirect_hops: usize,
    facts: &SeoFacts,
    indexability: &Indexability,
    config: &CrawlConfig,
) -> Vec<Issue> {
    let mut issues = Vec::new();
    let thresholds = &config.thresholds;

    if let Some(error) = fetch_error {
        issues.push(Issue::new(
            IssueType::FetchFailed,
            IssueSeverity::Error,
            format!("fetch failed: {}", error),
        ));
        return issues;
    }

    if redirect_hops > thresholds.max_redirect_hops {
        issues.push(Issue::new(
            IssueType::RedirectChainTooLong,
            IssueSeverity::Warning,
            format!(
                "redirect chain has {} hops (threshold {})",
                redirect_hops, thresholds.max_redirect_hops
            ),
        ));
    }

    if (400..=599).contains(&status) {
        issues.push(Issue::new(
            IssueType::HttpError,
            IssueSeverity::Error,
            format!("HTTP {}", status),
        ));
        return issues;
    }

    if !is_html || !(200..=299).contains(&status) {
        return issues;
    }

    match &facts.title {
        None => issues.push(Issue::new(
            IssueType::MissingTitle,
            IssueSeverity::Error,
            "page has no <title>",
        )),
        Some(_) => {
            if facts.title_length < thresholds.title_min_chars {
                issues.push(Issue::new(
                    IssueType::TitleTooShort,
                    IssueSeverity::Warning,
                    format!(
                        "title is {} characters (minimum {})",
                        facts.title_length, thresholds.title_min_chars
                    ),
                ));
            } else if facts.title_length > thresholds.title_max_chars {
                issues.push(Issue::new(
                    IssueType::TitleTooLong,
                    IssueSeverity::Warning,
                    format!(
                        "title is {} characters (maximum {})",
                        facts.title_length, thresholds.title_max_chars
                    ),
                ));
            }
        }
    }

    match &facts.meta_description {
        None => issues.push(Issue::new(
            IssueType::MissingMetaDescription,
            IssueSeverity::Warning,
            "page has no meta description",
        )),
        Some(_) => {
            if facts.meta_description_length < thresholds.meta_description_min_chars {
                issues.push(Issue::new(
                    IssueType::MetaDescriptionTooShort,
                    IssueSeverity::Info,
                    format!(
                        "meta description is {} characters (minimum {})",
                        facts.meta_description_length, thresholds.meta_description_min_chars
                    ),
                ));
            } else if facts.meta_description_length > thresholds.meta_description_max_chars {
                issues.push(Issue::new(
                    IssueType::MetaDescriptionTooLong,
                    IssueSeverity::Info,
                    format!(
                        "meta description is {} characters (maximum {})",
                        facts.meta_description_length, thresholds.meta_description_max_chars
                    ),
                ));
            }
        }
    }

    if facts.h1_count == 0 {
        issues.push(Issue::new(
            IssueType::MissingH1,
            IssueSeverity::Warning,
            "page has no <h1>",
        ));
    } else if facts.h1_count > 1 {
        issues.push(Issue::new(
            IssueType::MultipleH1,
            IssueSeverity::Warning,
            format!("page has {} <h1> headings", facts.h1_count),
        ));
    }

    if facts.images_missing_alt > 0 {
        issues.push(Issue::new(
            IssueType::MissingImageAlt,
            IssueSeverity::Warning,
            format!(
                "{} of {} images missing alt text",
                facts.images_missing_alt, facts.images
            ),
        ));
        if config.check_accessibility {
            for image in facts.image_alts.iter().filter(|i| i.alt.is_none()) {
                issues.push(Issue::new(
                    IssueType::MissingImageAlt,
                    IssueSeverity::Warning,
                    format!("image {} has no alt text", image.src),
                ));
            }
        }
    }

    if facts.word_count < thresholds.thin_content_words {
        issues.push(Issue::new(
            IssueType::ThinContent,
            IssueSeverity::Warning,
            format!(
                "page has {} words (threshold {})",
                facts.word_count, thresholds.thin_content_words
            ),
        ));
    }

    if config.check_canonical {
        match (&facts.canonical, facts.canonical_is_self) {
            (None, _) => issues.push(Issue::new(
                IssueType::MissingCanonical,
                IssueSeverity::Info,
                "page has no canonical link",
            )),
            (Some(canonical), Some(false)) => issues.push(Issue::new(
                IssueType::CanonicalMismatch,
                IssueSeverity::Warning,
                format!("canonical points to {}", canonical),
            )),
            _ => {}
        }
    }

    // hreflang sets must reference the page itself
    if config.check_hreflang && !facts.hreflang.is_empty() {
        let has_self = facts
            .hreflang
            .values()
            .any(|href| url_utils::urls_equivalent(href, page_url));
        if !has_self {
            issues.push(Issue::new(
                IssueType::MissingHreflang,
                IssueSeverity::Info,
                "hreflang set has no self-referencing entry",
            ));
        }
    }

    let invalid_blocks: Vec<&str> = facts
        .structured_data
        .iter()
        .filter_map(|d| match d {
            StructuredData::Invalid { error, .. } => Some(error.as_str()),
            _ => None,
        })
        .collect();
    if !invalid_blocks.is_empty() {
        issues.push(Issue::new(
            IssueType::InvalidStructuredData,
            IssueSeverity::Warning,
            format!(
                "{} malformed JSON-LD block(s): {}",
                invalid_blocks.len(),
                invalid_blocks[0]
            ),
        ));
    }

    if facts.open_graph.is_empty() {
        issues.push(Issue::new(
            IssueType::MissingOgTags,
            IssueSeverity::Info,
            "page has no Open Graph tags",
        ));
    }

    if !indexability.indexable {
        issues.push(Issue::new(
            IssueType::NotIndexable,
            IssueSeverity::Info,
            format!("not indexable: {}", indexability.reason),
        ));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageAlt;

    fn config() -> CrawlConfig {
        CrawlConfig::default()
    }

    fn healthy_facts() -> SeoFacts {
        SeoFacts {
            title: Some("A title comfortably inside the limits".to_string()),
            title_length: 37,
            meta_description: Some(
                "A meta description that is long enough to pass the default minimum easily."
                    .to_string(),
            ),
            meta_description_length: 75,
            h1: Some("Heading".to_string()),
            h1_count: 1,
            word_count: 400,
            open_graph: crate::models::OpenGraphFacts {
                title: Some("og".to_string()),
                ..Default::default()
            },
            canonical: Some("https://example.com/page".to_string()),
            canonical_is_self: Some(true),
            ..SeoFacts::default()
        }
    }

    fn classify_facts(facts: &SeoFacts, config: &CrawlConfig) -> Vec<Issue> {
        classify(
            "https://example.com/page",
            200,
            None,
            true,
            0,
            facts,
            &Indexability::indexable(),
            config,
        )
    }

    fn has_issue(issues: &[Issue], t: IssueType) -> bool {
        issues.iter().any(|i| i.issue_type == t)
    }

    #[test]
    fn test_healthy_page_is_clean() {
        let issues = classify_facts(&healthy_facts(), &config());
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_fetch_failure_short_circuits() {
        let issues = classify(
            "https://example.com/page",
            0,
            Some("DNS resolution failed"),
            false,
            0,
            &SeoFacts::default(),
            &Indexability::blocked("fetch failed"),
            &config(),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::FetchFailed);
        assert_eq!(issues[0].severity, IssueSeverity::Error);
        assert!(issues[0].message.contains("DNS"));
    }

    #[test]
    fn test_http_error_skips_fact_checks() {
        let issues = classify(
            "https://example.com/missing",
            404,
            None,
            true,
            0,
            &SeoFacts::default(),
            &Indexability::blocked("error status 404"),
            &config(),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::HttpError);
        assert!(issues[0].message.contains("404"));
    }

    #[test]
    fn test_title_thresholds() {
        let mut facts = healthy_facts();
        facts.title = None;
        facts.title_length = 0;
        assert!(has_issue(&classify_facts(&facts, &config()), IssueType::MissingTitle));

        let mut facts = healthy_facts();
        facts.title = Some("Short".to_string());
        facts.title_length = 5;
        assert!(has_issue(&classify_facts(&facts, &config()), IssueType::TitleTooShort));

        let mut facts = healthy_facts();
        facts.title_length = 90;
        assert!(has_issue(&classify_facts(&facts, &config()), IssueType::TitleTooLong));
    }

    #[test]
    fn test_custom_thresholds_respected() {
        let mut cfg = config();
        cfg.thresholds.title_min_chars = 3;
        let mut facts = healthy_facts();
        facts.title = Some("Okay!".to_string());
        facts.title_length = 5;
        assert!(!has_issue(&classify_facts(&facts, &cfg), IssueType::TitleTooShort));
    }

    #[test]
    fn test_meta_description_rules() {
        let mut facts = healthy_facts();
        facts.meta_description = None;
        facts.meta_description_length = 0;
        let issues = classify_facts(&facts, &config());
        assert!(has_issue(&issues, IssueType::MissingMetaDescription));

        let mut facts = healthy_facts();
        facts.meta_description_length = 10;
        assert!(has_issue(
            &classify_facts(&facts, &config()),
            IssueType::MetaDescriptionTooShort
        ));

        let mut facts = healthy_facts();
        facts.meta_description_length = 300;
        assert!(has_issue(
            &classify_facts(&facts, &config()),
            IssueType::MetaDescriptionTooLong
        ));
    }

    #[test]
    fn test_heading_rules() {
        let mut facts = healthy_facts();
        facts.h1_count = 0;
        assert!(has_issue(&classify_facts(&facts, &config()), IssueType::MissingH1));

        facts.h1_count = 3;
        assert!(has_issue(&classify_facts(&facts, &config()), IssueType::MultipleH1));
    }

    #[test]
    fn test_image_alt_aggregate_and_per_image() {
        let mut facts = healthy_facts();
        facts.images = 4;
        facts.images_missing_alt = 2;
        facts.image_alts = vec![
            ImageAlt {
                src: "/a.png".to_string(),
                alt: None,
            },
            ImageAlt {
                src: "/b.png".to_string(),
                alt: Some("fine".to_string()),
            },
            ImageAlt {
                src: "/c.png".to_string(),
                alt: None,
            },
        ];

        let issues = classify_facts(&facts, &config());
        let alt_issues: Vec<_> = issues
            .iter()
            .filter(|i| i.issue_type == IssueType::MissingImageAlt)
            .collect();
        assert_eq!(alt_issues.len(), 1);
        assert!(alt_issues[0].message.contains("2 of 4"));

        let mut cfg = config();
        cfg.check_accessibility = true;
        let issues = classify_facts(&facts, &cfg);
        let alt_issues: Vec<_> = issues
            .iter()
            .filter(|i| i.issue_type == IssueType::MissingImageAlt)
            .collect();
        // aggregate plus one per sampled image without alt
        assert_eq!(alt_issues.len(), 3);
    }

    #[test]
    fn test_thin_content() {
        let mut facts = healthy_facts();
        facts.word_count = 12;
        let issues = classify_facts(&facts, &config());
        assert!(has_issue(&issues, IssueType::ThinContent));
    }

    #[test]
    fn test_canonical_rules() {
        let mut facts = healthy_facts();
        facts.canonical = None;
        facts.canonical_is_self = None;
        assert!(has_issue(
            &classify_facts(&facts, &config()),
            IssueType::MissingCanonical
        ));

        let mut facts = healthy_facts();
        facts.canonical = Some("https://example.com/other".to_string());
        facts.canonical_is_self = Some(false);
        assert!(has_issue(
            &classify_facts(&facts, &config()),
            IssueType::CanonicalMismatch
        ));

        let mut cfg = config();
        cfg.check_canonical = false;
        let mut facts = healthy_facts();
        facts.canonical = None;
        facts.canonical_is_self = None;
        assert!(!has_issue(
            &classify_facts(&facts, &cfg),
            IssueType::MissingCanonical
        ));
    }

    #[test]
    fn test_hreflang_self_reference() {
        let mut facts = healthy_facts();
        facts
            .hreflang
            .insert("de".to_string(), "https://example.com/de/page".to_string());
        let issues = classify_facts(&facts, &config());
        assert!(has_issue(&issues, IssueType::MissingHreflang));

        facts
            .hreflang
            .insert("en".to_string(), "https://example.com/page".to_string());
        let issues = classify_facts(&facts, &config());
        assert!(!has_issue(&issues, IssueType::MissingHreflang));
    }

    #[test]
    fn test_invalid_structured_data() {
        let mut facts = healthy_facts();
        facts.structured_data = vec![
            StructuredData::JsonLd(serde_json::json!({"@type": "X"})),
            StructuredData::Invalid {
                raw: "{oops".to_string(),
                error: "expected value".to_string(),
            },
        ];
        let issues = classify_facts(&facts, &config());
        let found = issues
            .iter()
            .find(|i| i.issue_type == IssueType::InvalidStructuredData)
            .expect("should flag invalid JSON-LD");
        assert!(found.message.contains("1 malformed"));
    }

    #[test]
    fn test_redirect_chain_warning() {
        let issues = classify(
            "https://example.com/page",
            200,
            None,
            true,
            3,
            &healthy_facts(),
            &Indexability::indexable(),
            &config(),
        );
        assert!(has_issue(&issues, IssueType::RedirectChainTooLong));

        let issues = classify(
            "https://example.com/page",
            200,
            None,
            true,
            1,
            &healthy_facts(),
            &Indexability::indexable(),
            &config(),
        );
        assert!(!has_issue(&issues, IssueType::RedirectChainTooLong));
    }

    #[test]
    fn test_noindex_flagged_as_info() {
        let issues = classify(
            "https://example.com/page",
            200,
            None,
            true,
            0,
            &healthy_facts(),
            &Indexability::blocked("robots meta noindex"),
            &config(),
        );
        let found = issues
            .iter()
            .find(|i| i.issue_type == IssueType::NotIndexable)
            .expect("should flag noindex");
        assert_eq!(found.severity, IssueSeverity::Info);
        assert!(found.message.contains("robots meta noindex"));
    }

    #[test]
    fn test_non_html_success_is_clean() {
        let issues = classify(
            "https://example.com/logo.png",
            200,
            None,
            false,
            0,
            &SeoFacts::default(),
            &Indexability::indexable(),
            &config(),
        );
        assert!(issues.is_empty());
    }
}
