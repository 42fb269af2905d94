//! Per-page SEO analysis: fetched HTML in, structured facts out.
//!
//! Extraction never fails: malformed HTML degrades to partial facts and
//! malformed JSON-LD becomes `StructuredData::Invalid`. Issue classification
//! happens downstream in `issues`, against configured thresholds, so this
//! module only reports what is on the page.

use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use crate::config::CrawlConfig;
use crate::models::{
    ImageAlt, Indexability, OpenGraphFacts, SeoFacts, StructuredData, TwitterCardFacts,
};
use crate::url_utils;

/// Images kept in the per-page alt sample.
const MAX_IMAGE_SAMPLE: usize = 20;

/// Raw JSON-LD preserved on parse failure, clipped to keep results compact.
const MAX_INVALID_JSON_LD_BYTES: usize = 512;

/// Robots directives read from `<meta name="robots">`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RobotsMeta {
    pub noindex: bool,
    pub nofollow: bool,
}

/// Everything the analyzer learned from one HTML page.
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    pub facts: SeoFacts,
    /// Digest of whitespace-normalized visible text (see [`content_hash`]).
    pub content_hash: String,
    /// Absolute outbound link targets, deduplicated in document order, for
    /// frontier expansion. Counts in `facts` are per anchor, not deduped.
    pub links: Vec<String>,
    pub robots_meta: RobotsMeta,
}

pub fn analyze(html: &str, page_url: &str, config: &CrawlConfig) -> PageAnalysis {
    let document = Html::parse_document(html);

    let mut facts = SeoFacts::default();

    facts.title = extract_title(&document);
    facts.title_length = facts.title.as_deref().map(|t| t.chars().count()).unwrap_or(0);

    facts.meta_description = extract_meta_content(&document, "name", "description");
    facts.meta_description_length = facts
        .meta_description
        .as_deref()
        .map(|d| d.chars().count())
        .unwrap_or(0);
    facts.meta_keywords = extract_meta_content(&document, "name", "keywords");

    if config.check_canonical {
        facts.canonical = extract_canonical(&document, page_url);
        facts.canonical_is_self = facts
            .canonical
            .as_deref()
            .map(|canonical| url_utils::urls_equivalent(canonical, page_url));
    }

    let (h1, h1_count) = extract_heading(&document, "h1");
    let (h2, h2_count) = extract_heading(&document, "h2");
    facts.h1 = h1;
    facts.h1_count = h1_count;
    facts.h2 = h2;
    facts.h2_count = h2_count;

    let page_host = url_utils::extract_host(page_url).unwrap_or_default();
    let (links, internal, external) = extract_links(&document, page_url, &page_host, config);
    facts.internal_links = internal;
    facts.external_links = external;

    let (image_count, missing_alt, sample) = extract_images(&document, config.include_images);
    facts.images = image_count;
    facts.images_missing_alt = missing_alt;
    facts.image_alts = sample;

    if config.check_hreflang {
        facts.hreflang = extract_hreflang(&document, page_url);
    }

    facts.open_graph = extract_opengraph(&document);
    facts.twitter_card = extract_twitter(&document);

    if config.extract_structured_data {
        facts.structured_data = extract_json_ld(&document);
    }

    let text = visible_text(&document);
    let normalized = normalize_whitespace(&text);
    facts.word_count = normalized.split_whitespace().count();
    facts.text_ratio = if html.is_empty() {
        0.0
    } else {
        text.len() as f32 / html.len() as f32
    };

    PageAnalysis {
        content_hash: content_hash(&text),
        robots_meta: extract_robots_meta(&document),
        facts,
        links,
    }
}

/// Duplicate-detection digest: SHA-256 over whitespace-normalized visible
/// text. Whitespace-insensitive on purpose, so reformatting or minification
/// alone never splits a duplicate cluster. Byte-level differences remain
/// visible through `content_length`.
pub fn content_hash(visible_text: &str) -> String {
    let normalized = normalize_whitespace(visible_text);
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{:x}", digest)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The page's indexability verdict and the rule that decided it.
/// Precedence: noindex signals, then robots.txt, then HTTP status.
pub fn indexability_verdict(
    status: u16,
    robots_meta: &RobotsMeta,
    x_robots_tag: Option<&str>,
    robots_txt_allowed: bool,
) -> Indexability {
    if robots_meta.noindex {
        return Indexability::blocked("robots meta noindex");
    }
    if let Some(tag) = x_robots_tag {
        let lower = tag.to_ascii_lowercase();
        if lower.contains("noindex") || lower.contains("none") {
            return Indexability::blocked("x-robots-tag noindex");
        }
    }
    if !robots_txt_allowed {
        return Indexability::blocked("disallowed by robots.txt");
    }
    if !(200..=299).contains(&status) {
        return Indexability::blocked(format!("error status {}", status));
    }
    Indexability::indexable()
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").unwrap();
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_meta_content(document: &Html, attr_name: &str, attr_value: &str) -> Option<String> {
    let selector_str = format!("meta[{}='{}']", attr_name, attr_value);
    let selector = Selector::parse(&selector_str).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_canonical(document: &Html, page_url: &str) -> Option<String> {
    let selector = Selector::parse("link[rel='canonical']").unwrap();
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| url_utils::resolve_link(href, page_url))
}

fn extract_heading(document: &Html, tag: &str) -> (Option<String>, usize) {
    let selector = match Selector::parse(tag) {
        Ok(s) => s,
        Err(_) => return (None, 0),
    };
    let mut first = None;
    let mut count = 0;
    for element in document.select(&selector) {
        count += 1;
        if first.is_none() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                first = Some(text);
            }
        }
    }
    (first, count)
}

fn extract_links(
    document: &Html,
    page_url: &str,
    page_host: &str,
    config: &CrawlConfig,
) -> (Vec<String>, usize, usize) {
    let selector = Selector::parse("a[href]").unwrap();

    let mut targets = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut internal = 0;
    let mut external = 0;

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
            || href.starts_with("file:")
        {
            continue;
        }

        let Some(absolute) = url_utils::resolve_link(href, page_url) else {
            continue;
        };

        let link_host = url_utils::extract_host(&absolute).unwrap_or_default();
        let is_internal = url_utils::is_same_host(&link_host, page_host)
            || (config.follow_subdomains && url_utils::is_same_site(&link_host, page_host));
        if is_internal {
            internal += 1;
        } else {
            external += 1;
        }

        if seen.insert(absolute.clone()) {
            targets.push(absolute);
        }
    }

    (targets, internal, external)
}

fn extract_images(document: &Html, keep_sample: bool) -> (usize, usize, Vec<ImageAlt>) {
    let selector = Selector::parse("img").unwrap();

    let mut count = 0;
    let mut missing_alt = 0;
    let mut sample = Vec::new();

    for element in document.select(&selector) {
        count += 1;
        let alt = element
            .value()
            .attr("alt")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if alt.is_none() {
            missing_alt += 1;
        }
        if keep_sample && sample.len() < MAX_IMAGE_SAMPLE {
            if let Some(src) = element.value().attr("src") {
                sample.push(ImageAlt {
                    src: src.to_string(),
                    alt,
                });
            }
        }
    }

    (count, missing_alt, sample)
}

fn extract_hreflang(document: &Html, page_url: &str) -> HashMap<String, String> {
    let selector = Selector::parse("link[rel='alternate'][hreflang]").unwrap();
    let mut map = HashMap::new();
    for element in document.select(&selector) {
        let value = element.value();
        if let (Some(lang), Some(href)) = (value.attr("hreflang"), value.attr("href")) {
            if let Some(absolute) = url_utils::resolve_link(href, page_url) {
                map.insert(lang.to_string(), absolute);
            }
        }
    }
    map
}

fn extract_opengraph(document: &Html) -> OpenGraphFacts {
    let mut og = OpenGraphFacts::default();

    let selector = Selector::parse("meta[property^='og:']").unwrap();
    for element in document.select(&selector) {
        if let (Some(property), Some(content)) = (
            element.value().attr("property"),
            element.value().attr("content"),
        ) {
            let key = property.strip_prefix("og:").unwrap_or(property);
            let content = content.to_string();

            match key {
                "title" => og.title = Some(content),
                "description" => og.description = Some(content),
                "image" => og.image = Some(content),
                "url" => og.url = Some(content),
                "site_name" => og.site_name = Some(content),
                "type" => og.og_type = Some(content),
                _ => {
                    og.extra.insert(key.to_string(), content);
                }
            }
        }
    }

    og
}

fn extract_twitter(document: &Html) -> TwitterCardFacts {
    let mut twitter = TwitterCardFacts::default();

    let selector = Selector::parse("meta[name^='twitter:']").unwrap();
    for element in document.select(&selector) {
        if let (Some(name), Some(content)) = (
            element.value().attr("name"),
            element.value().attr("content"),
        ) {
            let key = name.strip_prefix("twitter:").unwrap_or(name);
            let content = content.to_string();

            match key {
                "card" => twitter.card = Some(content),
                "title" => twitter.title = Some(content),
                "description" => twitter.description = Some(content),
                "image" => twitter.image = Some(content),
                "site" => twitter.site = Some(content),
                _ => {
                    twitter.extra.insert(key.to_string(), content);
                }
            }
        }
    }

    twitter
}

fn extract_json_ld(document: &Html) -> Vec<StructuredData> {
    let mut items = Vec::new();

    let selector = Selector::parse("script[type='application/ld+json']").unwrap();
    for element in document.select(&selector) {
        let raw = element.text().collect::<String>();
        if raw.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(arr)) => {
                items.extend(arr.into_iter().map(StructuredData::JsonLd));
            }
            Ok(value) => items.push(StructuredData::JsonLd(value)),
            Err(e) => {
                let mut clipped = raw.trim().to_string();
                if clipped.len() > MAX_INVALID_JSON_LD_BYTES {
                    let mut cut = MAX_INVALID_JSON_LD_BYTES;
                    while !clipped.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    clipped.truncate(cut);
                }
                items.push(StructuredData::Invalid {
                    raw: clipped,
                    error: e.to_string(),
                });
            }
        }
    }

    items
}

fn extract_robots_meta(document: &Html) -> RobotsMeta {
    let mut meta = RobotsMeta::default();
    let selector = Selector::parse("meta[name='robots']").unwrap();
    for element in document.select(&selector) {
        if let Some(content) = element.value().attr("content") {
            let lower = content.to_ascii_lowercase();
            // "none" is shorthand for "noindex, nofollow"
            if lower.contains("noindex") || lower.contains("none") {
                meta.noindex = true;
            }
            if lower.contains("nofollow") || lower.contains("none") {
                meta.nofollow = true;
            }
        }
    }
    meta
}

/// Text a reader would actually see: script, style, noscript, and template
/// contents stripped.
fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    let body_selector = Selector::parse("body").unwrap();
    match document.select(&body_selector).next() {
        Some(body) => collect_visible_text(body, &mut out),
        None => collect_visible_text(document.root_element(), &mut out),
    }
    out
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    if matches!(
        element.value().name(),
        "script" | "style" | "noscript" | "template"
    ) {
        return;
    }
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            collect_visible_text(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
}
