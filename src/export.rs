//! Export a finished job's results as CSV or a single JSON document.

use serde::Serialize;
use std::io::Write;
use thiserror::Error;

use crate::models::{CrawlJob, CrawlResult};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Column order for CSV exports. One row per crawled page; list-valued
/// fields are flattened (issues joined with `|`).
const CSV_HEADERS: [&str; 24] = [
    "url",
    "status",
    "indexable",
    "indexability_reason",
    "depth",
    "parent_url",
    "title",
    "title_length",
    "meta_description",
    "meta_description_length",
    "h1_count",
    "word_count",
    "internal_links",
    "external_links",
    "images",
    "images_missing_alt",
    "canonical",
    "content_type",
    "content_length",
    "response_time_ms",
    "redirect_hops",
    "content_hash",
    "fetch_error",
    "issues",
];

pub fn write_csv<W: Write>(results: &[CrawlResult], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADERS)?;

    for result in results {
        let issues = result
            .issues
            .iter()
            .map(|issue| issue.issue_type.to_string())
            .collect::<Vec<_>>()
            .join("|");

        csv_writer.write_record([
            result.url.clone(),
            result.status.to_string(),
            result.indexability.indexable.to_string(),
            result.indexability.reason.clone(),
            result.depth.to_string(),
            result.parent_url.clone().unwrap_or_default(),
            result.facts.title.clone().unwrap_or_default(),
            result.facts.title_length.to_string(),
            result.facts.meta_description.clone().unwrap_or_default(),
            result.facts.meta_description_length.to_string(),
            result.facts.h1_count.to_string(),
            result.facts.word_count.to_string(),
            result.facts.internal_links.to_string(),
            result.facts.external_links.to_string(),
            result.facts.images.to_string(),
            result.facts.images_missing_alt.to_string(),
            result.facts.canonical.clone().unwrap_or_default(),
            result.content_type.clone().unwrap_or_default(),
            result.content_length.to_string(),
            result.response_time_ms.to_string(),
            result.redirect_chain.len().to_string(),
            result.content_hash.clone().unwrap_or_default(),
            result.fetch_error.clone().unwrap_or_default(),
            issues,
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// The whole job as one JSON document: the job row followed by every result.
#[derive(Serialize)]
struct ExportDocument<'a> {
    job: &'a CrawlJob,
    results: &'a [CrawlResult],
}

pub fn write_json<W: Write>(
    job: &CrawlJob,
    results: &[CrawlResult],
    writer: W,
) -> Result<(), ExportError> {
    let document = ExportDocument { job, results };
    serde_json::to_writer_pretty(writer, &document)?;
    Ok(())
}
