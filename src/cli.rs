use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::CrawlConfig;

/// Command-line surface for running and inspecting site audits.
/// Exit codes: 0=success, 1=operation failed, 2=invalid arguments
#[derive(Parser, Debug)]
#[command(name = "site-audit")]
#[command(about = "On-demand SEO crawler and site auditor")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "./data",
        help = "Directory for the audit database and logs"
    )]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a site and record per-page SEO results.
    Audit(AuditArgs),

    /// Show a job's stored row and, while it runs, live progress.
    Status {
        #[arg(help = "Job id")]
        job_id: uuid::Uuid,
    },

    /// Cancel a job. Safe to repeat; finished jobs are left alone.
    Cancel {
        #[arg(help = "Job id")]
        job_id: uuid::Uuid,
    },

    /// List all jobs, most recent first.
    Jobs,

    /// Page through one job's per-URL results.
    Results {
        #[arg(help = "Job id")]
        job_id: uuid::Uuid,

        #[arg(long, default_value_t = 0, help = "Rows to skip")]
        offset: usize,

        #[arg(long, default_value_t = 50, help = "Maximum rows to print")]
        limit: usize,
    },

    /// Aggregated issue counts with sample URLs, broken links included.
    Report {
        #[arg(help = "Job id")]
        job_id: uuid::Uuid,
    },

    /// Pages whose visible text is identical.
    Duplicates {
        #[arg(help = "Job id")]
        job_id: uuid::Uuid,
    },

    /// Pages that redirect, worst chains first.
    Redirects {
        #[arg(help = "Job id")]
        job_id: uuid::Uuid,
    },

    /// Diff two runs over the same site.
    Compare {
        #[arg(help = "Earlier job id")]
        first: uuid::Uuid,

        #[arg(help = "Later job id")]
        second: uuid::Uuid,
    },

    /// Write a job's results to a file or stdout.
    Export {
        #[arg(help = "Job id")]
        job_id: uuid::Uuid,

        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        #[arg(short, long, help = "Output file (stdout when omitted)")]
        output: Option<PathBuf>,
    },

    /// Delete a job and all of its results.
    Delete {
        #[arg(help = "Job id")]
        job_id: uuid::Uuid,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    #[arg(help = "Site URL to audit (scheme defaults to https)")]
    pub target_url: String,

    #[arg(long, default_value_t = 500, help = "Stop after fetching this many pages")]
    pub max_pages: usize,

    #[arg(long, default_value_t = 10, help = "Maximum link depth from the start URL")]
    pub max_depth: u32,

    #[arg(
        long = "delay-ms",
        default_value_t = 200,
        help = "Milliseconds between requests to the same host"
    )]
    pub delay_ms: u64,

    #[arg(long, default_value_t = 4, help = "Concurrent fetch workers")]
    pub workers: usize,

    #[arg(long, default_value_t = 30, help = "Per-request timeout in seconds")]
    pub timeout: u64,

    #[arg(long, help = "Crawl without consulting robots.txt")]
    pub ignore_robots: bool,

    #[arg(long, help = "Follow links to other hosts")]
    pub follow_external: bool,

    #[arg(long, help = "Follow links to subdomains of the target")]
    pub follow_subdomains: bool,

    #[arg(long, help = "Skip image URLs entirely")]
    pub skip_images: bool,

    #[arg(long, help = "Fetch stylesheet URLs")]
    pub include_css: bool,

    #[arg(long, help = "Fetch script URLs")]
    pub include_js: bool,

    #[arg(long, help = "Skip canonical tag checks")]
    pub no_canonical: bool,

    #[arg(long, help = "Skip hreflang extraction")]
    pub no_hreflang: bool,

    #[arg(long, help = "Skip JSON-LD extraction")]
    pub no_structured_data: bool,

    #[arg(long, help = "Report every image missing alt text individually")]
    pub check_accessibility: bool,

    #[arg(long, help = "Override the User-Agent header")]
    pub user_agent: Option<String>,

    #[arg(
        long = "robots-override",
        value_name = "FILE",
        help = "Use this file as robots.txt instead of fetching it"
    )]
    pub robots_file: Option<PathBuf>,

    #[arg(
        long = "url-list",
        value_name = "FILE",
        help = "Audit exactly these URLs (one per line) instead of crawling"
    )]
    pub urls_file: Option<PathBuf>,

    #[arg(long, value_name = "REGEX", help = "Only follow URLs matching a pattern (repeatable)")]
    pub include: Vec<String>,

    #[arg(long, value_name = "REGEX", help = "Never follow URLs matching a pattern (repeatable)")]
    pub exclude: Vec<String>,
}

impl AuditArgs {
    /// Assemble the crawl configuration. File-backed options (URL list,
    /// robots override) are loaded by the caller and passed in.
    pub fn build_config(
        &self,
        url_list: Option<Vec<String>>,
        robots_override: Option<String>,
    ) -> CrawlConfig {
        CrawlConfig {
            max_pages: self.max_pages,
            max_depth: self.max_depth,
            crawl_delay_ms: self.delay_ms,
            respect_robots_txt: !self.ignore_robots,
            follow_external_links: self.follow_external,
            follow_subdomains: self.follow_subdomains,
            include_images: !self.skip_images,
            include_css: self.include_css,
            include_js: self.include_js,
            check_canonical: !self.no_canonical,
            check_hreflang: !self.no_hreflang,
            extract_structured_data: !self.no_structured_data,
            check_accessibility: self.check_accessibility,
            workers: self.workers,
            timeout_secs: self.timeout,
            user_agent: self.user_agent.clone(),
            robots_override,
            url_list,
            include_patterns: self.include.clone(),
            exclude_patterns: self.exclude.clone(),
            ..CrawlConfig::default()
        }
    }
}
