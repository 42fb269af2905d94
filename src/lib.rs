pub mod cli;
pub mod config;
pub mod models;
pub mod analyzer;
pub mod issues;
pub mod network;
pub mod robots;
pub mod frontier;
pub mod progress;
pub mod store;
pub mod runner;
pub mod jobs;
pub mod reports;
pub mod export;
pub mod logging;
pub mod url_utils;

// Re-export main types for library usage
pub use config::{CrawlConfig, ConfigError, IssueThresholds, Limits};
pub use models::{CrawlJob, CrawlResult, Indexability, Issue, IssueSeverity, IssueType, JobStatus};
pub use network::{FetchError, FetchedPage, HttpClient};
pub use analyzer::{analyze, PageAnalysis};
pub use robots::RobotsPolicy;
pub use frontier::{EnqueueOutcome, Frontier, FrontierEntry};
pub use progress::{JobProgress, ProgressSnapshot, SharedProgress};
pub use store::{AuditStore, StoreError};
pub use runner::CrawlRunner;
pub use jobs::{JobError, JobManager};
