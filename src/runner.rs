//! Crawl job runner: drives one job from seed URL to terminal status.
//!
//! A bounded worker pool fetches pages while the runner thread dispatches
//! frontier entries, enforces per-host politeness, consults robots policy,
//! and folds finished pages back into the frontier. Fetch failures are
//! recorded as status-0 results and never abort the job; only a storage
//! error does that.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analyzer;
use crate::config::{ConfigError, CrawlConfig};
use crate::frontier::{EnqueueOutcome, Frontier, FrontierEntry};
use crate::issues;
use crate::models::{
    CrawlJob, CrawlResult, Indexability, IssueSeverity, JobStatus, SeoFacts,
};
use crate::network::{FetchError, FetchedPage, HttpClient};
use crate::progress::SharedProgress;
use crate::robots::{self, RobotsPolicy};
use crate::store::AuditStore;
use crate::url_utils;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("invalid crawl configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] FetchError),
}

pub struct CrawlRunner {
    job: CrawlJob,
    config: Arc<CrawlConfig>,
    http: Arc<HttpClient>,
    store: Arc<AuditStore>,
    frontier: Arc<Frontier>,
    progress: SharedProgress,
    cancel: Arc<AtomicBool>,
    /// Robots policy per host, resolved at most once per job.
    robots_cache: HashMap<String, Arc<RobotsPolicy>>,
    /// Earliest instant the next request to a host may start.
    next_allowed: HashMap<String, Instant>,
}

impl CrawlRunner {
    pub fn new(
        job: CrawlJob,
        store: Arc<AuditStore>,
        progress: SharedProgress,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, RunnerError> {
        let config = Arc::new(job.config.clone());
        let http = Arc::new(HttpClient::new(
            config.user_agent(),
            Duration::from_secs(config.timeout_secs),
        )?);
        let frontier = Arc::new(Frontier::new(&job.target_url, &config)?);

        Ok(Self {
            job,
            config,
            http,
            store,
            frontier,
            progress,
            cancel,
            robots_cache: HashMap::new(),
            next_allowed: HashMap::new(),
        })
    }

    /// Run the crawl to completion and return the terminal job row.
    /// The terminal status is also persisted; whichever of completion,
    /// cancellation, or failure reaches the store first wins.
    pub async fn run(mut self) -> CrawlJob {
        self.job.status = JobStatus::Running;
        self.job.started_at = Some(Utc::now());
        if let Err(e) = self.store.put_job(&self.job) {
            error!(job_id = %self.job.id, error = %e, "could not mark job running");
            return self.finish(JobStatus::Failed, Some(e.to_string()), 0, 0).await;
        }

        info!(
            job_id = %self.job.id,
            target = %self.job.target_url,
            max_pages = self.config.max_pages,
            max_depth = self.config.max_depth,
            "crawl started"
        );

        self.seed();

        let max_workers = self.config.workers.max(1);
        let mut workers: JoinSet<WorkerOutcome> = JoinSet::new();
        let mut dispatched: usize = 0;
        let mut errors_total: u64 = 0;
        let mut warnings_total: u64 = 0;
        let mut failure: Option<String> = None;

        loop {
            // Phase 1: fill the worker pool.
            if failure.is_none() {
                while workers.len() < max_workers {
                    if self.cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    if dispatched >= self.config.max_pages {
                        self.frontier.clear_pending();
                        break;
                    }
                    let Some(entry) = self.frontier.dequeue() else {
                        break;
                    };

                    let policy = self.robots_for(&entry.url).await;
                    if self.config.respect_robots_txt && !policy.is_allowed(&entry.url) {
                        debug!(url = %entry.url, "blocked by robots.txt, not fetched");
                        continue;
                    }

                    dispatched += 1;
                    let not_before = self.reserve_slot(&entry.url, policy.crawl_delay_ms());
                    let ctx = WorkerCtx {
                        job_id: self.job.id,
                        config: Arc::clone(&self.config),
                        http: Arc::clone(&self.http),
                        store: Arc::clone(&self.store),
                        progress: Arc::clone(&self.progress),
                        policy,
                    };
                    workers.spawn(crawl_one(ctx, entry, not_before));
                }
            }

            // Phase 2: collect one finished page.
            if let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(outcome) => self.absorb(
                        outcome,
                        &mut errors_total,
                        &mut warnings_total,
                        &mut failure,
                    ),
                    Err(e) => warn!(job_id = %self.job.id, error = %e, "worker task aborted"),
                }
                continue;
            }

            // Phase 3: pool is empty; decide whether anything is left.
            if failure.is_some()
                || self.cancel.load(Ordering::SeqCst)
                || dispatched >= self.config.max_pages
                || self.frontier.is_empty()
            {
                break;
            }
        }

        self.frontier.clear_pending();
        self.progress.clear_current_url();

        let (status, err) = if let Some(msg) = failure {
            (JobStatus::Failed, Some(msg))
        } else if self.cancel.load(Ordering::SeqCst) {
            (JobStatus::Cancelled, None)
        } else {
            (JobStatus::Completed, None)
        };
        self.finish(status, err, errors_total, warnings_total).await
    }

    /// Push the starting URLs: the explicit list when one was given,
    /// otherwise the target URL.
    fn seed(&self) {
        let mut seeded = 0u64;
        match &self.config.url_list {
            Some(urls) => {
                for url in urls {
                    match self.frontier.enqueue_seed(url) {
                        EnqueueOutcome::Enqueued => seeded += 1,
                        EnqueueOutcome::AlreadyVisited => {}
                        outcome => {
                            warn!(url = %url, ?outcome, "skipping unusable seed URL")
                        }
                    }
                }
            }
            None => {
                if self.frontier.enqueue_seed(&self.job.target_url) == EnqueueOutcome::Enqueued {
                    seeded = 1;
                }
            }
        }
        self.progress.pages_discovered.add(seeded);
    }

    async fn robots_for(&mut self, url: &str) -> Arc<RobotsPolicy> {
        let host = url_utils::extract_host(url).unwrap_or_default();
        if let Some(policy) = self.robots_cache.get(&host) {
            return Arc::clone(policy);
        }
        let policy = Arc::new(robots::resolve_for_host(&self.http, url, &self.config).await);
        if let Some(delay) = policy.crawl_delay_ms() {
            debug!(host = %host, delay_ms = delay, "robots.txt crawl-delay in effect");
        }
        self.robots_cache.insert(host, Arc::clone(&policy));
        policy
    }

    /// Claim the next politeness slot for a host. The configured delay and
    /// the robots crawl-delay compete; the larger one wins.
    fn reserve_slot(&mut self, url: &str, robots_delay_ms: Option<u64>) -> Instant {
        let host = url_utils::extract_host(url).unwrap_or_default();
        let delay_ms = self.config.crawl_delay_ms.max(robots_delay_ms.unwrap_or(0));
        let now = Instant::now();
        let slot = match self.next_allowed.get(&host) {
            Some(at) if *at > now => *at,
            _ => now,
        };
        self.next_allowed
            .insert(host, slot + Duration::from_millis(delay_ms));
        slot
    }

    /// Fold one finished page back in: expand its links, note redirect
    /// landings, and tally issue severities for the job row.
    fn absorb(
        &self,
        outcome: WorkerOutcome,
        errors_total: &mut u64,
        warnings_total: &mut u64,
        failure: &mut Option<String>,
    ) {
        if let Some(store_error) = outcome.store_error {
            warn!(job_id = %self.job.id, url = %outcome.page_url, error = %store_error, "storage write failed, stopping crawl");
            failure.get_or_insert(store_error);
            return;
        }

        *errors_total += outcome.error_issues;
        *warnings_total += outcome.warning_issues;

        if let Some(landing) = outcome.redirect_final {
            // The landing page's content is recorded under the requested
            // URL; marking it visited stops a second fetch via a direct link.
            if self.frontier.mark_visited(&landing) {
                self.progress.pages_discovered.inc();
            }
        }

        for link in &outcome.links {
            if self.frontier.try_enqueue(link, &outcome.page_url, outcome.depth + 1)
                == EnqueueOutcome::Enqueued
            {
                self.progress.pages_discovered.inc();
            }
        }
    }

    async fn finish(
        mut self,
        status: JobStatus,
        err: Option<String>,
        errors_total: u64,
        warnings_total: u64,
    ) -> CrawlJob {
        let snapshot = self.progress.snapshot();
        self.job.status = status;
        self.job.error = err;
        self.job.pages_crawled = snapshot.pages_crawled;
        self.job.pages_discovered = snapshot.pages_discovered;
        self.job.errors_count = errors_total;
        self.job.warnings_count = warnings_total;
        self.job.completed_at = Some(Utc::now());
        self.job.duration_ms = self
            .job
            .started_at
            .map(|started| (Utc::now() - started).num_milliseconds().max(0) as u64);

        match self.store.finish_job(&self.job) {
            Ok(true) => info!(
                job_id = %self.job.id,
                status = %self.job.status,
                pages = self.job.pages_crawled,
                errors = self.job.errors_count,
                "crawl finished"
            ),
            Ok(false) => debug!(job_id = %self.job.id, "terminal status already recorded"),
            Err(e) => error!(job_id = %self.job.id, error = %e, "could not persist terminal job status"),
        }
        self.job
    }
}

struct WorkerCtx {
    job_id: Uuid,
    config: Arc<CrawlConfig>,
    http: Arc<HttpClient>,
    store: Arc<AuditStore>,
    progress: SharedProgress,
    policy: Arc<RobotsPolicy>,
}

struct WorkerOutcome {
    /// Final URL of the page, used as the parent for links found on it.
    page_url: String,
    depth: u32,
    links: Vec<String>,
    redirect_final: Option<String>,
    error_issues: u64,
    warning_issues: u64,
    store_error: Option<String>,
}

/// Fetch, analyze, classify, and persist one URL.
async fn crawl_one(ctx: WorkerCtx, entry: FrontierEntry, not_before: Instant) -> WorkerOutcome {
    tokio::time::sleep_until(not_before).await;
    ctx.progress.set_current_url(&entry.url);

    let timeout = Duration::from_secs(ctx.config.timeout_secs);
    let (result, links) = match ctx.http.fetch_with_timeout(&entry.url, timeout).await {
        Ok(page) => page_result(&ctx, &entry, page),
        Err(fetch_error) => failure_result(&ctx, &entry, &fetch_error),
    };

    ctx.progress.pages_crawled.inc();
    if result.status == 0 {
        ctx.progress.pages_failed.inc();
    }
    ctx.progress.issues_found.add(result.issues.len() as u64);

    let severity_count = |severity: IssueSeverity| {
        result
            .issues
            .iter()
            .filter(|i| i.severity == severity)
            .count() as u64
    };
    let error_issues = severity_count(IssueSeverity::Error);
    let warning_issues = severity_count(IssueSeverity::Warning);

    let store_error = match ctx.store.put_result(&result) {
        Ok(true) => None,
        Ok(false) => {
            debug!(url = %result.url, "result for this URL already stored");
            None
        }
        Err(e) => Some(e.to_string()),
    };

    WorkerOutcome {
        page_url: result.url.clone(),
        depth: entry.depth,
        links,
        redirect_final: result.redirected_to.clone(),
        error_issues,
        warning_issues,
        store_error,
    }
}

/// Build the result row for a completed HTTP exchange.
fn page_result(
    ctx: &WorkerCtx,
    entry: &FrontierEntry,
    page: FetchedPage,
) -> (CrawlResult, Vec<String>) {
    let is_html = page
        .content_type
        .as_deref()
        .map(url_utils::is_html_content_type)
        .unwrap_or(false);
    let is_success = (200..=299).contains(&page.status);

    let analysis = if is_html && is_success && !page.body.is_empty() {
        Some(analyzer::analyze(&page.body, &page.final_url, &ctx.config))
    } else {
        None
    };

    let robots_meta = analysis
        .as_ref()
        .map(|a| a.robots_meta)
        .unwrap_or_default();
    let facts = analysis
        .as_ref()
        .map(|a| a.facts.clone())
        .unwrap_or_else(SeoFacts::default);
    let content_hash = analysis.as_ref().map(|a| a.content_hash.clone());

    let indexability = analyzer::indexability_verdict(
        page.status,
        &robots_meta,
        page.x_robots_tag.as_deref(),
        ctx.policy.is_allowed(&entry.url),
    );

    let issues = issues::classify(
        &page.final_url,
        page.status,
        None,
        is_html,
        page.redirect_chain.len(),
        &facts,
        &indexability,
        &ctx.config,
    );

    let links = match &analysis {
        Some(a) if !a.robots_meta.nofollow => a.links.clone(),
        _ => Vec::new(),
    };

    let result = CrawlResult {
        job_id: ctx.job_id,
        url: page.final_url,
        normalized_url: entry.normalized.clone(),
        url_hash: url_utils::url_hash(&entry.normalized),
        parent_url: entry.parent.clone(),
        depth: entry.depth,
        status: page.status,
        fetch_error: None,
        content_type: page.content_type,
        response_time_ms: page.elapsed_ms,
        content_length: page.content_length,
        content_hash,
        redirected_to: page.redirected_to,
        redirect_chain: page.redirect_chain,
        facts,
        indexability,
        issues,
        crawled_at: Utc::now(),
    };
    (result, links)
}

/// Build the status-0 result row for a fetch that never produced a response.
fn failure_result(
    ctx: &WorkerCtx,
    entry: &FrontierEntry,
    fetch_error: &FetchError,
) -> (CrawlResult, Vec<String>) {
    let message = fetch_error.to_string();
    let indexability = Indexability::blocked(format!("fetch failed: {message}"));
    let facts = SeoFacts::default();
    let issues = issues::classify(
        &entry.url,
        0,
        Some(&message),
        false,
        0,
        &facts,
        &indexability,
        &ctx.config,
    );

    let result = CrawlResult {
        job_id: ctx.job_id,
        url: entry.url.clone(),
        normalized_url: entry.normalized.clone(),
        url_hash: url_utils::url_hash(&entry.normalized),
        parent_url: entry.parent.clone(),
        depth: entry.depth,
        status: 0,
        fetch_error: Some(message),
        content_type: None,
        response_time_ms: 0,
        content_length: 0,
        content_hash: None,
        redirected_to: None,
        redirect_chain: Vec::new(),
        facts,
        indexability,
        issues,
        crawled_at: Utc::now(),
    };
    (result, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    struct Harness {
        _dir: TempDir,
        store: Arc<AuditStore>,
        progress: SharedProgress,
        cancel: Arc<AtomicBool>,
    }

    impl Harness {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(AuditStore::open(dir.path()).unwrap());
            Self {
                _dir: dir,
                store,
                progress: Arc::new(crate::progress::JobProgress::new()),
                cancel: Arc::new(AtomicBool::new(false)),
            }
        }

        fn runner(&self, target: &str, config: CrawlConfig) -> CrawlRunner {
            let job = CrawlJob::new(target.to_string(), config);
            self.store.put_job(&job).unwrap();
            CrawlRunner::new(
                job,
                Arc::clone(&self.store),
                Arc::clone(&self.progress),
                Arc::clone(&self.cancel),
            )
            .unwrap()
        }
    }

    fn fast_config() -> CrawlConfig {
        CrawlConfig {
            crawl_delay_ms: 0,
            respect_robots_txt: false,
            ..CrawlConfig::default()
        }
    }

    fn html_page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
    }

    /// Serves an HTML page and records when each request arrived.
    struct StampedPage {
        hits: Arc<Mutex<Vec<Instant>>>,
        body: String,
    }

    impl StampedPage {
        fn new(hits: &Arc<Mutex<Vec<Instant>>>, body: &str) -> Self {
            Self {
                hits: Arc::clone(hits),
                body: body.to_string(),
            }
        }
    }

    impl Respond for StampedPage {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            self.hits.lock().push(Instant::now());
            ResponseTemplate::new(200)
                .set_body_raw(self.body.clone(), "text/html; charset=utf-8")
        }
    }

    #[tokio::test]
    async fn test_single_page_crawl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(
                "<html><head><title>Front page headline</title></head>\
                 <body><h1>Welcome</h1></body></html>",
            ))
            .mount(&server)
            .await;

        let harness = Harness::new();
        let runner = harness.runner(&server.uri(), fast_config());
        let job_id = runner.job.id;
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.pages_crawled, 1);
        let results = harness.store.results_for_job(&job_id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, 200);
        assert_eq!(
            results[0].facts.title.as_deref(),
            Some("Front page headline")
        );
    }

    #[tokio::test]
    async fn test_links_followed_and_deduplicated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(
                "<html><body><a href=\"/about\">About</a>\
                 <a href=\"/about\">About again</a>\
                 <a href=\"/contact\">Contact</a></body></html>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(html_page("<html><body><a href=\"/\">Home</a></body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(html_page("<html><body>Call us</body></html>"))
            .mount(&server)
            .await;

        let harness = Harness::new();
        let runner = harness.runner(&server.uri(), fast_config());
        let job_id = runner.job.id;
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.pages_crawled, 3);
        assert_eq!(harness.store.count_results(&job_id).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_same_host_fetches_spaced_by_crawl_delay() {
        let server = MockServer::start().await;
        let hits: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(StampedPage::new(
                &hits,
                "<html><body><a href=\"/second\">2</a>\
                 <a href=\"/third\">3</a></body></html>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/second"))
            .respond_with(StampedPage::new(&hits, "<html><body>two</body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/third"))
            .respond_with(StampedPage::new(&hits, "<html><body>three</body></html>"))
            .mount(&server)
            .await;

        let config = CrawlConfig {
            crawl_delay_ms: 200,
            respect_robots_txt: false,
            ..CrawlConfig::default()
        };
        let harness = Harness::new();
        let runner = harness.runner(&server.uri(), config);
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.pages_crawled, 3);

        let stamps = hits.lock().clone();
        assert_eq!(stamps.len(), 3);
        for pair in stamps.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            // dispatch slots are 200ms apart; leave headroom for scheduling
            assert!(
                gap >= Duration::from_millis(150),
                "same-host fetches only {}ms apart",
                gap.as_millis()
            );
        }
    }

    #[tokio::test]
    async fn test_robots_crawl_delay_wins_when_larger() {
        let server = MockServer::start().await;
        let hits: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("User-agent: *\nCrawl-delay: 0.3\n"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(StampedPage::new(
                &hits,
                "<html><body><a href=\"/second\">2</a>\
                 <a href=\"/third\">3</a></body></html>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/second"))
            .respond_with(StampedPage::new(&hits, "<html><body>two</body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/third"))
            .respond_with(StampedPage::new(&hits, "<html><body>three</body></html>"))
            .mount(&server)
            .await;

        let config = CrawlConfig {
            crawl_delay_ms: 50,
            respect_robots_txt: true,
            ..CrawlConfig::default()
        };
        let harness = Harness::new();
        let runner = harness.runner(&server.uri(), config);
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.pages_crawled, 3);

        // 0.3s from robots.txt beats the 50ms configured delay
        let stamps = hits.lock().clone();
        assert_eq!(stamps.len(), 3);
        for pair in stamps.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            assert!(
                gap >= Duration::from_millis(250),
                "same-host fetches only {}ms apart",
                gap.as_millis()
            );
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_recorded_as_data() {
        let harness = Harness::new();
        // nothing listens on this port
        let runner = harness.runner("http://127.0.0.1:1", fast_config());
        let job_id = runner.job.id;
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Completed);
        let results = harness.store.results_for_job(&job_id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, 0);
        assert!(results[0].fetch_error.is_some());
        assert!(!results[0].indexability.indexable);
    }

    #[tokio::test]
    async fn test_max_pages_cap() {
        let server = MockServer::start().await;
        // every page links to the next, forever
        for i in 0..20 {
            let p = if i == 0 { "/".to_string() } else { format!("/p{i}") };
            let next = format!("/p{}", i + 1);
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(html_page(&format!(
                    "<html><body><a href=\"{next}\">next</a></body></html>"
                )))
                .mount(&server)
                .await;
        }

        let config = CrawlConfig {
            max_pages: 5,
            max_depth: 100,
            ..fast_config()
        };
        let harness = Harness::new();
        let runner = harness.runner(&server.uri(), config);
        let job_id = runner.job.id;
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.pages_crawled, 5);
        assert_eq!(harness.store.count_results(&job_id).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_cancel_before_start_dispatches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page("<html><body>never seen</body></html>"))
            .expect(0)
            .mount(&server)
            .await;

        let harness = Harness::new();
        harness.cancel.store(true, Ordering::SeqCst);
        let runner = harness.runner(&server.uri(), fast_config());
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.pages_crawled, 0);
    }

    #[tokio::test]
    async fn test_robots_disallow_not_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("User-agent: *\nDisallow: /private/\n"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(
                "<html><body><a href=\"/private/page\">secret</a>\
                 <a href=\"/public\">open</a></body></html>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/public"))
            .respond_with(html_page("<html><body>fine</body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/private/page"))
            .respond_with(html_page("<html><body>secret</body></html>"))
            .expect(0)
            .mount(&server)
            .await;

        let config = CrawlConfig {
            crawl_delay_ms: 0,
            respect_robots_txt: true,
            ..CrawlConfig::default()
        };
        let harness = Harness::new();
        let runner = harness.runner(&server.uri(), config);
        let job_id = runner.job.id;
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Completed);
        let urls: Vec<String> = harness
            .store
            .results_for_job(&job_id)
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(urls.len(), 2);
        assert!(!urls.iter().any(|u| u.contains("/private/")));
    }

    #[tokio::test]
    async fn test_redirect_chain_captured() {
        let server = MockServer::start().await;
        let target = format!("{}/final", server.uri());
        let mid = format!("{}/mid", server.uri());
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", mid.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mid"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", target.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/final"))
            .respond_with(html_page("<html><body>landed</body></html>"))
            .mount(&server)
            .await;

        let harness = Harness::new();
        let runner = harness.runner(&server.uri(), fast_config());
        let job_id = runner.job.id;
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Completed);
        let results = harness.store.results_for_job(&job_id).unwrap();
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.status, 200);
        assert_eq!(r.url, target);
        assert_eq!(r.redirect_chain.len(), 2);
        assert_eq!(r.redirect_chain[0].status, 301);
        assert_eq!(r.redirect_chain[1].status, 302);
        assert_eq!(r.redirected_to.as_deref(), Some(target.as_str()));
    }

    #[tokio::test]
    async fn test_url_list_mode_fetches_only_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(html_page(
                "<html><body><a href=\"/not-listed\">x</a></body></html>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(html_page("<html><body>b</body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/not-listed"))
            .respond_with(html_page("<html><body>hidden</body></html>"))
            .expect(0)
            .mount(&server)
            .await;

        let config = CrawlConfig {
            url_list: Some(vec![
                format!("{}/a", server.uri()),
                format!("{}/b", server.uri()),
            ]),
            ..fast_config()
        };
        let harness = Harness::new();
        let runner = harness.runner(&server.uri(), config);
        let job_id = runner.job.id;
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(harness.store.count_results(&job_id).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_error_page_counts_toward_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(
                "<html><body><a href=\"/gone\">missing</a></body></html>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let harness = Harness::new();
        let runner = harness.runner(&server.uri(), fast_config());
        let job_id = runner.job.id;
        let job = runner.run().await;

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.errors_count >= 1);
        let results = harness.store.results_for_job(&job_id).unwrap();
        let gone = results.iter().find(|r| r.status == 404).unwrap();
        assert!(!gone.indexability.indexable);
        assert!(gone
            .issues
            .iter()
            .any(|i| i.issue_type == crate::models::IssueType::HttpError));
    }
}
