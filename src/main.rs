use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use site_audit::cli::{AuditArgs, Cli, Commands, ExportFormat};
use site_audit::config::Limits;
use site_audit::export::{self, ExportError};
use site_audit::jobs::{JobError, JobManager};
use site_audit::logging::init_logging_in_data_dir;
use site_audit::models::{CrawlJob, CrawlResult, JobStatus};
use site_audit::reports;
use site_audit::store::{AuditStore, StoreError};
use site_audit::url_utils::normalize_url_for_cli;

#[derive(Error, Debug)]
pub enum MainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("job error: {0}")]
    Job(#[from] JobError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("audit failed: {0}")]
    AuditFailed(String),
}

/// One URL per line; blank lines and `#` comments are skipped.
fn read_url_list(path: &Path) -> Result<Vec<String>, MainError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

fn open_store(data_dir: &Path) -> Result<Arc<AuditStore>, MainError> {
    Ok(Arc::new(AuditStore::open(data_dir)?))
}

fn print_job(job: &CrawlJob) {
    println!("Job:       {}", job.id);
    println!("Target:    {}", job.target_url);
    println!("Status:    {}", job.status);
    println!(
        "Pages:     {} crawled, {} discovered",
        job.pages_crawled, job.pages_discovered
    );
    println!(
        "Issues:    {} errors, {} warnings",
        job.errors_count, job.warnings_count
    );
    println!("Created:   {}", job.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(ms) = job.duration_ms {
        println!("Duration:  {:.1}s", ms as f64 / 1000.0);
    }
    if let Some(error) = &job.error {
        println!("Error:     {}", error);
    }
}

async fn run_audit(manager: JobManager, args: AuditArgs) -> Result<(), MainError> {
    let url_list = match &args.urls_file {
        Some(path) => Some(read_url_list(path)?),
        None => None,
    };
    let robots_override = match &args.robots_file {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };
    let config = args.build_config(url_list, robots_override);
    let target = normalize_url_for_cli(&args.target_url);

    let job = manager.start_job(&target, config)?;
    println!("Auditing {} (job {})", job.target_url, job.id);

    // First Ctrl+C requests cancellation; in-flight fetches still finish
    // and their results are kept.
    let cancel_manager = manager.clone();
    let cancel_id = job.id;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCtrl+C received, cancelling job...");
            let _ = cancel_manager.cancel(&cancel_id);
        }
    });

    while manager.is_live(&job.id) {
        if let Some(snapshot) = manager.live_progress(&job.id) {
            eprint!(
                "\r{:>5} crawled  {:>5} discovered  {:>4} failed  {:>4} issues  {:>4}s ",
                snapshot.pages_crawled,
                snapshot.pages_discovered,
                snapshot.pages_failed,
                snapshot.issues_found,
                snapshot.elapsed_ms / 1000
            );
        }
        tokio::time::sleep(Duration::from_millis(Limits::PROGRESS_POLL_MS)).await;
    }
    eprintln!();

    let finished = manager.wait(&job.id).await?;
    print_job(&finished);

    if finished.status == JobStatus::Failed {
        return Err(MainError::AuditFailed(
            finished.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    Ok(())
}

fn run_status(store: &Arc<AuditStore>, job_id: &Uuid) -> Result<(), MainError> {
    let manager = JobManager::new(Arc::clone(store));
    let job = manager.get(job_id)?;
    print_job(&job);
    if let Some(snapshot) = manager.live_progress(job_id) {
        println!(
            "Live:      {} crawled, {} discovered, {} failed, {} issues",
            snapshot.pages_crawled,
            snapshot.pages_discovered,
            snapshot.pages_failed,
            snapshot.issues_found
        );
    }
    let results = store.count_results(job_id)?;
    println!("Results:   {} stored", results);
    Ok(())
}

fn run_cancel(store: &Arc<AuditStore>, job_id: &Uuid) -> Result<(), MainError> {
    let manager = JobManager::new(Arc::clone(store));
    let status = manager.cancel(job_id)?;
    println!("Job {} is now {}", job_id, status);
    Ok(())
}

fn run_jobs(store: &Arc<AuditStore>) -> Result<(), MainError> {
    let jobs = store.list_jobs()?;
    if jobs.is_empty() {
        println!("No jobs recorded");
        return Ok(());
    }
    for job in jobs {
        println!(
            "{}  {:<9}  {:>5} pages  {:>4} errors  {}  {}",
            job.id,
            job.status.to_string(),
            job.pages_crawled,
            job.errors_count,
            job.created_at.format("%Y-%m-%d %H:%M"),
            job.target_url
        );
    }
    Ok(())
}

fn run_results(
    store: &Arc<AuditStore>,
    job_id: &Uuid,
    offset: usize,
    limit: usize,
) -> Result<(), MainError> {
    let total = store.count_results(job_id)?;
    let page = store.results_page(job_id, offset, limit)?;
    for result in &page {
        let marker = if result.status == 0 {
            "!!"
        } else if result.status >= 400 {
            "E "
        } else if result.status >= 300 {
            "R "
        } else {
            "  "
        };
        println!(
            "{} {:>3}  {:>5}ms  d{}  {} issues  {}",
            marker,
            result.status,
            result.response_time_ms,
            result.depth,
            result.issues.len(),
            result.url
        );
    }
    println!(
        "Showing {}..{} of {} results",
        offset,
        offset + page.len(),
        total
    );
    Ok(())
}

fn run_report(store: &Arc<AuditStore>, job_id: &Uuid) -> Result<(), MainError> {
    let manager = JobManager::new(Arc::clone(store));
    let job = manager.get(job_id)?;
    let results = store.results_for_job(job_id)?;
    let document = serde_json::json!({
        "job_id": job.id,
        "target_url": job.target_url,
        "status": job.status,
        "pages_crawled": job.pages_crawled,
        "errors_count": job.errors_count,
        "warnings_count": job.warnings_count,
        "issues": reports::issue_summary(&results),
        "broken_links": reports::broken_links(&results),
    });
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn run_duplicates(store: &Arc<AuditStore>, job_id: &Uuid) -> Result<(), MainError> {
    JobManager::new(Arc::clone(store)).get(job_id)?;
    let results = store.results_for_job(job_id)?;
    let clusters = reports::duplicate_clusters(&results);
    println!("{}", serde_json::to_string_pretty(&clusters)?);
    Ok(())
}

fn run_redirects(store: &Arc<AuditStore>, job_id: &Uuid) -> Result<(), MainError> {
    JobManager::new(Arc::clone(store)).get(job_id)?;
    let results = store.results_for_job(job_id)?;
    let entries = reports::redirect_report(&results);
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn run_compare(store: &Arc<AuditStore>, first: &Uuid, second: &Uuid) -> Result<(), MainError> {
    let manager = JobManager::new(Arc::clone(store));
    manager.get(first)?;
    manager.get(second)?;
    let first_results = store.results_for_job(first)?;
    let second_results = store.results_for_job(second)?;
    let comparison = reports::compare(&first_results, &second_results);
    println!("{}", serde_json::to_string_pretty(&comparison)?);
    Ok(())
}

fn run_export(
    store: &Arc<AuditStore>,
    job_id: &Uuid,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<(), MainError> {
    let manager = JobManager::new(Arc::clone(store));
    let job = manager.get(job_id)?;
    let results = store.results_for_job(job_id)?;

    match &output {
        Some(path) => {
            let file = File::create(path)?;
            write_export(&job, &results, format, file)?;
            eprintln!("Exported {} results to {}", results.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            write_export(&job, &results, format, stdout.lock())?;
        }
    }
    Ok(())
}

fn write_export<W: Write>(
    job: &CrawlJob,
    results: &[CrawlResult],
    format: ExportFormat,
    writer: W,
) -> Result<(), MainError> {
    match format {
        ExportFormat::Csv => export::write_csv(results, writer)?,
        ExportFormat::Json => export::write_json(job, results, writer)?,
    }
    Ok(())
}

fn run_delete(store: &Arc<AuditStore>, job_id: &Uuid) -> Result<(), MainError> {
    let results = store.count_results(job_id)?;
    JobManager::new(Arc::clone(store)).delete(job_id)?;
    println!("Deleted job {} and {} results", job_id, results);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let cli = Cli::parse();

    init_logging_in_data_dir(&cli.data_dir).map_err(|e| MainError::Logging(e.to_string()))?;
    let store = open_store(&cli.data_dir)?;

    match cli.command {
        Commands::Audit(args) => {
            let manager = JobManager::new(Arc::clone(&store));
            run_audit(manager, args).await?;
        }
        Commands::Status { job_id } => run_status(&store, &job_id)?,
        Commands::Cancel { job_id } => run_cancel(&store, &job_id)?,
        Commands::Jobs => run_jobs(&store)?,
        Commands::Results {
            job_id,
            offset,
            limit,
        } => run_results(&store, &job_id, offset, limit)?,
        Commands::Report { job_id } => run_report(&store, &job_id)?,
        Commands::Duplicates { job_id } => run_duplicates(&store, &job_id)?,
        Commands::Redirects { job_id } => run_redirects(&store, &job_id)?,
        Commands::Compare { first, second } => run_compare(&store, &first, &second)?,
        Commands::Export {
            job_id,
            format,
            output,
        } => run_export(&store, &job_id, format, output)?,
        Commands::Delete { job_id } => run_delete(&store, &job_id)?,
    }

    Ok(())
}
