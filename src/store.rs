//! Durable storage for jobs and per-page results, backed by redb.
//!
//! Layout is two tables: `jobs` keyed by job id, and `results` keyed by
//! `"{job_id}/{url_hash}"` so one job's rows form a contiguous key range.
//! Values are serde_json bytes. Results are append-only: the first write
//! for a key wins and later writes are ignored.

use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CrawlJob, CrawlResult};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database creation error: {0}")]
    Create(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),
}

pub struct AuditStore {
    db: Arc<Database>,
}

impl AuditStore {
    const JOBS: TableDefinition<'_, &str, &[u8]> = TableDefinition::new("jobs");
    const RESULTS: TableDefinition<'_, &str, &[u8]> = TableDefinition::new("results");

    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        let data_path = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_path)?;

        let db = Database::create(data_path.join("site_audit.redb"))?;

        // Open each table once so later read transactions find them.
        let write_txn = db.begin_write()?;
        {
            let _jobs = write_txn.open_table(Self::JOBS)?;
            let _results = write_txn.open_table(Self::RESULTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn result_key(job_id: &Uuid, url_hash: &str) -> String {
        format!("{job_id}/{url_hash}")
    }

    // ========================================================================
    // JOBS
    // ========================================================================

    /// Insert or replace a job row. Used for creation and for the
    /// pending -> running transition; terminal writes go through
    /// [`finish_job`](Self::finish_job).
    pub fn put_job(&self, job: &CrawlJob) -> Result<(), StoreError> {
        let key = job.id.to_string();
        let bytes = serde_json::to_vec(job)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(Self::JOBS)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Write a terminal job row unless one already exists. Whichever of
    /// completion, cancellation, or failure lands first sticks; the losers
    /// get `false` back and leave the row alone.
    pub fn finish_job(&self, job: &CrawlJob) -> Result<bool, StoreError> {
        let key = job.id.to_string();
        let write_txn = self.db.begin_write()?;
        let written = {
            let mut table = write_txn.open_table(Self::JOBS)?;
            let current: Option<CrawlJob> = match table.get(key.as_str())? {
                Some(guard) => Some(serde_json::from_slice(guard.value())?),
                None => None,
            };
            match current {
                Some(existing) if existing.status.is_terminal() => false,
                _ => {
                    let bytes = serde_json::to_vec(job)?;
                    table.insert(key.as_str(), bytes.as_slice())?;
                    true
                }
            }
        };
        write_txn.commit()?;
        Ok(written)
    }

    pub fn get_job(&self, job_id: &Uuid) -> Result<Option<CrawlJob>, StoreError> {
        let key = job_id.to_string();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::JOBS)?;
        match table.get(key.as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// All jobs, most recently created first.
    pub fn list_jobs(&self) -> Result<Vec<CrawlJob>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::JOBS)?;

        let mut jobs = Vec::new();
        for entry in table.iter()? {
            let (_key, value) = entry?;
            jobs.push(serde_json::from_slice::<CrawlJob>(value.value())?);
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Remove a job and every result stored under it. Returns whether the
    /// job row existed.
    pub fn delete_job(&self, job_id: &Uuid) -> Result<bool, StoreError> {
        let job_key = job_id.to_string();
        let (start, end) = Self::result_range(job_id);

        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut jobs = write_txn.open_table(Self::JOBS)?;
            let existed = jobs.remove(job_key.as_str())?.is_some();

            let mut results = write_txn.open_table(Self::RESULTS)?;
            let keys: Vec<String> = results
                .range(start.as_str()..end.as_str())?
                .map(|entry| entry.map(|(k, _)| k.value().to_string()))
                .collect::<Result<_, _>>()?;
            for key in keys {
                results.remove(key.as_str())?;
            }
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    // ========================================================================
    // RESULTS
    // ========================================================================

    /// Store one page result. Returns `false` without writing when a result
    /// for this (job, url_hash) already exists.
    pub fn put_result(&self, result: &CrawlResult) -> Result<bool, StoreError> {
        let key = Self::result_key(&result.job_id, &result.url_hash);
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(Self::RESULTS)?;
            if table.get(key.as_str())?.is_some() {
                false
            } else {
                let bytes = serde_json::to_vec(result)?;
                table.insert(key.as_str(), bytes.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    pub fn get_result(
        &self,
        job_id: &Uuid,
        url_hash: &str,
    ) -> Result<Option<CrawlResult>, StoreError> {
        let key = Self::result_key(job_id, url_hash);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::RESULTS)?;
        match table.get(key.as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// All results for a job, in stable key order.
    pub fn results_for_job(&self, job_id: &Uuid) -> Result<Vec<CrawlResult>, StoreError> {
        let (start, end) = Self::result_range(job_id);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::RESULTS)?;

        let mut results = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (_key, value) = entry?;
            results.push(serde_json::from_slice::<CrawlResult>(value.value())?);
        }
        Ok(results)
    }

    /// Page through a job's results in stable key order.
    pub fn results_page(
        &self,
        job_id: &Uuid,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CrawlResult>, StoreError> {
        let (start, end) = Self::result_range(job_id);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::RESULTS)?;

        let mut results = Vec::new();
        for entry in table
            .range(start.as_str()..end.as_str())?
            .skip(offset)
            .take(limit)
        {
            let (_key, value) = entry?;
            results.push(serde_json::from_slice::<CrawlResult>(value.value())?);
        }
        Ok(results)
    }

    pub fn count_results(&self, job_id: &Uuid) -> Result<usize, StoreError> {
        let (start, end) = Self::result_range(job_id);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::RESULTS)?;
        let mut count = 0;
        for entry in table.range(start.as_str()..end.as_str())? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Key range covering exactly `"{job_id}/..."`. `'0'` is the ASCII
    /// character after `'/'`, so the exclusive end bound closes the prefix.
    fn result_range(job_id: &Uuid) -> (String, String) {
        (format!("{job_id}/"), format!("{job_id}0"))
    }
}
