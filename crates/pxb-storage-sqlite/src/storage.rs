use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pxb_core::{
    AnalysisRecord, AnalysisResult, Artifacts, BatchJob, InfrastructureReport, JobId, JobStatus,
    ResourceDescriptor, ResourceKind,
};
use pxb_storage::JobStore;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// SQLite-backed job store. Statements run on the blocking pool behind a single
/// connection, so concurrent writers from different jobs are serialized.
#[derive(Clone)]
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

const JOB_COLUMNS: &str =
    "id, started_at, completed_at, status, total_resources, processed_resources, error_message";

const ANALYSIS_COLUMNS: &str = "batch_job_id, resource_id, resource_name, resource_kind, node, status, config_json,
     analysis, security_review, optimization_recommendations, infra_template, config_template, error, analyzed_at";

impl SqliteJobStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(db_path).with_context(|| format!("open sqlite db {}", db_path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("open in-memory sqlite db")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let init_sql = include_str!("../migrations/0001_init.sql");
        conn.execute_batch(init_sql).context("apply schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| anyhow!("sqlite connection lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("sqlite worker task failed")?
    }

    /// Fixed-width ISO-8601 so lexical order matches time order.
    fn ts(t: DateTime<Utc>) -> String {
        t.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn row_to_job(r: &Row<'_>) -> rusqlite::Result<BatchJob> {
        let completed_at = match r.get::<_, Option<String>>(2)? {
            Some(raw) => Some(Self::parse_ts(2, raw)?),
            None => None,
        };
        let status_raw: String = r.get(3)?;
        let status = JobStatus::parse(&status_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, format!("unknown job status {status_raw}").into())
        })?;
        Ok(BatchJob {
            job_id: JobId(r.get(0)?),
            started_at: Self::parse_ts(1, r.get(1)?)?,
            completed_at,
            status,
            total_resources: r.get::<_, i64>(4)? as usize,
            processed_resources: r.get::<_, i64>(5)? as usize,
            error_message: r.get(6)?,
        })
    }

    fn row_to_analysis(r: &Row<'_>) -> rusqlite::Result<AnalysisRecord> {
        let kind_raw: String = r.get(3)?;
        let kind = ResourceKind::parse(&kind_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, format!("unknown resource kind {kind_raw}").into())
        })?;
        let config_json: String = r.get(6)?;
        let config: serde_json::Value = serde_json::from_str(&config_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
        let resource = ResourceDescriptor {
            id: r.get(1)?,
            name: r.get(2)?,
            kind,
            location: r.get(4)?,
            status: r.get(5)?,
            config,
        };
        let artifacts = Artifacts {
            analysis: r.get(7)?,
            security_review: r.get(8)?,
            optimization_recommendations: r.get(9)?,
            infra_template: r.get(10)?,
            config_template: r.get(11)?,
        };
        let error: i64 = r.get(12)?;
        Ok(AnalysisRecord {
            job_id: JobId(r.get(0)?),
            result: AnalysisResult::restore(resource, artifacts, error != 0),
            analyzed_at: Self::parse_ts(13, r.get(13)?)?,
        })
    }

    fn load_job(conn: &Connection, job_id: JobId) -> Result<Option<BatchJob>> {
        let job = conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM batch_jobs WHERE id=?1"),
                params![job_id.0],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    /// Explain why a guarded update touched no rows.
    fn rejected(conn: &Connection, job_id: JobId, processed: usize) -> anyhow::Error {
        match Self::load_job(conn, job_id) {
            Ok(None) => anyhow!("job {job_id} not found"),
            Ok(Some(job)) if job.status != JobStatus::Running => {
                anyhow!("job {job_id} is {} and can no longer change", job.status.as_str())
            }
            Ok(Some(job)) => anyhow!(
                "job {job_id}: invalid progress {processed} (current {}, total {})",
                job.processed_resources,
                job.total_resources
            ),
            Err(e) => e,
        }
    }

    fn finish(
        conn: &Connection,
        job_id: JobId,
        processed: usize,
        status: JobStatus,
        message: Option<&str>,
    ) -> Result<()> {
        let changed = conn.execute(
            "UPDATE batch_jobs SET status=?2, processed_resources=?3, completed_at=?4, error_message=?5
             WHERE id=?1 AND status='running' AND ?3 >= processed_resources AND ?3 <= total_resources",
            params![job_id.0, status.as_str(), processed as i64, Self::ts(Utc::now()), message],
        )?;
        if changed == 0 {
            return Err(Self::rejected(conn, job_id, processed));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create_job(&self, total_resources: usize) -> Result<BatchJob> {
        self.with_conn(move |conn| {
            let started_at = Utc::now();
            conn.execute(
                "INSERT INTO batch_jobs(started_at, status, total_resources, processed_resources) VALUES (?1, ?2, ?3, 0)",
                params![Self::ts(started_at), JobStatus::Running.as_str(), total_resources as i64],
            )?;
            let job_id = JobId(conn.last_insert_rowid());
            Self::load_job(conn, job_id)?.ok_or_else(|| anyhow!("job {job_id} vanished after insert"))
        })
        .await
    }

    async fn update_progress(&self, job_id: JobId, processed: usize) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE batch_jobs SET processed_resources=?2
                 WHERE id=?1 AND status='running' AND ?2 >= processed_resources AND ?2 <= total_resources",
                params![job_id.0, processed as i64],
            )?;
            if changed == 0 {
                return Err(Self::rejected(conn, job_id, processed));
            }
            Ok(())
        })
        .await
    }

    async fn complete_job(&self, job_id: JobId, processed: usize) -> Result<()> {
        self.with_conn(move |conn| Self::finish(conn, job_id, processed, JobStatus::Completed, None))
            .await
    }

    async fn fail_job(&self, job_id: JobId, processed: usize, message: &str) -> Result<()> {
        let message = message.to_string();
        self.with_conn(move |conn| Self::finish(conn, job_id, processed, JobStatus::Failed, Some(&message)))
            .await
    }

    async fn save_analysis(&self, job_id: JobId, result: &AnalysisResult) -> Result<()> {
        let result = result.clone();
        self.with_conn(move |conn| {
            let res = result.resource();
            let art = result.artifacts();
            let config_json = serde_json::to_string(&res.config)?;
            conn.execute(
                &format!(
                    "INSERT INTO resource_analyses({ANALYSIS_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                     ON CONFLICT(batch_job_id, resource_id) DO UPDATE SET
                       resource_name=excluded.resource_name,
                       resource_kind=excluded.resource_kind,
                       node=excluded.node,
                       status=excluded.status,
                       config_json=excluded.config_json,
                       analysis=excluded.analysis,
                       security_review=excluded.security_review,
                       optimization_recommendations=excluded.optimization_recommendations,
                       infra_template=excluded.infra_template,
                       config_template=excluded.config_template,
                       error=excluded.error,
                       analyzed_at=excluded.analyzed_at"
                ),
                params![
                    job_id.0,
                    res.id,
                    res.name,
                    res.kind.as_str(),
                    res.location,
                    res.status,
                    config_json,
                    art.analysis,
                    art.security_review,
                    art.optimization_recommendations,
                    art.infra_template,
                    art.config_template,
                    result.is_error() as i64,
                    Self::ts(Utc::now()),
                ],
            )
            .with_context(|| format!("save analysis for resource {} in job {job_id}", res.id))?;
            Ok(())
        })
        .await
    }

    async fn save_report(&self, job_id: JobId, report_type: &str, content: &str) -> Result<()> {
        let report_type = report_type.to_string();
        let content = content.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO infrastructure_reports(batch_job_id, report_type, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![job_id.0, report_type, content, Self::ts(Utc::now())],
            )
            .with_context(|| format!("save {report_type} report for job {job_id}"))?;
            Ok(())
        })
        .await
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<BatchJob>> {
        self.with_conn(move |conn| Self::load_job(conn, job_id)).await
    }

    async fn list_jobs(&self) -> Result<Vec<BatchJob>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM batch_jobs ORDER BY started_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([], Self::row_to_job)?;
            let mut jobs = vec![];
            for row in rows {
                jobs.push(row?);
            }
            Ok(jobs)
        })
        .await
    }

    async fn list_analyses(&self, job_id: JobId) -> Result<Vec<AnalysisRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ANALYSIS_COLUMNS} FROM resource_analyses WHERE batch_job_id=?1 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![job_id.0], Self::row_to_analysis)?;
            let mut out = vec![];
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    async fn get_analysis(&self, job_id: JobId, resource_id: &str) -> Result<Option<AnalysisRecord>> {
        let resource_id = resource_id.to_string();
        self.with_conn(move |conn| {
            let rec = conn
                .query_row(
                    &format!(
                        "SELECT {ANALYSIS_COLUMNS} FROM resource_analyses WHERE batch_job_id=?1 AND resource_id=?2"
                    ),
                    params![job_id.0, resource_id],
                    Self::row_to_analysis,
                )
                .optional()?;
            Ok(rec)
        })
        .await
    }

    async fn list_reports(&self, job_id: JobId) -> Result<Vec<InfrastructureReport>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT batch_job_id, report_type, content, created_at FROM infrastructure_reports
                 WHERE batch_job_id=?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![job_id.0], |r| {
                Ok(InfrastructureReport {
                    job_id: JobId(r.get(0)?),
                    report_type: r.get(1)?,
                    content: r.get(2)?,
                    created_at: Self::parse_ts(3, r.get(3)?)?,
                })
            })?;
            let mut out = vec![];
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    async fn abandon_running(&self, reason: &str) -> Result<Vec<JobId>> {
        let reason = reason.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let ids = {
                let mut stmt = tx.prepare("SELECT id FROM batch_jobs WHERE status='running' ORDER BY id")?;
                let rows = stmt.query_map([], |r| r.get::<_, i64>(0))?;
                let mut ids = vec![];
                for row in rows {
                    ids.push(JobId(row?));
                }
                ids
            };
            let changed = tx.execute(
                "UPDATE batch_jobs SET status='failed', completed_at=?1, error_message=?2 WHERE status='running'",
                params![Self::ts(Utc::now()), reason],
            )?;
            if changed != ids.len() {
                bail!("reconcile touched {changed} jobs, expected {}", ids.len());
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn vm(id: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            id: id.into(),
            name: "web 1".into(),
            kind: ResourceKind::Vm,
            location: "pve1".into(),
            status: "running".into(),
            config: json!({"cores": 4, "net0": "virtio=AA:BB,bridge=vmbr0"}),
        }
    }

    #[tokio::test]
    async fn sqlite_open_and_migrate() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("pxb.db");
        let _ = SqliteJobStore::open(&db_path).unwrap();
        // reopening re-applies the idempotent schema
        let store = SqliteJobStore::open(&db_path).unwrap();
        assert!(store.list_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn job_lifecycle_round_trips() {
        let dir = tempdir().unwrap();
        let store = SqliteJobStore::open(&dir.path().join("pxb.db")).unwrap();

        let job = store.create_job(2).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        store.update_progress(job.job_id, 1).await.unwrap();
        store.complete_job(job.job_id, 2).await.unwrap();

        let job = store.get_job(job.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_resources, 2);
        assert!(job.completed_at.is_some());
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn progress_guard_rejects_regression_and_overflow() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let job = store.create_job(3).await.unwrap();
        store.update_progress(job.job_id, 2).await.unwrap();

        let err = store.update_progress(job.job_id, 1).await.unwrap_err();
        assert!(err.to_string().contains("invalid progress"));
        assert!(store.update_progress(job.job_id, 4).await.is_err());
        assert!(store.update_progress(JobId(999), 1).await.unwrap_err().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn terminal_jobs_reject_further_changes() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let job = store.create_job(1).await.unwrap();
        store.fail_job(job.job_id, 0, "store unavailable").await.unwrap();

        assert!(store.complete_job(job.job_id, 1).await.is_err());
        assert!(store.update_progress(job.job_id, 1).await.is_err());
        let job = store.get_job(job.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("store unavailable"));
    }

    #[tokio::test]
    async fn analysis_rows_upsert_per_resource() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let job = store.create_job(2).await.unwrap();

        let mut artifacts = Artifacts::analysis_only("first pass");
        artifacts.infra_template = Some("resource \"proxmox_vm_qemu\" \"web\" {}".into());
        store.save_analysis(job.job_id, &AnalysisResult::success(vm("100"), artifacts)).await.unwrap();
        store.save_analysis(job.job_id, &AnalysisResult::failed(vm("101"), "Error: timeout")).await.unwrap();
        store
            .save_analysis(job.job_id, &AnalysisResult::success(vm("100"), Artifacts::analysis_only("second pass")))
            .await
            .unwrap();

        let rows = store.list_analyses(job.job_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].result.resource_id(), "100");
        assert_eq!(rows[0].result.artifacts().analysis, "second pass");
        assert_eq!(rows[0].result.artifacts().infra_template, None);
        assert_eq!(rows[0].result.resource().config["cores"], 4);
        assert!(rows[1].result.is_error());

        let one = store.get_analysis(job.job_id, "101").await.unwrap().unwrap();
        assert_eq!(one.result.artifacts().analysis, "Error: timeout");
    }

    #[tokio::test]
    async fn corrupt_rows_are_reported_not_masked() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let job = store.create_job(1).await.unwrap();
        store
            .save_analysis(job.job_id, &AnalysisResult::success(vm("100"), Artifacts::analysis_only("ok")))
            .await
            .unwrap();

        let id = job.job_id.0;
        store
            .with_conn(move |conn| {
                conn.execute("UPDATE resource_analyses SET config_json='{not json' WHERE batch_job_id=?1", params![id])?;
                conn.execute("UPDATE batch_jobs SET status='paused' WHERE id=?1", params![id])?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(store.get_analysis(job.job_id, "100").await.is_err());
        assert!(store.list_analyses(job.job_id).await.is_err());
        assert!(store.get_job(job.job_id).await.is_err());
        assert!(store.list_jobs().await.is_err());
    }

    #[tokio::test]
    async fn reports_are_appended() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let job = store.create_job(1).await.unwrap();
        store.save_report(job.job_id, "summary", "two nodes").await.unwrap();
        store.save_report(job.job_id, "summary", "retry").await.unwrap();
        let reports = store.list_reports(job.job_id).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].content, "two nodes");
    }

    #[tokio::test]
    async fn foreign_key_blocks_orphan_rows() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        assert!(store.save_report(JobId(42), "summary", "x").await.is_err());
        assert!(store.save_analysis(JobId(42), &AnalysisResult::failed(vm("1"), "Error: x")).await.is_err());
    }

    #[tokio::test]
    async fn abandon_running_marks_failed() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        let finished = store.create_job(1).await.unwrap();
        store.complete_job(finished.job_id, 1).await.unwrap();
        let stuck = store.create_job(5).await.unwrap();

        let ids = store.abandon_running("abandoned: process exited mid-run").await.unwrap();
        assert_eq!(ids, vec![stuck.job_id]);
        let stuck = store.get_job(stuck.job_id).await.unwrap().unwrap();
        assert_eq!(stuck.status, JobStatus::Failed);
        assert_eq!(stuck.error_message.as_deref(), Some("abandoned: process exited mid-run"));

        let jobs = store.list_jobs().await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, stuck.job_id);
    }
}
