//! Append-only store for run result records. Records are inserted and read,
//! never updated.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Pool;
use crate::run::RunScope;

/// The immutable persisted outcome of one execution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRecord {
    pub id: i64,
    pub run_id: String,
    pub scope: RunScope,
    pub service_id: Option<i64>,
    pub service_name: Option<String>,
    pub scenario_id: Option<i64>,
    pub scenario_title: Option<String>,
    pub service_full_run: Option<bool>,
    pub status: String,
    pub duration_ms: i64,
    pub report_url: Option<String>,
    pub error: Option<String>,
    pub http_status: Option<u16>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub report: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn insert(pool: &Pool, mut record: ResultRecord) -> Result<ResultRecord> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO test_results (run_id, scope, service_id, service_name, scenario_id,
                scenario_title, service_full_run, status, duration_ms, report_url, error,
                http_status, stdout, stderr, report_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        rusqlite::params![
            record.run_id,
            record.scope.as_str(),
            record.service_id,
            record.service_name,
            record.scenario_id,
            record.scenario_title,
            record.service_full_run,
            record.status,
            record.duration_ms,
            record.report_url,
            record.error,
            record.http_status,
            record.stdout,
            record.stderr,
            record.report,
            record.created_at.to_rfc3339(),
        ],
    )
    .context("Failed to insert test result")?;
    record.id = conn.last_insert_rowid();
    Ok(record)
}

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResultRecord> {
    let scope: String = row.get(2)?;
    let created_at: String = row.get(16)?;
    Ok(ResultRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        scope: RunScope::parse(&scope).unwrap_or(RunScope::Scenario),
        service_id: row.get(3)?,
        service_name: row.get(4)?,
        scenario_id: row.get(5)?,
        scenario_title: row.get(6)?,
        service_full_run: row.get(7)?,
        status: row.get(8)?,
        duration_ms: row.get(9)?,
        report_url: row.get(10)?,
        error: row.get(11)?,
        http_status: row.get(12)?,
        stdout: row.get(13)?,
        stderr: row.get(14)?,
        report: row.get(15)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
    })
}

/// Result records, newest first.
pub fn list(pool: &Pool, limit: Option<u32>) -> Result<Vec<ResultRecord>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, run_id, scope, service_id, service_name, scenario_id, scenario_title,
                service_full_run, status, duration_ms, report_url, error, http_status,
                stdout, stderr, report_json, created_at
         FROM test_results
         ORDER BY created_at DESC, id DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit.map(i64::from).unwrap_or(-1)], from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;

    fn test_pool() -> (tempfile::TempDir, Pool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.db");
        let pool = storage::open_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    fn record(run_id: &str, created_at: &str) -> ResultRecord {
        ResultRecord {
            id: 0,
            run_id: run_id.into(),
            scope: RunScope::Scenario,
            service_id: None,
            service_name: None,
            scenario_id: None,
            scenario_title: Some("Login".into()),
            service_full_run: None,
            status: "PASSED".into(),
            duration_ms: 10,
            report_url: None,
            error: None,
            http_status: Some(200),
            stdout: Some("ok".into()),
            stderr: None,
            report: None,
            created_at: created_at.parse().unwrap(),
        }
    }

    #[test]
    fn listing_is_newest_first() {
        let (_dir, pool) = test_pool();
        insert(&pool, record("run-1", "2024-05-01T10:00:00Z")).unwrap();
        insert(&pool, record("run-2", "2024-05-01T11:00:00Z")).unwrap();
        insert(&pool, record("run-3", "2024-05-01T09:00:00Z")).unwrap();

        let all = list(&pool, None).unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, ["run-2", "run-1", "run-3"]);

        let limited = list(&pool, Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn duplicate_run_id_is_rejected() {
        let (_dir, pool) = test_pool();
        insert(&pool, record("run-1", "2024-05-01T10:00:00Z")).unwrap();
        assert!(insert(&pool, record("run-1", "2024-05-01T11:00:00Z")).is_err());
    }

    #[test]
    fn fields_round_trip() {
        let (_dir, pool) = test_pool();
        let mut rec = record("run-1", "2024-05-01T10:00:00Z");
        rec.scope = RunScope::Service;
        rec.service_full_run = Some(true);
        rec.report = Some("[{\"elements\":[]}]".into());
        insert(&pool, rec).unwrap();

        let got = &list(&pool, None).unwrap()[0];
        assert_eq!(got.scope, RunScope::Service);
        assert_eq!(got.service_full_run, Some(true));
        assert_eq!(got.report.as_deref(), Some("[{\"elements\":[]}]"));
        assert_eq!(got.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }
}
