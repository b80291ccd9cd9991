//! Persists one immutable result record per execution attempt.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::executor::ExecutionEnvelope;
use super::{RunScope, RunStatus};
use crate::storage::results::{self, ResultRecord};
use crate::storage::Pool;

/// Injected time source so recorded timestamps are deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Identifiers of the triggering request, carried into the result record.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub scope: Option<RunScope>,
    pub service_id: Option<i64>,
    pub service_name: Option<String>,
    pub scenario_id: Option<i64>,
    pub scenario_title: Option<String>,
    pub service_full_run: Option<bool>,
    pub report_url: Option<String>,
}

pub struct ResultRecorder {
    pool: Pool,
    clock: Arc<dyn Clock>,
}

impl ResultRecorder {
    pub fn new(pool: Pool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: Pool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Record one execution attempt. Every attempt gets a fresh run id;
    /// nothing is deduplicated or updated here, only inserted.
    ///
    /// Callers treat a failure as non-fatal: log it and return the run
    /// outcome regardless.
    pub fn record(
        &self,
        ctx: RunContext,
        envelope: &ExecutionEnvelope,
        status: RunStatus,
        duration: Duration,
    ) -> Result<ResultRecord> {
        let record = ResultRecord {
            id: 0,
            run_id: Uuid::new_v4().to_string(),
            scope: ctx.scope.unwrap_or(RunScope::Scenario),
            service_id: ctx.service_id,
            service_name: ctx.service_name,
            scenario_id: ctx.scenario_id,
            scenario_title: ctx.scenario_title,
            service_full_run: ctx.service_full_run,
            status: status.as_str().to_string(),
            duration_ms: duration.as_millis() as i64,
            report_url: ctx.report_url,
            error: envelope.error.clone(),
            http_status: envelope.http_status,
            stdout: envelope.stdout.clone(),
            stderr: envelope.stderr.clone(),
            report: envelope.report_json(),
            created_at: self.clock.now(),
        };

        let saved = results::insert(&self.pool, record)?;
        tracing::info!(
            run_id = %saved.run_id,
            scope = %saved.scope,
            status = %saved.status,
            duration_ms = saved.duration_ms,
            "Stored run result"
        );
        Ok(saved)
    }
}
