//! Testdeck -- organize executable test scenarios into services and run
//! them against an external executor.
//!
//! This crate provides the run-execution pipeline (bundle assembly, executor
//! client, report classification, result recording) plus the storage and API
//! layers around it.

pub mod api;
pub mod config;
pub mod run;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;

use crate::api::state::AppState;
use crate::config::Config;
use crate::run::executor::ExecutionClient;
use crate::run::recorder::ResultRecorder;

/// Start the testdeck daemon: API server backed by the run pipeline.
pub async fn serve(config: Config) -> Result<()> {
    if let Some(parent) = std::path::Path::new(&config.storage.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    tracing::info!(db_path = %config.storage.db_path, "Initializing database");
    let pool = storage::open_pool(&config.storage.db_path)?;

    let executor = Arc::new(ExecutionClient::new(config.executor_config()));
    tracing::info!(
        url = %config.executor.url,
        timeout_secs = executor.timeout().as_secs(),
        "Executor client ready"
    );

    let state = AppState {
        pool: pool.clone(),
        executor,
        recorder: Arc::new(ResultRecorder::new(pool)),
    };

    let addr: std::net::SocketAddr = config.server.bind.parse()?;
    let app = api::router(state);

    tracing::info!(%addr, "Testdeck listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
