//! API route definitions.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use super::ApiError;
use crate::run::bundle::{self, Asset, RunBundle, ScenarioAssets};
use crate::run::executor::ExecutionEnvelope;
use crate::run::recorder::RunContext;
use crate::run::{report, RunError, RunScope};
use crate::storage::{results, scenarios, services, steps};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/run", post(direct_run))
        .route("/results", get(list_results).post(create_result))
        .route("/services", get(list_services).post(create_service))
        .route(
            "/services/{id}",
            get(get_service).put(update_service).delete(delete_service),
        )
        .route("/services/{id}/run", post(run_service))
        .route(
            "/services/{id}/scenarios",
            get(list_scenarios).post(create_scenario),
        )
        .route(
            "/services/{id}/scenarios/{scenario_id}",
            get(get_scenario).put(update_scenario).delete(delete_scenario),
        )
        .route("/services/{id}/steps", get(list_steps).post(create_step))
        .route(
            "/services/{id}/steps/{step_id}",
            put(update_step).delete(delete_step),
        )
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

// ---------------------------------------------------------------------------
// Run endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RunMetadata {
    pub scope: Option<RunScope>,
    pub service_id: Option<i64>,
    pub scenario_id: Option<i64>,
    pub scenario_title: Option<String>,
    pub service_full_run: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct DirectRunRequest {
    #[serde(default)]
    features: Vec<Asset>,
    #[serde(default)]
    steps: Vec<Asset>,
    metadata: Option<RunMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceRunRequest {
    features: Option<Vec<Asset>>,
    metadata: Option<RunMetadata>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Execute a bundle, classify the outcome, and record it. Recording is
/// best-effort bookkeeping: a persistence failure is logged and the run
/// outcome is returned regardless. Transport failures come back as a
/// failure envelope, never as a bare 5xx.
async fn run_and_record(state: &AppState, bundle: RunBundle, ctx: RunContext) -> Response {
    let started = Instant::now();
    let (envelope, response_code) = match state.executor.execute(&bundle).await {
        Ok(envelope) => {
            let code = envelope
                .http_status
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(StatusCode::OK);
            (envelope, code)
        }
        Err(err) => {
            tracing::warn!(error = %err, "Executor invocation failed");
            (
                ExecutionEnvelope::transport_failure(err.to_string()),
                StatusCode::OK,
            )
        }
    };
    let duration = started.elapsed();

    let status = report::resolve_status(Some(&envelope));
    if let Err(err) = state.recorder.record(ctx, &envelope, status, duration) {
        tracing::warn!(error = %err, "Failed to persist run result");
    }

    (response_code, Json(envelope)).into_response()
}

/// Run an explicit bundle as supplied by the caller.
async fn direct_run(
    State(state): State<AppState>,
    Json(request): Json<DirectRunRequest>,
) -> Result<Response, ApiError> {
    let bundle = RunBundle {
        features: request.features,
        steps: request.steps,
    };
    bundle.validate()?;

    let metadata = request.metadata.unwrap_or_default();
    let scenario_title = non_blank(metadata.scenario_title)
        .or_else(|| non_blank(bundle.features.first().and_then(|f| f.name.clone())));

    let ctx = RunContext {
        scope: metadata.scope,
        service_id: metadata.service_id,
        scenario_id: metadata.scenario_id,
        scenario_title,
        service_full_run: metadata.service_full_run,
        ..Default::default()
    };

    Ok(run_and_record(&state, bundle, ctx).await)
}

/// Run one scenario of a service (explicit features) or the whole service.
async fn run_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<ServiceRunRequest>>,
) -> Result<Response, ApiError> {
    let svc = services::get(&state.pool, id)?;
    let stored = scenarios::list_by_service(&state.pool, id)?;
    let library = steps::list_by_service(&state.pool, id)?;

    let scenario_assets: Vec<ScenarioAssets> = stored
        .iter()
        .map(|sc| ScenarioAssets {
            features: sc.features.clone(),
            steps: sc.steps.clone(),
        })
        .collect();
    let library_assets: Vec<Asset> = library
        .iter()
        .map(|s| Asset {
            name: s.name.clone(),
            content: s.content.clone(),
        })
        .collect();

    let request = body.map(|Json(b)| b).unwrap_or_default();
    let (run_bundle, scope) = bundle::assemble(request.features, &scenario_assets, &library_assets);
    let metadata = request.metadata.unwrap_or_default();
    let full_run = scope == RunScope::Service;

    let scenario_title = if full_run {
        None
    } else {
        non_blank(metadata.scenario_title).or_else(|| {
            metadata
                .scenario_id
                .and_then(|sid| stored.iter().find(|sc| sc.id == sid))
                .map(|sc| sc.title.clone())
                .or_else(|| non_blank(run_bundle.features.first().and_then(|f| f.name.clone())))
        })
    };

    let ctx = RunContext {
        scope: Some(scope),
        service_id: Some(svc.id),
        service_name: Some(svc.name.clone()),
        scenario_id: metadata.scenario_id,
        scenario_title,
        service_full_run: Some(full_run),
        ..Default::default()
    };

    Ok(run_and_record(&state, run_bundle, ctx).await)
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    limit: Option<u32>,
}

async fn list_results(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let records = results::list(&state.pool, query.limit)?;
    let total = records.len();
    Ok(Json(json!({ "data": records, "meta": { "total": total } })))
}

#[derive(Debug, Deserialize)]
struct ResultIngest {
    run_id: Option<String>,
    scope: Option<RunScope>,
    service_id: Option<i64>,
    service_name: Option<String>,
    scenario_id: Option<i64>,
    scenario_title: Option<String>,
    service_full_run: Option<bool>,
    status: String,
    #[serde(default)]
    duration_ms: i64,
    report_url: Option<String>,
    error: Option<String>,
    stdout: Option<String>,
    stderr: Option<String>,
    report: Option<Value>,
}

/// Ingest a result produced outside the run pipeline: an external runner
/// posting its own outcome, report link included. A missing run id gets a
/// fresh one.
async fn create_result(
    State(state): State<AppState>,
    Json(request): Json<ResultIngest>,
) -> Result<(StatusCode, Json<results::ResultRecord>), ApiError> {
    if request.status.trim().is_empty() {
        return Err(RunError::Validation("status must not be blank".into()).into());
    }

    let record = results::ResultRecord {
        id: 0,
        run_id: request
            .run_id
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        scope: request.scope.unwrap_or(RunScope::Scenario),
        service_id: request.service_id,
        service_name: request.service_name,
        scenario_id: request.scenario_id,
        scenario_title: request.scenario_title,
        service_full_run: request.service_full_run,
        status: request.status.trim().to_string(),
        duration_ms: request.duration_ms,
        report_url: request.report_url,
        error: request.error,
        http_status: None,
        stdout: request.stdout,
        stderr: request.stderr,
        report: request.report.map(|r| r.to_string()),
        created_at: chrono::Utc::now(),
    };

    let saved = results::insert(&state.pool, record)?;
    Ok((StatusCode::CREATED, Json(saved)))
}

// ---------------------------------------------------------------------------
// Service CRUD
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ServiceRequest {
    name: String,
    description: Option<String>,
}

async fn list_services(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let all = services::list(&state.pool)?;
    let total = all.len();
    Ok(Json(json!({ "data": all, "meta": { "total": total } })))
}

async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<services::Service>, ApiError> {
    Ok(Json(services::get(&state.pool, id)?))
}

async fn create_service(
    State(state): State<AppState>,
    Json(request): Json<ServiceRequest>,
) -> Result<(StatusCode, Json<services::Service>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(RunError::Validation("service name must not be blank".into()).into());
    }
    let svc = services::create(&state.pool, &request.name, request.description.as_deref())?;
    Ok((StatusCode::CREATED, Json(svc)))
}

async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ServiceRequest>,
) -> Result<Json<services::Service>, ApiError> {
    let svc = services::update(&state.pool, id, &request.name, request.description.as_deref())?;
    Ok(Json(svc))
}

async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    services::delete(&state.pool, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Scenario CRUD
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScenarioRequest {
    title: Option<String>,
    #[serde(default)]
    features: Vec<Asset>,
    #[serde(default)]
    steps: Vec<Asset>,
}

async fn list_scenarios(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    services::get(&state.pool, id)?;
    let all = scenarios::list_by_service(&state.pool, id)?;
    let total = all.len();
    Ok(Json(json!({ "data": all, "meta": { "total": total } })))
}

async fn get_scenario(
    State(state): State<AppState>,
    Path((id, scenario_id)): Path<(i64, i64)>,
) -> Result<Json<scenarios::Scenario>, ApiError> {
    services::get(&state.pool, id)?;
    Ok(Json(scenarios::get(&state.pool, id, scenario_id)?))
}

async fn create_scenario(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ScenarioRequest>,
) -> Result<(StatusCode, Json<scenarios::Scenario>), ApiError> {
    services::get(&state.pool, id)?;
    let sc = scenarios::create(
        &state.pool,
        id,
        request.title.as_deref(),
        &request.features,
        &request.steps,
    )?;
    Ok((StatusCode::CREATED, Json(sc)))
}

async fn update_scenario(
    State(state): State<AppState>,
    Path((id, scenario_id)): Path<(i64, i64)>,
    Json(request): Json<ScenarioRequest>,
) -> Result<Json<scenarios::Scenario>, ApiError> {
    services::get(&state.pool, id)?;
    let sc = scenarios::update(
        &state.pool,
        id,
        scenario_id,
        request.title.as_deref(),
        &request.features,
        &request.steps,
    )?;
    Ok(Json(sc))
}

async fn delete_scenario(
    State(state): State<AppState>,
    Path((id, scenario_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    services::get(&state.pool, id)?;
    scenarios::delete(&state.pool, id, scenario_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Step library CRUD
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StepRequest {
    name: Option<String>,
    content: String,
}

async fn list_steps(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    services::get(&state.pool, id)?;
    let all = steps::list_by_service(&state.pool, id)?;
    let total = all.len();
    Ok(Json(json!({ "data": all, "meta": { "total": total } })))
}

async fn create_step(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<StepRequest>,
) -> Result<(StatusCode, Json<steps::ServiceStep>), ApiError> {
    services::get(&state.pool, id)?;
    let step = steps::create(&state.pool, id, request.name.as_deref(), &request.content)?;
    Ok((StatusCode::CREATED, Json(step)))
}

async fn update_step(
    State(state): State<AppState>,
    Path((id, step_id)): Path<(i64, i64)>,
    Json(request): Json<StepRequest>,
) -> Result<Json<steps::ServiceStep>, ApiError> {
    services::get(&state.pool, id)?;
    let step = steps::update(
        &state.pool,
        id,
        step_id,
        request.name.as_deref(),
        &request.content,
    )?;
    Ok(Json(step))
}

async fn delete_step(
    State(state): State<AppState>,
    Path((id, step_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    services::get(&state.pool, id)?;
    steps::delete(&state.pool, id, step_id)?;
    Ok(StatusCode::NO_CONTENT)
}
