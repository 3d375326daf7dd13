//! HTTP handlers and wire types.
//!
//! The wire contract mirrors the upstream dashboard's expectations: a
//! records-oriented dataset in, a serialized execution result out. Every
//! script-level failure is an HTTP 200 with a non-success status — those
//! are first-class results the reviewer acts on. Only malformed requests
//! (400), backpressure (429), and infrastructure failures (500) use error
//! status codes.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::policy::{self, Violation};
use crate::table::{Cell, Table};
use crate::workbench::{self, ExecutionResult, ExecutionStatus};

use super::AppState;

/// Submitted code larger than this is rejected before scanning; planner
/// steps are a few lines, so anything near this size is garbage or abuse.
const MAX_CODE_BYTES: usize = 64 * 1024;

/// Extra wall-clock grace the gateway allows the workbench beyond the
/// script deadline before declaring the worker lost.
const BACKSTOP_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Dataset as a JSON array of row objects.
    pub dataframe: JsonValue,
    /// The transformation script to run.
    pub code: String,
    /// Optional scalar parameters, bound to `params` in the namespace.
    #[serde(default)]
    pub params: serde_json::Map<String, JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataframe: Option<JsonValue>,
    pub diagnostics: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type Rejection = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: String) -> Rejection {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message }),
    )
}

pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, Rejection> {
    let request_id = Uuid::new_v4();

    // ── Shape validation (MalformedRequest, before the scanner) ──
    if request.code.len() > MAX_CODE_BYTES {
        return Err(bad_request(format!(
            "code is {} bytes, over the {MAX_CODE_BYTES}-byte limit",
            request.code.len()
        )));
    }
    let dataset = Table::from_records(&request.dataframe)
        .map_err(|e| bad_request(format!("invalid dataset: {e}")))?;
    if dataset.cell_count() as u64 > state.limits.max_cells {
        return Err(bad_request(format!(
            "input dataset has {} cells, over the {}-cell limit",
            dataset.cell_count(),
            state.limits.max_cells
        )));
    }
    let params = convert_params(&request.params)?;

    info!(
        %request_id,
        rows = dataset.n_rows(),
        cols = dataset.n_cols(),
        code_bytes = request.code.len(),
        "Handling execution request"
    );

    // ── Layer one: static policy scan ──
    let decision = policy::scan(&request.code);
    if !decision.allowed {
        warn!(
            %request_id,
            violations = decision.violations.len(),
            "Policy scan rejected code: {}",
            decision.summary()
        );
        let result = ExecutionResult::policy_rejected(&decision);
        return Ok(Json(ExecuteResponse {
            status: result.status,
            dataframe: None,
            diagnostics: result.diagnostics,
            violations: decision.violations,
        }));
    }

    // ── Worker permit with bounded queueing ──
    let permit = match tokio::time::timeout(
        state.queue_wait,
        state.permits.clone().acquire_owned(),
    )
    .await
    {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => {
            error!(%request_id, "Worker semaphore closed");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "execution workers unavailable".to_string(),
                }),
            ));
        }
        Err(_) => {
            warn!(%request_id, "All execution workers busy, applying backpressure");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse {
                    error: "all execution workers are busy; retry shortly".to_string(),
                }),
            ));
        }
    };

    // ── Layer two: workbench under limits ──
    let limits = state.limits.clone();
    let workshop = state.workshop;
    let code = request.code;
    let backstop = limits.timeout + BACKSTOP_GRACE;
    let worker = tokio::task::spawn_blocking(move || {
        let result = workbench::execute(&code, dataset, params, workshop, &limits);
        // Permit released only after the workbench fully unwound, so the
        // slot never returns to the pool with work still running
        drop(permit);
        result
    });

    let result = match tokio::time::timeout(backstop, worker).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            // A worker panic is an infrastructure failure; the detail goes
            // to the log, not to the caller
            error!(%request_id, "Execution worker failed: {join_error}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "execution worker failed".to_string(),
                }),
            ));
        }
        Err(_) => {
            warn!(%request_id, "Workbench missed its deadline, abandoning worker");
            ExecutionResult {
                status: ExecutionStatus::Timeout,
                output: None,
                diagnostics: format!(
                    "execution did not finish within the {} ms wall-clock budget and was cancelled",
                    state.limits.timeout.as_millis()
                ),
            }
        }
    };

    info!(%request_id, status = ?result.status, "Request finished");
    Ok(Json(ExecuteResponse {
        status: result.status,
        dataframe: result.output.map(|table| table.to_records()),
        diagnostics: result.diagnostics,
        violations: Vec::new(),
    }))
}

fn convert_params(
    params: &serde_json::Map<String, JsonValue>,
) -> Result<Vec<(String, Cell)>, Rejection> {
    let mut converted = Vec::with_capacity(params.len());
    for (name, value) in params {
        let cell = Cell::from_scalar_json(value)
            .ok_or_else(|| bad_request(format!("parameter '{name}' must be a scalar")))?;
        converted.push((name.clone(), cell));
    }
    Ok(converted)
}

// ── Liveness and status ──────────────────────────────────

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub started_at: String,
    pub uptime_seconds: u64,
    pub workers_available: usize,
    pub libraries: Vec<LibraryInfo>,
}

#[derive(Debug, Serialize)]
pub struct LibraryInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub functions: Vec<&'static str>,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let libraries = state
        .workshop
        .names()
        .into_iter()
        .filter_map(|name| state.workshop.get(name))
        .map(|lib| LibraryInfo {
            name: lib.name(),
            description: lib.description(),
            functions: lib.functions().to_vec(),
        })
        .collect();

    Json(StatusResponse {
        service: "sentinel-runner",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at_utc.to_rfc3339(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        workers_available: state.permits.available_permits(),
        libraries,
    })
}
