//! HTTP surface of the job gateway.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pal_backends::RegistryError;
use pal_model::SimRequest;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::gateway::JobGateway;

/// Body of `POST /sim/run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunBody {
    pub request: SimRequest,
    /// `category/name` or a bare registered name.
    pub backend: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitted {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

const DEFAULT_LIST_LIMIT: usize = 50;

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::NotFound { .. } | GatewayError::Registry(RegistryError::NotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            GatewayError::NotReady { .. } => StatusCode::CONFLICT,
            GatewayError::Registry(_) => StatusCode::BAD_REQUEST,
            GatewayError::Config { .. } | GatewayError::NoRuntime | GatewayError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn router(gateway: JobGateway) -> Router {
    Router::new()
        .route("/sim/run", post(submit))
        .route("/sim/list", get(list))
        .route("/sim/results", get(stored))
        .route("/sim/:job_id", get(status))
        .route("/sim/:job_id/result", get(result).delete(delete_stored))
        .route("/sim/:job_id/cancel", post(cancel))
        .route("/health", get(health))
        .with_state(gateway)
}

async fn submit(State(gateway): State<JobGateway>, Json(body): Json<RunBody>) -> Result<Response, GatewayError> {
    let backend = gateway.resolve_selector(&body.backend)?;
    let job_id = gateway.submit(body.request, backend)?;
    Ok((StatusCode::ACCEPTED, Json(Submitted { job_id })).into_response())
}

async fn list(State(gateway): State<JobGateway>, Query(params): Query<ListParams>) -> impl IntoResponse {
    Json(gateway.list(Some(params.limit.unwrap_or(DEFAULT_LIST_LIMIT))))
}

async fn status(State(gateway): State<JobGateway>, Path(job_id): Path<String>) -> Result<Response, GatewayError> {
    Ok(Json(gateway.status(&job_id)?).into_response())
}

async fn result(State(gateway): State<JobGateway>, Path(job_id): Path<String>) -> Result<Response, GatewayError> {
    // Results of earlier processes are read from disk.
    match tokio::task::spawn_blocking(move || gateway.result(&job_id)).await {
        Ok(result) => Ok(Json(result?.as_ref()).into_response()),
        Err(e) => Ok(join_failure(e)),
    }
}

async fn stored(State(gateway): State<JobGateway>) -> Result<Response, GatewayError> {
    match tokio::task::spawn_blocking(move || gateway.stored_results()).await {
        Ok(manifests) => Ok(Json(manifests?).into_response()),
        Err(e) => Ok(join_failure(e)),
    }
}

async fn delete_stored(
    State(gateway): State<JobGateway>,
    Path(job_id): Path<String>,
) -> Result<Response, GatewayError> {
    match tokio::task::spawn_blocking(move || gateway.delete_stored(&job_id)).await {
        Ok(deleted) => {
            deleted?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Err(e) => Ok(join_failure(e)),
    }
}

async fn cancel(State(gateway): State<JobGateway>, Path(job_id): Path<String>) -> Result<Response, GatewayError> {
    Ok(Json(gateway.cancel(&job_id)?).into_response())
}

async fn health(State(gateway): State<JobGateway>) -> impl IntoResponse {
    // Probes touch the filesystem.
    match tokio::task::spawn_blocking(move || gateway.health()).await {
        Ok(health) => Json(health).into_response(),
        Err(e) => join_failure(e),
    }
}

fn join_failure(e: tokio::task::JoinError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody { error: e.to_string() }),
    )
        .into_response()
}
