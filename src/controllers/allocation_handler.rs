use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AppState;
use crate::models::routine_model::{BatchItem, BatchRequest, CheckResponse, CommitRequest, RoutineError};
use axum::debug_handler;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scheduler::{AllocationOutcome, AllocationRequest};
use tracing::debug;

#[utoipa::path(
    post,
    path = "/api/v1/allocations/check",
    request_body(
        content = AllocationRequest,
        description = "Single, spanned, lab split or elective request"
    ),
    responses(
        (status = 200, description = "Conflicts the request would cause, possibly none", body = CheckResponse),
        (status = 422, description = "Request is invalid", body = RoutineError),
        (status = 500, description = "Routine could not be read", body = RoutineError),
    )
)]
#[debug_handler]
/// Checks a request against the routine without writing
///
/// This function is a handler for the route `POST /api/v1/allocations/check`. It validates the
/// request and lists the teachers, rooms and cells it would collide with.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `request` - The allocation request
///
/// # Returns
/// `Response` with a status code of 200 OK and the conflict list. An empty list means the
/// request can be committed without an override.
///
/// # Errors
/// This function returns a 422 error with field-level detail if the request is invalid.
pub async fn check_allocation(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<AllocationRequest>,
) -> Response {
    debug!("Received {} request to check", request.kind());
    let app_state_lock = app_state.read().await;

    match app_state_lock.service.check_conflicts(&request).await {
        Ok(conflicts) => Json(CheckResponse::from(conflicts)).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/allocations",
    request_body(
        content = CommitRequest,
        description = "Request to write, with the override flag"
    ),
    responses(
        (status = 201, description = "Rows written", body = AllocationOutcome),
        (status = 409, description = "Conflicts need confirmation, or the write was rolled back", body = AllocationOutcome),
        (status = 404, description = "A row being replaced was removed concurrently", body = RoutineError),
        (status = 422, description = "Request is invalid", body = RoutineError),
    )
)]
#[debug_handler]
/// Commits a request
///
/// This function is a handler for the route `POST /api/v1/allocations`. The checks are repeated
/// under the routine's locks; the rows are written in one transaction only when there are no
/// conflicts or `override_conflicts` is set. Rows the request displaces are removed together
/// with the rest of their span, elective or lab pair.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `request` - The allocation request and the override flag
///
/// # Returns
/// `Response` with a status code of 201 Created and the new assignment ids, or 409 Conflict
/// with a `needs_confirmation` outcome listing the conflicts when nothing was written.
///
/// # Errors
/// This function returns an error if:
/// - The request is invalid (422)
/// - A displaced row no longer exists (404); reload the grid and retry
/// - The write failed and was rolled back (409); retry the whole request
pub async fn commit_allocation(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<CommitRequest>,
) -> Response {
    debug!(
        "Received {} request to commit, override: {}",
        request.request.kind(),
        request.override_conflicts
    );
    let app_state_lock = app_state.read().await;

    match app_state_lock
        .service
        .commit(&request.request, request.override_conflicts)
        .await
    {
        Ok(outcome @ AllocationOutcome::Committed { .. }) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Ok(outcome) => (StatusCode::CONFLICT, Json(outcome)).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/allocations/batch",
    request_body(
        content = BatchRequest,
        description = "Requests to commit in order"
    ),
    responses(
        (status = 200, description = "One outcome per request, in request order", body = Vec<BatchItem>),
    )
)]
#[debug_handler]
/// Commits several requests in order
///
/// This function is a handler for the route `POST /api/v1/allocations/batch`, used by bulk
/// importers. Each request is committed on its own, exactly as `POST /api/v1/allocations` would;
/// a failing request does not undo the ones before it.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `request` - The requests and the override flag applied to each of them
///
/// # Returns
/// `Response` with a status code of 200 OK and one item per request holding either its
/// outcome or its error.
pub async fn commit_batch(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<BatchRequest>,
) -> Response {
    debug!("Received batch of {} requests", request.requests.len());
    let app_state_lock = app_state.read().await;

    let items: Vec<BatchItem> = app_state_lock
        .service
        .commit_batch(&request.requests, request.override_conflicts)
        .await
        .into_iter()
        .enumerate()
        .map(|(index, result)| BatchItem::new(index, result))
        .collect();
    Json(items).into_response()
}
