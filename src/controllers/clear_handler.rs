use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AppState;
use crate::models::routine_model::{ClearSlotRequest, RoutineError, SectionPath};
use axum::debug_handler;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use scheduler::{ClearOutcome, ElectiveGroupId, SectionKey, SpanId};
use tracing::debug;
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/v1/clear/slot",
    request_body(
        content = ClearSlotRequest,
        description = "Cell to clear"
    ),
    responses(
        (status = 200, description = "Removed rows", body = ClearOutcome),
        (status = 404, description = "Cell is empty", body = RoutineError),
        (status = 422, description = "Cell holds a span or elective member", body = RoutineError),
    )
)]
#[debug_handler]
/// Clears one cell
///
/// This function is a handler for the route `POST /api/v1/clear/slot`. It removes a plain class
/// or both lab rows of the cell. Cells that belong to a span or an elective are refused; clear
/// those through their group.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `request` - Section, day and slot of the cell
///
/// # Returns
/// `Response` with a status code of 200 OK and the removed assignment ids.
///
/// # Errors
/// This function returns a 404 error if the cell is already empty, and a 422 error if it
/// holds a span or elective member.
pub async fn clear_slot(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<ClearSlotRequest>,
) -> Response {
    debug!("Received request to clear {:?}", request);
    let app_state_lock = app_state.read().await;

    match app_state_lock
        .service
        .clear_slot(&request.section, request.day, request.slot_id)
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/spans/{span_id}",
    params(
        ("span_id" = Uuid, Path, description = "Span group id")
    ),
    responses(
        (status = 200, description = "Removed rows", body = ClearOutcome),
        (status = 404, description = "Span no longer exists", body = RoutineError),
        (status = 422, description = "Span belongs to an elective or its rows are no longer intact", body = RoutineError),
    )
)]
#[debug_handler]
/// Clears a span group
///
/// This function is a handler for the route `DELETE /api/v1/spans/{span_id}`. Every period of
/// the span is removed, and the other group's span too when the span is one half of a
/// two-group lab.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `span_id` - The span group id
///
/// # Returns
/// `Response` with a status code of 200 OK and the removed assignment ids.
///
/// # Errors
/// This function returns a 404 error if the span was already cleared, and a 422 error if it
/// belongs to an elective or its stored periods no longer form a whole span.
pub async fn clear_span(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path(span_id): Path<Uuid>,
) -> Response {
    let app_state_lock = app_state.read().await;

    match app_state_lock.service.clear_span(SpanId(span_id)).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/electives/{group_id}",
    params(
        ("group_id" = Uuid, Path, description = "Elective group id")
    ),
    responses(
        (status = 200, description = "Removed rows in every section", body = ClearOutcome),
        (status = 404, description = "Elective no longer exists", body = RoutineError),
    )
)]
#[debug_handler]
/// Clears an elective offering
///
/// This function is a handler for the route `DELETE /api/v1/electives/{group_id}`. The copies
/// of the elective in every target section are removed together.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `group_id` - The elective group id
///
/// # Returns
/// `Response` with a status code of 200 OK, the removed assignment ids and the sections whose
/// grids changed.
///
/// # Errors
/// This function returns a 404 error if the elective was already cleared.
pub async fn clear_elective(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path(group_id): Path<Uuid>,
) -> Response {
    let app_state_lock = app_state.read().await;

    match app_state_lock.service.clear_elective(ElectiveGroupId(group_id)).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/routine/{program_code}/{semester}/{section}",
    params(SectionPath),
    responses(
        (status = 200, description = "Removed rows", body = ClearOutcome),
        (status = 404, description = "Section routine is already empty", body = RoutineError),
    )
)]
#[debug_handler]
/// Clears a section's whole week
///
/// This function is a handler for the route
/// `DELETE /api/v1/routine/{program_code}/{semester}/{section}`. Electives the section takes
/// part in are removed from their other sections as well; those sections are listed in the
/// outcome.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `section` - Program code, semester and section name
///
/// # Returns
/// `Response` with a status code of 200 OK and the removed assignment ids.
///
/// # Errors
/// This function returns a 404 error if the section has nothing to clear.
pub async fn clear_section(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path(section): Path<SectionPath>,
) -> Response {
    let section = SectionKey::from(section);
    debug!("Received request to clear section {}", section);
    let app_state_lock = app_state.read().await;

    match app_state_lock.service.clear_section(&section).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}
