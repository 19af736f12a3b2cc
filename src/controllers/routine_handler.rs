use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AppState;
use crate::models::registry_model::{sections_get, Section};
use crate::models::routine_model::{AvailabilityQuery, ResourceKind, RoutineError, SectionPath};
use axum::debug_handler;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scheduler::{Availability, ClassAssignment, Day, DoubleBooking, RoutineErr, RoutineGrid, SectionKey, SlotId};
use tracing::trace;

#[utoipa::path(
    get,
    path = "/api/v1/sections",
    responses(
        (status = 200, description = "Registered sections", body = Vec<Section>),
        (status = 500, description = "Sections could not be read", body = RoutineError),
    )
)]
#[debug_handler]
/// Lists every registered section
///
/// This function is a handler for the route `GET /api/v1/sections`.
pub async fn sections(State(app_state): State<Arc<RwLock<AppState>>>) -> Response {
    let app_state_lock = app_state.read().await;

    match sections_get(&app_state_lock.routine_data.routine_db).await {
        Ok(sections) => Json(sections).into_response(),
        Err(e) => RoutineError::response(StatusCode::INTERNAL_SERVER_ERROR.into(), e),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/routine/{program_code}/{semester}/{section}",
    params(SectionPath),
    responses(
        (status = 200, description = "Weekly grid of the section", body = RoutineGrid),
        (status = 500, description = "Routine could not be read", body = RoutineError),
    )
)]
#[debug_handler]
/// Gets a section's weekly grid
///
/// This function is a handler for the route `GET /api/v1/routine/{program_code}/{semester}/{section}`.
/// The grid is rebuilt from the stored rows on every call: lab groups sharing a cell are merged
/// (Group A first), span periods are folded into their first cell and break slots always show
/// as breaks.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `section` - Program code, semester and section name
///
/// # Returns
/// `Response` with a status code of 200 OK and the grid. An unknown or empty section gives an
/// empty grid.
pub async fn routine(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path(section): Path<SectionPath>,
) -> Response {
    let section = SectionKey::from(section);
    let app_state_lock = app_state.read().await;

    match app_state_lock.service.grid(&section).await {
        Ok(grid) => Json(grid).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/availability/{kind}/{id}",
    params(
        ("kind" = ResourceKind, Path, description = "teacher or room"),
        ("id" = i32, Path, description = "Teacher or room id"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Whether the resource is free, and who holds it if not", body = Availability),
        (status = 422, description = "Unknown day or slot", body = RoutineError),
    )
)]
#[debug_handler]
/// Checks whether a teacher or room is free at a day and slot
///
/// This function is a handler for the route `GET /api/v1/availability/{kind}/{id}?day=&slot_id=`.
/// Rows in every section count.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `kind`, `id` - The teacher or room
/// - `query` - The day (0 = Sunday .. 5 = Friday) and slot id
///
/// # Returns
/// `Response` with a status code of 200 OK and the availability, listing the rows that hold
/// the resource when it is busy.
///
/// # Errors
/// This function returns a 422 error if the day is out of range or the slot is not in the
/// calendar.
pub async fn availability(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path((kind, id)): Path<(ResourceKind, i32)>,
    Query(query): Query<AvailabilityQuery>,
) -> Response {
    trace!("availability of {:?} {} at {:?}", kind, id, query);
    let day = match Day::try_from(query.day) {
        Ok(day) => day,
        Err(message) => return RoutineError::routine_response(RoutineErr::validation("day", message)),
    };
    let app_state_lock = app_state.read().await;

    match app_state_lock
        .service
        .is_available(kind.resource(id), day, SlotId(query.slot_id))
        .await
    {
        Ok(availability) => Json(availability).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/schedule/{kind}/{id}",
    params(
        ("kind" = ResourceKind, Path, description = "teacher or room"),
        ("id" = i32, Path, description = "Teacher or room id"),
    ),
    responses(
        (status = 200, description = "Rows using the resource, by day then slot", body = Vec<ClassAssignment>),
        (status = 500, description = "Routine could not be read", body = RoutineError),
    )
)]
#[debug_handler]
/// Gets the weekly schedule of a teacher or room
///
/// This function is a handler for the route `GET /api/v1/schedule/{kind}/{id}`.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `kind`, `id` - The teacher or room
///
/// # Returns
/// `Response` with a status code of 200 OK and every row that uses the resource, across all
/// sections, ordered by day and calendar position.
pub async fn resource_schedule(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path((kind, id)): Path<(ResourceKind, i32)>,
) -> Response {
    let app_state_lock = app_state.read().await;

    match app_state_lock.service.resource_schedule(kind.resource(id)).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/audit",
    responses(
        (status = 200, description = "Teachers and rooms used by more than one class at once", body = Vec<DoubleBooking>),
        (status = 500, description = "Routine could not be read", body = RoutineError),
    )
)]
#[debug_handler]
/// Lists double bookings across the whole timetable
///
/// This function is a handler for the route `GET /api/v1/audit`. Conflicts that were overridden
/// at commit time stay in the routine; this lists each of them once per resource, day and slot.
/// Lab groups sharing a cell and the copies of one elective count as a single class.
pub async fn audit(State(app_state): State<Arc<RwLock<AppState>>>) -> Response {
    let app_state_lock = app_state.read().await;

    match app_state_lock.service.audit().await {
        Ok(found) => Json(found).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}
