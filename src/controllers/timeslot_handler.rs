use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AppState;
use crate::models::{
    routine_model::RoutineError,
    timeslot_model::{TimeSlotErr, TimeslotRequest},
};
use axum::debug_handler;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scheduler::TimeSlot;
use tracing::{debug, trace};

#[utoipa::path(
    get,
    path = "/api/v1/timeslots",
    responses(
        (status = 200, description = "Time slot calendar in order", body = Vec<TimeSlot>),
        (status = 500, description = "Calendar could not be read", body = RoutineError),
    )
)]
#[debug_handler]
/// Lists the time slot calendar
///
/// This function is a handler for the route `GET /api/v1/timeslots`. It returns every slot,
/// breaks included, in display order.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
///
/// # Returns
/// `Response` with a status code of 200 OK and the ordered slots.
///
/// # Errors
/// This function returns an error response if the stored calendar cannot be read or is
/// inconsistent (for example, two slots share a sort order).
pub async fn timeslots(State(app_state): State<Arc<RwLock<AppState>>>) -> Response {
    let app_state_lock = app_state.read().await;

    match app_state_lock.service.calendar().await {
        Ok(calendar) => Json(calendar.slots().to_vec()).into_response(),
        Err(e) => RoutineError::routine_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/timeslots/add",
    request_body(
        content = inline(TimeslotRequest),
        description = "Timeslots to add"
    ),
    responses(
        (status = 201, description = "Added timeslots with their ids", body = Vec<TimeSlot>),
        (status = 400, description = "Bad start time or duration", body = RoutineError),
        (status = 422, description = "Slot reuses a sort order or ends before it starts", body = RoutineError),
    )
)]
#[debug_handler]
/// Adds timeslots to the calendar
///
/// This function is a handler for the route `POST /api/v1/timeslots/add`. Every form is parsed
/// before anything is stored; the slots are then added one at a time.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `request` - The timeslots to add
///
/// # Returns
/// `Response` with a status code of 201 Created and the stored slots.
///
/// # Errors
/// This function returns a 400 error if a start time or duration cannot be read, and a 422
/// error if a slot reuses another slot's sort order. Slots added before the
/// failing one stay in the calendar.
pub async fn add_timeslots(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<TimeslotRequest>,
) -> Response {
    debug!("Received request to add timeslots: {:?}", request);
    let slots = match request
        .timeslots
        .iter()
        .map(|form| form.to_time_slot())
        .collect::<Result<Vec<_>, TimeSlotErr>>()
    {
        Ok(slots) => slots,
        Err(e) => {
            trace!("Error parsing timeslot: {:?}", e);
            return RoutineError::response(StatusCode::BAD_REQUEST.into(), Box::new(e));
        }
    };

    let app_state_lock = app_state.read().await;
    let mut added = Vec::with_capacity(slots.len());
    for slot in slots {
        match app_state_lock.service.add_time_slot(slot).await {
            Ok(slot) => added.push(slot),
            Err(e) => {
                debug!("Error when trying to add timeslots: {:?}", e);
                return RoutineError::routine_response(e);
            }
        }
    }
    (StatusCode::CREATED, Json(added)).into_response()
}
