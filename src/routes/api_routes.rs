use crate::config::AppState;
use crate::controllers::{
    allocation_handler::{check_allocation, commit_allocation, commit_batch},
    clear_handler::{clear_elective, clear_section, clear_slot, clear_span},
    routine_handler::{audit, availability, resource_schedule, routine, sections},
    timeslot_handler::{add_timeslots, timeslots},
};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Returns a router with all the routes for the API
///
/// This function returns a router with the routes for the time slot calendar, allocation,
/// clearing and the read-only routine views. It is nested under `/api/v1`.
///
/// # Returns
/// A router with all the routes for the API
pub fn get_routes() -> Router<Arc<RwLock<AppState>>> {
    let calendar_routes = Router::new()
        .route("/timeslots", get(timeslots))
        .route("/timeslots/add", post(add_timeslots))
        .route("/sections", get(sections));

    let allocation_routes = Router::new()
        .route("/allocations", post(commit_allocation))
        .route("/allocations/check", post(check_allocation))
        .route("/allocations/batch", post(commit_batch))
        .route("/clear/slot", post(clear_slot))
        .route("/spans/{span_id}", delete(clear_span))
        .route("/electives/{group_id}", delete(clear_elective));

    let read_routes = Router::new()
        .route(
            "/routine/{program_code}/{semester}/{section}",
            get(routine).delete(clear_section),
        )
        .route("/availability/{kind}/{id}", get(availability))
        .route("/schedule/{kind}/{id}", get(resource_schedule))
        .route("/audit", get(audit));

    calendar_routes.merge(allocation_routes).merge(read_routes)
}
