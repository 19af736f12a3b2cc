use crate::{
    controllers::{allocation_handler, clear_handler, routine_handler, timeslot_handler},
    models::{
        registry_model::Section,
        routine_model::{
            BatchItem, BatchRequest, CheckResponse, ClearSlotRequest, CommitRequest, ResourceKind,
            RoutineError,
        },
        timeslot_model::{TimeslotForm, TimeslotRequest},
    },
    types::ApiStatusCode,
};
use scheduler::{
    AllocationOutcome, AllocationRequest, Availability, CellView, ClassAssignment, ClearOutcome,
    Conflict, DoubleBooking, FieldError, Occupant, RoutineGrid, TimeSlot,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        // Calendar
        timeslot_handler::timeslots,
        timeslot_handler::add_timeslots,
        routine_handler::sections,
        // Allocation
        allocation_handler::check_allocation,
        allocation_handler::commit_allocation,
        allocation_handler::commit_batch,
        // Clearing
        clear_handler::clear_slot,
        clear_handler::clear_span,
        clear_handler::clear_elective,
        clear_handler::clear_section,
        // Routine
        routine_handler::routine,
        routine_handler::availability,
        routine_handler::resource_schedule,
        routine_handler::audit,
    ),
    components(
        schemas(
            AllocationRequest, AllocationOutcome, Availability, BatchItem, BatchRequest, CellView,
            CheckResponse, ClassAssignment, ClearOutcome, ClearSlotRequest, CommitRequest, Conflict,
            DoubleBooking, FieldError, Occupant, ResourceKind, RoutineError, RoutineGrid, Section,
            TimeSlot, TimeslotForm, TimeslotRequest, ApiStatusCode,
        )
    ),
    tags(
        (name = "Timeslots", description = "Time slot calendar endpoints"),
        (name = "Allocation", description = "Check and commit class allocations"),
        (name = "Clearing", description = "Remove cells, spans, electives and whole sections"),
        (name = "Routine", description = "Section grids, availability, schedules and the audit")
    )
)]
pub struct ApiDoc;
