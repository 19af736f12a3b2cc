//! Routine slot allocation and conflict engine.
//!
//! Decides whether a class may occupy a (section, day, time slot) cell, turns
//! high level requests (single slot, spanned, lab split, elective) into the
//! assignment rows that get stored, and rebuilds the per-section weekly grid
//! from whatever is stored.
//!
//! The crate knows nothing about HTTP or SQL. Persistence and the
//! program/subject/teacher/room catalogs are reached through the
//! [`store::AssignmentStore`] and [`registry::Registry`] traits; in-memory
//! implementations of both ship with the crate.
//!
//! # Layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | assignment rows, sections, slots, resources |
//! | [`request`] | tagged allocation requests |
//! | [`calendar`] | ordered slot catalog every request addresses |
//! | [`availability`] | teacher/room availability queries and conflict payloads |
//! | [`allocator`] | single slot and class attribute rules |
//! | [`span`] | multi-period span groups |
//! | [`lab`] | Group A / Group B / both / alternating-week practicals |
//! | [`elective`] | one elective projected into several section grids |
//! | [`grid`] | read model: section grid with merged cells |
//! | [`service`] | two-phase check/commit façade shared by all callers |
//! | [`audit`] | whole-timetable double-booking report |
//! | [`locks`] | per cell and per booking mutual exclusion for writes |

pub mod allocator;
pub mod audit;
pub mod availability;
pub mod calendar;
pub mod elective;
pub mod error;
pub mod grid;
pub mod lab;
pub mod locks;
pub mod model;
pub mod registry;
pub mod request;
pub mod service;
pub mod span;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::DoubleBooking;
pub use availability::{Availability, AvailabilityIndex, Conflict, Exclusions, Occupant};
pub use calendar::TimeSlotCalendar;
pub use error::{FieldError, RoutineErr, StoreError, ValidationErrors};
pub use grid::{CellView, RoutineGrid};
pub use model::{
    AssignmentId, CellKey, ClassAssignment, ClassType, Day, ElectiveGroupId, ElectiveInfo,
    GroupConfig, LabGroup, LabInfo, Resource, RoomId, SectionKey, SlotId, SpanId, SpanInfo,
    SubjectId, TeacherId, TimeSlot,
};
pub use registry::{Registry, StaticRegistry};
pub use request::{
    AllocationRequest, ClassDetails, ElectiveRequest, GroupDetails, LabGroupMode, LabSplitRequest,
    SingleSlotRequest, SpannedRequest,
};
pub use service::{AllocationOutcome, ClearOutcome, RoutineService};
pub use store::{AssignmentStore, MemoryStore, WritePlan};
