use crate::types::ApiStatusCode;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, response::Response};
use scheduler::{
    AllocationOutcome, AllocationRequest, AssignmentId, Conflict, Day, FieldError, Resource,
    RoomId, RoutineErr, SectionKey, SlotId, TeacherId,
};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};
use std::error::Error;
use utoipa::{IntoParams, ToSchema};

/// Struct that represents an error that occurred when working with the routine.
///
/// # Fields
/// - `status` - The HTTP status code associated with the error
/// - `error` - A string describing the specific error that occurred
/// - `fields` - Field-level detail of a rejected request, empty otherwise
#[derive(Debug, Clone, ToSchema)]
pub struct RoutineError {
    pub status: ApiStatusCode,
    pub error: String,
    pub fields: Vec<FieldError>,
}

/// Serializes a `RoutineError` as `{ "status": "422", "error": "...", "fields": [...] }`.
/// `fields` is left out when empty.
impl Serialize for RoutineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let status: String = self.status.to_string();
        let len = if self.fields.is_empty() { 2 } else { 3 };
        let mut state = serializer.serialize_struct("RoutineError", len)?;
        state.serialize_field("status", &status)?;
        state.serialize_field("error", &self.error)?;
        if !self.fields.is_empty() {
            state.serialize_field("fields", &self.fields)?;
        }
        state.end()
    }
}

impl RoutineError {
    /// Creates a `Response` instance from a status code and any error.
    pub fn response(status: ApiStatusCode, error: Box<dyn Error>) -> Response {
        let error = RoutineError {
            status,
            error: error.to_string(),
            fields: Vec::new(),
        };
        (status, Json(error)).into_response()
    }

    /// Status a routine error is reported with.
    ///
    /// | error      | status |
    /// |------------|--------|
    /// | Validation | 422    |
    /// | NotFound   | 404    |
    /// | Atomicity  | 409    |
    /// | Store      | 500    |
    pub fn status_for(error: &RoutineErr) -> StatusCode {
        match error {
            RoutineErr::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RoutineErr::NotFound(_) => StatusCode::NOT_FOUND,
            RoutineErr::Atomicity(_) => StatusCode::CONFLICT,
            RoutineErr::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn from_routine(error: &RoutineErr) -> Self {
        let fields = match error {
            RoutineErr::Validation(errors) => errors.errors.clone(),
            _ => Vec::new(),
        };
        RoutineError {
            status: Self::status_for(error).into(),
            error: error.to_string(),
            fields,
        }
    }

    /// Creates a `Response` for an engine error, keeping validation detail.
    pub fn routine_response(error: RoutineErr) -> Response {
        let error = Self::from_routine(&error);
        (error.status, Json(error)).into_response()
    }
}

/// A request to check or commit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommitRequest {
    pub request: AllocationRequest,
    /// Write even when the request conflicts with stored rows.
    #[serde(default)]
    pub override_conflicts: bool,
}

/// Several requests committed one after another.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchRequest {
    pub requests: Vec<AllocationRequest>,
    #[serde(default)]
    pub override_conflicts: bool,
}

/// Conflicts found by a check; empty when the request can be committed as is.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckResponse {
    pub conflicts: Vec<Conflict>,
    /// Human-readable form of each conflict, in the same order.
    pub messages: Vec<String>,
}

impl From<Vec<Conflict>> for CheckResponse {
    fn from(conflicts: Vec<Conflict>) -> Self {
        let messages = conflicts.iter().map(ToString::to_string).collect();
        Self { conflicts, messages }
    }
}

/// Outcome of one request of a batch.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchItem {
    pub index: usize,
    pub outcome: Option<AllocationOutcome>,
    pub error: Option<RoutineError>,
}

impl BatchItem {
    pub fn new(index: usize, result: Result<AllocationOutcome, RoutineErr>) -> Self {
        match result {
            Ok(outcome) => Self {
                index,
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => Self {
                index,
                outcome: None,
                error: Some(RoutineError::from_routine(&e)),
            },
        }
    }
}

/// Cell to clear.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClearSlotRequest {
    pub section: SectionKey,
    pub day: Day,
    pub slot_id: SlotId,
}

/// Resource kind in availability and schedule paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Teacher,
    Room,
}

impl ResourceKind {
    pub fn resource(self, id: i32) -> Resource {
        match self {
            ResourceKind::Teacher => Resource::Teacher(TeacherId(id)),
            ResourceKind::Room => Resource::Room(RoomId(id)),
        }
    }
}

/// Day and slot of an availability query.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    /// 0 = Sunday .. 5 = Friday
    pub day: u8,
    pub slot_id: i32,
}

/// Path of a section grid: `/routine/{program_code}/{semester}/{section}`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct SectionPath {
    pub program_code: String,
    pub semester: u8,
    pub section: String,
}

impl From<SectionPath> for SectionKey {
    fn from(path: SectionPath) -> Self {
        SectionKey::new(path.program_code, path.semester, path.section)
    }
}

/// Ids written by a commit, as returned to batch importers.
pub fn written_ids(outcome: &AllocationOutcome) -> &[AssignmentId] {
    match outcome {
        AllocationOutcome::Committed { assignment_ids, .. } => assignment_ids,
        AllocationOutcome::NeedsConfirmation { .. } => &[],
    }
}
