//! Error taxonomy.
//!
//! - [`RoutineErr::Validation`]: the request is structurally invalid. Raised
//!   before anything is written.
//! - [`RoutineErr::Atomicity`]: a multi-row write failed and was rolled back
//!   wholesale. Retry the whole operation.
//! - [`RoutineErr::NotFound`]: a clear targeted rows that are already gone.
//!   Refresh the grid instead of retrying.
//!
//! Busy teachers and rooms are not errors; they travel as
//! [`crate::availability::Conflict`] payloads the caller may override.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every problem found in one request, collected before returning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Moves another set of errors in, prefixing each field.
    pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for error in other.errors {
            self.push(format!("{prefix}.{}", error.field), error.message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{joined}")
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors reported by the engine to its callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutineErr {
    #[error("Invalid routine request: {0}")]
    Validation(ValidationErrors),
    #[error("Routine write rolled back: {0}")]
    Atomicity(String),
    #[error("{0} doesn't exist")]
    NotFound(String),
    #[error("Routine store io failed: {0}")]
    Store(String),
}

impl RoutineErr {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        RoutineErr::Validation(ValidationErrors::single(field, message))
    }

    /// Maps a failed write. Anything but a vanished row means the
    /// transaction was rolled back.
    pub fn from_write(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => RoutineErr::NotFound(what),
            other => RoutineErr::Atomicity(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for RoutineErr {
    fn from(errors: ValidationErrors) -> Self {
        RoutineErr::Validation(errors)
    }
}

impl From<StoreError> for RoutineErr {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => RoutineErr::NotFound(what),
            other => RoutineErr::Store(other.to_string()),
        }
    }
}

/// Errors raised by [`crate::store::AssignmentStore`] and
/// [`crate::registry::Registry`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} doesn't exist")]
    NotFound(String),
    #[error("Store constraint violated: {0}")]
    Constraint(String),
    #[error("Store io failed: {0}")]
    Io(String),
}
