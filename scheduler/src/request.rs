//! Allocation requests.
//!
//! Each variant names its own required fields. Nothing optional is inferred
//! from another variant's shape; validation happens in the module that
//! plans the variant.

use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;
use crate::model::{ClassType, Day, GroupConfig, RoomId, SectionKey, SlotId, SubjectId, TeacherId};

/// Class attributes shared by every request variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ClassDetails {
    pub class_type: Option<ClassType>,
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub teacher_ids: Vec<TeacherId>,
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub notes: String,
}

impl ClassDetails {
    pub fn new(class_type: ClassType) -> Self {
        Self {
            class_type: Some(class_type),
            ..Self::default()
        }
    }

    pub fn with_subject(mut self, subject_id: i32) -> Self {
        self.subject_id = Some(SubjectId(subject_id));
        self
    }

    pub fn with_teachers(mut self, teacher_ids: &[i32]) -> Self {
        self.teacher_ids = teacher_ids.iter().copied().map(TeacherId).collect();
        self
    }

    pub fn with_room(mut self, room_id: i32) -> Self {
        self.room_id = Some(RoomId(room_id));
        self
    }
}

/// Subject, teachers and room of one lab group as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GroupDetails {
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub teacher_ids: Vec<TeacherId>,
    pub room_id: Option<RoomId>,
}

impl GroupDetails {
    pub fn new(subject_id: i32, teacher_ids: &[i32], room_id: i32) -> Self {
        Self {
            subject_id: Some(SubjectId(subject_id)),
            teacher_ids: teacher_ids.iter().copied().map(TeacherId).collect(),
            room_id: Some(RoomId(room_id)),
        }
    }

    /// Checks every field and returns the complete configuration.
    pub fn validate(&self) -> Result<GroupConfig, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.subject_id.is_none() {
            errors.push("subject_id", "a subject is required");
        }
        if self.teacher_ids.is_empty() {
            errors.push("teacher_ids", "at least one teacher is required");
        }
        if self.room_id.is_none() {
            errors.push("room_id", "a room is required");
        }

        match (self.subject_id, self.room_id) {
            (Some(subject_id), Some(room_id)) if errors.is_empty() => Ok(GroupConfig {
                subject_id,
                teacher_ids: self.teacher_ids.clone(),
                room_id,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SingleSlotRequest {
    pub section: SectionKey,
    pub day: Day,
    pub slot_id: SlotId,
    #[serde(flatten)]
    pub class: ClassDetails,
}

/// A class spread over two or more consecutive slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SpannedRequest {
    pub section: SectionKey,
    pub day: Day,
    /// Any order; sorted by calendar position before checking.
    pub slot_ids: Vec<SlotId>,
    #[serde(flatten)]
    pub class: ClassDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum LabGroupMode {
    GroupA,
    GroupB,
    BothGroups,
    AltWeeks,
}

/// A practical split into lab groups. One slot id books a single period,
/// several book a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LabSplitRequest {
    pub section: SectionKey,
    pub day: Day,
    pub slot_ids: Vec<SlotId>,
    pub mode: LabGroupMode,
    pub group_a: Option<GroupDetails>,
    pub group_b: Option<GroupDetails>,
    #[serde(default)]
    pub notes: String,
}

/// One elective offering shown in several sections of semester 7 or 8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ElectiveRequest {
    pub program_code: String,
    pub semester: u8,
    pub day: Day,
    pub slot_ids: Vec<SlotId>,
    pub elective_number: u8,
    pub elective_type: Option<String>,
    pub label: Option<String>,
    /// Defaults to every registered section of the semester.
    pub target_sections: Option<Vec<String>>,
    #[serde(flatten)]
    pub class: ClassDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationRequest {
    Single(SingleSlotRequest),
    Spanned(SpannedRequest),
    LabSplit(LabSplitRequest),
    Elective(ElectiveRequest),
}

impl AllocationRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            AllocationRequest::Single(_) => "single",
            AllocationRequest::Spanned(_) => "spanned",
            AllocationRequest::LabSplit(_) => "lab_split",
            AllocationRequest::Elective(_) => "elective",
        }
    }

    pub fn day(&self) -> Day {
        match self {
            AllocationRequest::Single(request) => request.day,
            AllocationRequest::Spanned(request) => request.day,
            AllocationRequest::LabSplit(request) => request.day,
            AllocationRequest::Elective(request) => request.day,
        }
    }
}
