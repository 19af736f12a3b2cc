//! Timetable data model.
//!
//! A section's weekly routine is a grid of (day, slot) cells. Each stored
//! [`ClassAssignment`] fills one cell; multi-period classes, lab groups and
//! electives are several rows tied together by a span id, a lab flag or an
//! elective group id.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Identifier of a time slot in the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct SlotId(pub i32);

/// Registry id of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct SubjectId(pub i32);

/// Registry id of a teacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct TeacherId(pub i32);

/// Registry id of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct RoomId(pub i32);

/// Store-assigned id of a class assignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct AssignmentId(pub i64);

/// Shared by every row of one multi-period class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct SpanId(pub Uuid);

/// Shared by every row of one elective offering, across sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct ElectiveGroupId(pub Uuid);

impl SpanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl ElectiveGroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElectiveGroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for AssignmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for SpanId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for ElectiveGroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Teaching day. Serialized as its index, 0 = Sunday through 5 = Friday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Day {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Sunday,
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Day {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Day::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| format!("day index must be 0 (Sunday) to 5 (Friday), got {value}"))
    }
}

impl From<Day> for u8 {
    fn from(day: Day) -> Self {
        day.index()
    }
}

impl Display for Day {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Day::Sunday => "Sunday",
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
        };
        write!(f, "{name}")
    }
}

#[cfg(feature = "openapi")]
impl utoipa::PartialSchema for Day {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::ObjectBuilder::new()
            .schema_type(utoipa::openapi::schema::Type::Integer)
            .minimum(Some(0))
            .maximum(Some(5))
            .description(Some("Day index, 0 = Sunday .. 5 = Friday"))
            .into()
    }
}

#[cfg(feature = "openapi")]
impl utoipa::ToSchema for Day {}

/// One interval of the daily calendar. Break slots are rendered, never allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TimeSlot {
    pub id: SlotId,
    pub sort_order: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub is_break: bool,
}

impl TimeSlot {
    pub fn new(id: SlotId, sort_order: i32, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            id,
            sort_order,
            start_time,
            end_time,
            is_break: false,
        }
    }

    pub fn as_break(mut self) -> Self {
        self.is_break = true;
        self
    }
}

/// (program, semester, section) triple naming one independent weekly grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SectionKey {
    pub program_code: String,
    pub semester: u8,
    pub section: String,
}

impl SectionKey {
    pub fn new(program_code: impl Into<String>, semester: u8, section: impl Into<String>) -> Self {
        Self {
            program_code: program_code.into(),
            semester,
            section: section.into(),
        }
    }}

impl Display for SectionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.program_code, self.semester, self.section)
    }
}

/// Address of one grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CellKey {
    pub section: SectionKey,
    pub day: Day,
    pub slot_id: SlotId,
}

impl Display for CellKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} slot {}", self.section, self.day, self.slot_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ClassType {
    Lecture,
    Practical,
    Tutorial,
    Break,
}

impl ClassType {
    /// Lecture, practical and tutorial need a subject, a teacher and a room.
    pub fn is_teaching(self) -> bool {
        !matches!(self, ClassType::Break)
    }
}

impl Display for ClassType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClassType::Lecture => "lecture",
            ClassType::Practical => "practical",
            ClassType::Tutorial => "tutorial",
            ClassType::Break => "break",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum LabGroup {
    A,
    B,
    All,
}

/// A teacher or a room, the two resources availability is tracked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Resource {
    Teacher(TeacherId),
    Room(RoomId),
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Teacher(id) => write!(f, "teacher {}", id.0),
            Resource::Room(id) => write!(f, "room {}", id.0),
        }
    }
}

/// Subject, teachers and room of one lab group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GroupConfig {
    pub subject_id: SubjectId,
    pub teacher_ids: Vec<TeacherId>,
    pub room_id: RoomId,
}

/// Membership in a multi-period span group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SpanInfo {
    pub span_id: SpanId,
    /// Set on the row at the lowest slot position only.
    pub master: bool,
    /// Number of periods in the whole group.
    pub periods: u8,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LabInfo {
    pub group: LabGroup,
    /// Row runs in parallel with the other group's row in the same cell.
    #[serde(default)]
    pub concurrent: bool,
    #[serde(default)]
    pub alternate_weeks: bool,
    /// Group B configuration of an alternating-week lab. The row's own
    /// subject, teachers and room hold Group A.
    pub alternate: Option<GroupConfig>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ElectiveInfo {
    pub group_id: ElectiveGroupId,
    pub number: u8,
    pub elective_type: Option<String>,
    pub label: String,
    pub target_sections: Vec<String>,
}

/// The atomic scheduled unit: one row in one cell.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ClassAssignment {
    /// `None` until the store has written the row.
    pub id: Option<AssignmentId>,
    pub section: SectionKey,
    pub day: Day,
    pub slot_id: SlotId,
    pub class_type: ClassType,
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub teacher_ids: Vec<TeacherId>,
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub notes: String,
    pub span: Option<SpanInfo>,
    pub lab: Option<LabInfo>,
    pub elective: Option<ElectiveInfo>,
}

impl ClassAssignment {
    /// Creates an unsaved row with no teaching details.
    pub fn new(section: SectionKey, day: Day, slot_id: SlotId, class_type: ClassType) -> Self {
        Self {
            id: None,
            section,
            day,
            slot_id,
            class_type,
            subject_id: None,
            teacher_ids: Vec::new(),
            room_id: None,
            notes: String::new(),
            span: None,
            lab: None,
            elective: None,
        }
    }

    pub fn with_subject(mut self, subject_id: SubjectId) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    pub fn with_teachers(mut self, teacher_ids: Vec<TeacherId>) -> Self {
        self.teacher_ids = teacher_ids;
        self
    }

    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn cell(&self) -> CellKey {
        CellKey {
            section: self.section.clone(),
            day: self.day,
            slot_id: self.slot_id,
        }
    }

    /// Same row moved to another slot, keeping every other attribute.
    pub fn at_slot(&self, slot_id: SlotId) -> Self {
        Self {
            slot_id,
            ..self.clone()
        }
    }

    /// Every teacher and room the row occupies, including the alternate
    /// configuration of an alternating-week lab.
    pub fn resources(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> =
            self.teacher_ids.iter().copied().map(Resource::Teacher).collect();
        resources.extend(self.room_id.map(Resource::Room));

        if let Some(alternate) = self.lab.as_ref().and_then(|lab| lab.alternate.as_ref()) {
            resources.extend(alternate.teacher_ids.iter().copied().map(Resource::Teacher));
            resources.push(Resource::Room(alternate.room_id));
        }

        resources.sort();
        resources.dedup();
        resources
    }

    pub fn uses(&self, resource: Resource) -> bool {
        self.resources().contains(&resource)
    }

    pub fn span_id(&self) -> Option<SpanId> {
        self.span.as_ref().map(|span| span.span_id)
    }

    pub fn elective_group(&self) -> Option<ElectiveGroupId> {
        self.elective.as_ref().map(|elective| elective.group_id)
    }

    pub fn lab_group(&self) -> Option<LabGroup> {
        self.lab.as_ref().map(|lab| lab.group)
    }

    /// A span member hidden under its master's merged cell.
    pub fn is_span_follower(&self) -> bool {
        self.span.as_ref().is_some_and(|span| !span.master)
    }

    pub fn is_concurrent_lab(&self) -> bool {
        self.lab.as_ref().is_some_and(|lab| lab.concurrent)
    }
}
