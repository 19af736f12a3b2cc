//! Fixtures shared by the unit tests.

use async_trait::async_trait;
use chrono::NaiveTime;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::StoreError;
use crate::model::{
    AssignmentId, ClassAssignment, ClassType, Day, ElectiveGroupId, Resource, RoomId, SectionKey,
    SlotId, SpanId, SubjectId, TeacherId, TimeSlot,
};
use crate::registry::StaticRegistry;
use crate::service::RoutineService;
use crate::store::{AssignmentStore, MemoryStore, WritePlan};
use crate::calendar::TimeSlotCalendar;

/// A 50 minute slot starting on the hour.
pub(crate) fn slot(id: i32, sort_order: i32, start_hour: u32) -> TimeSlot {
    let start = NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap();
    let end = NaiveTime::from_hms_opt(start_hour, 50, 0).unwrap();
    TimeSlot::new(SlotId(id), sort_order, start, end)
}

/// Slots 0..=7 from 08:00, with slot 4 as the lunch break.
pub(crate) fn standard_slots() -> Vec<TimeSlot> {
    (0..8)
        .map(|i| {
            let slot = slot(i, (i + 1) * 10, 8 + i as u32);
            if i == 4 { slot.as_break() } else { slot }
        })
        .collect()
}

pub(crate) fn standard_calendar() -> TimeSlotCalendar {
    TimeSlotCalendar::new(standard_slots()).unwrap()
}

pub(crate) fn section_ab() -> SectionKey {
    SectionKey::new("BCT", 7, "AB")
}

pub(crate) fn section_cd() -> SectionKey {
    SectionKey::new("BCT", 7, "CD")
}

pub(crate) fn lecture(
    section: SectionKey,
    day: Day,
    slot: i32,
    subject: i32,
    teacher: i32,
    room: i32,
) -> ClassAssignment {
    ClassAssignment::new(section, day, SlotId(slot), ClassType::Lecture)
        .with_subject(SubjectId(subject))
        .with_teachers(vec![TeacherId(teacher)])
        .with_room(RoomId(room))
}

/// BCT semesters 5, 7 and 8 with sections AB and CD, and a wide id range for
/// subjects, teachers and rooms.
pub(crate) fn registry() -> StaticRegistry {
    StaticRegistry::new()
        .with_sections("BCT", 5, &["AB", "CD"])
        .with_sections("BCT", 7, &["AB", "CD"])
        .with_sections("BCT", 8, &["AB", "CD"])
        .with_subjects(1..=500)
        .with_teachers(1..=100)
        .with_rooms(1..=500)
}

pub(crate) fn memory_service() -> RoutineService<MemoryStore, StaticRegistry> {
    RoutineService::new(MemoryStore::new(standard_slots()), registry())
}

/// Store whose writes can be made to fail, as if the connection dropped
/// in the middle of a transaction.
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    pub inner: MemoryStore,
    pub fail_writes: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(standard_slots()),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AssignmentStore for FailingStore {
    async fn time_slots(&self) -> Result<Vec<TimeSlot>, StoreError> {
        self.inner.time_slots().await
    }

    async fn add_time_slot(&self, slot: TimeSlot) -> Result<TimeSlot, StoreError> {
        self.inner.add_time_slot(slot).await
    }

    async fn in_cell(
        &self,
        section: &SectionKey,
        day: Day,
        slot_id: SlotId,
    ) -> Result<Vec<ClassAssignment>, StoreError> {
        self.inner.in_cell(section, day, slot_id).await
    }

    async fn using_resource_at(
        &self,
        resource: Resource,
        day: Day,
        slot_id: SlotId,
    ) -> Result<Vec<ClassAssignment>, StoreError> {
        self.inner.using_resource_at(resource, day, slot_id).await
    }

    async fn using_resource(&self, resource: Resource) -> Result<Vec<ClassAssignment>, StoreError> {
        self.inner.using_resource(resource).await
    }

    async fn by_span(&self, span_id: SpanId) -> Result<Vec<ClassAssignment>, StoreError> {
        self.inner.by_span(span_id).await
    }

    async fn by_elective_group(
        &self,
        group_id: ElectiveGroupId,
    ) -> Result<Vec<ClassAssignment>, StoreError> {
        self.inner.by_elective_group(group_id).await
    }

    async fn by_section(&self, section: &SectionKey) -> Result<Vec<ClassAssignment>, StoreError> {
        self.inner.by_section(section).await
    }

    async fn all(&self) -> Result<Vec<ClassAssignment>, StoreError> {
        self.inner.all().await
    }

    async fn apply(&self, plan: WritePlan) -> Result<Vec<AssignmentId>, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io("connection lost mid-transaction".to_string()));
        }
        self.inner.apply(plan).await
    }
}
