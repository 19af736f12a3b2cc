//! Single-cell allocation rules.
//!
//! Every other planner builds on these checks: a target slot must exist and
//! must not be a break, and a class must carry what its type requires.

use crate::calendar::TimeSlotCalendar;
use crate::error::ValidationErrors;
use crate::model::{ClassAssignment, ClassType, Day, SectionKey, SlotId};
use crate::request::{ClassDetails, SingleSlotRequest};

pub struct SlotAllocator;

impl SlotAllocator {
    /// The slot exists in the calendar and can hold a class.
    pub fn check_slot(
        calendar: &TimeSlotCalendar,
        slot_id: SlotId,
        field: &str,
    ) -> Result<(), ValidationErrors> {
        match calendar.get(slot_id) {
            None => Err(ValidationErrors::single(
                field,
                format!("slot {slot_id} is not in the time slot calendar"),
            )),
            Some(slot) if slot.is_break => Err(ValidationErrors::single(
                field,
                format!("slot {slot_id} is a break and cannot hold a class"),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Checks the class attributes. Breaks need nothing; lectures, tutorials
    /// and practicals need a subject, at least one teacher and a room.
    pub fn check_class(class: &ClassDetails) -> Result<ClassType, ValidationErrors> {
        let Some(class_type) = class.class_type else {
            return Err(ValidationErrors::single("class_type", "a class type is required"));
        };
        if !class_type.is_teaching() {
            return Ok(class_type);
        }

        let mut errors = ValidationErrors::new();
        if class.subject_id.is_none() {
            errors.push("subject_id", format!("a subject is required for a {class_type}"));
        }
        if class.teacher_ids.is_empty() {
            errors.push("teacher_ids", format!("at least one teacher is required for a {class_type}"));
        }
        if class.room_id.is_none() {
            errors.push("room_id", format!("a room is required for a {class_type}"));
        }
        errors.into_result()?;
        Ok(class_type)
    }

    /// Unsaved row for `class` at (section, day, slot). Break rows carry no
    /// subject, teachers or room.
    pub fn row(
        section: &SectionKey,
        day: Day,
        slot_id: SlotId,
        class: &ClassDetails,
    ) -> Result<ClassAssignment, ValidationErrors> {
        let class_type = Self::check_class(class)?;
        let mut row = ClassAssignment::new(section.clone(), day, slot_id, class_type)
            .with_notes(class.notes.clone());
        if class_type.is_teaching() {
            row.subject_id = class.subject_id;
            row.teacher_ids = class.teacher_ids.clone();
            row.room_id = class.room_id;
        }
        Ok(row)
    }

    pub fn plan(
        calendar: &TimeSlotCalendar,
        request: &SingleSlotRequest,
    ) -> Result<Vec<ClassAssignment>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(slot_errors) = Self::check_slot(calendar, request.slot_id, "slot_id") {
            errors.errors.extend(slot_errors.errors);
        }
        let row = Self::row(&request.section, request.day, request.slot_id, &request.class);
        match row {
            Ok(row) if errors.is_empty() => Ok(vec![row]),
            Ok(_) => Err(errors),
            Err(class_errors) => {
                errors.errors.extend(class_errors.errors);
                Err(errors)
            }
        }
    }
}
