//! Elective projection.
//!
//! One elective offering of semester 7 or 8 is written once per target
//! section, at the same day and slots, with a shared elective group id so the
//! copies are only ever cleared together.

use std::collections::HashSet;

use crate::allocator::SlotAllocator;
use crate::calendar::TimeSlotCalendar;
use crate::error::ValidationErrors;
use crate::model::{ClassAssignment, ElectiveGroupId, ElectiveInfo, SectionKey, SlotId};
use crate::request::ElectiveRequest;
use crate::span::SpanGroupManager;

/// The rows of one projected offering.
#[derive(Debug, Clone)]
pub struct Projection {
    pub group_id: ElectiveGroupId,
    pub rows: Vec<ClassAssignment>,
}

pub struct ElectiveProjector;

impl ElectiveProjector {
    /// Elective numbers a semester accepts.
    pub fn allowed_numbers(semester: u8) -> &'static [u8] {
        match semester {
            7 => &[1],
            8 => &[1, 2],
            _ => &[],
        }
    }

    /// `registered` lists the sections the registry knows for the request's
    /// program and semester; targets default to all of them.
    pub fn plan(
        calendar: &TimeSlotCalendar,
        request: &ElectiveRequest,
        registered: &[String],
    ) -> Result<Projection, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if request.program_code.trim().is_empty() {
            errors.push("program_code", "a program is required");
        }
        let allowed = Self::allowed_numbers(request.semester);
        if allowed.is_empty() {
            errors.push(
                "semester",
                format!("electives exist only in semesters 7 and 8, not {}", request.semester),
            );
        } else if !allowed.contains(&request.elective_number) {
            errors.push(
                "elective_number",
                format!(
                    "semester {} accepts elective number {}, got {}",
                    request.semester,
                    allowed.iter().map(ToString::to_string).collect::<Vec<_>>().join(" or "),
                    request.elective_number
                ),
            );
        }

        let targets = Self::targets(request, registered, &mut errors);
        let slots = match Self::slots(calendar, request, targets.first()) {
            Ok(slots) => slots,
            Err(slot_errors) => {
                errors.errors.extend(slot_errors.errors);
                Vec::new()
            }
        };

        let template = match targets.first() {
            Some(section) => {
                let first = slots.first().copied().unwrap_or(SlotId(0));
                match SlotAllocator::row(section, request.day, first, &request.class) {
                    Ok(row) if !row.class_type.is_teaching() => {
                        errors.push("class_type", "an elective must be a lecture, practical or tutorial");
                        None
                    }
                    Ok(row) => Some(row),
                    Err(class_errors) => {
                        errors.errors.extend(class_errors.errors);
                        None
                    }
                }
            }
            None => None,
        };
        errors.into_result()?;

        let group_id = ElectiveGroupId::new();
        let elective = ElectiveInfo {
            group_id,
            number: request.elective_number,
            elective_type: request.elective_type.clone(),
            label: request
                .label
                .clone()
                .filter(|label| !label.trim().is_empty())
                .unwrap_or_else(|| format!("Elective {}", request.elective_number)),
            target_sections: targets.iter().map(|section| section.section.clone()).collect(),
        };

        let mut rows = Vec::new();
        if let Some(template) = template {
            for section in &targets {
                let mut row = template.clone();
                row.section = section.clone();
                row.elective = Some(elective.clone());
                if slots.len() < 2 {
                    rows.push(row);
                } else {
                    rows.extend(SpanGroupManager::validate(calendar, section, request.day, &slots)?.spread(&row)?);
                }
            }
        }
        Ok(Projection { group_id, rows })
    }

    fn targets(request: &ElectiveRequest, registered: &[String], errors: &mut ValidationErrors) -> Vec<SectionKey> {
        let names: Vec<String> = match &request.target_sections {
            Some(names) => names.clone(),
            None => registered.to_vec(),
        };
        if names.is_empty() {
            errors.push(
                "target_sections",
                format!("no sections are registered for {} semester {}", request.program_code, request.semester),
            );
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.clone()) {
                errors.push("target_sections", format!("section {name} is listed twice"));
            } else if !registered.contains(&name) {
                errors.push(
                    "target_sections",
                    format!("section {name} is not registered for {} semester {}", request.program_code, request.semester),
                );
            } else {
                targets.push(SectionKey::new(request.program_code.clone(), request.semester, name));
            }
        }
        targets
    }

    fn slots(
        calendar: &TimeSlotCalendar,
        request: &ElectiveRequest,
        section: Option<&SectionKey>,
    ) -> Result<Vec<SlotId>, ValidationErrors> {
        match request.slot_ids.as_slice() {
            [] => Err(ValidationErrors::single("slot_ids", "at least one slot is required")),
            [slot_id] => {
                SlotAllocator::check_slot(calendar, *slot_id, "slot_ids")?;
                Ok(vec![*slot_id])
            }
            many => {
                let section = section
                    .cloned()
                    .unwrap_or_else(|| SectionKey::new(request.program_code.clone(), request.semester, ""));
                let group = SpanGroupManager::validate(calendar, &section, request.day, many)?;
                Ok(group.slots().to_vec())
            }
        }
    }
}
