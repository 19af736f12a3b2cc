//! Practical sessions split into lab groups.
//!
//! | mode         | rows per slot | lab group | notes                              |
//! |--------------|---------------|-----------|------------------------------------|
//! | `groupA`     | 1             | A         | ordinary single occupant           |
//! | `groupB`     | 1             | B         | ordinary single occupant           |
//! | `bothGroups` | 2             | A and B   | concurrent, each with its own config |
//! | `altWeeks`   | 1             | ALL       | stores B's config as the alternate |
//!
//! Several slot ids turn each group's rows into a span; each group gets its
//! own span id.

use crate::allocator::SlotAllocator;
use crate::calendar::TimeSlotCalendar;
use crate::error::ValidationErrors;
use crate::model::{ClassAssignment, ClassType, GroupConfig, LabGroup, LabInfo, SlotId};
use crate::request::{GroupDetails, LabGroupMode, LabSplitRequest};
use crate::span::SpanGroupManager;

pub struct LabGroupSplitter;

impl LabGroupSplitter {
    pub fn plan(
        calendar: &TimeSlotCalendar,
        request: &LabSplitRequest,
    ) -> Result<Vec<ClassAssignment>, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let slots = match Self::slots(calendar, request) {
            Ok(slots) => Some(slots),
            Err(slot_errors) => {
                errors.errors.extend(slot_errors.errors);
                None
            }
        };

        let (need_a, need_b) = match request.mode {
            LabGroupMode::GroupA => (true, false),
            LabGroupMode::GroupB => (false, true),
            LabGroupMode::BothGroups | LabGroupMode::AltWeeks => (true, true),
        };
        let group_a = Self::config(need_a, request.group_a.as_ref(), "group_a", "A", &mut errors);
        let group_b = Self::config(need_b, request.group_b.as_ref(), "group_b", "B", &mut errors);
        errors.into_result()?;

        let slots = slots.unwrap_or_default();
        let mut rows = Vec::new();
        match (request.mode, group_a, group_b) {
            (LabGroupMode::GroupA, Some(a), _) => {
                rows.extend(Self::place(calendar, request, &slots, &a, Self::lab(LabGroup::A, false))?);
            }
            (LabGroupMode::GroupB, _, Some(b)) => {
                rows.extend(Self::place(calendar, request, &slots, &b, Self::lab(LabGroup::B, false))?);
            }
            (LabGroupMode::BothGroups, Some(a), Some(b)) => {
                rows.extend(Self::place(calendar, request, &slots, &a, Self::lab(LabGroup::A, true))?);
                rows.extend(Self::place(calendar, request, &slots, &b, Self::lab(LabGroup::B, true))?);
            }
            (LabGroupMode::AltWeeks, Some(a), Some(b)) => {
                let lab = LabInfo {
                    group: LabGroup::All,
                    concurrent: false,
                    alternate_weeks: true,
                    alternate: Some(b),
                };
                rows.extend(Self::place(calendar, request, &slots, &a, lab)?);
            }
            _ => {
                return Err(ValidationErrors::single("mode", "lab group configuration is incomplete"));
            }
        }
        Ok(rows)
    }

    fn lab(group: LabGroup, concurrent: bool) -> LabInfo {
        LabInfo {
            group,
            concurrent,
            alternate_weeks: false,
            alternate: None,
        }
    }

    /// Single checked slot, or a validated span run.
    fn slots(calendar: &TimeSlotCalendar, request: &LabSplitRequest) -> Result<Vec<SlotId>, ValidationErrors> {
        match request.slot_ids.as_slice() {
            [] => Err(ValidationErrors::single("slot_ids", "at least one slot is required")),
            [slot_id] => {
                SlotAllocator::check_slot(calendar, *slot_id, "slot_ids")?;
                Ok(vec![*slot_id])
            }
            many => {
                let group = SpanGroupManager::validate(calendar, &request.section, request.day, many)?;
                Ok(group.slots().to_vec())
            }
        }
    }

    fn config(
        required: bool,
        details: Option<&GroupDetails>,
        field: &str,
        name: &str,
        errors: &mut ValidationErrors,
    ) -> Option<GroupConfig> {
        if !required {
            return None;
        }
        match details {
            None => {
                errors.push(field, format!("group {name} configuration is required"));
                None
            }
            Some(details) => match details.validate() {
                Ok(config) => Some(config),
                Err(group_errors) => {
                    errors.merge_prefixed(field, group_errors);
                    None
                }
            },
        }
    }

    /// Rows for one group's configuration over the slots. A fresh span per group.
    fn place(
        calendar: &TimeSlotCalendar,
        request: &LabSplitRequest,
        slots: &[SlotId],
        config: &GroupConfig,
        lab: LabInfo,
    ) -> Result<Vec<ClassAssignment>, ValidationErrors> {
        let first = slots.first().copied().unwrap_or(SlotId(0));
        let mut template = ClassAssignment::new(request.section.clone(), request.day, first, ClassType::Practical)
            .with_subject(config.subject_id)
            .with_teachers(config.teacher_ids.clone())
            .with_room(config.room_id)
            .with_notes(request.notes.clone());
        template.lab = Some(lab);

        if slots.len() < 2 {
            return Ok(vec![template]);
        }
        SpanGroupManager::validate(calendar, &request.section, request.day, slots)?.spread(&template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Day, RoomId, TeacherId};
    use crate::testing::{section_ab, standard_calendar};

    fn request(mode: LabGroupMode, slot_ids: &[i32]) -> LabSplitRequest {
        LabSplitRequest {
            section: section_ab(),
            day: Day::Tuesday,
            slot_ids: slot_ids.iter().copied().map(SlotId).collect(),
            mode,
            group_a: Some(GroupDetails::new(30, &[4], 21)),
            group_b: Some(GroupDetails::new(31, &[5], 22)),
            notes: String::new(),
        }
    }

    #[test]
    fn test_single_group_modes() {
        let calendar = standard_calendar();
        let rows = LabGroupSplitter::plan(&calendar, &request(LabGroupMode::GroupB, &[1])).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lab_group(), Some(LabGroup::B));
        assert_eq!(rows[0].room_id, Some(RoomId(22)));
        assert!(!rows[0].is_concurrent_lab());

        // Group B's config is not needed, or looked at, for group A.
        let mut only_a = request(LabGroupMode::GroupA, &[1]);
        only_a.group_b = None;
        let rows = LabGroupSplitter::plan(&calendar, &only_a).unwrap();
        assert_eq!(rows[0].lab_group(), Some(LabGroup::A));
    }

    #[test]
    fn test_both_groups_share_the_cell() {
        let calendar = standard_calendar();
        let rows = LabGroupSplitter::plan(&calendar, &request(LabGroupMode::BothGroups, &[2])).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cell(), rows[1].cell());
        assert_eq!(rows[0].lab_group(), Some(LabGroup::A));
        assert_eq!(rows[1].lab_group(), Some(LabGroup::B));
        assert!(rows.iter().all(ClassAssignment::is_concurrent_lab));
        assert_eq!(rows[1].teacher_ids, vec![TeacherId(5)]);
    }

    #[test]
    fn test_both_groups_without_group_b_is_an_error() {
        let calendar = standard_calendar();
        let mut missing_b = request(LabGroupMode::BothGroups, &[2]);
        missing_b.group_b = None;

        let errors = LabGroupSplitter::plan(&calendar, &missing_b).unwrap_err();
        assert!(errors.has_field("group_b"));
    }

    #[test]
    fn test_incomplete_group_is_reported_per_field() {
        let calendar = standard_calendar();
        let mut partial = request(LabGroupMode::BothGroups, &[2]);
        partial.group_b = Some(GroupDetails {
            room_id: None,
            ..GroupDetails::new(31, &[], 22)
        });

        let errors = LabGroupSplitter::plan(&calendar, &partial).unwrap_err();
        assert!(errors.has_field("group_b.teacher_ids"));
        assert!(errors.has_field("group_b.room_id"));
    }

    #[test]
    fn test_alternate_weeks_keeps_both_configs_on_one_row() {
        let calendar = standard_calendar();
        let rows = LabGroupSplitter::plan(&calendar, &request(LabGroupMode::AltWeeks, &[3])).unwrap();

        assert_eq!(rows.len(), 1);
        let lab = rows[0].lab.as_ref().unwrap();
        assert_eq!(lab.group, LabGroup::All);
        assert!(lab.alternate_weeks);
        assert_eq!(lab.alternate.as_ref().unwrap().room_id, RoomId(22));
        assert!(rows[0].uses(crate::model::Resource::Teacher(TeacherId(5))));
    }

    #[test]
    fn test_spanned_both_groups_get_a_span_each() {
        let calendar = standard_calendar();
        let rows = LabGroupSplitter::plan(&calendar, &request(LabGroupMode::BothGroups, &[6, 5])).unwrap();

        assert_eq!(rows.len(), 4);
        let a_span = rows[0].span_id();
        let b_span = rows[2].span_id();
        assert_ne!(a_span, b_span);
        assert_eq!(rows[0].slot_id, SlotId(5));
        assert!(rows.iter().filter(|row| !row.is_span_follower()).count() == 2);
    }

    #[test]
    fn test_spanned_lab_over_break_is_rejected() {
        let calendar = standard_calendar();
        let errors = LabGroupSplitter::plan(&calendar, &request(LabGroupMode::GroupA, &[3, 4])).unwrap_err();
        assert!(errors.has_field("slot_ids"));
    }
}
