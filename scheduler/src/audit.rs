//! Whole-timetable double-booking audit.
//!
//! Overridden conflicts stay in the store, so the audit lists every teacher or
//! room that more than one logical class uses at the same day and slot. Lab
//! rows sharing a cell count as one class, as do the copies of one elective.

use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::availability::Occupant;
use crate::model::{CellKey, ClassAssignment, Day, ElectiveGroupId, Resource, SlotId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DoubleBooking {
    pub resource: Resource,
    pub day: Day,
    pub slot_id: SlotId,
    /// Ordered by assignment id.
    pub occupants: Vec<Occupant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Unit {
    Elective(ElectiveGroupId),
    Cell(CellKey),
}

fn unit(row: &ClassAssignment) -> Unit {
    match row.elective_group() {
        Some(group) => Unit::Elective(group),
        None => Unit::Cell(row.cell()),
    }
}

/// Double bookings ordered by day, slot id and resource.
pub fn double_bookings(rows: &[ClassAssignment]) -> Vec<DoubleBooking> {
    let buckets = rows
        .iter()
        .flat_map(|row| {
            row.resources()
                .into_iter()
                .map(move |resource| ((resource, row.day, row.slot_id), row))
        })
        .into_group_map();

    let mut found: Vec<DoubleBooking> = buckets
        .into_par_iter()
        .filter(|(_, holders)| holders.iter().map(|row| unit(row)).unique().count() > 1)
        .map(|((resource, day, slot_id), holders)| {
            let occupants = holders
                .into_iter()
                .sorted_by_key(|row| row.id)
                .map(Occupant::from)
                .collect();
            DoubleBooking {
                resource,
                day,
                slot_id,
                occupants,
            }
        })
        .collect();

    found.sort_by_key(|booking| (booking.day, booking.slot_id, booking.resource));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssignmentId, ElectiveInfo, LabGroup, LabInfo, TeacherId};
    use crate::testing::{lecture, section_ab, section_cd};

    fn stored(mut row: ClassAssignment, id: i64) -> ClassAssignment {
        row.id = Some(AssignmentId(id));
        row
    }

    #[test]
    fn test_clean_timetable_has_no_findings() {
        let rows = vec![
            stored(lecture(section_ab(), Day::Sunday, 0, 1, 1, 1), 1),
            stored(lecture(section_cd(), Day::Sunday, 0, 2, 2, 2), 2),
            stored(lecture(section_cd(), Day::Sunday, 1, 2, 1, 1), 3),
        ];
        assert!(double_bookings(&rows).is_empty());
    }

    #[test]
    fn test_shared_teacher_is_reported_once_per_slot() {
        let rows = vec![
            stored(lecture(section_cd(), Day::Monday, 2, 2, 7, 3), 2),
            stored(lecture(section_ab(), Day::Monday, 2, 1, 7, 4), 1),
        ];
        let found = double_bookings(&rows);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].resource, Resource::Teacher(TeacherId(7)));
        let ids: Vec<_> = found[0].occupants.iter().map(|o| o.assignment_id).collect();
        assert_eq!(ids, vec![Some(AssignmentId(1)), Some(AssignmentId(2))]);
    }

    #[test]
    fn test_lab_groups_and_elective_copies_are_one_class() {
        let mut a = stored(lecture(section_ab(), Day::Tuesday, 1, 30, 4, 21), 1);
        let mut b = stored(lecture(section_ab(), Day::Tuesday, 1, 31, 4, 22), 2);
        for (row, group) in [(&mut a, LabGroup::A), (&mut b, LabGroup::B)] {
            row.lab = Some(LabInfo {
                group,
                concurrent: true,
                alternate_weeks: false,
                alternate: None,
            });
        }

        let elective = ElectiveInfo {
            group_id: ElectiveGroupId::new(),
            number: 1,
            elective_type: None,
            label: "Elective 1".to_string(),
            target_sections: vec!["AB".to_string(), "CD".to_string()],
        };
        let mut ab = stored(lecture(section_ab(), Day::Tuesday, 2, 70, 9, 40), 3);
        let mut cd = stored(lecture(section_cd(), Day::Tuesday, 2, 70, 9, 40), 4);
        ab.elective = Some(elective.clone());
        cd.elective = Some(elective);

        assert!(double_bookings(&[a, b, ab, cd]).is_empty());
    }
}
