//! Read-only routine grid.
//!
//! [`RoutineGrid::assemble`] is a pure function of the calendar and the stored
//! rows. It never feeds back into allocation; rebuild it whenever rows change.

use serde::{Deserialize, Serialize};

use crate::calendar::TimeSlotCalendar;
use crate::model::{ClassAssignment, Day, LabGroup, SectionKey, SlotId, TimeSlot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellView {
    Empty {
        slot_id: SlotId,
    },
    Break {
        slot_id: SlotId,
    },
    /// One row, both lab groups of a slot (A before B), or a span master
    /// whose `col_span` covers the slots after it.
    Class {
        slot_id: SlotId,
        col_span: u8,
        entries: Vec<ClassAssignment>,
    },
}

impl CellView {
    pub fn slot_id(&self) -> SlotId {
        match self {
            CellView::Empty { slot_id } | CellView::Break { slot_id } | CellView::Class { slot_id, .. } => *slot_id,
        }
    }

    pub fn entries(&self) -> &[ClassAssignment] {
        match self {
            CellView::Class { entries, .. } => entries,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DayRow {
    pub day: Day,
    /// Calendar order. Slots covered by a span master are left out.
    pub cells: Vec<CellView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RoutineGrid {
    pub section: SectionKey,
    pub slots: Vec<TimeSlot>,
    pub days: Vec<DayRow>,
}

fn lab_rank(group: Option<LabGroup>) -> u8 {
    match group {
        Some(LabGroup::A) => 0,
        Some(LabGroup::B) => 1,
        Some(LabGroup::All) | None => 2,
    }
}

impl RoutineGrid {
    /// Builds the grid of `section`. Rows of other sections are ignored.
    pub fn assemble(section: &SectionKey, calendar: &TimeSlotCalendar, assignments: &[ClassAssignment]) -> Self {
        let rows: Vec<&ClassAssignment> = assignments.iter().filter(|row| &row.section == section).collect();

        let days = Day::ALL
            .iter()
            .map(|&day| DayRow {
                day,
                cells: calendar
                    .slots()
                    .iter()
                    .filter_map(|slot| Self::cell_view(slot, day, &rows))
                    .collect(),
            })
            .collect();

        Self {
            section: section.clone(),
            slots: calendar.slots().to_vec(),
            days,
        }
    }

    /// `None` when the slot is covered by a span master.
    fn cell_view(slot: &TimeSlot, day: Day, rows: &[&ClassAssignment]) -> Option<CellView> {
        if slot.is_break {
            return Some(CellView::Break { slot_id: slot.id });
        }

        let in_cell: Vec<&ClassAssignment> = rows
            .iter()
            .copied()
            .filter(|row| row.day == day && row.slot_id == slot.id)
            .collect();
        if in_cell.is_empty() {
            return Some(CellView::Empty { slot_id: slot.id });
        }

        let mut entries: Vec<ClassAssignment> = in_cell
            .into_iter()
            .filter(|row| !row.is_span_follower())
            .cloned()
            .collect();
        if entries.is_empty() {
            return None;
        }
        entries.sort_by_key(|row| (lab_rank(row.lab_group()), row.id));

        let col_span = entries
            .iter()
            .filter_map(|row| row.span.as_ref().map(|span| span.periods))
            .max()
            .unwrap_or(1);

        Some(CellView::Class {
            slot_id: slot.id,
            col_span,
            entries,
        })
    }

    pub fn day(&self, day: Day) -> Option<&DayRow> {
        self.days.iter().find(|row| row.day == day)
    }

    /// `None` for slots hidden under a span master or unknown to the calendar.
    pub fn cell(&self, day: Day, slot_id: SlotId) -> Option<&CellView> {
        self.day(day)?.cells.iter().find(|cell| cell.slot_id() == slot_id)
    }

    /// Whether no day holds a class.
    pub fn is_blank(&self) -> bool {
        self.days
            .iter()
            .flat_map(|row| row.cells.iter())
            .all(|cell| !matches!(cell, CellView::Class { .. }))
    }
}
