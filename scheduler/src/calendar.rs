//! Time slot calendar.
//!
//! The same ordered slot catalog applies to every teaching day. Order always
//! comes from `sort_order`, never from the order ids were handed in, and
//! positions are indices into that order so gaps in `sort_order` values do not
//! matter.

use std::collections::{HashMap, HashSet};

use crate::error::ValidationErrors;
use crate::model::{SlotId, TimeSlot};

#[derive(Debug, Clone, Default)]
pub struct TimeSlotCalendar {
    slots: Vec<TimeSlot>,
    positions: HashMap<SlotId, usize>,
}

impl TimeSlotCalendar {
    /// Builds the calendar, rejecting duplicate ids, duplicate sort orders and
    /// slots that end before they start.
    pub fn new(mut slots: Vec<TimeSlot>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut ids = HashSet::new();
        let mut orders = HashSet::new();

        for slot in &slots {
            if !ids.insert(slot.id) {
                errors.push("time_slots", format!("slot {} is listed twice", slot.id));
            }
            if !orders.insert(slot.sort_order) {
                errors.push(
                    "time_slots",
                    format!("sort order {} is used by more than one slot", slot.sort_order),
                );
            }
            if slot.end_time <= slot.start_time {
                errors.push("time_slots", format!("slot {} ends before it starts", slot.id));
            }
        }
        errors.into_result()?;

        slots.sort_by_key(|slot| slot.sort_order);
        let positions = slots
            .iter()
            .enumerate()
            .map(|(position, slot)| (slot.id, position))
            .collect();

        Ok(Self { slots, positions })
    }

    /// All slots, breaks included, in calendar order.
    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: SlotId) -> Option<&TimeSlot> {
        self.position(id).map(|position| &self.slots[position])
    }

    pub fn position(&self, id: SlotId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Slots that can hold classes.
    pub fn teaching_slots(&self) -> impl Iterator<Item = &TimeSlot> {
        self.slots.iter().filter(|slot| !slot.is_break)
    }

    /// Sorts the given ids by calendar position. Unknown and repeated ids are
    /// reported under `field`.
    pub fn ordered(&self, ids: &[SlotId], field: &str) -> Result<Vec<SlotId>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut seen = HashSet::new();
        let mut known = Vec::with_capacity(ids.len());

        for &id in ids {
            if !seen.insert(id) {
                errors.push(field, format!("slot {id} is requested twice"));
                continue;
            }
            match self.position(id) {
                Some(position) => known.push((position, id)),
                None => errors.push(field, format!("slot {id} is not in the time slot calendar")),
            }
        }
        errors.into_result()?;

        known.sort();
        Ok(known.into_iter().map(|(_, id)| id).collect())
    }

    /// Whether the ids, once ordered, sit at consecutive calendar positions.
    pub fn is_contiguous(&self, ordered: &[SlotId]) -> bool {
        let positions: Vec<usize> = ordered.iter().filter_map(|id| self.position(*id)).collect();
        positions.len() == ordered.len() && positions.windows(2).all(|pair| pair[1] == pair[0] + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{slot, standard_calendar};

    #[test]
    fn test_calendar_sorts_by_sort_order() {
        let calendar = TimeSlotCalendar::new(vec![slot(3, 30, 10), slot(1, 10, 8), slot(2, 20, 9)]).unwrap();
        let ids: Vec<i32> = calendar.slots().iter().map(|slot| slot.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(calendar.position(SlotId(3)), Some(2));
        assert_eq!(calendar.position(SlotId(9)), None);
    }

    #[test]
    fn test_calendar_rejects_duplicates() {
        let errors = TimeSlotCalendar::new(vec![slot(1, 10, 8), slot(1, 20, 9), slot(2, 20, 10)]).unwrap_err();
        assert_eq!(errors.errors.len(), 2);
    }

    #[test]
    fn test_ordered_ignores_submission_order() {
        let calendar = standard_calendar();
        let ordered = calendar.ordered(&[SlotId(3), SlotId(1), SlotId(2)], "slot_ids").unwrap();
        assert_eq!(ordered, vec![SlotId(1), SlotId(2), SlotId(3)]);
        assert!(calendar.is_contiguous(&ordered));
    }

    #[test]
    fn test_ordered_reports_unknown_and_repeated() {
        let calendar = standard_calendar();
        let errors = calendar.ordered(&[SlotId(1), SlotId(1), SlotId(42)], "slot_ids").unwrap_err();
        assert_eq!(errors.errors.len(), 2);
        assert!(errors.has_field("slot_ids"));
    }

    #[test]
    fn test_contiguity_across_break_position() {
        let calendar = standard_calendar();
        // Slot 4 is the break between 3 and 5.
        assert!(!calendar.is_contiguous(&[SlotId(3), SlotId(5)]));
        assert!(calendar.is_contiguous(&[SlotId(5), SlotId(6)]));
    }
}
