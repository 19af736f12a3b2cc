//! Multi-period span groups.
//!
//! A span group moves through `Proposed -> Validated -> Committed -> Cleared`.
//! Validation orders the slot ids by calendar position (never by submission
//! order) and requires a gap-free run of at least two teaching slots. The
//! committed group is one row per slot sharing a span id; the row at the
//! lowest position is the master and carries the period count.

use std::collections::HashSet;
use tracing::debug;

use crate::allocator::SlotAllocator;
use crate::calendar::TimeSlotCalendar;
use crate::error::ValidationErrors;
use crate::model::{ClassAssignment, Day, SectionKey, SlotId, SpanId, SpanInfo};
use crate::request::SpannedRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanState {
    Proposed,
    Validated,
    Committed,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanGroup {
    span_id: SpanId,
    section: SectionKey,
    day: Day,
    slots: Vec<SlotId>,
    state: SpanState,
}

impl SpanGroup {
    pub fn propose(section: SectionKey, day: Day, slot_ids: &[SlotId]) -> Self {
        Self {
            span_id: SpanId::new(),
            section,
            day,
            slots: slot_ids.to_vec(),
            state: SpanState::Proposed,
        }
    }

    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    pub fn state(&self) -> SpanState {
        self.state
    }

    /// Slot ids; in calendar order once validated.
    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    /// `Proposed -> Validated`.
    pub fn validate(mut self, calendar: &TimeSlotCalendar) -> Result<Self, ValidationErrors> {
        if self.state != SpanState::Proposed {
            return Err(ValidationErrors::single(
                "slot_ids",
                format!("span {} was already validated", self.span_id),
            ));
        }

        let ordered = calendar.ordered(&self.slots, "slot_ids")?;
        let mut errors = ValidationErrors::new();
        if ordered.len() < 2 {
            errors.push("slot_ids", "a span needs at least two slots");
        }
        for slot_id in &ordered {
            if let Err(slot_errors) = SlotAllocator::check_slot(calendar, *slot_id, "slot_ids") {
                errors.errors.extend(slot_errors.errors);
            }
        }
        if ordered.len() >= 2 && !calendar.is_contiguous(&ordered) {
            let listed = ordered.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            errors.push("slot_ids", format!("slots [{listed}] are not consecutive"));
        }
        errors.into_result()?;

        self.slots = ordered;
        self.state = SpanState::Validated;
        Ok(self)
    }

    /// One row per slot copied from `template`, sharing this span id.
    pub fn spread(&self, template: &ClassAssignment) -> Result<Vec<ClassAssignment>, ValidationErrors> {
        if self.state != SpanState::Validated {
            return Err(ValidationErrors::single(
                "slot_ids",
                format!("span {} must be validated before its rows are built", self.span_id),
            ));
        }
        let periods = u8::try_from(self.slots.len())
            .map_err(|_| ValidationErrors::single("slot_ids", "too many slots for one span"))?;

        Ok(self
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot_id)| {
                let mut row = template.at_slot(*slot_id);
                row.section = self.section.clone();
                row.day = self.day;
                row.span = Some(SpanInfo {
                    span_id: self.span_id,
                    master: index == 0,
                    periods,
                });
                row
            })
            .collect())
    }

    /// Rebuilds a committed group from its stored rows, checking that they
    /// share a span id, sit on consecutive slots of one cell row and have a
    /// single master carrying the group size.
    pub fn committed(calendar: &TimeSlotCalendar, rows: &[ClassAssignment]) -> Result<Self, ValidationErrors> {
        let Some(first) = rows.first() else {
            return Err(ValidationErrors::single("span_id", "a span has at least one row"));
        };
        let Some(span_id) = first.span_id() else {
            return Err(ValidationErrors::single("span_id", "row is not part of a span"));
        };

        let mut errors = ValidationErrors::new();
        if rows
            .iter()
            .any(|row| row.span_id() != Some(span_id) || row.section != first.section || row.day != first.day)
        {
            errors.push("span_id", format!("rows of span {span_id} disagree on span, section or day"));
        }

        let slot_ids: Vec<SlotId> = rows.iter().map(|row| row.slot_id).collect();
        let ordered = match calendar.ordered(&slot_ids, "slot_ids") {
            Ok(ordered) => ordered,
            Err(slot_errors) => {
                errors.errors.extend(slot_errors.errors);
                return Err(errors);
            }
        };
        if !calendar.is_contiguous(&ordered) {
            errors.push("slot_ids", format!("span {span_id} has a gap"));
        }

        let masters: Vec<&ClassAssignment> = rows
            .iter()
            .filter(|row| row.span.as_ref().is_some_and(|span| span.master))
            .collect();
        match masters.as_slice() {
            [master] => {
                if ordered.first() != Some(&master.slot_id) {
                    errors.push("span_id", format!("master of span {span_id} is not its first slot"));
                }
                if master.span.as_ref().map(|span| usize::from(span.periods)) != Some(rows.len()) {
                    errors.push("span_id", format!("master of span {span_id} has the wrong period count"));
                }
            }
            _ => errors.push("span_id", format!("span {span_id} has {} masters", masters.len())),
        }
        errors.into_result()?;

        Ok(Self {
            span_id,
            section: first.section.clone(),
            day: first.day,
            slots: ordered,
            state: SpanState::Committed,
        })
    }

    /// `Committed -> Cleared`. `removing` is everything a clear is about to
    /// delete; it must hold every period of the span.
    pub fn clear(mut self, removing: &[ClassAssignment]) -> Result<Self, ValidationErrors> {
        if self.state != SpanState::Committed {
            return Err(ValidationErrors::single(
                "span_id",
                format!("span {} is not committed", self.span_id),
            ));
        }
        let covered: HashSet<SlotId> = removing
            .iter()
            .filter(|row| row.span_id() == Some(self.span_id))
            .map(|row| row.slot_id)
            .collect();
        if let Some(missing) = self.slots.iter().find(|slot_id| !covered.contains(slot_id)) {
            return Err(ValidationErrors::single(
                "span_id",
                format!("clearing span {} would leave slot {missing} behind", self.span_id),
            ));
        }

        debug!("span {} cleared from {} slots", self.span_id, self.slots.len());
        self.state = SpanState::Cleared;
        Ok(self)
    }
}

pub struct SpanGroupManager;

impl SpanGroupManager {
    /// Validated span id and its ordered slots for (section, day).
    pub fn validate(
        calendar: &TimeSlotCalendar,
        section: &SectionKey,
        day: Day,
        slot_ids: &[SlotId],
    ) -> Result<SpanGroup, ValidationErrors> {
        SpanGroup::propose(section.clone(), day, slot_ids).validate(calendar)
    }

    pub fn plan(calendar: &TimeSlotCalendar, request: &SpannedRequest) -> Result<Vec<ClassAssignment>, ValidationErrors> {
        let first = request.slot_ids.first().copied().unwrap_or(SlotId(0));
        let group = Self::validate(calendar, &request.section, request.day, &request.slot_ids);
        let template = SlotAllocator::row(&request.section, request.day, first, &request.class);

        match (group, template) {
            (Ok(group), Ok(template)) => group.spread(&template),
            (group, template) => {
                let mut errors = ValidationErrors::new();
                if let Err(group_errors) = group {
                    errors.errors.extend(group_errors.errors);
                }
                if let Err(class_errors) = template {
                    errors.errors.extend(class_errors.errors);
                }
                Err(errors)
            }
        }
    }
}
