//! Persistence contract for time slots and class assignments.
//!
//! Reads are plain queries. Every mutation goes through
//! [`AssignmentStore::apply`], which must write a whole [`WritePlan`] or
//! nothing at all.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::model::{
    AssignmentId, ClassAssignment, Day, ElectiveGroupId, LabGroup, Resource, SectionKey, SlotId,
    SpanId, TimeSlot,
};

/// Rows to delete and rows to insert, applied as one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePlan {
    pub removals: Vec<AssignmentId>,
    pub inserts: Vec<ClassAssignment>,
}

impl WritePlan {
    pub fn remove(removals: Vec<AssignmentId>) -> Self {
        Self {
            removals,
            inserts: Vec::new(),
        }
    }}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// The full slot catalog, in any order.
    async fn time_slots(&self) -> Result<Vec<TimeSlot>, StoreError>;

    /// Adds a slot to the catalog and returns it with its id.
    async fn add_time_slot(&self, slot: TimeSlot) -> Result<TimeSlot, StoreError>;

    /// Rows stored in one (section, day, slot) cell.
    async fn in_cell(
        &self,
        section: &SectionKey,
        day: Day,
        slot_id: SlotId,
    ) -> Result<Vec<ClassAssignment>, StoreError>;

    /// Rows in any section that occupy `resource` at (day, slot).
    async fn using_resource_at(
        &self,
        resource: Resource,
        day: Day,
        slot_id: SlotId,
    ) -> Result<Vec<ClassAssignment>, StoreError>;

    /// Every row that occupies `resource`, any day.
    async fn using_resource(&self, resource: Resource) -> Result<Vec<ClassAssignment>, StoreError>;

    async fn by_span(&self, span_id: SpanId) -> Result<Vec<ClassAssignment>, StoreError>;

    async fn by_elective_group(
        &self,
        group_id: ElectiveGroupId,
    ) -> Result<Vec<ClassAssignment>, StoreError>;

    async fn by_section(&self, section: &SectionKey) -> Result<Vec<ClassAssignment>, StoreError>;

    async fn all(&self) -> Result<Vec<ClassAssignment>, StoreError>;

    /// Deletes `plan.removals`, then inserts `plan.inserts`, in one
    /// all-or-nothing write. Returns the ids of the inserted rows in order.
    ///
    /// A removal that no longer exists fails with [`StoreError::NotFound`];
    /// two rows landing in the same cell with the same lab group fail with
    /// [`StoreError::Constraint`]. Either way nothing is written.
    async fn apply(&self, plan: WritePlan) -> Result<Vec<AssignmentId>, StoreError>;
}

/// Uniqueness key the store enforces for every row: one row per cell and lab group.
pub fn cell_unique_key(row: &ClassAssignment) -> (SectionKey, Day, SlotId, Option<LabGroup>) {
    (row.section.clone(), row.day, row.slot_id, row.lab_group())
}

#[derive(Debug, Default, Clone)]
struct MemoryState {
    next_id: i64,
    slots: Vec<TimeSlot>,
    rows: BTreeMap<AssignmentId, ClassAssignment>,
}

/// In-process store. Writes build the next state on a copy and swap it in
/// only when every step succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new(slots: Vec<TimeSlot>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                next_id: 1,
                slots,
                rows: BTreeMap::new(),
            }),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn select<F>(&self, keep: F) -> Vec<ClassAssignment>
    where
        F: Fn(&ClassAssignment) -> bool + Send,
    {
        let state = self.state.read().await;
        state.rows.values().filter(|row| keep(row)).cloned().collect()
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn time_slots(&self) -> Result<Vec<TimeSlot>, StoreError> {
        Ok(self.state.read().await.slots.clone())
    }

    async fn add_time_slot(&self, mut slot: TimeSlot) -> Result<TimeSlot, StoreError> {
        let mut state = self.state.write().await;
        if state.slots.iter().any(|existing| existing.sort_order == slot.sort_order) {
            return Err(StoreError::Constraint(format!(
                "sort order {} is already used",
                slot.sort_order
            )));
        }
        let next = state.slots.iter().map(|existing| existing.id.0).max().unwrap_or(0) + 1;
        slot.id = SlotId(next);
        state.slots.push(slot.clone());
        Ok(slot)
    }

    async fn in_cell(
        &self,
        section: &SectionKey,
        day: Day,
        slot_id: SlotId,
    ) -> Result<Vec<ClassAssignment>, StoreError> {
        Ok(self
            .select(|row| &row.section == section && row.day == day && row.slot_id == slot_id)
            .await)
    }

    async fn using_resource_at(
        &self,
        resource: Resource,
        day: Day,
        slot_id: SlotId,
    ) -> Result<Vec<ClassAssignment>, StoreError> {
        Ok(self
            .select(|row| row.day == day && row.slot_id == slot_id && row.uses(resource))
            .await)
    }

    async fn using_resource(&self, resource: Resource) -> Result<Vec<ClassAssignment>, StoreError> {
        Ok(self.select(|row| row.uses(resource)).await)
    }

    async fn by_span(&self, span_id: SpanId) -> Result<Vec<ClassAssignment>, StoreError> {
        Ok(self.select(|row| row.span_id() == Some(span_id)).await)
    }

    async fn by_elective_group(
        &self,
        group_id: ElectiveGroupId,
    ) -> Result<Vec<ClassAssignment>, StoreError> {
        Ok(self.select(|row| row.elective_group() == Some(group_id)).await)
    }

    async fn by_section(&self, section: &SectionKey) -> Result<Vec<ClassAssignment>, StoreError> {
        Ok(self.select(|row| &row.section == section).await)
    }

    async fn all(&self) -> Result<Vec<ClassAssignment>, StoreError> {
        Ok(self.select(|_| true).await)
    }

    async fn apply(&self, plan: WritePlan) -> Result<Vec<AssignmentId>, StoreError> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        trace!(
            "staging {} removals and {} inserts",
            plan.removals.len(),
            plan.inserts.len()
        );

        for id in &plan.removals {
            if staged.rows.remove(id).is_none() {
                return Err(StoreError::NotFound(format!("Assignment {id}")));
            }
        }

        let mut inserted = Vec::with_capacity(plan.inserts.len());
        for mut row in plan.inserts {
            let key = cell_unique_key(&row);
            if staged.rows.values().any(|existing| cell_unique_key(existing) == key) {
                return Err(StoreError::Constraint(format!(
                    "{} already holds a row for lab group {:?}",
                    row.cell(),
                    key.3
                )));
            }
            let id = AssignmentId(staged.next_id);
            staged.next_id += 1;
            row.id = Some(id);
            staged.rows.insert(id, row);
            inserted.push(id);
        }

        *state = staged;
        debug!("applied write plan, inserted {:?}", inserted);
        Ok(inserted)
    }
}
