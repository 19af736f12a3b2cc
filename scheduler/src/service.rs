//! Two-phase routine service.
//!
//! [`RoutineService::check_conflicts`] validates a request and reports what it
//! would collide with, without writing. [`RoutineService::commit`] repeats the
//! checks while holding the per-key locks and writes only when there are no
//! conflicts or the caller overrides them. The service keeps no session state
//! and may be shared between any number of concurrent callers.
//!
//! A committed request replaces whatever sat in its target cells. The
//! displaced rows are removed as whole logical units: the full span, every
//! copy of an elective and both rows of a two-group lab go together, in the
//! same write as the new rows.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::future::Future;
use tracing::{debug, info, warn};

use crate::allocator::SlotAllocator;
use crate::audit::{self, DoubleBooking};
use crate::availability::{Availability, AvailabilityIndex, Conflict, Exclusions, Occupant};
use crate::calendar::TimeSlotCalendar;
use crate::elective::ElectiveProjector;
use crate::error::{RoutineErr, StoreError, ValidationErrors};
use crate::grid::RoutineGrid;
use crate::lab::LabGroupSplitter;
use crate::locks::{KeyLocks, LockKey};
use crate::model::{
    AssignmentId, CellKey, ClassAssignment, Day, ElectiveGroupId, Resource, SectionKey, SlotId,
    SpanId, TimeSlot,
};
use crate::registry::Registry;
use crate::request::AllocationRequest;
use crate::span::{SpanGroup, SpanGroupManager};
use crate::store::{AssignmentStore, WritePlan};

/// Locking rounds before a commit gives up on a routine that keeps changing.
const LOCK_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AllocationOutcome {
    Committed {
        /// Ids of the new rows, in write order.
        assignment_ids: Vec<AssignmentId>,
        /// Conflicts the caller chose to override.
        overridden: Vec<Conflict>,
    },
    /// Nothing was written; commit again with the override flag to proceed.
    NeedsConfirmation { conflicts: Vec<Conflict> },
}

impl AllocationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, AllocationOutcome::Committed { .. })
    }
}

/// Result of a clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ClearOutcome {
    pub removed: Vec<AssignmentId>,
    /// Every section whose grid changed.
    pub affected_sections: Vec<SectionKey>,
}

#[derive(Debug, Clone)]
struct Prepared {
    conflicts: Vec<Conflict>,
    displaced: Vec<ClassAssignment>,
}

pub struct RoutineService<S, R> {
    store: S,
    registry: R,
    locks: KeyLocks,
}

impl<S, R> RoutineService<S, R>
where
    S: AssignmentStore,
    R: Registry,
{
    pub fn new(store: S, registry: R) -> Self {
        Self {
            store,
            registry,
            locks: KeyLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub async fn calendar(&self) -> Result<TimeSlotCalendar, RoutineErr> {
        let slots = self.store.time_slots().await?;
        Ok(TimeSlotCalendar::new(slots)?)
    }

    /// Adds a slot to the catalog. The id is assigned by the store.
    pub async fn add_time_slot(&self, slot: TimeSlot) -> Result<TimeSlot, RoutineErr> {
        let slots = self.store.time_slots().await?;
        let mut errors = ValidationErrors::new();
        if let Some(existing) = slots.iter().find(|existing| existing.sort_order == slot.sort_order) {
            errors.push(
                "sort_order",
                format!("sort order {} is already used by slot {}", slot.sort_order, existing.id),
            );
        }
        if slot.end_time <= slot.start_time {
            errors.push("end_time", "the slot ends before it starts");
        }
        errors.into_result()?;

        let added = self.store.add_time_slot(slot).await.map_err(|e| match e {
            StoreError::Constraint(message) => RoutineErr::validation("sort_order", message),
            other => RoutineErr::from(other),
        })?;
        info!("added time slot {} at sort order {}", added.id, added.sort_order);
        Ok(added)
    }

    /// Validates `request` and lists its conflicts. Writes nothing.
    pub async fn check_conflicts(&self, request: &AllocationRequest) -> Result<Vec<Conflict>, RoutineErr> {
        debug!("checking {} request for day {}", request.kind(), request.day());
        let calendar = self.calendar().await?;
        let draft = self.draft(&calendar, request).await?;
        Ok(self.prepare(&draft).await?.conflicts)
    }

    /// Writes `request` atomically. With conflicts and no override, nothing
    /// is written and the conflicts come back for confirmation.
    pub async fn commit(
        &self,
        request: &AllocationRequest,
        override_conflicts: bool,
    ) -> Result<AllocationOutcome, RoutineErr> {
        debug!("committing {} request for day {}", request.kind(), request.day());
        let calendar = self.calendar().await?;
        let draft = self.draft(&calendar, request).await?;

        let mut keys = commit_keys(&draft, &[]);
        for _ in 0..LOCK_ATTEMPTS {
            let guard = self.locks.acquire(keys.iter().cloned()).await;
            let prepared = self.prepare(&draft).await?;

            let needed = commit_keys(&draft, &prepared.displaced);
            if !needed.is_subset(&guard.keys().iter().cloned().collect()) {
                debug!("displaced rows moved while locking, retrying with {} keys", needed.len());
                keys = needed;
                continue;
            }

            if !prepared.conflicts.is_empty() {
                if !override_conflicts {
                    debug!("{} conflicts need confirmation", prepared.conflicts.len());
                    return Ok(AllocationOutcome::NeedsConfirmation {
                        conflicts: prepared.conflicts,
                    });
                }
                for conflict in &prepared.conflicts {
                    warn!("overriding conflict: {conflict}");
                }
            }

            let plan = WritePlan {
                removals: prepared.displaced.iter().filter_map(|row| row.id).collect(),
                inserts: draft.clone(),
            };
            let removed = plan.removals.len();
            let assignment_ids = self.store.apply(plan).await.map_err(RoutineErr::from_write)?;
            info!(
                "committed {} request: {} rows written, {} replaced",
                request.kind(),
                assignment_ids.len(),
                removed
            );
            return Ok(AllocationOutcome::Committed {
                assignment_ids,
                overridden: prepared.conflicts,
            });
        }

        Err(RoutineErr::Atomicity(
            "the routine kept changing while locking; retry the whole request".to_string(),
        ))
    }

    /// Commits each request in turn. Every request is atomic on its own; a
    /// failure does not undo the requests before it.
    pub async fn commit_batch(
        &self,
        requests: &[AllocationRequest],
        override_conflicts: bool,
    ) -> Vec<Result<AllocationOutcome, RoutineErr>> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(self.commit(request, override_conflicts).await);
        }
        let committed = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, Ok(AllocationOutcome::Committed { .. })))
            .count();
        info!("batch of {} requests: {} committed", requests.len(), committed);
        outcomes
    }

    pub async fn is_available(&self, resource: Resource, day: Day, slot_id: SlotId) -> Result<Availability, RoutineErr> {
        let calendar = self.calendar().await?;
        if calendar.get(slot_id).is_none() {
            return Err(RoutineErr::validation(
                "slot_id",
                format!("slot {slot_id} is not in the time slot calendar"),
            ));
        }
        Ok(AvailabilityIndex::new(&self.store)
            .is_available(resource, day, slot_id, &Exclusions::none())
            .await?)
    }

    /// Clears one cell: a plain class, or every lab row in it. Span and
    /// elective members must be cleared through their group.
    pub async fn clear_slot(&self, section: &SectionKey, day: Day, slot_id: SlotId) -> Result<ClearOutcome, RoutineErr> {
        let cell = CellKey {
            section: section.clone(),
            day,
            slot_id,
        };
        self.clear_with(|| self.slot_unit(&cell)).await
    }

    /// Clears every period of a span, and the other lab group's rows when the
    /// span is one half of a two-group lab.
    /// A span whose stored rows no longer form an intact group is refused;
    /// clear its section instead.
    pub async fn clear_span(&self, span_id: SpanId) -> Result<ClearOutcome, RoutineErr> {
        self.clear_with(|| self.span_unit(span_id)).await
    }

    /// Clears every copy of an elective offering.
    pub async fn clear_elective(&self, group_id: ElectiveGroupId) -> Result<ClearOutcome, RoutineErr> {
        self.clear_with(|| self.elective_unit(group_id)).await
    }

    /// Clears a section's whole week. Electives it takes part in are cleared
    /// from their other sections too.
    pub async fn clear_section(&self, section: &SectionKey) -> Result<ClearOutcome, RoutineErr> {
        self.clear_with(|| self.section_unit(section)).await
    }

    pub async fn grid(&self, section: &SectionKey) -> Result<RoutineGrid, RoutineErr> {
        let calendar = self.calendar().await?;
        let rows = self.store.by_section(section).await?;
        Ok(RoutineGrid::assemble(section, &calendar, &rows))
    }

    /// Every row using a teacher or room, by day then calendar position.
    pub async fn resource_schedule(&self, resource: Resource) -> Result<Vec<ClassAssignment>, RoutineErr> {
        let calendar = self.calendar().await?;
        let mut rows = self.store.using_resource(resource).await?;
        rows.sort_by_key(|row| (row.day, calendar.position(row.slot_id), row.section.clone(), row.lab_group(), row.id));
        Ok(rows)
    }

    pub async fn audit(&self) -> Result<Vec<DoubleBooking>, RoutineErr> {
        let rows = self.store.all().await?;
        let found = audit::double_bookings(&rows);
        if !found.is_empty() {
            warn!("audit found {} double bookings", found.len());
        }
        Ok(found)
    }

    /// Expands a request into unsaved rows and checks its references.
    async fn draft(
        &self,
        calendar: &TimeSlotCalendar,
        request: &AllocationRequest,
    ) -> Result<Vec<ClassAssignment>, RoutineErr> {
        let rows = match request {
            AllocationRequest::Single(single) => SlotAllocator::plan(calendar, single)?,
            AllocationRequest::Spanned(spanned) => SpanGroupManager::plan(calendar, spanned)?,
            AllocationRequest::LabSplit(lab) => LabGroupSplitter::plan(calendar, lab)?,
            AllocationRequest::Elective(elective) => {
                let registered = self
                    .registry
                    .sections(&elective.program_code, elective.semester)
                    .await?;
                let projection = ElectiveProjector::plan(calendar, elective, &registered)?;
                debug!("elective group {} spans {} rows", projection.group_id, projection.rows.len());
                projection.rows
            }
        };
        self.check_references(&rows).await?;
        Ok(rows)
    }

    /// Every section, subject, teacher and room must be registered.
    async fn check_references(&self, rows: &[ClassAssignment]) -> Result<(), RoutineErr> {
        let mut sections = BTreeSet::new();
        let mut subjects = BTreeSet::new();
        let mut teachers = BTreeSet::new();
        let mut rooms = BTreeSet::new();
        for row in rows {
            sections.insert(row.section.clone());
            subjects.extend(row.subject_id);
            teachers.extend(row.teacher_ids.iter().copied());
            rooms.extend(row.room_id);
            if let Some(alternate) = row.lab.as_ref().and_then(|lab| lab.alternate.as_ref()) {
                subjects.insert(alternate.subject_id);
                teachers.extend(alternate.teacher_ids.iter().copied());
                rooms.insert(alternate.room_id);
            }
        }

        let mut errors = ValidationErrors::new();
        for section in &sections {
            if !self.registry.has_section(section).await? {
                errors.push("section", format!("section {section} is not registered"));
            }
        }
        for subject in subjects {
            if !self.registry.has_subject(subject).await? {
                errors.push("subject_id", format!("subject {} is not registered", subject.0));
            }
        }
        for teacher in teachers {
            if !self.registry.has_teacher(teacher).await? {
                errors.push("teacher_ids", format!("teacher {} is not registered", teacher.0));
            }
        }
        for room in rooms {
            if !self.registry.has_room(room).await? {
                errors.push("room_id", format!("room {} is not registered", room.0));
            }
        }
        Ok(errors.into_result()?)
    }

    /// Conflicts of a draft against the current store, and the rows a commit
    /// would displace.
    async fn prepare(&self, draft: &[ClassAssignment]) -> Result<Prepared, RoutineErr> {
        let targets: BTreeSet<CellKey> = draft.iter().map(ClassAssignment::cell).collect();

        let mut conflicts = Vec::new();
        let mut seeds = Vec::new();
        for cell in &targets {
            let occupants = self.store.in_cell(&cell.section, cell.day, cell.slot_id).await?;
            if !occupants.is_empty() {
                conflicts.push(Conflict::CellOccupied {
                    target: cell.clone(),
                    occupants: occupants.iter().map(Occupant::from).collect(),
                });
                seeds.extend(occupants);
            }
        }

        let displaced = self.logical_units(seeds).await?;
        // Rows pulled in from outside the target cells are removed as well;
        // list them so the caller sees everything an override deletes.
        let mut elsewhere: BTreeMap<CellKey, Vec<Occupant>> = BTreeMap::new();
        for row in displaced.iter().filter(|row| !targets.contains(&row.cell())) {
            elsewhere.entry(row.cell()).or_default().push(Occupant::from(row));
        }
        conflicts.extend(
            elsewhere
                .into_iter()
                .map(|(target, occupants)| Conflict::CellOccupied { target, occupants }),
        );

        let exclusions = Exclusions {
            assignment_ids: displaced.iter().filter_map(|row| row.id).collect(),
        };
        let wanted: BTreeSet<(CellKey, Resource)> = draft
            .iter()
            .flat_map(|row| row.resources().into_iter().map(move |resource| (row.cell(), resource)))
            .collect();
        let queries: Vec<(Resource, Day, SlotId)> = wanted
            .iter()
            .map(|(cell, resource)| (*resource, cell.day, cell.slot_id))
            .collect();
        let answers = AvailabilityIndex::new(&self.store)
            .check_many(&queries, &exclusions)
            .await?;

        for ((target, resource), availability) in wanted.into_iter().zip(answers) {
            if !availability.available {
                conflicts.push(Conflict::ResourceBusy {
                    target,
                    resource,
                    occupants: availability.occupants,
                });
            }
        }

        Ok(Prepared { conflicts, displaced })
    }

    /// Closes a set of rows over their span groups, elective groups and
    /// concurrent lab siblings. Ordered by id.
    async fn logical_units(&self, seeds: Vec<ClassAssignment>) -> Result<Vec<ClassAssignment>, StoreError> {
        let mut units: BTreeMap<AssignmentId, ClassAssignment> = BTreeMap::new();
        let mut spans = HashSet::new();
        let mut electives = HashSet::new();
        let mut lab_cells = HashSet::new();
        let mut pending = seeds;

        while let Some(row) = pending.pop() {
            let Some(id) = row.id else { continue };
            if units.contains_key(&id) {
                continue;
            }
            if let Some(span_id) = row.span_id().filter(|span_id| spans.insert(*span_id)) {
                pending.extend(self.store.by_span(span_id).await?);
            }
            if let Some(group) = row.elective_group().filter(|group| electives.insert(*group)) {
                pending.extend(self.store.by_elective_group(group).await?);
            }
            if row.is_concurrent_lab() && lab_cells.insert(row.cell()) {
                let siblings = self.store.in_cell(&row.section, row.day, row.slot_id).await?;
                pending.extend(siblings.into_iter().filter(ClassAssignment::is_concurrent_lab));
            }
            units.insert(id, row);
        }
        Ok(units.into_values().collect())
    }

    async fn slot_unit(&self, cell: &CellKey) -> Result<Vec<ClassAssignment>, RoutineErr> {
        let rows = self.store.in_cell(&cell.section, cell.day, cell.slot_id).await?;
        if rows.is_empty() {
            return Err(RoutineErr::NotFound(format!("Assignment at {cell}")));
        }
        if let Some(span_id) = rows.iter().find_map(ClassAssignment::span_id) {
            return Err(RoutineErr::validation(
                "slot_id",
                format!("{cell} is one period of span {span_id}; clear the whole span instead"),
            ));
        }
        if let Some(group) = rows.iter().find_map(ClassAssignment::elective_group) {
            return Err(RoutineErr::validation(
                "slot_id",
                format!("{cell} belongs to elective group {group}; clear the elective group instead"),
            ));
        }
        Ok(rows)
    }

    async fn span_unit(&self, span_id: SpanId) -> Result<Vec<ClassAssignment>, RoutineErr> {
        let rows = self.store.by_span(span_id).await?;
        if rows.is_empty() {
            return Err(RoutineErr::NotFound(format!("Span {span_id}")));
        }
        if let Some(group) = rows.iter().find_map(ClassAssignment::elective_group) {
            return Err(RoutineErr::validation(
                "span_id",
                format!("span {span_id} belongs to elective group {group}; clear the elective group instead"),
            ));
        }

        let calendar = self.calendar().await?;
        let group = SpanGroup::committed(&calendar, &rows)?;
        let unit = self.logical_units(rows).await?;
        group.clear(&unit)?;
        Ok(unit)
    }

    async fn elective_unit(&self, group_id: ElectiveGroupId) -> Result<Vec<ClassAssignment>, RoutineErr> {
        let rows = self.store.by_elective_group(group_id).await?;
        if rows.is_empty() {
            return Err(RoutineErr::NotFound(format!("Elective group {group_id}")));
        }
        Ok(self.logical_units(rows).await?)
    }

    async fn section_unit(&self, section: &SectionKey) -> Result<Vec<ClassAssignment>, RoutineErr> {
        let rows = self.store.by_section(section).await?;
        if rows.is_empty() {
            return Err(RoutineErr::NotFound(format!("Routine of {section}")));
        }
        Ok(self.logical_units(rows).await?)
    }

    /// Locks the cells of the selected rows, selects again under the lock and
    /// removes the rows in one write.
    async fn clear_with<F, Fut>(&self, select: F) -> Result<ClearOutcome, RoutineErr>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Vec<ClassAssignment>, RoutineErr>>,
    {
        let mut keys = cell_keys(&select().await?);
        for _ in 0..LOCK_ATTEMPTS {
            let guard = self.locks.acquire(keys.iter().cloned()).await;
            let rows = select().await?;

            let needed = cell_keys(&rows);
            if !needed.is_subset(&guard.keys().iter().cloned().collect()) {
                keys = needed;
                continue;
            }

            let removed: Vec<AssignmentId> = rows.iter().filter_map(|row| row.id).collect();
            let affected_sections: Vec<SectionKey> = rows
                .iter()
                .map(|row| row.section.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            self.store
                .apply(WritePlan::remove(removed.clone()))
                .await
                .map_err(RoutineErr::from_write)?;
            info!("cleared {} rows from {} sections", removed.len(), affected_sections.len());
            return Ok(ClearOutcome {
                removed,
                affected_sections,
            });
        }

        Err(RoutineErr::Atomicity(
            "the routine kept changing while locking; retry the clear".to_string(),
        ))
    }
}

/// Keys a commit must hold: the cells and bookings it writes, and the cells
/// it empties.
fn commit_keys(inserts: &[ClassAssignment], displaced: &[ClassAssignment]) -> BTreeSet<LockKey> {
    let mut keys: BTreeSet<LockKey> = inserts.iter().flat_map(LockKey::for_row).collect();
    keys.extend(cell_keys(displaced));
    keys
}

fn cell_keys(rows: &[ClassAssignment]) -> BTreeSet<LockKey> {
    rows.iter().map(|row| LockKey::Cell(row.cell())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod common {
        use crate::model::{ClassType, Day, SlotId};
        use crate::request::{
            AllocationRequest, ClassDetails, ElectiveRequest, GroupDetails, LabGroupMode, LabSplitRequest,
            SingleSlotRequest, SpannedRequest,
        };
        use crate::testing::{section_ab, section_cd};

        pub(crate) fn single(section_cd_instead: bool, day: Day, slot: i32, subject: i32, teacher: i32, room: i32) -> AllocationRequest {
            AllocationRequest::Single(SingleSlotRequest {
                section: if section_cd_instead { section_cd() } else { section_ab() },
                day,
                slot_id: SlotId(slot),
                class: ClassDetails::new(ClassType::Lecture)
                    .with_subject(subject)
                    .with_teachers(&[teacher])
                    .with_room(room),
            })
        }

        pub(crate) fn spanned(slot_ids: &[i32]) -> AllocationRequest {
            AllocationRequest::Spanned(SpannedRequest {
                section: section_ab(),
                day: Day::Monday,
                slot_ids: slot_ids.iter().copied().map(SlotId).collect(),
                class: ClassDetails::new(ClassType::Practical).with_subject(20).with_teachers(&[2]).with_room(12),
            })
        }

        pub(crate) fn both_groups(slot_ids: &[i32]) -> AllocationRequest {
            AllocationRequest::LabSplit(LabSplitRequest {
                section: section_ab(),
                day: Day::Tuesday,
                slot_ids: slot_ids.iter().copied().map(SlotId).collect(),
                mode: LabGroupMode::BothGroups,
                group_a: Some(GroupDetails::new(30, &[4], 21)),
                group_b: Some(GroupDetails::new(31, &[5], 22)),
                notes: String::new(),
            })
        }

        pub(crate) fn alt_weeks(slot_ids: &[i32]) -> AllocationRequest {
            match both_groups(slot_ids) {
                AllocationRequest::LabSplit(mut lab) => {
                    lab.mode = LabGroupMode::AltWeeks;
                    AllocationRequest::LabSplit(lab)
                }
                other => other,
            }
        }

        pub(crate) fn elective(semester: u8, number: u8) -> AllocationRequest {
            AllocationRequest::Elective(ElectiveRequest {
                program_code: "BCT".to_string(),
                semester,
                day: Day::Wednesday,
                slot_ids: vec![SlotId(1)],
                elective_number: number,
                elective_type: None,
                label: Some("Cloud Computing".to_string()),
                target_sections: None,
                class: ClassDetails::new(ClassType::Lecture).with_subject(70).with_teachers(&[9]).with_room(40),
            })
        }

        pub(crate) fn committed_ids(outcome: crate::service::AllocationOutcome) -> Vec<crate::model::AssignmentId> {
            match outcome {
                crate::service::AllocationOutcome::Committed { assignment_ids, .. } => assignment_ids,
                other => panic!("expected a commit, got {other:?}"),
            }
        }
    }

    mod unit_tests {
        use super::common::*;
        use super::*;
        use crate::grid::CellView;
        use crate::model::{ClassType, LabGroup, RoomId, SubjectId, TeacherId};
        use crate::span::SpanState;
        use crate::store::MemoryStore;
        use crate::testing::{FailingStore, memory_service, registry, section_ab, section_cd};
        use std::sync::Arc;

        #[tokio::test]
        async fn test_allocate_then_clear_single_lecture() {
            let service = memory_service();
            let grid = service.grid(&section_ab()).await.unwrap();
            assert!(grid.is_blank());

            let ids = committed_ids(service.commit(&single(false, Day::Sunday, 0, 101, 1, 1), false).await.unwrap());
            assert_eq!(ids.len(), 1);

            let grid = service.grid(&section_ab()).await.unwrap();
            let entries = grid.cell(Day::Sunday, SlotId(0)).unwrap().entries();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].subject_id, Some(SubjectId(101)));
            assert_eq!(entries[0].teacher_ids, vec![TeacherId(1)]);
            assert_eq!(entries[0].room_id, Some(RoomId(1)));

            let cleared = service.clear_slot(&section_ab(), Day::Sunday, SlotId(0)).await.unwrap();
            assert_eq!(cleared.removed, ids);
            assert_eq!(cleared.affected_sections, vec![section_ab()]);
            assert_eq!(service.grid(&section_ab()).await.unwrap(), grid_of_empty(&service).await);
        }

        async fn grid_of_empty(service: &RoutineService<MemoryStore, crate::registry::StaticRegistry>) -> RoutineGrid {
            RoutineGrid::assemble(&section_ab(), &service.calendar().await.unwrap(), &[])
        }

        #[tokio::test]
        async fn test_clearing_an_empty_cell_is_not_found() {
            let service = memory_service();
            let err = service.clear_slot(&section_ab(), Day::Sunday, SlotId(0)).await.unwrap_err();
            assert!(matches!(err, RoutineErr::NotFound(_)));
        }

        #[tokio::test]
        async fn test_span_commit_and_group_clear() {
            let service = memory_service();
            let ids = committed_ids(service.commit(&spanned(&[2, 3]), false).await.unwrap());
            assert_eq!(ids.len(), 2);

            let rows = service.store().by_section(&section_ab()).await.unwrap();
            let calendar = service.calendar().await.unwrap();
            let group = SpanGroup::committed(&calendar, &rows).unwrap();
            assert_eq!(group.state(), SpanState::Committed);
            assert_eq!(group.slots(), &[SlotId(2), SlotId(3)]);

            // One period of a span cannot be cleared on its own.
            let err = service.clear_slot(&section_ab(), Day::Monday, SlotId(3)).await.unwrap_err();
            assert!(matches!(err, RoutineErr::Validation(_)));

            let cleared = service.clear_span(group.span_id()).await.unwrap();
            assert_eq!(cleared.removed.len(), 2);
            assert!(service.store().is_empty().await);

            let err = service.clear_span(group.span_id()).await.unwrap_err();
            assert!(matches!(err, RoutineErr::NotFound(_)));
        }

        #[tokio::test]
        async fn test_span_with_gap_writes_nothing() {
            let service = memory_service();
            let err = service.commit(&spanned(&[2, 4]), true).await.unwrap_err();
            match err {
                RoutineErr::Validation(errors) => assert!(errors.has_field("slot_ids")),
                other => panic!("expected a validation error, got {other:?}"),
            }
            assert!(service.store().is_empty().await);
        }

        #[tokio::test]
        async fn test_span_master_sits_at_lowest_position_for_any_order() {
            use rand::seq::SliceRandom;

            let service = memory_service();
            let mut slot_ids = vec![5, 6, 7];
            slot_ids.shuffle(&mut rand::rng());
            service.commit(&spanned(&slot_ids), false).await.unwrap();

            let rows = service.store().by_section(&section_ab()).await.unwrap();
            let masters: Vec<_> = rows.iter().filter(|row| !row.is_span_follower()).collect();
            assert_eq!(masters.len(), 1);
            assert_eq!(masters[0].slot_id, SlotId(5));
            assert_eq!(masters[0].span.as_ref().unwrap().periods, 3);
        }

        #[tokio::test]
        async fn test_both_groups_commit_and_clear_together() {
            let service = memory_service();
            committed_ids(service.commit(&both_groups(&[2]), false).await.unwrap());

            let rows = service.store().in_cell(&section_ab(), Day::Tuesday, SlotId(2)).await.unwrap();
            let mut groups: Vec<_> = rows.iter().filter_map(ClassAssignment::lab_group).collect();
            groups.sort();
            assert_eq!(groups, vec![LabGroup::A, LabGroup::B]);

            let grid = service.grid(&section_ab()).await.unwrap();
            let entries = grid.cell(Day::Tuesday, SlotId(2)).unwrap().entries();
            assert_eq!(entries[0].lab_group(), Some(LabGroup::A));

            let cleared = service.clear_slot(&section_ab(), Day::Tuesday, SlotId(2)).await.unwrap();
            assert_eq!(cleared.removed.len(), 2);
            assert!(service.store().is_empty().await);
        }

        #[tokio::test]
        async fn test_spanned_both_groups_clear_through_either_span() {
            let service = memory_service();
            committed_ids(service.commit(&both_groups(&[0, 1]), false).await.unwrap());
            assert_eq!(service.store().len().await, 4);

            let rows = service.store().in_cell(&section_ab(), Day::Tuesday, SlotId(0)).await.unwrap();
            let b_span = rows
                .iter()
                .find(|row| row.lab_group() == Some(LabGroup::B))
                .and_then(ClassAssignment::span_id)
                .unwrap();

            let cleared = service.clear_span(b_span).await.unwrap();
            assert_eq!(cleared.removed.len(), 4);
            assert!(service.store().is_empty().await);
        }

        #[tokio::test]
        async fn test_lab_groups_do_not_conflict_with_each_other() {
            let service = memory_service();
            let request = match both_groups(&[2]) {
                AllocationRequest::LabSplit(mut lab) => {
                    // Same teacher supervises both groups.
                    lab.group_b = Some(crate::request::GroupDetails::new(31, &[4], 22));
                    AllocationRequest::LabSplit(lab)
                }
                other => other,
            };
            assert!(service.check_conflicts(&request).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_both_groups_report_a_busy_group_b_room() {
            let service = memory_service();
            // Room 22 is where Group B would work.
            committed_ids(service.commit(&single(true, Day::Tuesday, 2, 1, 1, 22), false).await.unwrap());

            let conflicts = service.check_conflicts(&both_groups(&[2])).await.unwrap();
            assert_eq!(conflicts.len(), 1);
            match &conflicts[0] {
                Conflict::ResourceBusy { target, resource, occupants } => {
                    assert_eq!(*resource, Resource::Room(RoomId(22)));
                    assert_eq!(target.section, section_ab());
                    assert_eq!(occupants[0].section, section_cd());
                }
                other => panic!("expected a busy room, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_alt_weeks_books_both_group_configurations() {
            let service = memory_service();
            // Teacher 5 only runs the Group B weeks.
            committed_ids(service.commit(&single(true, Day::Tuesday, 2, 1, 5, 1), false).await.unwrap());

            let conflicts = service.check_conflicts(&alt_weeks(&[2])).await.unwrap();
            assert_eq!(conflicts.len(), 1);
            assert!(matches!(
                conflicts[0],
                Conflict::ResourceBusy { resource: Resource::Teacher(TeacherId(5)), .. }
            ));
        }

        #[tokio::test]
        async fn test_elective_projects_into_both_sections_and_clears_together() {
            let service = memory_service();
            let ids = committed_ids(service.commit(&elective(7, 1), false).await.unwrap());
            assert_eq!(ids.len(), 2);

            let ab = service.store().in_cell(&section_ab(), Day::Wednesday, SlotId(1)).await.unwrap();
            let cd = service.store().in_cell(&section_cd(), Day::Wednesday, SlotId(1)).await.unwrap();
            assert_eq!(ab.len(), 1);
            assert_eq!(cd.len(), 1);
            let group = ab[0].elective_group().unwrap();
            assert_eq!(cd[0].elective_group(), Some(group));

            // Half an elective cannot be cleared.
            let err = service.clear_slot(&section_cd(), Day::Wednesday, SlotId(1)).await.unwrap_err();
            assert!(matches!(err, RoutineErr::Validation(_)));
            assert_eq!(service.store().len().await, 2);

            let cleared = service.clear_elective(group).await.unwrap();
            assert_eq!(cleared.removed.len(), 2);
            assert_eq!(cleared.affected_sections, vec![section_ab(), section_cd()]);
            assert!(service.store().is_empty().await);
        }

        #[tokio::test]
        async fn test_clearing_twice_is_not_found() {
            let service = memory_service();
            committed_ids(service.commit(&elective(7, 1), false).await.unwrap());
            let group = service.store().all().await.unwrap()[0].elective_group().unwrap();

            assert_eq!(service.clear_elective(group).await.unwrap().removed.len(), 2);
            let err = service.clear_elective(group).await.unwrap_err();
            assert!(matches!(err, RoutineErr::NotFound(_)));

            let err = service.clear_section(&section_ab()).await.unwrap_err();
            assert!(matches!(err, RoutineErr::NotFound(_)));
        }

        #[tokio::test]
        async fn test_spanned_elective_clears_only_through_its_group() {
            let service = memory_service();
            let request = match elective(7, 1) {
                AllocationRequest::Elective(mut elective) => {
                    elective.slot_ids = vec![SlotId(3), SlotId(2)];
                    AllocationRequest::Elective(elective)
                }
                other => other,
            };
            assert_eq!(committed_ids(service.commit(&request, false).await.unwrap()).len(), 4);

            let rows = service.store().in_cell(&section_ab(), Day::Wednesday, SlotId(2)).await.unwrap();
            let span_id = rows[0].span_id().unwrap();
            match service.clear_span(span_id).await.unwrap_err() {
                RoutineErr::Validation(errors) => assert!(errors.has_field("span_id")),
                other => panic!("expected a validation error, got {other:?}"),
            }
            assert_eq!(service.store().len().await, 4);

            let cleared = service.clear_elective(rows[0].elective_group().unwrap()).await.unwrap();
            assert_eq!(cleared.removed.len(), 4);
            assert!(service.store().is_empty().await);
        }

        #[tokio::test]
        async fn test_broken_span_is_refused_but_its_section_clears() {
            let service = memory_service();
            committed_ids(service.commit(&spanned(&[2, 3]), false).await.unwrap());

            let rows = service.store().by_section(&section_ab()).await.unwrap();
            let master = rows.iter().find(|row| !row.is_span_follower()).unwrap();
            let span_id = master.span_id().unwrap();
            service
                .store()
                .apply(WritePlan::remove(vec![master.id.unwrap()]))
                .await
                .unwrap();

            match service.clear_span(span_id).await.unwrap_err() {
                RoutineErr::Validation(errors) => assert!(errors.has_field("span_id")),
                other => panic!("expected a validation error, got {other:?}"),
            }
            assert_eq!(service.store().len().await, 1);

            let cleared = service.clear_section(&section_ab()).await.unwrap();
            assert_eq!(cleared.removed.len(), 1);
            assert!(service.store().is_empty().await);
        }

        #[tokio::test]
        async fn test_elective_number_rules_block_the_write() {
            let service = memory_service();
            for request in [elective(8, 3), elective(7, 2)] {
                let err = service.commit(&request, true).await.unwrap_err();
                match err {
                    RoutineErr::Validation(errors) => assert!(errors.has_field("elective_number")),
                    other => panic!("expected a validation error, got {other:?}"),
                }
            }
            assert!(service.store().is_empty().await);
        }

        #[tokio::test]
        async fn test_elective_reports_conflict_per_section() {
            let service = memory_service();
            // Teacher 9 already has a semester 5 class at that slot.
            let busy = AllocationRequest::Single(crate::request::SingleSlotRequest {
                section: SectionKey::new("BCT", 5, "CD"),
                day: Day::Wednesday,
                slot_id: SlotId(1),
                class: crate::request::ClassDetails::new(ClassType::Lecture)
                    .with_subject(3)
                    .with_teachers(&[9])
                    .with_room(41),
            });
            service.commit(&busy, false).await.unwrap();

            let conflicts = service.check_conflicts(&elective(7, 1)).await.unwrap();
            // One for each target section using teacher 9.
            let busy_teacher: Vec<_> = conflicts
                .iter()
                .filter(|conflict| matches!(conflict, Conflict::ResourceBusy { resource: Resource::Teacher(TeacherId(9)), .. }))
                .collect();
            assert_eq!(busy_teacher.len(), 2);
            assert_eq!(busy_teacher[0].occupants()[0].section, SectionKey::new("BCT", 5, "CD"));
        }

        #[tokio::test]
        async fn test_conflict_override_round_trip() {
            let service = memory_service();
            committed_ids(service.commit(&single(true, Day::Sunday, 0, 11, 1, 101), false).await.unwrap());

            let request = single(false, Day::Sunday, 0, 101, 1, 1);
            let conflicts = service.check_conflicts(&request).await.unwrap();
            assert_eq!(conflicts.len(), 1);
            assert!(conflicts[0].to_string().contains("BCT-7-CD"));

            let outcome = service.commit(&request, false).await.unwrap();
            assert!(matches!(outcome, AllocationOutcome::NeedsConfirmation { ref conflicts } if conflicts.len() == 1));
            assert_eq!(service.store().len().await, 1);

            let outcome = service.commit(&request, true).await.unwrap();
            let new_id = match outcome {
                AllocationOutcome::Committed { assignment_ids, overridden } => {
                    assert_eq!(overridden.len(), 1);
                    assignment_ids[0]
                }
                other => panic!("expected a commit, got {other:?}"),
            };

            let availability = service
                .is_available(Resource::Teacher(TeacherId(1)), Day::Sunday, SlotId(0))
                .await
                .unwrap();
            assert!(!availability.available);
            assert!(availability.occupants.iter().any(|occupant| occupant.assignment_id == Some(new_id)));

            assert_eq!(service.audit().await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_occupied_cell_replaced_with_whole_span() {
            let service = memory_service();
            committed_ids(service.commit(&spanned(&[2, 3]), false).await.unwrap());

            let request = AllocationRequest::Single(crate::request::SingleSlotRequest {
                section: section_ab(),
                day: Day::Monday,
                slot_id: SlotId(3),
                class: crate::request::ClassDetails::new(ClassType::Tutorial)
                    .with_subject(8)
                    .with_teachers(&[6])
                    .with_room(7),
            });
            let conflicts = service.check_conflicts(&request).await.unwrap();
            let occupied: Vec<_> = conflicts.iter().map(|conflict| conflict.target().slot_id).collect();
            assert_eq!(occupied, vec![SlotId(3), SlotId(2)]);

            committed_ids(service.commit(&request, true).await.unwrap());
            let rows = service.store().by_section(&section_ab()).await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].class_type, ClassType::Tutorial);
            assert!(rows[0].span.is_none());
        }

        #[tokio::test]
        async fn test_grid_is_idempotent() {
            let service = memory_service();
            service.commit(&single(false, Day::Sunday, 0, 101, 1, 1), false).await.unwrap();
            service.commit(&spanned(&[2, 3]), false).await.unwrap();
            service.commit(&both_groups(&[5]), false).await.unwrap();

            let first = service.grid(&section_ab()).await.unwrap();
            let second = service.grid(&section_ab()).await.unwrap();
            assert_eq!(first, second);
            assert!(matches!(first.cell(Day::Monday, SlotId(2)), Some(CellView::Class { col_span: 2, .. })));
        }

        #[tokio::test]
        async fn test_concurrent_commits_cannot_double_book() {
            let service = Arc::new(memory_service());
            let mut handles = Vec::new();
            for cd in [false, true] {
                let service = service.clone();
                handles.push(tokio::spawn(async move {
                    service.commit(&single(cd, Day::Friday, 3, 50, 77, 200 + i32::from(cd)), false).await
                }));
            }

            let mut committed = 0;
            for handle in handles {
                if handle.await.unwrap().unwrap().is_committed() {
                    committed += 1;
                }
            }
            assert_eq!(committed, 1);
            let booked = service
                .store()
                .using_resource_at(Resource::Teacher(TeacherId(77)), Day::Friday, SlotId(3))
                .await
                .unwrap();
            assert_eq!(booked.len(), 1);
        }

        #[tokio::test]
        async fn test_failed_write_rolls_back_everything() {
            let service = RoutineService::new(FailingStore::new(), registry());
            service.store().fail();

            let err = service.commit(&elective(7, 1), false).await.unwrap_err();
            assert!(matches!(err, RoutineErr::Atomicity(_)));
            assert!(service.store().inner.is_empty().await);
        }

        #[tokio::test]
        async fn test_unregistered_references_are_validation_errors() {
            let service = memory_service();
            let err = service
                .commit(&single(false, Day::Sunday, 0, 101, 1000, 1), false)
                .await
                .unwrap_err();
            match err {
                RoutineErr::Validation(errors) => assert!(errors.has_field("teacher_ids")),
                other => panic!("expected a validation error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_clear_section_takes_elective_siblings() {
            let service = memory_service();
            service.commit(&elective(7, 1), false).await.unwrap();
            service.commit(&single(false, Day::Sunday, 0, 101, 1, 1), false).await.unwrap();

            let cleared = service.clear_section(&section_ab()).await.unwrap();
            assert_eq!(cleared.removed.len(), 3);
            assert_eq!(cleared.affected_sections, vec![section_ab(), section_cd()]);
            assert!(service.store().is_empty().await);
        }

        #[tokio::test]
        async fn test_batch_commits_each_request_on_its_own() {
            let service = memory_service();
            let requests = vec![
                single(false, Day::Sunday, 0, 101, 1, 1),
                spanned(&[2, 4]),
                single(true, Day::Sunday, 0, 12, 1, 2),
            ];
            let outcomes = service.commit_batch(&requests, false).await;

            assert!(outcomes[0].as_ref().unwrap().is_committed());
            assert!(matches!(outcomes[1], Err(RoutineErr::Validation(_))));
            assert!(matches!(outcomes[2], Ok(AllocationOutcome::NeedsConfirmation { .. })));
            assert_eq!(service.store().len().await, 1);
        }

        #[tokio::test]
        async fn test_resource_schedule_orders_by_day_and_slot() {
            let service = memory_service();
            service.commit(&single(false, Day::Monday, 1, 101, 3, 1), false).await.unwrap();
            service.commit(&single(true, Day::Sunday, 6, 101, 3, 2), false).await.unwrap();
            service.commit(&single(true, Day::Sunday, 0, 101, 3, 2), false).await.unwrap();

            let schedule = service.resource_schedule(Resource::Teacher(TeacherId(3))).await.unwrap();
            let places: Vec<_> = schedule.iter().map(|row| (row.day, row.slot_id.0)).collect();
            assert_eq!(places, vec![(Day::Sunday, 0), (Day::Sunday, 6), (Day::Monday, 1)]);
        }

        #[tokio::test]
        async fn test_add_time_slot_checks_times() {
            let service = memory_service();
            let mut slot = crate::testing::slot(0, 90, 16);
            let added = service.add_time_slot(slot.clone()).await.unwrap();
            assert_eq!(added.id, SlotId(8));
            assert_eq!(service.calendar().await.unwrap().len(), 9);

            slot.sort_order = 95;
            slot.end_time = slot.start_time;
            match service.add_time_slot(slot).await.unwrap_err() {
                RoutineErr::Validation(errors) => assert!(errors.has_field("end_time")),
                other => panic!("expected a validation error, got {other:?}"),
            }

            // Slot 0 already sits at sort order 10.
            match service.add_time_slot(crate::testing::slot(0, 10, 17)).await.unwrap_err() {
                RoutineErr::Validation(errors) => {
                    assert!(errors.has_field("sort_order"));
                    assert!(!errors.has_field("time_slots"));
                }
                other => panic!("expected a validation error, got {other:?}"),
            }
            assert_eq!(service.calendar().await.unwrap().len(), 9);
        }
    }
}
