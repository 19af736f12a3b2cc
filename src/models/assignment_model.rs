use async_trait::async_trait;
use chrono::NaiveTime;
use scheduler::{
    AssignmentId, AssignmentStore, ClassAssignment, Day, ElectiveGroupId, LabGroup, Resource,
    SectionKey, SlotId, SpanId, StoreError, TimeSlot, WritePlan,
};
use sqlx::types::Json;
use sqlx::{FromRow, Pool, Postgres};
use tracing::{debug, trace};

const SELECT_ASSIGNMENTS: &str = "SELECT id, details FROM class_assignments";

/// Postgres-backed assignment and time slot store.
///
/// Each row keeps the full `ClassAssignment` as JSON next to the columns the
/// lookups filter on. The unique index on (section, day, slot, lab group)
/// backs the one-occupant-per-cell rule.
#[derive(Debug, Clone)]
pub struct PgAssignmentStore {
    db_pool: Pool<Postgres>,
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: i64,
    details: Json<ClassAssignment>,
}

impl From<AssignmentRow> for ClassAssignment {
    fn from(row: AssignmentRow) -> Self {
        let mut assignment = row.details.0;
        assignment.id = Some(AssignmentId(row.id));
        assignment
    }
}

#[derive(Debug, FromRow)]
struct TimeSlotRow {
    id: i32,
    sort_order: i32,
    start_time: NaiveTime,
    end_time: NaiveTime,
    is_break: bool,
}

impl From<TimeSlotRow> for TimeSlot {
    fn from(row: TimeSlotRow) -> Self {
        Self {
            id: SlotId(row.id),
            sort_order: row.sort_order,
            start_time: row.start_time,
            end_time: row.end_time,
            is_break: row.is_break,
        }
    }
}

/// Maps a sqlx failure onto the store error the engine understands.
fn store_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db)
            if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() =>
        {
            StoreError::Constraint(db.message().to_string())
        }
        sqlx::Error::RowNotFound => StoreError::NotFound("Row".to_string()),
        _ => StoreError::Io(e.to_string()),
    }
}

fn lab_group_name(group: LabGroup) -> &'static str {
    match group {
        LabGroup::A => "A",
        LabGroup::B => "B",
        LabGroup::All => "ALL",
    }
}

/// Teacher ids and room ids a row occupies, alternate-week configuration included.
fn resource_columns(row: &ClassAssignment) -> (Vec<i32>, Vec<i32>) {
    let mut teachers = Vec::new();
    let mut rooms = Vec::new();
    for resource in row.resources() {
        match resource {
            Resource::Teacher(id) => teachers.push(id.0),
            Resource::Room(id) => rooms.push(id.0),
        }
    }
    (teachers, rooms)
}

fn resource_filter(resource: Resource) -> (&'static str, i32) {
    match resource {
        Resource::Teacher(id) => ("$1 = ANY(teacher_ids)", id.0),
        Resource::Room(id) => ("$1 = ANY(room_ids)", id.0),
    }
}

impl PgAssignmentStore {
    pub fn new(db_pool: Pool<Postgres>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AssignmentStore for PgAssignmentStore {
    async fn time_slots(&self) -> Result<Vec<TimeSlot>, StoreError> {
        let rows = sqlx::query_as::<_, TimeSlotRow>(
            "SELECT id, sort_order, start_time, end_time, is_break FROM time_slots ORDER BY sort_order",
        )
        .fetch_all(&self.db_pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(TimeSlot::from).collect())
    }

    async fn add_time_slot(&self, slot: TimeSlot) -> Result<TimeSlot, StoreError> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO time_slots (sort_order, start_time, end_time, is_break) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(slot.sort_order)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(slot.is_break)
        .fetch_one(&self.db_pool)
        .await
        .map_err(store_err)?;

        Ok(TimeSlot {
            id: SlotId(id),
            ..slot
        })
    }

    async fn in_cell(
        &self,
        section: &SectionKey,
        day: Day,
        slot_id: SlotId,
    ) -> Result<Vec<ClassAssignment>, StoreError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "{SELECT_ASSIGNMENTS} WHERE program_code = $1 AND semester = $2 AND section = $3 \
             AND day = $4 AND slot_id = $5 ORDER BY id"
        ))
        .bind(&section.program_code)
        .bind(i16::from(section.semester))
        .bind(&section.section)
        .bind(i16::from(day.index()))
        .bind(slot_id.0)
        .fetch_all(&self.db_pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(ClassAssignment::from).collect())
    }

    async fn using_resource_at(
        &self,
        resource: Resource,
        day: Day,
        slot_id: SlotId,
    ) -> Result<Vec<ClassAssignment>, StoreError> {
        let (filter, id) = resource_filter(resource);
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "{SELECT_ASSIGNMENTS} WHERE {filter} AND day = $2 AND slot_id = $3 ORDER BY id"
        ))
        .bind(id)
        .bind(i16::from(day.index()))
        .bind(slot_id.0)
        .fetch_all(&self.db_pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(ClassAssignment::from).collect())
    }

    async fn using_resource(&self, resource: Resource) -> Result<Vec<ClassAssignment>, StoreError> {
        let (filter, id) = resource_filter(resource);
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!("{SELECT_ASSIGNMENTS} WHERE {filter} ORDER BY id"))
            .bind(id)
            .fetch_all(&self.db_pool)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(ClassAssignment::from).collect())
    }

    async fn by_span(&self, span_id: SpanId) -> Result<Vec<ClassAssignment>, StoreError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!("{SELECT_ASSIGNMENTS} WHERE span_id = $1 ORDER BY id"))
            .bind(span_id.0)
            .fetch_all(&self.db_pool)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(ClassAssignment::from).collect())
    }

    async fn by_elective_group(
        &self,
        group_id: ElectiveGroupId,
    ) -> Result<Vec<ClassAssignment>, StoreError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "{SELECT_ASSIGNMENTS} WHERE elective_group_id = $1 ORDER BY id"
        ))
        .bind(group_id.0)
        .fetch_all(&self.db_pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(ClassAssignment::from).collect())
    }

    async fn by_section(&self, section: &SectionKey) -> Result<Vec<ClassAssignment>, StoreError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "{SELECT_ASSIGNMENTS} WHERE program_code = $1 AND semester = $2 AND section = $3 ORDER BY id"
        ))
        .bind(&section.program_code)
        .bind(i16::from(section.semester))
        .bind(&section.section)
        .fetch_all(&self.db_pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(ClassAssignment::from).collect())
    }

    async fn all(&self) -> Result<Vec<ClassAssignment>, StoreError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!("{SELECT_ASSIGNMENTS} ORDER BY id"))
            .fetch_all(&self.db_pool)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(ClassAssignment::from).collect())
    }

    /// Deletes then inserts inside one transaction. Returning early drops the
    /// transaction, which rolls every statement back.
    async fn apply(&self, plan: WritePlan) -> Result<Vec<AssignmentId>, StoreError> {
        trace!(
            "applying {} removals and {} inserts",
            plan.removals.len(),
            plan.inserts.len()
        );
        let mut tx = self.db_pool.begin().await.map_err(store_err)?;

        for id in &plan.removals {
            let result = sqlx::query("DELETE FROM class_assignments WHERE id = $1")
                .bind(id.0)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("Assignment {id}")));
            }
        }

        let mut inserted = Vec::with_capacity(plan.inserts.len());
        for mut row in plan.inserts {
            row.id = None;
            let (teacher_ids, room_ids) = resource_columns(&row);
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO class_assignments \
                 (program_code, semester, section, day, slot_id, lab_group, span_id, elective_group_id, \
                  teacher_ids, room_ids, details) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
            )
            .bind(&row.section.program_code)
            .bind(i16::from(row.section.semester))
            .bind(&row.section.section)
            .bind(i16::from(row.day.index()))
            .bind(row.slot_id.0)
            .bind(row.lab_group().map(lab_group_name))
            .bind(row.span_id().map(|span| span.0))
            .bind(row.elective_group().map(|group| group.0))
            .bind(teacher_ids)
            .bind(room_ids)
            .bind(Json(&row))
            .fetch_one(&mut *tx)
            .await
            .map_err(store_err)?;
            inserted.push(AssignmentId(id));
        }

        tx.commit().await.map_err(store_err)?;
        debug!("applied write plan, inserted {:?}", inserted);
        Ok(inserted)
    }
}
