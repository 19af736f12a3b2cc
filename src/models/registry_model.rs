use async_trait::async_trait;
use scheduler::{Registry, RoomId, StoreError, SubjectId, TeacherId};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Pool, Postgres};
use std::error::Error;
use utoipa::ToSchema;

type BoxedError = Box<dyn Error + Send + Sync>;

/// Program/section, subject, teacher and room catalogs stored in Postgres.
#[derive(Debug, Clone)]
pub struct PgRegistry {
    db_pool: Pool<Postgres>,
}

impl PgRegistry {
    pub fn new(db_pool: Pool<Postgres>) -> Self {
        Self { db_pool }
    }

    async fn exists(&self, table: &str, id: i32) -> Result<bool, StoreError> {
        sqlx::query_scalar(&format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)"))
            .bind(id)
            .fetch_one(&self.db_pool)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl Registry for PgRegistry {
    async fn sections(&self, program_code: &str, semester: u8) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar("SELECT name FROM sections WHERE program_code = $1 AND semester = $2 ORDER BY name")
            .bind(program_code)
            .bind(i16::from(semester))
            .fetch_all(&self.db_pool)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    async fn has_subject(&self, id: SubjectId) -> Result<bool, StoreError> {
        self.exists("subjects", id.0).await
    }

    async fn has_teacher(&self, id: TeacherId) -> Result<bool, StoreError> {
        self.exists("teachers", id.0).await
    }

    async fn has_room(&self, id: RoomId) -> Result<bool, StoreError> {
        self.exists("rooms", id.0).await
    }
}

/// A section as listed by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Section {
    pub id: i32,
    pub program_code: String,
    pub semester: i16,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubjectForm {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeacherForm {
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomForm {
    pub name: String,
    pub capacity: i32,
}

/// Lists the sections of every program, by program, semester and name.
pub async fn sections_get(db_pool: &Pool<Postgres>) -> Result<Vec<Section>, BoxedError> {
    let sections = sqlx::query_as::<_, Section>(
        "SELECT id, program_code, semester, name FROM sections ORDER BY program_code, semester, name",
    )
    .fetch_all(db_pool)
    .await?;
    Ok(sections)
}

/// Registers sections of a program's semester. Existing names are left alone.
///
/// # Returns
/// The ids of the newly inserted sections.
pub async fn sections_add(
    db_pool: &Pool<Postgres>,
    program_code: &str,
    semester: u8,
    names: &[String],
) -> Result<Vec<i32>, BoxedError> {
    let mut tx = db_pool.begin().await?;
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id: Option<i32> = sqlx::query_scalar(
            "INSERT INTO sections (program_code, semester, name) VALUES ($1, $2, $3) \
             ON CONFLICT (program_code, semester, name) DO NOTHING RETURNING id",
        )
        .bind(program_code)
        .bind(i16::from(semester))
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;
        ids.extend(id);
    }
    tx.commit().await?;
    Ok(ids)
}

/// Adds a subject, or renames the one with the same code.
pub async fn subject_add(db_pool: &Pool<Postgres>, subject: &SubjectForm) -> Result<i32, BoxedError> {
    let id: i32 = sqlx::query_scalar("INSERT INTO subjects (code, name) VALUES ($1, $2) \
         ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name RETURNING id")
        .bind(&subject.code)
        .bind(&subject.name)
        .fetch_one(db_pool)
        .await?;
    Ok(id)
}

/// Adds a teacher, or renames the one with the same email.
pub async fn teacher_add(db_pool: &Pool<Postgres>, teacher: &TeacherForm) -> Result<i32, BoxedError> {
    let id: i32 = sqlx::query_scalar("INSERT INTO teachers (name, email) VALUES ($1, $2) \
         ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name RETURNING id")
        .bind(&teacher.name)
        .bind(&teacher.email)
        .fetch_one(db_pool)
        .await?;
    Ok(id)
}

/// Adds a room, or updates the capacity of the one with the same name.
pub async fn room_add(db_pool: &Pool<Postgres>, room: &RoomForm) -> Result<i32, BoxedError> {
    let id: i32 = sqlx::query_scalar("INSERT INTO rooms (name, capacity) VALUES ($1, $2) \
         ON CONFLICT (name) DO UPDATE SET capacity = EXCLUDED.capacity RETURNING id")
        .bind(&room.name)
        .bind(room.capacity)
        .fetch_one(db_pool)
        .await?;
    Ok(id)
}
