use crate::db_config::db_setup;
use crate::models::{assignment_model::PgAssignmentStore, registry_model::PgRegistry};
use scheduler::RoutineService;
use sqlx::{Pool, Postgres};
use std::error::Error;

/// The routine engine backed by Postgres.
pub type PgRoutineService = RoutineService<PgAssignmentStore, PgRegistry>;

/// The application state
///
/// Shared by every handler behind an `Arc<RwLock<_>>`. The service holds its own
/// per-cell and per-booking locks, so handlers only ever take the read lock.
///
/// # Fields
/// - `routine_data`: The database connection pool
/// - `service`: The allocation service every handler goes through
pub struct AppState {
    pub routine_data: RoutineData,
    pub service: PgRoutineService,
}

impl AppState {
    /// Creates a new `AppState` instance.
    ///
    /// # Errors
    /// This function will return an error if `RoutineData` cannot be initialized.
    pub async fn new() -> Result<Self, Box<dyn Error>> {
        Ok(Self::from_data(RoutineData::new().await?))
    }

    /// Builds the state around an existing pool.
    pub fn from_data(routine_data: RoutineData) -> Self {
        let pool = routine_data.routine_db.clone();
        Self {
            routine_data,
            service: RoutineService::new(PgAssignmentStore::new(pool.clone()), PgRegistry::new(pool)),
        }
    }
}

/// The struct holds the database connection pool
///
/// # Fields
/// - `routine_db`: The database connection pool
#[derive(Debug)]
pub struct RoutineData {
    pub routine_db: Pool<Postgres>,
}

impl RoutineData {
    /// Creates a new `RoutineData` instance.
    ///
    /// This function initializes the database connection pool using the `db_setup` function.
    ///
    /// # Errors
    /// This function will return an error if the database connection pool cannot be initialized.
    pub async fn new() -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            routine_db: db_setup().await?,
        })
    }
}
