//! HTTP service around the `scheduler` routine engine.
//!
//! Postgres holds the time slot calendar, the assignment rows and the
//! program/subject/teacher/room catalogs; axum exposes allocation, clearing
//! and the read-only routine views under `/api/v1`.

pub mod api_docs;
pub mod config;
pub mod controllers;
pub mod db_config;
pub mod models;
pub mod routes;
pub mod types;
