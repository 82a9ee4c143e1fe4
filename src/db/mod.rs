//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and conversions
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: queries used by the report runner

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{DbIntegration, DbRunLog, DbScheduledReport, DbTemplate, NewRunLog, RunStatus};
pub use schema::SQLITE_INIT;
pub use sqlite::{ReportStorage, SqlitePool};
