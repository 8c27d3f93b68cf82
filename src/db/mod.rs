//! Database module: models, schema and storage for account records.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and write payloads
//! - `schema.rs`: SQL DDL and the list of later-added columns
//! - `sqlite.rs`: connection-per-call repository over SQLite
//! - `migrate.rs`: additive reconciliation of older databases

pub mod migrate;
pub mod models;
pub mod schema;
pub mod sqlite;

pub use migrate::reconcile_schema;
pub use models::{Account, MetadataPatch, NewAccount, StatusFilter};
pub use schema::SQLITE_INIT;
pub use sqlite::{AccountsStorage, InsertCounts};
