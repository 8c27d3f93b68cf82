//! SQL DDL for the account store.
//! SQLite-first design; timestamps use `CURRENT_TIMESTAMP` (UTC text).

/// SQLite schema with:
/// - `email` TEXT PRIMARY KEY (case-sensitive identity)
/// - `refresh_token` / `client_id` required OAuth credentials
/// - `is_sold` BOOLEAN (stored as INTEGER 0/1)
/// - `created_at` set once, `updated_at` bumped by every write
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    email TEXT PRIMARY KEY,
    password TEXT DEFAULT '',
    refresh_token TEXT NOT NULL,
    client_id TEXT NOT NULL,
    is_sold INTEGER DEFAULT 0,
    remark TEXT DEFAULT '',
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
"#;

/// A column that older databases may lack, with the definition used to add it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalColumn {
    pub name: &'static str,
    pub definition: &'static str,
}

/// Columns added after the first release. Appending here is the only way to
/// evolve the schema; every entry must carry a non-NULL default.
pub const OPTIONAL_COLUMNS: &[OptionalColumn] = &[
    OptionalColumn {
        name: "password",
        definition: "TEXT DEFAULT ''",
    },
    OptionalColumn {
        name: "is_sold",
        definition: "INTEGER DEFAULT 0",
    },
    OptionalColumn {
        name: "remark",
        definition: "TEXT DEFAULT ''",
    },
];
