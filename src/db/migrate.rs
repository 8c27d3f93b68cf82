//! Additive schema reconciliation.
//!
//! Databases created by older releases may lack columns listed in
//! [`OPTIONAL_COLUMNS`]. Each missing column is added with its default so old
//! rows read back with documented values. Every addition is independent and
//! failures are logged, never returned: startup must not fail here because the
//! base table already exists.

use crate::db::schema::{OPTIONAL_COLUMNS, OptionalColumn};
use crate::db::sqlite::AccountsStorage;
use crate::error::VaultError;
use sqlx::sqlite::SqliteConnection;
use std::collections::HashSet;
use tracing::{error, info};

/// Add every missing optional column. Returns the names actually added.
pub async fn reconcile_schema(storage: &AccountsStorage) -> Vec<&'static str> {
    reconcile_columns(storage, OPTIONAL_COLUMNS).await
}

async fn reconcile_columns(
    storage: &AccountsStorage,
    columns: &[OptionalColumn],
) -> Vec<&'static str> {
    let mut conn = match storage.connect().await {
        Ok(conn) => conn,
        Err(e) => {
            error!(error = %e, "schema reconciliation skipped: cannot open database");
            return Vec::new();
        }
    };

    let existing = match existing_columns(&mut conn).await {
        Ok(existing) => existing,
        Err(e) => {
            error!(error = %e, "schema reconciliation skipped: cannot inspect accounts");
            return Vec::new();
        }
    };

    let mut added = Vec::new();
    for column in columns.iter().filter(|c| !existing.contains(c.name)) {
        info!(column = column.name, "adding column to accounts table");
        let ddl = format!(
            "ALTER TABLE accounts ADD COLUMN {} {}",
            column.name, column.definition
        );
        match sqlx::query(&ddl).execute(&mut conn).await {
            Ok(_) => added.push(column.name),
            Err(e) => error!(column = column.name, error = %e, "failed to add column"),
        }
    }
    added
}

async fn existing_columns(conn: &mut SqliteConnection) -> Result<HashSet<String>, VaultError> {
    let rows = sqlx::query_as::<_, (i64, String, String, i64, Option<String>, i64)>(
        "PRAGMA table_info(accounts)",
    )
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|row| row.1).collect())
}
