use crate::db::models::{Account, MetadataPatch, NewAccount, StatusFilter, parse_timestamp};
use crate::db::schema::SQLITE_INIT;
use crate::error::VaultError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Connection, QueryBuilder, Row, Sqlite};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ACCOUNT_COLUMNS: &str =
    "email, password, refresh_token, client_id, is_sold, remark, created_at, updated_at";

const UPSERT_SQL: &str = r#"
INSERT INTO accounts (email, password, refresh_token, client_id, updated_at)
VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
ON CONFLICT(email) DO UPDATE SET
    password=excluded.password,
    refresh_token=excluded.refresh_token,
    client_id=excluded.client_id,
    updated_at=CURRENT_TIMESTAMP
"#;

/// Outcome of an insert-or-ignore pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertCounts {
    pub inserted: usize,
    pub already_present: usize,
    pub invalid: usize,
}

/// SQLite-backed account repository.
///
/// No connection is held between calls: each operation opens its own
/// connection and drops it on return, success or error. sqlx runs every
/// SQLite connection on a dedicated worker thread, so awaiting these calls
/// never blocks the runtime.
#[derive(Debug, Clone)]
pub struct AccountsStorage {
    options: SqliteConnectOptions,
    path: PathBuf,
}

impl AccountsStorage {
    /// Prepare a store at `path`, creating the parent directory if needed.
    /// The database file itself is created by the first connection.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        Ok(Self { options, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) async fn connect(&self) -> Result<SqliteConnection, VaultError> {
        Ok(SqliteConnection::connect_with(&self.options).await?)
    }

    /// Create the `accounts` table if absent. Safe on every startup.
    pub async fn init_schema(&self) -> Result<(), VaultError> {
        let mut conn = self.connect().await?;
        sqlx::query(SQLITE_INIT).execute(&mut conn).await?;
        Ok(())
    }

    pub async fn get_account(&self, email: &str) -> Result<Option<Account>, VaultError> {
        let mut conn = self.connect().await?;
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&mut conn)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    /// All accounts ordered by email, optionally narrowed by a search over
    /// email/remark and by sale status. An empty search applies no filter.
    pub async fn list_accounts(
        &self,
        search: Option<&str>,
        status: Option<StatusFilter>,
    ) -> Result<Vec<Account>, VaultError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {ACCOUNT_COLUMNS} FROM accounts"));
        let mut has_where = false;

        if let Some(query) = search.filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", escape_like(query));
            qb.push(" WHERE (email LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR remark LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
            has_where = true;
        }

        if let Some(status) = status {
            qb.push(if has_where { " AND " } else { " WHERE " });
            qb.push("is_sold = ").push_bind(i64::from(status.is_sold()));
        }

        qb.push(" ORDER BY email");

        let mut conn = self.connect().await?;
        let rows = qb.build().fetch_all(&mut conn).await?;
        rows.into_iter().map(Self::row_to_model).collect()
    }

    pub async fn list_all(&self) -> Result<Vec<Account>, VaultError> {
        self.list_accounts(None, None).await
    }

    /// Upsert by email. Credentials are overwritten; `is_sold` and `remark`
    /// keep their stored values.
    pub async fn upsert_account(&self, account: &NewAccount) -> Result<(), VaultError> {
        account.validate()?;
        let mut conn = self.connect().await?;
        Self::upsert_on(&mut conn, account).await?;
        debug!(email = %account.email, "account upserted");
        Ok(())
    }

    /// Batch upsert using a single transaction. Any failing entry rolls back
    /// the whole batch. Returns the number of entries written.
    pub async fn upsert_accounts_batch(&self, accounts: &[NewAccount]) -> Result<usize, VaultError> {
        if accounts.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        for account in accounts {
            account.validate()?;
            Self::upsert_on(&mut tx, account).await?;
        }

        tx.commit().await?;
        debug!(count = accounts.len(), "account batch upserted");
        Ok(accounts.len())
    }

    /// Apply only the provided metadata fields. An empty patch issues no
    /// statement. Returns the number of rows changed.
    pub async fn update_metadata(
        &self,
        email: &str,
        patch: &MetadataPatch,
    ) -> Result<u64, VaultError> {
        if patch.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE accounts SET ");
        let mut sets = qb.separated(", ");
        if let Some(is_sold) = patch.is_sold {
            sets.push("is_sold = ").push_bind_unseparated(i64::from(is_sold));
        }
        if let Some(remark) = &patch.remark {
            sets.push("remark = ").push_bind_unseparated(remark.clone());
        }
        sets.push("updated_at = CURRENT_TIMESTAMP");
        qb.push(" WHERE email = ").push_bind(email.to_string());

        let mut conn = self.connect().await?;
        let result = qb.build().execute(&mut conn).await?;
        Ok(result.rows_affected())
    }

    /// Delete every listed email in one statement; returns rows removed.
    /// Each email is a bound parameter, so one call is capped by SQLite's
    /// variable limit (32766); larger lists fail with `StorageUnavailable`
    /// and must be split by the caller.
    pub async fn delete_accounts<S: AsRef<str>>(&self, emails: &[S]) -> Result<u64, VaultError> {
        if emails.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM accounts WHERE email IN (");
        let mut list = qb.separated(", ");
        for email in emails {
            list.push_bind(email.as_ref().to_string());
        }
        list.push_unseparated(")");

        let mut conn = self.connect().await?;
        let result = qb.build().execute(&mut conn).await?;
        Ok(result.rows_affected())
    }

    /// Insert each entry unless its email already exists, inside one
    /// transaction. Invalid or failing entries are logged and skipped.
    pub async fn insert_missing(&self, accounts: &[NewAccount]) -> Result<InsertCounts, VaultError> {
        let mut counts = InsertCounts::default();
        if accounts.is_empty() {
            return Ok(counts);
        }
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        for account in accounts {
            if let Err(e) = account.validate() {
                warn!(email = %account.email, error = %e, "skipping invalid account");
                counts.invalid += 1;
                continue;
            }
            let result = sqlx::query(
                "INSERT OR IGNORE INTO accounts (email, refresh_token, client_id) VALUES (?, ?, ?)",
            )
            .bind(&account.email)
            .bind(&account.refresh_token)
            .bind(&account.client_id)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(r) if r.rows_affected() > 0 => counts.inserted += 1,
                Ok(_) => counts.already_present += 1,
                Err(e) => {
                    warn!(email = %account.email, error = %e, "failed to insert account");
                    counts.invalid += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(counts)
    }

    async fn upsert_on(conn: &mut SqliteConnection, account: &NewAccount) -> Result<(), VaultError> {
        sqlx::query(UPSERT_SQL)
            .bind(&account.email)
            .bind(&account.password)
            .bind(&account.refresh_token)
            .bind(&account.client_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    fn row_to_model(row: SqliteRow) -> Result<Account, VaultError> {
        let email: String = row.try_get("email")?;
        let password: Option<String> = row.try_get("password")?;
        let refresh_token: String = row.try_get("refresh_token")?;
        let client_id: String = row.try_get("client_id")?;
        let is_sold_i: Option<i64> = row.try_get("is_sold")?;
        let remark: Option<String> = row.try_get("remark")?;
        let created_str: String = row.try_get("created_at")?;
        let updated_str: String = row.try_get("updated_at")?;

        let created_at =
            parse_timestamp(&created_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let updated_at =
            parse_timestamp(&updated_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Account {
            email,
            password: password.unwrap_or_default(),
            refresh_token,
            client_id,
            is_sold: is_sold_i.unwrap_or(0) != 0,
            remark: remark.unwrap_or_default(),
            created_at,
            updated_at,
        })
    }
}

/// Escape LIKE wildcards so the query matches literally (paired with `ESCAPE '\'`).
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TempPath;

    async fn fresh_storage(tag: &str) -> (TempPath, AccountsStorage) {
        let db = TempPath::new(tag, "db");
        let storage = AccountsStorage::open(db.path())
            .await
            .expect("open storage");
        storage.init_schema().await.expect("init schema");
        (db, storage)
    }

    async fn backdate(storage: &AccountsStorage, email: &str) {
        let mut conn = storage.connect().await.expect("connect");
        sqlx::query("UPDATE accounts SET updated_at = '2000-01-01 00:00:00' WHERE email = ?")
            .bind(email)
            .execute(&mut conn)
            .await
            .expect("backdate");
    }

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("bob"), "bob");
    }

    #[tokio::test]
    async fn init_schema_is_idempotent() {
        let (_db, storage) = fresh_storage("init").await;
        storage.init_schema().await.expect("second init");
        assert!(storage.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn metadata_update_bumps_updated_at_only_when_fields_given() {
        let (_db, storage) = fresh_storage("meta").await;
        storage
            .upsert_account(&NewAccount::new("a@x.com", "rt", "c1"))
            .await
            .unwrap();
        backdate(&storage, "a@x.com").await;
        let before = storage.get_account("a@x.com").await.unwrap().unwrap();

        let touched = storage
            .update_metadata("a@x.com", &MetadataPatch::default())
            .await
            .unwrap();
        assert_eq!(touched, 0);
        let unchanged = storage.get_account("a@x.com").await.unwrap().unwrap();
        assert_eq!(unchanged.updated_at, before.updated_at);

        let patch = MetadataPatch {
            is_sold: Some(true),
            remark: None,
        };
        assert_eq!(storage.update_metadata("a@x.com", &patch).await.unwrap(), 1);
        let after = storage.get_account("a@x.com").await.unwrap().unwrap();
        assert!(after.is_sold);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.remark, before.remark);
        assert_eq!(after.refresh_token, before.refresh_token);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn metadata_update_for_unknown_email_touches_nothing() {
        let (_db, storage) = fresh_storage("meta-missing").await;
        let patch = MetadataPatch {
            is_sold: None,
            remark: Some("note".to_string()),
        };
        assert_eq!(storage.update_metadata("ghost@x.com", &patch).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_missing_never_overwrites() {
        let (_db, storage) = fresh_storage("insert-missing").await;
        storage
            .upsert_account(&NewAccount::new("a@x.com", "keep", "keep-client"))
            .await
            .unwrap();

        let counts = storage
            .insert_missing(&[
                NewAccount::new("a@x.com", "rt-new", "c-new"),
                NewAccount::new("b@x.com", "rt-b", "c-b"),
                NewAccount::new("c@x.com", "", "c-c"),
            ])
            .await
            .unwrap();

        assert_eq!(
            counts,
            InsertCounts {
                inserted: 1,
                already_present: 1,
                invalid: 1
            }
        );
        let a = storage.get_account("a@x.com").await.unwrap().unwrap();
        assert_eq!(a.refresh_token, "keep");
        assert!(storage.get_account("c@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let (_db, storage) = fresh_storage("wildcards").await;
        storage
            .upsert_account(&NewAccount::new("plain@x.com", "rt", "c"))
            .await
            .unwrap();
        storage
            .upsert_account(&NewAccount::new("under_score@x.com", "rt", "c"))
            .await
            .unwrap();

        let hits = storage.list_accounts(Some("_"), None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].email, "under_score@x.com");
        assert!(storage.list_accounts(Some("%"), None).await.unwrap().is_empty());
        assert_eq!(storage.list_accounts(Some(""), None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn constraint_violations_map_to_validation() {
        let (_db, storage) = fresh_storage("constraints").await;
        let mut conn = storage.connect().await.unwrap();

        let missing_token = sqlx::query(
            "INSERT INTO accounts (email, refresh_token, client_id) VALUES (?, NULL, ?)",
        )
        .bind("a@x.com")
        .bind("c1")
        .execute(&mut conn)
        .await
        .unwrap_err();
        let err = VaultError::from(missing_token);
        assert!(err.is_validation(), "unexpected mapping: {err}");
        assert!(!err.is_storage_unavailable());

        storage
            .upsert_account(&NewAccount::new("b@x.com", "rt", "c"))
            .await
            .unwrap();
        let duplicate = sqlx::query(
            "INSERT INTO accounts (email, refresh_token, client_id) VALUES (?, ?, ?)",
        )
        .bind("b@x.com")
        .bind("rt")
        .bind("c")
        .execute(&mut conn)
        .await
        .unwrap_err();
        assert!(VaultError::from(duplicate).is_validation());
    }

    #[tokio::test]
    async fn engine_errors_map_to_storage_unavailable() {
        let (_db, storage) = fresh_storage("engine").await;
        let mut conn = storage.connect().await.unwrap();

        let err = sqlx::query("SELECT * FROM no_such_table")
            .fetch_all(&mut conn)
            .await
            .err()
            .unwrap();
        let err = VaultError::from(err);
        assert!(err.is_storage_unavailable(), "unexpected mapping: {err}");
        assert!(!err.is_validation());
    }
}
