use crate::config::Config;
use crate::db::models::{Account, MetadataPatch, NewAccount, StatusFilter};
use crate::db::{AccountsStorage, reconcile_schema};
use crate::error::VaultError;
use crate::service::legacy_loader::{self, LegacyImport};
use std::path::Path;
use tracing::{debug, info};

/// Entry point for callers: runs the startup sequence once, then exposes the
/// repository operations.
#[derive(Debug, Clone)]
pub struct AccountOps {
    storage: AccountsStorage,
}

impl AccountOps {
    pub async fn new(cfg: &Config) -> Result<Self, VaultError> {
        let (ops, _) = Self::with_paths(&cfg.database_path, &cfg.legacy_path).await?;
        Ok(ops)
    }

    /// Create schema, reconcile older databases, import the legacy file.
    /// Only the first step can fail; the other two log and carry on since the
    /// base table is already usable.
    pub async fn with_paths(
        database_path: &Path,
        legacy_path: &Path,
    ) -> Result<(Self, LegacyImport), VaultError> {
        let storage = AccountsStorage::open(database_path).await?;
        storage.init_schema().await?;

        let added = reconcile_schema(&storage).await;
        if !added.is_empty() {
            info!(columns = ?added, "accounts schema reconciled");
        }

        let imported = legacy_loader::import_legacy(&storage, legacy_path).await;
        debug!(path = %database_path.display(), ?imported, "account store ready");

        Ok((Self { storage }, imported))
    }

    pub async fn get_account(&self, email: &str) -> Result<Option<Account>, VaultError> {
        self.storage.get_account(email).await
    }

    pub async fn list_accounts(
        &self,
        search: Option<&str>,
        status: Option<StatusFilter>,
    ) -> Result<Vec<Account>, VaultError> {
        self.storage.list_accounts(search, status).await
    }

    pub async fn list_all(&self) -> Result<Vec<Account>, VaultError> {
        self.storage.list_all().await
    }

    pub async fn upsert_account(&self, account: &NewAccount) -> Result<(), VaultError> {
        self.storage.upsert_account(account).await
    }

    pub async fn upsert_accounts_batch(&self, accounts: &[NewAccount]) -> Result<usize, VaultError> {
        self.storage.upsert_accounts_batch(accounts).await
    }

    pub async fn update_metadata(
        &self,
        email: &str,
        patch: &MetadataPatch,
    ) -> Result<u64, VaultError> {
        self.storage.update_metadata(email, patch).await
    }

    pub async fn delete_accounts<S: AsRef<str>>(&self, emails: &[S]) -> Result<u64, VaultError> {
        let deleted = self.storage.delete_accounts(emails).await?;
        if deleted > 0 {
            info!(requested = emails.len(), deleted, "accounts deleted");
        }
        Ok(deleted)
    }
}
