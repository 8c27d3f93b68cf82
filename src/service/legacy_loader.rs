use crate::db::models::NewAccount;
use crate::db::sqlite::AccountsStorage;
use crate::error::VaultError;
use serde::Deserialize;
use serde_json::Value;
use std::ffi::OsString;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};

/// Shape of one entry in the legacy `accounts.json` (keyed by email).
#[derive(Debug, Deserialize)]
struct LegacyCredential {
    refresh_token: String,
    client_id: String,
}

/// Parsed legacy file: usable entries plus the number that had to be dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LegacyFile {
    pub accounts: Vec<NewAccount>,
    pub skipped: usize,
}

/// What a legacy import pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LegacyImport {
    pub inserted: usize,
    pub already_present: usize,
    pub skipped: usize,
    pub backup: Option<PathBuf>,
}

/// `accounts.json` -> `accounts.json.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Read the legacy credential file. `Ok(None)` when it does not exist.
/// Entries missing a field are logged and skipped; an unreadable file or a
/// document that is not a JSON object is reported as malformed.
pub fn load_legacy(path: &Path) -> Result<Option<LegacyFile>, VaultError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| VaultError::MalformedLegacy(format!("unreadable: {e}")))?;
    let value: Value = serde_json::from_str(&contents)
        .map_err(|e| VaultError::MalformedLegacy(format!("invalid JSON: {e}")))?;
    let Value::Object(entries) = value else {
        return Err(VaultError::MalformedLegacy(
            "top-level value is not an object".to_string(),
        ));
    };

    let mut file = LegacyFile::default();
    for (email, info) in entries {
        match serde_json::from_value::<LegacyCredential>(info) {
            Ok(cred) => file
                .accounts
                .push(NewAccount::new(email, cred.refresh_token, cred.client_id)),
            Err(e) => {
                warn!(email = %email, error = %e, "skipping malformed legacy entry");
                file.skipped += 1;
            }
        }
    }
    Ok(Some(file))
}

/// Import the legacy file into `storage` without overwriting existing rows,
/// then rename it to its backup name. Never fails: any problem is logged and
/// treated as nothing to migrate.
pub async fn import_legacy(storage: &AccountsStorage, path: &Path) -> LegacyImport {
    let owned = path.to_path_buf();
    let loaded = match tokio::task::spawn_blocking(move || load_legacy(&owned)).await {
        Ok(loaded) => loaded,
        Err(e) => Err(VaultError::from(e)),
    };

    let file = match loaded {
        Ok(Some(file)) => file,
        Ok(None) => return LegacyImport::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "legacy import skipped");
            return LegacyImport::default();
        }
    };

    let mut report = LegacyImport {
        skipped: file.skipped,
        ..LegacyImport::default()
    };
    if file.accounts.is_empty() {
        info!(path = %path.display(), "legacy file holds no accounts; nothing to migrate");
        return report;
    }

    info!(path = %path.display(), count = file.accounts.len(), "migrating legacy accounts");
    let counts = match storage.insert_missing(&file.accounts).await {
        Ok(counts) => counts,
        Err(e) => {
            error!(path = %path.display(), error = %e, "legacy import failed");
            return report;
        }
    };
    report.inserted = counts.inserted;
    report.already_present = counts.already_present;
    report.skipped += counts.invalid;

    if counts.inserted + counts.already_present == 0 {
        return report;
    }
    info!(
        inserted = counts.inserted,
        already_present = counts.already_present,
        "migrated legacy accounts"
    );

    match rotate_to_backup(path).await {
        Ok(bak) => {
            info!(from = %path.display(), to = %bak.display(), "renamed legacy file");
            report.backup = Some(bak);
        }
        Err(e) => warn!(path = %path.display(), error = %e, "failed to rename legacy file"),
    }
    report
}

async fn rotate_to_backup(path: &Path) -> Result<PathBuf, VaultError> {
    let bak = backup_path(path);
    if tokio::fs::try_exists(&bak).await? {
        tokio::fs::remove_file(&bak).await?;
    }
    tokio::fs::rename(path, &bak).await?;
    Ok(bak)
}
