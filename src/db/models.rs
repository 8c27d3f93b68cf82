use crate::error::VaultError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `accounts` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub email: String,
    pub password: String,
    pub refresh_token: String,
    pub client_id: String,
    pub is_sold: bool,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Credentials written by an upsert. Metadata (`is_sold`, `remark`) is never
/// part of it, so re-saving credentials cannot clobber it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAccount {
    pub email: String,
    pub refresh_token: String,
    pub client_id: String,
    #[serde(default)]
    pub password: String,
}

impl NewAccount {
    pub fn new(
        email: impl Into<String>,
        refresh_token: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            refresh_token: refresh_token.into(),
            client_id: client_id.into(),
            password: String::new(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        for (field, value) in [
            ("email", &self.email),
            ("refresh_token", &self.refresh_token),
            ("client_id", &self.client_id),
        ] {
            if value.trim().is_empty() {
                return Err(VaultError::Validation(format!(
                    "{field} is required (account: {:?})",
                    self.email
                )));
            }
        }
        Ok(())
    }
}

/// Partial metadata update; `None` fields are left as stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataPatch {
    #[serde(default)]
    pub is_sold: Option<bool>,
    #[serde(default)]
    pub remark: Option<String>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.is_sold.is_none() && self.remark.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Sold,
    Unsold,
}

impl StatusFilter {
    /// Maps the `sold` / `unsold` filter names; anything else means "no filter".
    pub fn from_filter_type(value: &str) -> Option<Self> {
        match value {
            "sold" => Some(StatusFilter::Sold),
            "unsold" => Some(StatusFilter::Unsold),
            _ => None,
        }
    }

    pub(crate) fn is_sold(self) -> bool {
        matches!(self, StatusFilter::Sold)
    }
}

/// Parses SQLite `CURRENT_TIMESTAMP` text, tolerating RFC3339 for rows written
/// by other tools.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        Ok(naive) => Ok(naive.and_utc()),
        Err(_) => DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)),
    }
}
