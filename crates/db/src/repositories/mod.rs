use chrono::{DateTime, Utc};
use thiserror::Error;

use docflow_core::errors::StoreError;

pub mod document;
pub mod user;
pub mod workflow;

pub use document::SqlDocumentCatalog;
pub use user::{SqlIdentityProvider, SqlUserDirectory};
pub use workflow::SqlWorkflowStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => StoreError::Backend(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
        }
    }
}

/// Timestamps are stored as RFC 3339 TEXT columns.
pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp in `{column}`: {error}")))
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|value| parse_timestamp(column, &value)).transpose()
}
