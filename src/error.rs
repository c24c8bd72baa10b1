//! # Error Handling
//!
//! Error taxonomy for the notification core. Every error surfaces
//! synchronously to the caller of the operation that raised it; nothing is
//! retried internally.

use thiserror::Error;

/// Errors raised by the notification store, resolver and factory.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// A discriminator was missing or unusable on load or save of a row.
    #[error("schema violation: {reason}")]
    SchemaViolation { reason: String },

    /// A tag could not be resolved to a registered variant.
    #[error("unknown notification type '{tag}'")]
    UnknownType { tag: String },

    /// Two variants claimed the same tag or numeric code at registration.
    #[error("variant '{name}' conflicts with an already registered variant ({detail})")]
    DuplicateVariant { name: String, detail: String },

    /// The roles/permissions provider failed to answer.
    #[error("authority directory lookup failed: {0}")]
    Directory(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("notification payload could not be (de)serialized: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl NotificationError {
    pub fn schema_violation(reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            reason: reason.into(),
        }
    }

    pub fn unknown_type(tag: impl Into<String>) -> Self {
        Self::UnknownType { tag: tag.into() }
    }

    /// Wrap a failure from an [`AuthorityDirectory`](crate::directory::AuthorityDirectory) implementation.
    pub fn directory(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Directory(err.into())
    }

    /// True when the underlying store rejected a write on a unique key.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Database(err) if is_unique_violation(err))
    }
}

pub type Result<T, E = NotificationError> = std::result::Result<T, E>;

/// Detects unique-key violations across the Postgres and SQLite backends.
pub fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    if let Some(code) = db_error.code() {
        let code_str = code.as_ref();
        return code_str == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code_str);
    }

    false
}
