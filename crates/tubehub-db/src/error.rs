use rusqlite::ffi;
use thiserror::Error;
use uuid::Uuid;

use tubehub_types::models::EntityKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} {id} is not owned by {actor}")]
    NotOwner {
        kind: EntityKind,
        id: Uuid,
        actor: Uuid,
    },

    #[error("{field} already exists")]
    DuplicateKey { field: String },

    #[error("a channel cannot subscribe to itself")]
    SelfReference,

    #[error("view `{view}` is invalid: {reason}")]
    InvalidView { view: &'static str, reason: String },

    #[error("database connection lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Returns the constrained column (e.g. `users.email`) when `err` is a
/// UNIQUE or PRIMARY KEY violation.
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<String> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            let column = msg
                .as_deref()
                .and_then(|m| m.rsplit(": ").next())
                .and_then(|cols| cols.split(',').next())
                .map(|c| c.trim().to_string())
                .unwrap_or_default();
            Some(column)
        }
        _ => None,
    }
}

/// Maps a UNIQUE violation on insert/update to `DuplicateKey`, naming the
/// column without its table prefix.
pub(crate) fn map_unique(err: rusqlite::Error) -> StoreError {
    match unique_violation(&err) {
        Some(column) => StoreError::DuplicateKey {
            field: column
                .rsplit('.')
                .next()
                .unwrap_or(column.as_str())
                .to_string(),
        },
        None => StoreError::Sqlite(err),
    }
}
