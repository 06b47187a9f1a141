//! Error taxonomy for store operations.
//!
//! Every failure of a [`Store`](crate::store::Store) operation is a value of
//! [`StoreError`]. Constraint failures raised by SQLite are translated into
//! the matching variant so callers never have to inspect driver messages.

use thiserror::Error;

/// The kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Unit,
    Box,
    Item,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Entity::Unit => "unit",
            Entity::Box => "box",
            Entity::Item => "item",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed entity (by id or slug) does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: Entity, key: String },

    #[error("a unit named '{0}' already exists")]
    DuplicateName(String),

    #[error("a box with slug '{0}' already exists")]
    DuplicateSlug(String),

    /// The referenced parent (unit for a box, box for an item) does not exist.
    #[error("parent {entity} not found: {id}")]
    ParentNotFound { entity: Entity, id: i64 },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn not_found(entity: Entity, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }
}

/// Classification of a SQLite constraint failure.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Violation {
    UnitName,
    BoxSlug,
    ForeignKey,
}

/// Returns which constraint a database error violated, if any.
pub(crate) fn violation(err: &sqlx::Error) -> Option<Violation> {
    let db_err = match err {
        sqlx::Error::Database(db_err) => db_err,
        _ => return None,
    };

    let message = db_err.message();
    if db_err.is_foreign_key_violation() || message.contains("FOREIGN KEY constraint failed") {
        return Some(Violation::ForeignKey);
    }
    if db_err.is_unique_violation() || message.contains("UNIQUE constraint failed") {
        return classify_unique(message);
    }
    None
}

// SQLite reports "UNIQUE constraint failed: <table>.<column>".
fn classify_unique(message: &str) -> Option<Violation> {
    if message.contains("storage_units.name") {
        Some(Violation::UnitName)
    } else if message.contains("storage_boxes.slug") {
        Some(Violation::BoxSlug)
    } else {
        None
    }
}
