//! Typed domain errors. Plumbing code propagates `anyhow::Error`; these
//! variants ride inside it so the controller can tell a rejected input from a
//! broken disk with `downcast_ref`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Input rejected by a validation rule. The message is user-facing.
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Operation only exists in relational mode.
    #[error("{0} is only available with the SQLite store")]
    Unsupported(&'static str),

    /// A database constraint refused the write.
    #[error("{0}")]
    Constraint(String),
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        CatalogError::Validation(message.into())
    }
}
