//! Catalog operations. Every function takes a connection (in practice the request's
//! `DatabaseTransaction`) and reports failures as [`ServiceError`].

pub mod categories;
pub mod images;
pub mod options;
pub mod products;

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation { fields: Vec<String>, message: String },
    #[error("{entity} with id {id} was not found")]
    NotFound { entity: &'static str, id: i32 },
    #[error("{message}")]
    Conflict { fields: Vec<String>, message: String },
    #[error("cascading delete failed: {0}")]
    IntegrityCascadeFailure(String),
    #[error("file storage failed: {0}")]
    Storage(String),
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        ServiceError::Validation {
            fields: vec![field.to_string()],
            message: format!("{field}: {message}"),
        }
    }

    pub fn not_found(entity: &'static str, id: i32) -> Self {
        ServiceError::NotFound { entity, id }
    }

    pub fn conflict(fields: &[&str], message: impl Into<String>) -> Self {
        ServiceError::Conflict {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            message: message.into(),
        }
    }

    /// Stable category reported to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation { .. } => "validation",
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::Conflict { .. } => "conflict",
            ServiceError::IntegrityCascadeFailure(_) => "integrity_cascade_failure",
            ServiceError::Storage(_) => "storage",
            ServiceError::Db(_) => "database",
        }
    }

    pub fn fields(&self) -> Vec<String> {
        match self {
            ServiceError::Validation { fields, .. } | ServiceError::Conflict { fields, .. } => {
                fields.clone()
            }
            _ => Vec::new(),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort();
        ServiceError::Validation {
            message: format!("invalid value for: {}", fields.join(", ")),
            fields,
        }
    }
}

/// Turns a unique-index violation raised by the store into a [`ServiceError::Conflict`],
/// leaving every other database error as is.
pub(crate) fn unique_violation(err: DbErr, fields: &[&str], message: &str) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::conflict(fields, message),
        _ => ServiceError::Db(err),
    }
}

/// Turns a unique-index violation on one of `columns` into the same validation error the
/// pre-insert checks report, for writes that lose a race to a concurrent one.
pub(crate) fn taken_column(err: DbErr, columns: &[&str]) -> ServiceError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        if let Some(column) = columns
            .iter()
            .find(|column| detail.contains(&format!(".{column}")))
        {
            return ServiceError::validation(column, "is already in use");
        }
    }
    ServiceError::Db(err)
}

/// Wraps a storage fault raised while a delete cascades.
pub(crate) fn cascade_failure(step: &'static str) -> impl FnOnce(DbErr) -> ServiceError {
    move |err| ServiceError::IntegrityCascadeFailure(format!("{step}: {err}"))
}
