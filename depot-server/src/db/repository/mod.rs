//! Repository Module
//!
//! Postgres CRUD via sqlx. Each repository owns a pool handle and maps
//! driver errors into [`RepoError`].

pub mod audit_task;
pub mod order;
pub mod report;
pub mod user;
pub mod user_order;

pub use audit_task::AuditTaskRepository;
pub use order::OrderRepository;
pub use report::ReportRepository;
pub use user::UserRepository;
pub use user_order::UserOrderRepository;

use thiserror::Error;

use crate::domain::OrderError;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound("Record not found".into()),
            sqlx::Error::Database(db_err) => {
                // 23505 = unique_violation
                if db_err.code().as_deref() == Some("23505") {
                    RepoError::Duplicate(db_err.message().to_string())
                } else {
                    RepoError::Database(db_err.message().to_string())
                }
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

impl From<RepoError> for OrderError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(_) => OrderError::NotFound,
            RepoError::Duplicate(_) => OrderError::Duplicate,
            RepoError::Database(msg) => OrderError::Database(msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
