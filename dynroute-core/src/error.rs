//! Error taxonomy shared by the Store, Sandbox Host, Registry and Dispatcher.
//!
//! `dynroute-core` never depends on HTTP types; the server crate maps each
//! variant onto a status code and JSON body at the edge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("path conflict: {0}")]
    PathConflict(String),

    #[error("compilation error: {0}")]
    CompileError(String),

    #[error("runtime error: {0}")]
    RuntimeError(String),

    #[error("endpoint timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CoreError::PathConflict(db.message().to_string())
            }
            sqlx::Error::RowNotFound => CoreError::NotFound(e.to_string()),
            _ => CoreError::Internal(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::BadRequest(format!("invalid JSON: {e}"))
    }
}
