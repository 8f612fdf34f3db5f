//! Error types for sqlbatch operations.

use thiserror::Error;

/// Extract the full error message from a tokio_postgres::Error,
/// including the server-side details that Display hides.
pub fn format_db_error(e: &tokio_postgres::Error) -> String {
    if let Some(db_err) = e.as_db_error() {
        let mut msg = db_err.message().to_string();
        if let Some(detail) = db_err.detail() {
            msg.push_str(&format!("\n  Detail: {}", detail));
        }
        if let Some(hint) = db_err.hint() {
            msg.push_str(&format!("\n  Hint: {}", hint));
        }
        if let Some(position) = db_err.position() {
            msg.push_str(&format!("\n  Position: {:?}", position));
        }
        return msg;
    }
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(&format!(": {}", s));
        source = s.source();
    }
    if e.is_closed() {
        msg.push_str("\n  Note: The database connection was closed unexpectedly.");
    }
    msg
}

/// All error types that sqlbatch operations can produce.
#[derive(Error, Debug)]
pub enum SqlBatchError {
    /// Invalid or missing configuration (TOML parse errors, missing required fields, etc.).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A database query or connection operation failed.
    #[error("Database error: {}", format_db_error(.0))]
    DatabaseError(#[from] tokio_postgres::Error),

    /// A filesystem operation failed (reading scripts, writing result files, etc.).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A result set could not be written as CSV.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// A single statement of a batch failed to execute or persist.
    #[error("Statement {index} failed: {reason}")]
    StatementFailed { index: usize, reason: String },

    /// At least one statement of a batch failed; the rest were still attempted.
    #[error("{failed} of {total} statement(s) failed")]
    BatchIncomplete { failed: usize, total: usize },

    /// The script ended inside a literal or comment and strict mode was requested.
    #[error("Script rejected: {0}")]
    ScriptRejected(String),

    /// The database connection was lost during an operation.
    #[error("Connection lost during {operation}: {detail}")]
    ConnectionLost { operation: String, detail: String },
}

/// Convenience type alias for `Result<T, SqlBatchError>`.
pub type Result<T> = std::result::Result<T, SqlBatchError>;
