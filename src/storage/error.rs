use std::io;
use std::time::Duration;

use thiserror::Error;

// Primary SQLite result codes; extended codes keep them in the low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Failures raised by the storage layer itself.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("No import file selected")]
    NoImportSource,
}

impl StorageError {
    /// Returns true if the failure may go away on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Timeout { .. } | StorageError::Unavailable(_)
        )
    }
}

/// Whether a failed storage call is worth retrying.
///
/// The first recognised cause in the chain decides: timeouts, a busy or
/// locked database, an exhausted pool and interrupted I/O are transient.
/// Anything unrecognised is treated as permanent.
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| {
            if let Some(e) = cause.downcast_ref::<StorageError>() {
                Some(e.is_transient())
            } else if let Some(e) = cause.downcast_ref::<sqlx::Error>() {
                Some(sqlx_is_transient(e))
            } else {
                cause.downcast_ref::<io::Error>().map(io_is_transient)
            }
        })
        .unwrap_or(false)
}

fn sqlx_is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

fn io_is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
