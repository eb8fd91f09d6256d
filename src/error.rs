use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading and preparing the dashboard's inputs. All of them
/// are startup-fatal: the window is never opened over a broken context.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Row {row}, column '{column}': {reason}")]
    MalformedRow {
        row: usize,
        column: String,
        reason: String,
    },

    #[error("Filter on '{column}' has a value that column never holds: {value}")]
    InvalidFilter { column: String, value: String },

    #[error("Model artifact {path} not found")]
    ModelMissing { path: PathBuf },

    #[error("Model artifact {path} is corrupt: {reason}")]
    ModelCorrupt { path: PathBuf, reason: String },
}

pub type DashboardResult<T> = Result<T, DashboardError>;
