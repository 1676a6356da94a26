use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Source acquisition failed: {0}")]
    Acquisition(String),

    #[error("Manifest not found: {0}")]
    NotFound(String),

    #[error("{}:{line}: {message}", .location.display())]
    Parse {
        location: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Project validation failed: {0}")]
    ProjectValidation(String),

    #[error("Version query failed: {0}")]
    Oracle(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
