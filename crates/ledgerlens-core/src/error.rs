//! Error types for Ledgerlens

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Parsed filters broke one of their invariants
    #[error("Invalid filters: {0}")]
    InvalidFilters(String),

    /// The model provider answered with a non-success status
    #[error("Model API error ({status}): {body}")]
    ModelApi { status: u16, body: String },

    /// The model call did not finish within its time budget
    #[error("Model call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl Error {
    /// Whether a failed model call is worth one more attempt
    ///
    /// Timeouts, connection failures and 429/5xx responses are transient.
    /// Anything else (bad request, auth, malformed JSON) fails the same way twice.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.as_u16() == 429 || s.is_server_error())
            }
            Self::ModelApi { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
