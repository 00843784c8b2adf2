//! Error types for coolwatch.

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Settings write rejected for model {model}: {reason}")]
    Settings { model: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
