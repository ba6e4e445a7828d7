use crate::{pages::UnknownCategory, storage::StoreError};

/// Failure talking to the remote index service. Always recoverable by
/// falling back to local components.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote error: {0}")]
    Remote(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Category(#[from] UnknownCategory),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
