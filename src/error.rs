/// Error types shared across the extension contexts
use thiserror::Error;

/// Failure talking to the persisted key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage {op} failed: {message}")]
    Backend { op: &'static str, message: String },

    #[error("could not convert stored value: {0}")]
    Serialization(String),
}

/// Failure loading the bundled category table
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to fetch category resource: {0}")]
    Fetch(String),

    #[error("malformed category resource: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure in one stage of the popup open/reset pipeline
#[derive(Debug, Error)]
pub enum PopupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to query tabs: {0}")]
    Tabs(String),

    #[error("no active tab")]
    NoActiveTab,

    #[error("no site is being timed")]
    NoActiveDomain,
}
