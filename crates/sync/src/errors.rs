//! Sync pipeline error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid source record: {0}")]
    InvalidSource(String),

    #[error("Store error: {0}")]
    Store(#[from] supportkb_common::EngineError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
