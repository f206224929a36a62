//! Error types for stream message decoding

use thiserror::Error;

/// Errors that can occur when decoding stream input.
///
/// None of these are fatal to the processing loop: the caller drops the
/// offending message and carries on.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Message text is not valid JSON
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Message is JSON but not an object we understand
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Stream URL cannot be turned into an API URL
    #[error("Invalid stream URL '{0}'")]
    InvalidUrl(String),
}
