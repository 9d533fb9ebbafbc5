//! Error types for image generation.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while generating and saving an image.
#[derive(Debug, thiserror::Error)]
pub enum ImagenError {
    /// API key missing or empty.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// Network or SDK-level failure while calling the generation API.
    #[error("API call failed: {0}")]
    UpstreamCall(#[from] reqwest::Error),

    /// The generation API answered with a non-OK status or a failed task.
    #[error("API returned {status}{}", upstream_detail(.code, .message))]
    UpstreamStatus {
        /// HTTP status, or the task status when the task itself failed.
        status: String,
        /// Vendor error code, if the response carried one.
        code: Option<String>,
        /// Vendor error message, if the response carried one.
        message: Option<String>,
    },

    /// The call succeeded but the response did not contain an image URL.
    #[error("no image URL in response")]
    NoImageProduced {
        /// Raw response body, kept for diagnosis.
        response: serde_json::Value,
    },

    /// Asynchronous task did not finish in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Fetching the generated image failed.
    #[error("failed to download image: {0}")]
    Download(String),

    /// Result URL expired before download.
    #[error("failed to download image: result URL expired")]
    UrlExpired,

    /// The output file is missing or empty after writing.
    #[error("failed to save image to {}", .0.display())]
    SaveVerification(PathBuf),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn upstream_detail(code: &Option<String>, message: &Option<String>) -> String {
    match (code, message) {
        (Some(code), Some(message)) => format!(" ({code}): {message}"),
        (Some(code), None) => format!(" ({code})"),
        (None, Some(message)) => format!(": {message}"),
        (None, None) => String::new(),
    }
}

/// Result type alias for image generation operations.
pub type Result<T> = std::result::Result<T, ImagenError>;
