//! Error types for the Data Mart client.

use thiserror::Error;

/// Unified error type for all Data Mart client operations.
#[derive(Error, Debug)]
pub enum DataMartError {
    /// The object could not be fetched: the request failed or the server
    /// answered with anything other than `200 OK`.
    #[error("Data Mart object not found: {filename}")]
    NotFound { filename: String },

    /// The client has no usable credentials, or they cannot be sent as headers.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A saved object must use the `.rds` extension.
    #[error("Invalid file extension for {filename}: expected .{expected}")]
    InvalidExtension { filename: String, expected: &'static str },

    /// The commit upload failed. `status` is set when the server answered.
    #[error("Upload of {filename} failed{}: {message}", status_suffix(.status))]
    UploadFailed {
        filename: String,
        status: Option<u16>,
        message: String,
    },

    /// The download reported success but produced no local file.
    #[error("Could not read {filename} after download")]
    ReadFailed { filename: String },

    /// Open modes are limited to `r`, `rb`, `w` and `wb`.
    #[error("Invalid open mode: {0:?}")]
    InvalidMode(String),

    /// The configured base URL cannot be parsed.
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Encoding or decoding a saved object failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred on a local temporary file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl DataMartError {
    pub(crate) fn not_found(filename: &str) -> Self {
        Self::NotFound {
            filename: filename.to_string(),
        }
    }
}
