//! Structured error types for annoflow-core.
//!
//! Uses `thiserror` so library consumers can match on the failure kind.
//! The CLI wraps these in `anyhow` for context.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for annoflow-core operations
#[derive(Error, Debug)]
pub enum AnnoflowError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Export configuration is unusable; raised before any I/O
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// A record could not be projected into a document
    #[error("Failed to export datapoint #{index}: {reason}")]
    Export { index: usize, reason: String },

    /// Image extraction was requested but the document carries no image payload
    #[error("Datapoint '{file_name}' has no image payload to extract")]
    MissingImage { file_name: String },

    /// Required field missing
    #[error("Missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    /// Embedded image payload could not be decoded
    #[error("Failed to decode image of '{file_name}': {reason}")]
    ImageDecode { file_name: String, reason: String },

    /// Pixel buffer could not be encoded or written
    #[error("Image error: {source}")]
    Image {
        #[from]
        source: ::image::ImageError,
    },

    /// File or directory not found
    #[error("Path not found: {path:?}")]
    PathNotFound { path: PathBuf },

    /// Empty input file (cannot detect format)
    #[error("Empty input file: {path:?}")]
    EmptyFile { path: PathBuf },
}

/// Result type alias for annoflow-core operations
pub type Result<T> = std::result::Result<T, AnnoflowError>;

impl AnnoflowError {
    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an export error for the datapoint at `index`
    pub fn export(index: usize, reason: impl Into<String>) -> Self {
        Self::Export {
            index,
            reason: reason.into(),
        }
    }

    /// Create a missing image error
    pub fn missing_image(file_name: impl Into<String>) -> Self {
        Self::MissingImage {
            file_name: file_name.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Create an image decode error
    pub fn image_decode(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ImageDecode {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Create an empty file error
    pub fn empty_file(path: impl Into<PathBuf>) -> Self {
        Self::EmptyFile { path: path.into() }
    }

    /// Attach a datapoint index to an error raised while projecting it.
    ///
    /// Errors that already name an index are returned unchanged.
    pub fn at_index(self, index: usize) -> Self {
        match self {
            Self::Export { .. } => self,
            other => Self::export(index, other.to_string()),
        }
    }
}
