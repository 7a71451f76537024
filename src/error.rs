//! Error types and handling for BatchScale

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for BatchScale operations
pub type Result<T> = std::result::Result<T, BatchScaleError>;

/// Failure reported by an [`ImageCodec`](crate::processing::ImageCodec) implementation
#[derive(Debug, Error)]
pub enum CodecError {
    /// Error raised by the `image` crate
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Input bytes are not in a format this codec accepts
    #[error("unsupported image format: {0}")]
    Unsupported(String),

    /// Any other codec-specific failure
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an error, recorded in batch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Read,
    Decode,
    Resize,
    Encode,
    Write,
    Clean,
    Config,
    Pool,
    Internal,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "NotFound",
            Self::Validation => "ValidationError",
            Self::Read => "ReadError",
            Self::Decode => "DecodeError",
            Self::Resize => "ResizeError",
            Self::Encode => "EncodeError",
            Self::Write => "WriteError",
            Self::Clean => "CleanError",
            Self::Config => "ConfigError",
            Self::Pool => "PoolError",
            Self::Internal => "InternalError",
            Self::Io => "IoError",
        };
        f.write_str(name)
    }
}

/// A single file that could not be removed while cleaning a directory
#[derive(Debug)]
pub struct CleanFailure {
    pub path: PathBuf,
    pub error: std::io::Error,
}

/// Main error type for BatchScale operations
#[derive(Debug, Error)]
pub enum BatchScaleError {
    /// Source directory does not exist
    #[error("Source directory not found: {path:?}")]
    NotFound { path: PathBuf },

    /// Invalid scale, resulting dimensions or file limits
    #[error("Validation failed: {message} (file: {file:?})")]
    ValidationError {
        message: String,
        file: Option<PathBuf>,
    },

    /// Source bytes could not be read
    #[error("Failed to read {file:?}: {source}")]
    ReadError {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bytes are not a valid or supported image
    #[error("Failed to decode {file:?}: {source}")]
    DecodeError {
        file: PathBuf,
        #[source]
        source: CodecError,
    },

    /// Codec failed while resampling
    #[error("Failed to resize {file:?}: {source}")]
    ResizeError {
        file: PathBuf,
        #[source]
        source: CodecError,
    },

    /// Codec failed while encoding the output
    #[error("Failed to encode {file:?}: {source}")]
    EncodeError {
        file: PathBuf,
        #[source]
        source: CodecError,
    },

    /// Output could not be written to the destination
    #[error("Failed to write {file:?}: {source}")]
    WriteError {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more files could not be removed during a clean
    #[error("Failed to clean {path:?}: {} file(s) could not be removed", .failures.len())]
    CleanError {
        path: PathBuf,
        failures: Vec<CleanFailure>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Worker pool could not be created
    #[error("Worker pool error: {message}")]
    PoolError { message: String },

    /// A worker panicked while processing a file
    #[error("Internal error: {message} (file: {file:?})")]
    InternalError {
        message: String,
        file: Option<PathBuf>,
    },

    /// I/O related errors outside a single job
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerdeError(String),
}

impl BatchScaleError {
    /// Create a new source-not-found error
    pub fn not_found<P: Into<PathBuf>>(path: P) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S, file: Option<PathBuf>) -> Self {
        Self::ValidationError {
            message: message.into(),
            file,
        }
    }

    pub fn read(file: PathBuf, source: std::io::Error) -> Self {
        Self::ReadError { file, source }
    }

    pub fn decode(file: PathBuf, source: CodecError) -> Self {
        Self::DecodeError { file, source }
    }

    pub fn resize(file: PathBuf, source: CodecError) -> Self {
        Self::ResizeError { file, source }
    }

    pub fn encode(file: PathBuf, source: CodecError) -> Self {
        Self::EncodeError { file, source }
    }

    pub fn write(file: PathBuf, source: std::io::Error) -> Self {
        Self::WriteError { file, source }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new worker pool error
    pub fn pool<S: Into<String>>(message: S) -> Self {
        Self::PoolError {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S, file: Option<PathBuf>) -> Self {
        Self::InternalError {
            message: message.into(),
            file,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ValidationError { .. } => ErrorKind::Validation,
            Self::ReadError { .. } => ErrorKind::Read,
            Self::DecodeError { .. } => ErrorKind::Decode,
            Self::ResizeError { .. } => ErrorKind::Resize,
            Self::EncodeError { .. } => ErrorKind::Encode,
            Self::WriteError { .. } => ErrorKind::Write,
            Self::CleanError { .. } => ErrorKind::Clean,
            Self::ConfigError { .. } | Self::SerdeError(_) => ErrorKind::Config,
            Self::PoolError { .. } => ErrorKind::Pool,
            Self::InternalError { .. } => ErrorKind::Internal,
            Self::IoError(_) => ErrorKind::Io,
        }
    }

    /// Check if this error is recoverable (the batch can continue past it)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Affect a single file; recorded in that file's result
            Self::ValidationError { .. }
            | Self::ReadError { .. }
            | Self::DecodeError { .. }
            | Self::ResizeError { .. }
            | Self::EncodeError { .. }
            | Self::WriteError { .. }
            | Self::InternalError { .. } => true,

            // No meaningful batch without these
            Self::NotFound { .. }
            | Self::CleanError { .. }
            | Self::ConfigError { .. }
            | Self::PoolError { .. }
            | Self::IoError(_)
            | Self::SerdeError(_) => false,
        }
    }

    /// Get the associated file path if available
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            Self::ValidationError { file, .. } | Self::InternalError { file, .. } => file.as_ref(),

            Self::ReadError { file, .. }
            | Self::DecodeError { file, .. }
            | Self::ResizeError { file, .. }
            | Self::EncodeError { file, .. }
            | Self::WriteError { file, .. } => Some(file),

            Self::NotFound { path } | Self::CleanError { path, .. } => Some(path),

            _ => None,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { path } => {
                format!("Source directory {} does not exist", path.display())
            }
            Self::DecodeError { source, .. } => {
                format!("Not a valid PNG or JPEG image: {}", source)
            }
            Self::WriteError { file, source } => {
                format!("Could not write {}: {}", file.display(), source)
            }
            Self::CleanError { path, failures } => {
                let mut msg = format!(
                    "Could not remove {} file(s) under {}:",
                    failures.len(),
                    path.display()
                );
                for failure in failures {
                    msg.push_str(&format!("\n  {}: {}", failure.path.display(), failure.error));
                }
                msg
            }
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for BatchScaleError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerdeError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for BatchScaleError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerdeError(format!("YAML parsing error: {}", err))
    }
}

impl From<serde_json::Error> for BatchScaleError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerdeError(format!("JSON error: {}", err))
    }
}

/// Error context extension for adding file path information
pub trait ErrorContext<T> {
    /// Add file context to an error
    fn with_file_context(self, file: PathBuf) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<BatchScaleError>,
{
    fn with_file_context(self, path: PathBuf) -> Result<T> {
        self.map_err(|e| {
            let mut error: BatchScaleError = e.into();

            match &mut error {
                BatchScaleError::ValidationError { file, .. }
                | BatchScaleError::InternalError { file, .. } => {
                    if file.is_none() {
                        *file = Some(path);
                    }
                }
                _ => {}
            }

            error
        })
    }
}
