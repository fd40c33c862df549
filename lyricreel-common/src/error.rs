//! Common error types for LyricReel

use thiserror::Error;

/// Common result type for LyricReel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the orchestrator pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid input (e.g. no audio file for a song)
    #[error("{0}")]
    Validation(String),

    /// Analyzer, LLM, image or renderer reported failure or was unreachable
    #[error("{message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },

    /// Requested record not found
    #[error("{0}")]
    NotFound(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure inside one processing phase
    #[error("{phase} failed: {source}")]
    Phase {
        phase: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        Error::ExternalService {
            service,
            message: message.into(),
        }
    }

    /// Wrap this error as the failure of a named phase
    pub fn in_phase(self, phase: &'static str) -> Self {
        Error::Phase {
            phase,
            source: Box::new(self),
        }
    }

    /// Display text of the innermost error, skipping phase wrappers
    pub fn root_message(&self) -> String {
        match self {
            Error::Phase { source, .. } => source.root_message(),
            other => other.to_string(),
        }
    }

    /// True for failures where retrying cannot help (missing records)
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Phase { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
