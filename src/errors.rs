/*!
 * Error types for the narrasync engine.
 *
 * This module contains custom error types for the different parts of the engine,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

use crate::providers::JobKind;

/// Errors that can occur when talking to a synthesis provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether a poll that failed with this error may succeed on the next tick
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::ConnectionError(_) | Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }
}

/// Errors that abort one synchronization attempt
#[derive(Error, Debug)]
pub enum SyncError {
    /// The narration contained no usable text
    #[error("Narration text is empty")]
    EmptyInput,

    /// The script document has no `script` text
    #[error("No script text found in {path}")]
    MissingScriptText {
        /// Script document path
        path: String,
    },

    /// The script document could not be read or parsed
    #[error("Invalid script document {path}: {reason}")]
    InvalidScript {
        /// Script document path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// The provider rejected a job at submission
    #[error("Provider rejected the {kind} job: {source}")]
    SubmitRejected {
        /// Job that was being submitted
        kind: JobKind,
        /// Provider failure
        #[source]
        source: ProviderError,
    },

    /// A synthesis job reached a failed status
    #[error("Speech synthesis {kind} job failed: {reason}")]
    SynthesisFailed {
        /// Job that failed
        kind: JobKind,
        /// Reason reported by the provider
        reason: String,
    },

    /// Polling a job kept failing past the retry budget
    #[error("Speech synthesis unavailable while polling the {kind} job after {attempts} attempts: {last_error}")]
    SynthesisUnavailable {
        /// Job being polled
        kind: JobKind,
        /// Consecutive failed polls
        attempts: u32,
        /// Last transport error
        last_error: String,
    },

    /// A boundary marker is absent from the timing-mark stream
    #[error("Missing boundary marker in speech marks: {marker}")]
    MissingBoundary {
        /// Marker name that was expected
        marker: String,
    },

    /// A timing-mark record could not be read
    #[error("Malformed speech mark on line {line}: {reason}")]
    MalformedMarks {
        /// 1-based line number in the stream
        line: usize,
        /// Parse failure
        reason: String,
    },

    /// A subtitle interval that does not move forward
    #[error("Invalid interval for subtitle {index}: end {end_ms}ms <= start {start_ms}ms")]
    InvalidInterval {
        /// 1-based subtitle number
        index: usize,
        /// Start in milliseconds
        start_ms: u64,
        /// End in milliseconds
        end_ms: u64,
    },

    /// Local failure writing an artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The attempt was cancelled or timed out
    #[error("Synchronization cancelled: {0}")]
    Cancelled(String),

    /// Non-transient provider failure outside submission
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl SyncError {
    /// Whether a fresh attempt (new markup, new jobs) can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SubmitRejected { .. }
                | Self::SynthesisFailed { .. }
                | Self::SynthesisUnavailable { .. }
                | Self::MissingBoundary { .. }
                | Self::MalformedMarks { .. }
                | Self::Provider(_)
        )
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from a synchronization attempt
    #[error("Synchronization error: {0}")]
    Sync(#[from] SyncError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
