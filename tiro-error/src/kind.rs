//! Error kinds for tiro operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on the kind to decide what to show the learner; the message
/// and context are for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// Catch-all for cases nothing else describes
    Unexpected,

    /// The requested operation is not supported by this backend
    Unsupported,

    /// Invalid configuration
    ConfigInvalid,

    /// Invalid argument passed to an operation
    InvalidArgument,

    // =========================================================================
    // Prompt resources
    // =========================================================================
    /// A system prompt file could not be found at agent construction
    PromptNotFound,

    // =========================================================================
    // Inference/backend errors
    // =========================================================================
    /// The model call failed for an unclassified reason
    InferenceFailed,

    /// The backend answered without any text
    EmptyResponse,

    /// A streaming reply broke off before it finished
    StreamInterrupted,

    /// The backend rejected the request (bad model, bad payload)
    ProviderRejected,

    /// The backend is not reachable or is overloaded
    ProviderUnavailable,

    /// Rate limit exceeded
    RateLimited,

    /// Credentials missing or refused
    AuthenticationFailed,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Network error
    NetworkFailed,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse input or a backend payload
    ParseFailed,

    /// Failed to encode a request body
    SerializationFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            ErrorKind::PromptNotFound => "PromptNotFound",

            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::EmptyResponse => "EmptyResponse",
            ErrorKind::StreamInterrupted => "StreamInterrupted",
            ErrorKind::ProviderRejected => "ProviderRejected",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",

            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",

            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed
                | ErrorKind::StreamInterrupted
                | ErrorKind::ProviderUnavailable
                | ErrorKind::RateLimited
                | ErrorKind::NetworkFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
