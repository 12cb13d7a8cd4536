//! Backend error constructors
//!
//! Re-exports tiro-error and adds the constructors the providers share.

pub use tiro_error::{Error, ErrorKind, ErrorStatus, Result};

/// The request never reached the backend, or the connection dropped
pub fn network(operation: &'static str, err: reqwest::Error) -> Error {
    Error::new(ErrorKind::NetworkFailed, err.to_string())
        .with_operation(operation)
        .set_source(err)
}

/// Map a non-success HTTP status to an error kind
pub fn http_status(operation: &'static str, status: u16, body: impl Into<String>) -> Error {
    let body = body.into();
    let kind = match status {
        401 | 403 => ErrorKind::AuthenticationFailed,
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::ProviderUnavailable,
        _ => ErrorKind::ProviderRejected,
    };
    Error::new(kind, body)
        .with_operation(operation)
        .with_context("status", status.to_string())
}

/// The backend answered but the body could not be decoded
pub fn parse(operation: &'static str, message: impl Into<String>) -> Error {
    Error::parse_failed(message).with_operation(operation)
}

/// The backend answered with no text at all
pub fn empty_response(operation: &'static str) -> Error {
    Error::new(ErrorKind::EmptyResponse, "no content in response").with_operation(operation)
}

/// A streamed reply broke off mid-way
pub fn stream_interrupted(message: impl Into<String>) -> Error {
    Error::stream_interrupted(message)
}

/// Building the HTTP client failed
pub fn client_build(err: reqwest::Error) -> Error {
    Error::config_invalid(format!("failed to create HTTP client: {}", err))
        .with_operation("provider::new")
        .set_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(http_status("t", 401, "").kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(http_status("t", 429, "").kind(), ErrorKind::RateLimited);
        assert_eq!(http_status("t", 503, "").kind(), ErrorKind::ProviderUnavailable);
        assert_eq!(http_status("t", 404, "").kind(), ErrorKind::ProviderRejected);

        let err = http_status("openai::complete", 400, "bad payload");
        assert_eq!(err.context_value("status"), Some("400"));
        assert_eq!(err.message(), "bad payload");
        assert!(!err.is_retryable());
    }
}
