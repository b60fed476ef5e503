//! Error taxonomy shared by request processing and the response lifecycle.
//!
//! Two families live here:
//! - [`RestServiceError`]: raised by request-processing code and handed to
//!   [`ResponseHandler::on_request_complete`](crate::response::ResponseHandler::on_request_complete)
//!   as the cause of a failed request.
//! - [`ResponseError`]: typed failures returned synchronously by the response
//!   handler itself (lifecycle violations and lock timeouts).
//!
//! Both resolve to a [`RestServiceErrorCode`], and every code belongs to exactly
//! one [`ErrorCodeGroup`].

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Concrete error codes understood by the response layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestServiceErrorCode {
    // Client errors.
    BadRequest,
    InvalidArgs,
    MissingArgs,
    InvalidRequestState,
    UnsupportedHttpMethod,
    NoRequest,
    DuplicateRequest,
    MalformedRequest,

    // Server errors.
    InternalServerError,
    InternalObjectCreationError,
    RequestChannelClosed,
    ChannelAlreadyClosed,
    IllegalResponseMetadataStateTransition,
    OperationInterrupted,
    ResponseBuildingFailure,

    /// A code with no known group.
    Unknown,
}

/// Coarse grouping used to pick a wire status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCodeGroup {
    BadRequest,
    InternalServerError,
    Unknown,
}

impl RestServiceErrorCode {
    /// The group this code belongs to.
    pub fn group(self) -> ErrorCodeGroup {
        use RestServiceErrorCode::*;
        match self {
            BadRequest | InvalidArgs | MissingArgs | InvalidRequestState | UnsupportedHttpMethod
            | NoRequest | DuplicateRequest | MalformedRequest => ErrorCodeGroup::BadRequest,
            InternalServerError
            | InternalObjectCreationError
            | RequestChannelClosed
            | ChannelAlreadyClosed
            | IllegalResponseMetadataStateTransition
            | OperationInterrupted
            | ResponseBuildingFailure => ErrorCodeGroup::InternalServerError,
            Unknown => ErrorCodeGroup::Unknown,
        }
    }
}

impl fmt::Display for RestServiceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Failure raised by request-processing code.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RestServiceError {
    code: RestServiceErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl RestServiceError {
    /// Create an error with the given code and message.
    pub fn new(code: RestServiceErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> RestServiceErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Which internal guard a timed-out acquisition was waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Metadata,
    Write,
    Close,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockKind::Metadata => "metadata change",
            LockKind::Write => "channel write",
            LockKind::Close => "channel close",
        };
        f.write_str(name)
    }
}

/// Synchronous failures returned by the response handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// Headers or status were changed after the metadata went out.
    #[error("Response metadata has already been written to channel. No more changes possible")]
    MetadataAlreadySent,

    /// The channel was closed, by this handler or by someone else.
    #[error("Channel is closed and cannot accept operations")]
    ChannelClosed,

    /// A guard could not be acquired within the configured bound.
    #[error("Internal {lock} lock acquisition interrupted")]
    OperationInterrupted { lock: LockKind },

    /// A header name or value was not valid on the wire.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl ResponseError {
    /// Code used when this failure is itself reported as a request failure.
    pub fn error_code(&self) -> RestServiceErrorCode {
        match self {
            ResponseError::MetadataAlreadySent => {
                RestServiceErrorCode::IllegalResponseMetadataStateTransition
            }
            ResponseError::ChannelClosed => RestServiceErrorCode::ChannelAlreadyClosed,
            ResponseError::OperationInterrupted { .. } => RestServiceErrorCode::OperationInterrupted,
            ResponseError::InvalidHeader(_) => RestServiceErrorCode::InvalidArgs,
        }
    }

    /// True for lock timeouts, false for lifecycle violations.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ResponseError::OperationInterrupted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_groups() {
        assert_eq!(RestServiceErrorCode::InvalidArgs.group(), ErrorCodeGroup::BadRequest);
        assert_eq!(RestServiceErrorCode::MissingArgs.group(), ErrorCodeGroup::BadRequest);
        assert_eq!(
            RestServiceErrorCode::OperationInterrupted.group(),
            ErrorCodeGroup::InternalServerError
        );
        assert_eq!(
            RestServiceErrorCode::ChannelAlreadyClosed.group(),
            ErrorCodeGroup::InternalServerError
        );
        assert_eq!(RestServiceErrorCode::Unknown.group(), ErrorCodeGroup::Unknown);
    }

    #[test]
    fn test_response_error_codes() {
        assert_eq!(
            ResponseError::MetadataAlreadySent.error_code(),
            RestServiceErrorCode::IllegalResponseMetadataStateTransition
        );
        assert_eq!(
            ResponseError::ChannelClosed.error_code(),
            RestServiceErrorCode::ChannelAlreadyClosed
        );
        let interrupted = ResponseError::OperationInterrupted { lock: LockKind::Write };
        assert!(interrupted.is_interrupted());
        assert!(!ResponseError::ChannelClosed.is_interrupted());
        assert_eq!(
            interrupted.to_string(),
            "Internal channel write lock acquisition interrupted"
        );
    }

    #[test]
    fn test_rest_service_error_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = RestServiceError::new(RestServiceErrorCode::InternalServerError, "lookup failed")
            .with_source(io);
        assert_eq!(err.to_string(), "lookup failed");
        assert_eq!(err.code(), RestServiceErrorCode::InternalServerError);
        assert!(err.source().is_some());
    }
}
