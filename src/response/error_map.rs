//! Mapping from request failures to terminal error responses.
//!
//! Every cause maps to a status. Only client errors carry a reason; server
//! errors never echo internal detail to the peer.

use std::error::Error as StdError;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};

use crate::channel::{Frame, ResponseMetadata};
use crate::error::{ErrorCodeGroup, ResponseError, RestServiceError, RestServiceErrorCode};
use crate::observability::ResponseMetrics;

const ERROR_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";

/// Status and optional client-facing reason for a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub reason: Option<String>,
}

impl ErrorResponse {
    /// Body text, e.g. `Failure: 400 Bad Request (Reason - bad id)`.
    pub fn body(&self) -> String {
        match &self.reason {
            Some(reason) => format!("Failure: {} (Reason - {})", self.status, reason),
            None => format!("Failure: {}", self.status),
        }
    }

    /// A complete response: metadata and body in one frame.
    pub fn into_frame(self) -> Frame {
        let body = self.body();
        let mut metadata = ResponseMetadata {
            status: self.status,
            ..ResponseMetadata::default()
        };
        metadata
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(ERROR_CONTENT_TYPE));
        Frame::Full { metadata, body: Bytes::from(body) }
    }
}

/// Map a wire status from an error code, counting the category.
pub fn status_for_code(code: RestServiceErrorCode, metrics: &ResponseMetrics) -> StatusCode {
    match code.group() {
        ErrorCodeGroup::BadRequest => {
            metrics.bad_request_errors.increment(1);
            StatusCode::BAD_REQUEST
        }
        ErrorCodeGroup::InternalServerError => {
            metrics.internal_server_errors.increment(1);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorCodeGroup::Unknown => {
            metrics.unknown_rest_service_errors.increment(1);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Build the error response for `cause`.
pub fn map_error(cause: &(dyn StdError + 'static), metrics: &ResponseMetrics) -> ErrorResponse {
    let code = if let Some(e) = cause.downcast_ref::<RestServiceError>() {
        Some(e.code())
    } else {
        cause.downcast_ref::<ResponseError>().map(ResponseError::error_code)
    };

    let Some(code) = code else {
        metrics.unknown_exception_errors.increment(1);
        return ErrorResponse { status: StatusCode::INTERNAL_SERVER_ERROR, reason: None };
    };

    let status = status_for_code(code, metrics);
    let reason = (status == StatusCode::BAD_REQUEST).then(|| cause.to_string());
    let response = ErrorResponse { status, reason };
    tracing::trace!(code = %code, body = %response.body(), "Constructed error response");
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::testing::{recorded, MetricsSnapshot};

    #[test]
    fn test_bad_request_carries_reason() {
        let (metrics, snapshotter) = recorded();
        let cause = RestServiceError::new(RestServiceErrorCode::InvalidArgs, "bad id");
        let response = map_error(&cause, &metrics);

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.reason.as_deref(), Some("bad id"));
        assert_eq!(response.body(), "Failure: 400 Bad Request (Reason - bad id)");
        let snapshot = MetricsSnapshot::take(&snapshotter);
        assert_eq!(snapshot.counter("rest_response_bad_request_errors_total"), 1);
    }

    #[test]
    fn test_server_error_hides_reason() {
        let (metrics, snapshotter) = recorded();
        let cause = RestServiceError::new(
            RestServiceErrorCode::InternalObjectCreationError,
            "secret table name",
        );
        let response = map_error(&cause, &metrics);

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.reason, None);
        assert!(!response.body().contains("secret"));
        let snapshot = MetricsSnapshot::take(&snapshotter);
        assert_eq!(snapshot.counter("rest_response_internal_server_errors_total"), 1);
    }

    #[test]
    fn test_unknown_code_defaults_to_server_error() {
        let (metrics, snapshotter) = recorded();
        let cause = RestServiceError::new(RestServiceErrorCode::Unknown, "??");
        let response = map_error(&cause, &metrics);

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.reason, None);
        let snapshot = MetricsSnapshot::take(&snapshotter);
        assert_eq!(snapshot.counter("rest_response_unknown_rest_service_errors_total"), 1);
    }

    #[test]
    fn test_foreign_error_is_unknown_exception() {
        let (metrics, snapshotter) = recorded();
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let response = map_error(&cause, &metrics);

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body(), "Failure: 500 Internal Server Error");
        let snapshot = MetricsSnapshot::take(&snapshotter);
        assert_eq!(snapshot.counter("rest_response_unknown_exception_errors_total"), 1);
    }

    #[test]
    fn test_response_errors_map_through_their_code() {
        let (metrics, _) = recorded();
        let invalid = ResponseError::InvalidHeader("bad\nvalue".into());
        assert_eq!(map_error(&invalid, &metrics).status, StatusCode::BAD_REQUEST);
        assert_eq!(
            map_error(&ResponseError::ChannelClosed, &metrics).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let (metrics, _) = recorded();
        let cause = RestServiceError::new(RestServiceErrorCode::MissingArgs, "no blob id");
        let first = map_error(&cause, &metrics);
        for _ in 0..10 {
            assert_eq!(map_error(&cause, &metrics), first);
        }
    }

    #[test]
    fn test_frame_shape() {
        let frame = ErrorResponse { status: StatusCode::BAD_REQUEST, reason: Some("x".into()) }
            .into_frame();
        let Frame::Full { metadata, body } = frame else {
            panic!("expected a full response frame");
        };
        assert_eq!(metadata.status, StatusCode::BAD_REQUEST);
        assert_eq!(metadata.headers[CONTENT_TYPE], "text/plain; charset=UTF-8");
        assert_eq!(&body[..], b"Failure: 400 Bad Request (Reason - x)");
    }
}
