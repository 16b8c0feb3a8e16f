//! Error types and the JSON envelopes used by the dispatch pipeline.
//!
//! Every failure that reaches the response materializer is an [`Error`]. The
//! error is rendered as `{"error": "<message>"}` and its [`ErrorKind`] decides
//! the status code used when the handler did not pick one explicitly.
//!
//! # Design
//!
//! This module uses an opaque `Error` struct paired with an `ErrorKind` enum,
//! following the `std::io::Error` pattern. Internal error sources can change
//! without breaking consumers.
//!
//! # Example
//!
//! ```rust
//! use axum_dispatch::{Error, ErrorKind};
//! use axum::http::StatusCode;
//!
//! let error = Error::msg("too many requests");
//! assert_eq!(error.kind(), ErrorKind::Handler);
//! assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
//! assert_eq!(error.to_string(), "too many requests");
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of error that occurred.
///
/// # Stability
///
/// This enum is marked `#[non_exhaustive]`, so new variants may be added
/// in future versions without breaking existing code. Always include a
/// wildcard arm when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Error returned by a handler or middleware.
    #[error("handler error")]
    Handler,

    /// The request is not allowed through a firewall.
    #[error("authentication error")]
    Authentication,

    /// Programmer or configuration error (unknown database, websocket, language,
    /// body read twice, duplicate route).
    #[error("configuration error")]
    Configuration,

    /// The request is not `multipart/form-data`.
    #[error("invalid multipart")]
    InvalidMultipart,

    /// A multipart part could not be opened.
    #[error("file cannot be opened")]
    OpenFile,

    /// A multipart part could not be read.
    #[error("cannot read data")]
    ReadData,

    /// Malformed request input (bad JSON, XML, header value).
    #[error("invalid input")]
    InvalidInput,

    /// A response envelope could not be serialized.
    #[error("serialization error")]
    Serialization,

    /// I/O error (file operations, network).
    #[error("I/O error")]
    Io,

    /// Internal/unexpected error, including recovered panics.
    #[error("internal error")]
    Internal,
}

impl ErrorKind {
    /// Handler errors and input errors map to `400 Bad Request`, firewall
    /// rejections to `401`, everything that signals a broken server to `500`.
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Handler
            | ErrorKind::InvalidMultipart
            | ErrorKind::OpenFile
            | ErrorKind::ReadData
            | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Configuration
            | ErrorKind::Serialization
            | ErrorKind::Io
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// An error produced while dispatching a request.
///
/// Use [`Error::kind()`] to determine the category of error for matching,
/// and the `Display` implementation to get the message that ends up in the
/// `{"error": ...}` envelope.
///
/// ```rust
/// use axum_dispatch::{Error, ErrorKind};
///
/// let err = Error::msg("not found");
/// let err = Error::config("invalid database");
/// let err = Error::new(ErrorKind::Io, std::io::Error::other("disk full"));
/// ```
pub struct Error {
    kind: ErrorKind,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl Error {
    /// Creates a new error with the given kind and source.
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            source: error.into(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the status code used when the handler did not set one.
    ///
    /// Handler errors and input errors map to `400 Bad Request`, firewall
    /// rejections to `401`, everything that signals a broken server to `500`.
    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// Returns the `{"error": ...}` envelope for this error.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.to_string())
    }

    /// Consumes the error and returns the inner error source.
    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.source
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Error {
    /// Creates a handler error from a message.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Handler, msg.into())
    }

    /// Creates an authentication error.
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, msg.into())
    }

    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, msg.into())
    }

    /// The requested database name is not registered.
    pub fn invalid_database(name: &str) -> Self {
        Self::config(format!("invalid database: {name}"))
    }

    /// The requested websocket name is not registered.
    pub fn invalid_websocket(name: &str) -> Self {
        Self::config(format!("invalid websocket: {name}"))
    }

    /// The requested language is not configured.
    pub fn invalid_lang(code: &str) -> Self {
        Self::config(format!("invalid lang: {code}"))
    }

    /// The request does not carry a multipart content type.
    pub fn invalid_multipart() -> Self {
        Self::new(
            ErrorKind::InvalidMultipart,
            "request has not multipart content type",
        )
    }

    /// A multipart part could not be opened.
    pub fn open_file(cause: impl fmt::Display) -> Self {
        Self::new(ErrorKind::OpenFile, format!("file cannot be opened: {cause}"))
    }

    /// A multipart part could not be read.
    pub fn read_data(cause: impl fmt::Display) -> Self {
        Self::new(ErrorKind::ReadData, format!("cannot read data: {cause}"))
    }

    /// Creates an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, msg.into())
    }

    /// Creates an I/O error from a message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, msg.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg.into())
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = self.to_envelope();

        tracing::error!(
            kind = %self.kind,
            message = %envelope.error,
            status = %status.as_u16(),
            "Error occurred"
        );

        (status, Json(envelope)).into_response()
    }
}

// ============================================================================
// From implementations
// ============================================================================

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Self::msg(msg)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Self::msg(msg)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::new(ErrorKind::InvalidInput, err)
        } else {
            Self::new(ErrorKind::Serialization, err)
        }
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(err: quick_xml::DeError) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

impl From<quick_xml::SeError> for Error {
    fn from(err: quick_xml::SeError) -> Self {
        Self::new(ErrorKind::Serialization, err)
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::new(ErrorKind::Internal, err)
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

impl From<multer::Error> for Error {
    fn from(err: multer::Error) -> Self {
        Self::read_data(err)
    }
}

impl From<axum::Error> for Error {
    fn from(err: axum::Error) -> Self {
        Self::new(ErrorKind::Io, err)
    }
}

// ============================================================================
// Envelopes
// ============================================================================

/// Failure envelope: `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Human-readable error message.
    pub error: String,
}

impl ErrorEnvelope {
    /// Creates a new error envelope.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Success envelope: `{"result": <value>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    pub result: T,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(format!("{}", ErrorKind::Handler), "handler error");
        assert_eq!(format!("{}", ErrorKind::InvalidMultipart), "invalid multipart");
        assert_eq!(format!("{}", ErrorKind::Internal), "internal error");
    }

    #[test]
    fn test_error_msg_is_handler_kind() {
        let err = Error::msg("too many requests");
        assert_eq!(err.kind(), ErrorKind::Handler);
        assert_eq!(err.to_string(), "too many requests");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_configuration_errors_are_server_errors() {
        for err in [
            Error::invalid_database("reports"),
            Error::invalid_websocket("chat"),
            Error::invalid_lang("xx"),
        ] {
            assert_eq!(err.kind(), ErrorKind::Configuration);
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert!(Error::invalid_database("reports").to_string().contains("reports"));
    }

    #[test]
    fn test_multipart_errors_distinguish_open_and_read() {
        let open = Error::open_file("boundary missing");
        let read = Error::read_data("stream closed");
        assert_eq!(open.kind(), ErrorKind::OpenFile);
        assert_eq!(read.kind(), ErrorKind::ReadData);
        assert!(open.to_string().starts_with("file cannot be opened"));
        assert!(read.to_string().starts_with("cannot read data"));
        assert!(read.to_string().contains("stream closed"));
    }

    #[test]
    fn test_invalid_multipart_message() {
        let err = Error::invalid_multipart();
        assert_eq!(err.kind(), ErrorKind::InvalidMultipart);
        assert_eq!(err.to_string(), "request has not multipart content type");
    }

    #[test]
    fn test_authentication_status() {
        assert_eq!(
            Error::authentication("login required").status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_from_str_and_string() {
        let err: Error = "boom".into();
        assert_eq!(err.kind(), ErrorKind::Handler);
        let err: Error = String::from("bang").into();
        assert_eq!(err.to_string(), "bang");
    }

    #[test]
    fn test_from_serde_json_syntax_error_is_input() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_from_toml_error() {
        let toml_err = "invalid".parse::<toml::Value>().unwrap_err();
        let err: Error = toml_err.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_from_invalid_header() {
        let header_err = http::header::HeaderValue::from_bytes(b"\x00").unwrap_err();
        let err: Error = header_err.into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_envelope_serialization() {
        let body = serde_json::to_string(&Error::msg("nope").to_envelope()).unwrap();
        assert_eq!(body, r#"{"error":"nope"}"#);

        let body = serde_json::to_string(&ResultEnvelope { result: 42 }).unwrap();
        assert_eq!(body, r#"{"result":42}"#);
    }

    #[test]
    fn test_error_debug() {
        let debug_str = format!("{:?}", Error::internal("test"));
        assert!(debug_str.contains("Error"));
        assert!(debug_str.contains("Internal"));
    }

    #[test]
    fn test_error_into_inner() {
        let inner = Error::internal("test message").into_inner();
        assert_eq!(format!("{}", inner), "test message");
    }

    #[test]
    fn test_error_source_trait() {
        assert!(StdError::source(&Error::internal("test")).is_some());
    }

    #[tokio::test]
    async fn test_into_response_uses_kind_status() {
        let response = Error::authentication("login required").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"error":"login required"}"#);
    }
}
