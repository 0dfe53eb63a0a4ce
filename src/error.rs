//! Error taxonomy shared by the stores, the repository and the HTTP surface.
//!
//! Validation and not-found outcomes are ordinary responses. Backend failures
//! carry enough context (backend, operation) to diagnose, and the partial
//! outcomes of a two-step write are reported as their own variants so a client
//! can tell "try again" apart from "you made a mistake".

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::record::PhotoRecord;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad input from the caller; never retried
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    /// An object key already holds different content
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{backend} backend unavailable during {operation}: {reason}")]
    BackendUnavailable {
        backend: String,
        operation: String,
        reason: String,
    },

    /// The image was written but its metadata was not
    #[error("photo {} stored but not indexed: {reason}", record.id)]
    StoredNotIndexed {
        record: Box<PhotoRecord>,
        reason: String,
    },

    /// One half of a two-step mutation succeeded and the other failed
    #[error("{operation} of {id} partially applied: {reason}")]
    PartiallyApplied {
        operation: String,
        id: String,
        reason: String,
    },

    /// A bulk collection exists but is not a JSON array; writes refuse to clobber it
    #[error("metadata collection is corrupt: {0}")]
    CorruptCollection(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn backend(backend: impl Into<String>, operation: impl Into<String>, reason: impl ToString) -> Self {
        Error::BackendUnavailable {
            backend: backend.into(),
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Error::BackendUnavailable { .. })
    }

    /// Stable machine-readable code returned in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Unauthorized => "unauthorized",
            Error::Conflict(_) => "conflict",
            Error::BackendUnavailable { .. } => "backend_unavailable",
            Error::StoredNotIndexed { .. } => "stored_not_indexed",
            Error::PartiallyApplied { .. } => "partially_applied",
            Error::CorruptCollection(_) => "corrupt_collection",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::StoredNotIndexed { .. } => StatusCode::ACCEPTED,
            Error::BackendUnavailable { .. }
            | Error::PartiallyApplied { .. }
            | Error::CorruptCollection(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "success": false,
            "code": self.code(),
            "message": self.to_string(),
        });
        if let Error::StoredNotIndexed { record, .. } = self {
            body["photo"] = json!(record);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_distinguish_caller_and_backend_faults() {
        assert_eq!(Error::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::backend("memory", "list", "down").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::PartiallyApplied { operation: "delete".into(), id: "a".into(), reason: "r".into() }.code(),
            "partially_applied"
        );
    }

    #[test]
    fn test_backend_error_message_carries_context() {
        let err = Error::backend("redis", "put", "connection refused");
        assert!(err.is_backend_failure());
        assert_eq!(err.to_string(), "redis backend unavailable during put: connection refused");
    }
}
