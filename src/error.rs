use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Error taxonomy shared by the todo and identity services.
///
/// Services return these as values; the HTTP layer maps them to status codes
/// through the `IntoResponse` impl below and never throws across the boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was empty or missing before any store access.
    #[error("{0}")]
    InvalidInput(String),
    /// The entity failed field-level constraints.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// A store-level uniqueness index rejected the write.
    #[error("{0}")]
    Duplicate(String),
    /// The principal does not belong to a recognized identity provider.
    #[error("unsupported identity provider: {0}")]
    UnsupportedPrincipal(String),
    /// A recognized principal is missing a required attribute.
    #[error("the principal's {0} attribute is missing")]
    MissingAttribute(&'static str),
    /// Unclassified store failure; the driver error stays server-side.
    #[error("storage error")]
    Persistence(#[source] anyhow::Error),
}

pub const DUPLICATE_KEY_MSG: &str = "a record with this key already exists";

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_)
            | Error::Validation(_)
            | Error::UnsupportedPrincipal(_)
            | Error::MissingAttribute(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Duplicate(_) => StatusCode::CONFLICT,
            Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some("23505") {
                return Error::Duplicate(DUPLICATE_KEY_MSG.into());
            }
        }
        Error::Persistence(err.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Parse a record id taken from a request path.
///
/// An empty id is a caller bug; a non-UUID id can match no stored record and
/// is reported the same way as an unknown one.
pub fn parse_record_id(id: &str) -> Result<Uuid, Error> {
    if id.trim().is_empty() {
        return Err(Error::InvalidInput("the given id was empty".into()));
    }
    Uuid::parse_str(id.trim())
        .map_err(|_| Error::NotFound("no record was found with the given id".into()))
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = Error::Validation("name must not be empty".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err = Error::NotFound("no todo was found with the given id".into());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicate_maps_to_conflict() {
        let err = Error::Duplicate(DUPLICATE_KEY_MSG.into());
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn persistence_maps_to_internal_error_and_hides_the_source() {
        let err = Error::Persistence(anyhow::anyhow!("connection refused (db internals)"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "storage error");
    }

    #[test]
    fn principal_errors_map_to_bad_request() {
        assert_eq!(
            Error::UnsupportedPrincipal("gitlab".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::MissingAttribute("sub").status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn parse_record_id_rejects_empty_ids() {
        let err = parse_record_id("").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = parse_record_id("   ").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn parse_record_id_treats_malformed_ids_as_not_found() {
        let err = parse_record_id("nonexistent-id").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn parse_record_id_accepts_uuids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_record_id(&id.to_string()).expect("parse"), id);
    }
}
