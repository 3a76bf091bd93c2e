use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use service::errors::ServiceError;
use service::geojson::Violation;
use thiserror::Error;
use tracing::error;

/// HTTP-facing error. Input problems carry enough detail to fix the request;
/// storage and unclassified failures only ever say "Internal server error".
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { message: String, details: Option<Vec<Violation>> },
    #[error("payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },
    #[error("Not found")]
    NotFound,
    #[error("Internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [Violation]>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), details: None }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(violations) => ApiError::BadRequest {
                message: "Invalid GeoJSON".into(),
                details: Some(violations),
            },
            ServiceError::InvalidIdentifier(_) => ApiError::bad_request("Invalid identifier"),
            ServiceError::NotFound(_) => ApiError::NotFound,
            e @ (ServiceError::Storage(_) | ServiceError::Serialization(_)) => {
                error!(error = %e, "service failure");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            ApiError::BadRequest { details, .. } => details.as_deref(),
            _ => None,
        };
        let body = ErrorBody { error: self.to_string(), details };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_detail_is_withheld() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/srv/secret/path");
        let api: ApiError = ServiceError::Storage(io).into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.to_string(), "Internal server error");
    }

    #[test]
    fn classified_errors_map_to_status() {
        assert_eq!(ApiError::from(ServiceError::Validation(vec![])).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(ServiceError::InvalidIdentifier("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::from(ServiceError::not_found("doc")).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::PayloadTooLarge { limit: 1 }.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
