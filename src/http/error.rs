//! Maps [`Error`] onto HTTP responses.
//!
//! Client mistakes carry their message; server-side failures are logged and
//! answered with a generic message.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

impl Error {
    /// Status code the variant is answered with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. }
            | Self::InsufficientStock { .. }
            | Self::InvalidStatusTransition { .. } => StatusCode::CONFLICT,
            Self::Csv { .. } | Self::InvalidAmount { .. } => StatusCode::BAD_REQUEST,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) | Self::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Validation { field, message } => json!({
                "message": self.to_string(),
                "errors": { field.as_str(): message },
            }),
            _ if status.is_server_error() => {
                error!("Request failed: {self}");
                json!({ "message": "Internal server error" })
            }
            _ => json!({ "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn body_json(error: Error) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_is_field_level() {
        let (status, body) = body_json(Error::validation("email", "E-mail is required")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["email"], "E-mail is required");
    }

    #[tokio::test]
    async fn test_status_codes() {
        assert_eq!(
            Error::not_found("product", 3).status_code(),
            StatusCode::NOT_FOUND
        );
        let stock = Error::InsufficientStock {
            product: "Mug".to_string(),
            available: 1,
            requested: 2,
        };
        assert_eq!(stock.status_code(), StatusCode::CONFLICT);
        let csv = Error::Csv {
            line: 4,
            message: "bad".to_string(),
        };
        assert_eq!(csv.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_server_errors_are_generic() {
        let db_error = Error::Database(sea_orm::DbErr::Custom("disk on fire".to_string()));
        let (status, body) = body_json(db_error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }
}
