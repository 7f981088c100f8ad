use std::fmt::Display;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use comment_store::StorageError;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// A failed request: a status code and a plain-text body naming the step
/// that failed.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(step: &str, detail: impl Display) -> Self {
        let message = format!("{}: {}", step, detail);
        error!(%message, "request failed");
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    /// 404 with an empty body.
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: String::new(),
        }
    }

    /// Absent records become 404; every other storage failure is a 400.
    pub fn from_storage(step: &str, err: StorageError) -> Self {
        if err.is_not_found() {
            Self::not_found()
        } else {
            Self::bad_request(step, err)
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.message.is_empty() {
            self.status.into_response()
        } else {
            (self.status, self.message).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comment_store::policy::LengthViolation;

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::from_storage("Get", StorageError::NotFound("comment 1".to_string()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.message().is_empty());
    }

    #[test]
    fn validation_maps_to_400_with_step() {
        let err = ApiError::from_storage(
            "Save",
            StorageError::Validation {
                field: "name",
                reason: LengthViolation::TooLong,
            },
        );
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.message(),
            "Save: validator failed for field \"name\": value is greater than the required length"
        );
    }
}
