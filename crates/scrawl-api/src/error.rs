use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use scrawl_core::{Error, ErrorKind};
use scrawl_types::api::ErrorResponse;

const INTERNAL_MESSAGE: &str = "Internal server failure. Please try again.";

#[derive(Debug)]
pub enum ApiError {
    Core(Error),
    /// The request never reached the core: bad JSON, query or path.
    Rejected { status: StatusCode, message: String },
    /// Failure outside the core (task join). Already logged.
    Internal,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Core(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        Self::Rejected {
            status: r.status(),
            message: r.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        Self::Rejected {
            status: r.status(),
            message: r.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        Self::Rejected {
            status: r.status(),
            message: r.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Internal => internal(),
            Self::Rejected { status, message } => (status, "bad_request", message),
            Self::Core(e) => match e.kind() {
                ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, "invalid_input", e.to_string()),
                ErrorKind::UsernameTaken => (StatusCode::CONFLICT, "username_taken", e.to_string()),
                ErrorKind::AuthenticationFailed => (
                    StatusCode::UNAUTHORIZED,
                    "authentication_failed",
                    "Invalid username/password.".to_string(),
                ),
                ErrorKind::Unauthenticated => (
                    StatusCode::UNAUTHORIZED,
                    "unauthenticated",
                    "Not logged in.".to_string(),
                ),
                ErrorKind::RecipientNotFound => {
                    (StatusCode::NOT_FOUND, "no_such_wall", e.to_string())
                }
                ErrorKind::Internal => {
                    error!("Internal error: {}", e);
                    internal()
                }
            },
        };

        (
            status,
            Json(ErrorResponse {
                error: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        INTERNAL_MESSAGE.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        let status = |e: Error| ApiError::from(e).into_response().status();
        assert_eq!(status(Error::InvalidBody), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::UsernameTaken), StatusCode::CONFLICT);
        assert_eq!(status(Error::AuthenticationFailed), StatusCode::UNAUTHORIZED);
        assert_eq!(status(Error::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status(Error::RecipientNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(Error::CorruptCredential), StatusCode::INTERNAL_SERVER_ERROR);

        let rejected = ApiError::Rejected {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            message: "Expected request with `Content-Type: application/json`".into(),
        };
        assert_eq!(
            rejected.into_response().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }
}
