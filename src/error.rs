use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("some seats not found")]
    SeatsNotFound(Vec<String>),

    #[error("seat {seat_no} is not available (status: {status})")]
    SeatsUnavailable { seat_no: String, status: String },

    #[error("hold is not usable: {0}")]
    HoldInvalid(String),

    #[error("hold has expired")]
    HoldExpired,

    #[error("hold is owned by another user")]
    HoldForeign,

    #[error("event capacity exceeded")]
    CapacityExceeded,

    #[error("booking cannot be cancelled (status: {0})")]
    NotCancellable(String),

    #[error("already joined waitlist for this event")]
    AlreadyOnWaitlist,

    #[error("idempotency key already used for a different booking")]
    IdempotencyCollision,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("could not complete due to concurrent conflicts; please retry")]
    ServiceBusy,

    #[error("request deadline exceeded")]
    Timeout,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::SeatsNotFound(_) => StatusCode::NOT_FOUND,
            AppError::SeatsUnavailable { .. }
            | AppError::HoldInvalid(_)
            | AppError::HoldExpired
            | AppError::HoldForeign
            | AppError::CapacityExceeded
            | AppError::NotCancellable(_)
            | AppError::AlreadyOnWaitlist
            | AppError::IdempotencyCollision
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceBusy => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage errors carry connection strings and SQL; never echo them.
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "database error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = match &self {
            AppError::SeatsNotFound(missing) => Json(json!({
                "error": message,
                "details": missing,
            })),
            _ => Json(json!({ "error": message })),
        };

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_family_maps_to_409() {
        let errors = [
            AppError::SeatsUnavailable {
                seat_no: "A1".into(),
                status: "held".into(),
            },
            AppError::HoldInvalid("not active".into()),
            AppError::HoldExpired,
            AppError::HoldForeign,
            AppError::CapacityExceeded,
            AppError::NotCancellable("cancelled".into()),
            AppError::AlreadyOnWaitlist,
            AppError::IdempotencyCollision,
        ];
        for e in errors {
            assert_eq!(e.status_code(), StatusCode::CONFLICT, "{e}");
        }
    }

    #[test]
    fn retry_exhaustion_maps_to_503() {
        assert_eq!(
            AppError::ServiceBusy.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn missing_seats_map_to_404() {
        let e = AppError::SeatsNotFound(vec!["B7".into()]);
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn deadline_maps_to_504() {
        assert_eq!(AppError::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
