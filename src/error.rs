use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("store unavailable: {0}")]
    TransientStore(String),

    #[error("resource busy: {0}")]
    Busy(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(format!("delivery {id} not found")),
            StoreError::Conflict { .. } => AppError::ConcurrencyConflict(err.to_string()),
            StoreError::IllegalTransition { .. } => {
                AppError::InvalidStateTransition(err.to_string())
            }
            StoreError::Duplicate(_) => AppError::Internal(err.to_string()),
            StoreError::Unavailable(msg) => AppError::TransientStore(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_) | AppError::ConcurrencyConflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::TransientStore(_) | AppError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use uuid::Uuid;

    use super::AppError;
    use crate::models::delivery::DeliveryStatus;
    use crate::store::StoreError;

    #[test]
    fn busy_and_store_outages_are_service_unavailable() {
        let busy = AppError::Busy("delivery locked".to_string()).into_response();
        assert_eq!(busy.status(), StatusCode::SERVICE_UNAVAILABLE);

        let outage: AppError = StoreError::Unavailable("db down".to_string()).into();
        assert_eq!(
            outage.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn store_errors_map_to_state_machine_errors() {
        let id = Uuid::new_v4();

        let conflict: AppError = StoreError::Conflict {
            id,
            expected: DeliveryStatus::WaitingForAccept,
            actual: DeliveryStatus::InProgress,
        }
        .into();
        assert!(matches!(conflict, AppError::ConcurrencyConflict(_)));

        let illegal: AppError = StoreError::IllegalTransition {
            id,
            from: DeliveryStatus::Delivered,
            to: DeliveryStatus::InProgress,
        }
        .into();
        assert!(matches!(illegal, AppError::InvalidStateTransition(_)));
        assert_eq!(illegal.into_response().status(), StatusCode::CONFLICT);

        let missing: AppError = StoreError::NotFound(id).into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }
}
