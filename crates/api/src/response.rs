use academy_runtime::DrawError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type AppSuccess = GenericResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericResponse {
    pub status: u16,
    pub message: String,
    pub data: serde_json::Value,
}

impl GenericResponse {
    pub fn new(status: StatusCode, message: &str, data: serde_json::Value) -> Self {
        Self {
            status: status.as_u16(),
            message: message.to_string(),
            data,
        }
    }

    pub fn ok(message: &str, data: impl Serialize) -> Result<Self, AppError> {
        let data = serde_json::to_value(data)
            .map_err(|e| AppError::new(StatusCode::INTERNAL_SERVER_ERROR, e.into()))?;
        Ok(Self::new(StatusCode::OK, message, data))
    }
}

impl IntoResponse for GenericResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json::from(self)).into_response()
    }
}

// Make our own error that wraps `anyhow::Error`.
#[derive(Debug)]
pub struct AppError(pub StatusCode, pub anyhow::Error);
impl AppError {
    pub fn new(status: StatusCode, err: anyhow::Error) -> Self {
        Self(status, err)
    }

    pub fn from_draw(err: DrawError) -> Self {
        let status = match &err {
            DrawError::NotRegistered(_) | DrawError::UnknownPool(_) => StatusCode::NOT_FOUND,
            DrawError::OpportunityUnavailable { .. } => StatusCode::CONFLICT,
            DrawError::InvalidRequest(_) | DrawError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            DrawError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            DrawError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, err.into())
    }
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.0.is_server_error() {
            tracing::error!("CODE: {}, MESSAGE: {}", self.0.as_u16(), self.1);
        } else {
            tracing::warn!("CODE: {}, MESSAGE: {}", self.0.as_u16(), self.1);
        }
        GenericResponse::new(self.0, &self.1.to_string(), json!({})).into_response()
    }
}

// This enables using `?` on functions that return `Result<_, anyhow::Error>` to turn them into
// `Result<_, AppError>`. That way you don't need to do that manually.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(StatusCode::BAD_REQUEST, err.into())
    }
}

#[cfg(test)]
mod tests {
    use academy_runtime::{OpportunityKind, StoreError};

    use super::*;

    #[test]
    fn draw_errors_map_to_status_codes() {
        let cases = [
            (DrawError::NotRegistered("A1".into()), StatusCode::NOT_FOUND),
            (DrawError::UnknownPool("x".into()), StatusCode::NOT_FOUND),
            (
                DrawError::OpportunityUnavailable {
                    student_id: "A1".into(),
                    kind: OpportunityKind::Homework,
                },
                StatusCode::CONFLICT,
            ),
            (DrawError::InvalidRequest("packs".into()), StatusCode::BAD_REQUEST),
            (
                DrawError::Store(StoreError::Unavailable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from_draw(err).0, status);
        }
    }

    #[test]
    fn error_response_keeps_its_status() {
        let response = AppError::new(StatusCode::CONFLICT, anyhow::anyhow!("taken")).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
