use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::FaceSearchError;

pub type Result<T> = std::result::Result<T, AppError>;

/// API错误类型
pub struct AppError(pub anyhow::Error);

/// 请求本身不合法，例如上传文件缺少文件名
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct BadRequest(pub String);

impl AppError {
    fn status_code(&self) -> StatusCode {
        if self.0.is::<BadRequest>() {
            return StatusCode::BAD_REQUEST;
        }
        match self.0.downcast_ref::<FaceSearchError>() {
            Some(
                FaceSearchError::Decode(_)
                | FaceSearchError::NoFaceDetected
                | FaceSearchError::InvalidTopK(_),
            ) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
