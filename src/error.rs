//! 统一的 API 错误类型与 JSON 错误响应。

use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::PathRejection;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::io::{self, ErrorKind};
use thiserror::Error;
use tracing::error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("File type .{0} is not allowed")]
    UnsupportedExtension(String),
    #[error("File too large")]
    FileTooLarge,
    #[error("Filename missing")]
    MissingFilename,
    #[error("Invalid path")]
    InvalidPath,
    #[error("File not found")]
    FileNotFound,
    #[error("Range not satisfiable")]
    RangeNotSatisfiable(u64),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedExtension(_)
            | ApiError::FileTooLarge
            | ApiError::MissingFilename
            | ApiError::InvalidPath
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::FileNotFound => StatusCode::NOT_FOUND,
            ApiError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut headers = HeaderMap::new();
        match &self {
            ApiError::RangeNotSatisfiable(size) => {
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
            }
            ApiError::Internal(msg) => error!(error = %msg, "request failed"),
            _ => {}
        }
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, headers, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvalidPath => ApiError::InvalidPath,
            StorageError::Io(err) => err.into(),
        }
    }
}

impl From<io::Error> for ApiError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => ApiError::FileNotFound,
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
