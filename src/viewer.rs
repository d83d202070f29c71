//! 文件查看：按分块返回 206 范围响应。

use axum::body::Body as AxumBody;
use axum::extract::rejection::PathRejection;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::io::SeekFrom;
use std::path::Path as FsPath;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::config::FileServerConfig;
use crate::error::ApiError;
use crate::storage::Storage;

/// Inclusive byte range served by one view response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    /// 计算单次响应的范围：`end = min(start + chunk - 1, total - 1)`。
    pub fn plan(start: u64, total: u64, chunk_size: u64) -> Result<Self, ApiError> {
        if start >= total {
            return Err(ApiError::RangeNotSatisfiable(total));
        }
        let span = chunk_size.max(1) - 1;
        let end = start.saturating_add(span).min(total - 1);
        Ok(Self { start, end, total })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// 从 Range 头中取第一段数字作为起始偏移，无数字时为 0，溢出视为越界。
pub fn requested_start(value: Option<&HeaderValue>) -> u64 {
    let Some(value) = value else {
        return 0;
    };
    let text = String::from_utf8_lossy(value.as_bytes());
    match text
        .split(|ch: char| !ch.is_ascii_digit())
        .find(|digits| !digits.is_empty())
    {
        Some(digits) => digits.parse().unwrap_or(u64::MAX),
        None => 0,
    }
}

pub fn stream_content_type(path: &FsPath) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());
    match extension.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// `GET /file/view` 与 `GET /file/view/`：未提供文件名。
pub async fn missing_filename() -> ApiError {
    ApiError::MissingFilename
}

/// 查看文件：在各分类目录中定位文件，返回一个分块的 206 响应。
pub async fn view_file(
    filename: Result<Path<String>, PathRejection>,
    request_headers: HeaderMap,
    Extension(config): Extension<Arc<FileServerConfig>>,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<Response, ApiError> {
    let Path(filename) = filename?;
    let filename = filename.trim_start_matches('/');
    if filename.is_empty() {
        return Err(ApiError::MissingFilename);
    }

    let target = storage
        .find_in_categories(config.category_names(), filename)
        .await?
        .ok_or(ApiError::FileNotFound)?;

    let mut file = File::open(&target).await?;
    let file_size = file.metadata().await?.len();
    let content_type = stream_content_type(&target);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    if !config.streaming.enabled {
        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file_size));
        info!(filename, size = file_size, "view full file");
        return Ok((
            StatusCode::OK,
            response_headers,
            AxumBody::from_stream(ReaderStream::new(file)),
        )
            .into_response());
    }

    let start = requested_start(request_headers.get(header::RANGE));
    let range = ByteRange::plan(start, file_size, config.streaming.chunk_size_bytes())?;
    debug!(
        filename,
        start = range.start,
        end = range.end,
        length = range.len(),
        "view range accepted"
    );

    file.seek(SeekFrom::Start(range.start)).await?;
    let stream = ReaderStream::new(file.take(range.len()));
    response_headers.insert(
        header::CONTENT_RANGE,
        HeaderValue::from_str(&range.content_range())
            .map_err(|_| ApiError::Internal("failed to build response headers".into()))?,
    );
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(range.len()));

    Ok((
        StatusCode::PARTIAL_CONTENT,
        response_headers,
        AxumBody::from_stream(stream),
    )
        .into_response())
}
