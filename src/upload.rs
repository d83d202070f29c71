//! 上传处理：分类校验、目录创建、存储命名与限额写入。

use axum::extract::multipart::Field;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Extension, Multipart};
use axum::response::Json as JsonResponse;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::atomic::AtomicFile;
use crate::config::FileServerConfig;
use crate::error::ApiError;
use crate::naming::{generate_prefix, stored_name};
use crate::server::VIEW_ROUTE_PREFIX;
use crate::storage::Storage;
use crate::validator::{ExtensionMatch, validate_extension};

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Decides whether an upload is accepted, where it lands and what it is called.
pub trait UploadPolicy {
    fn accept(&self, original_name: &str) -> Result<ExtensionMatch, ApiError>;
    fn resolve_destination(&self, matched: &ExtensionMatch) -> Result<PathBuf, ApiError>;
    fn generate_stored_name(&self, original_name: &str) -> String;
}

/// 基于分类配置与重命名策略的默认实现。
pub struct CategoryPolicy<'a> {
    config: &'a FileServerConfig,
    storage: &'a Storage,
}

impl<'a> CategoryPolicy<'a> {
    pub fn new(config: &'a FileServerConfig, storage: &'a Storage) -> Self {
        Self { config, storage }
    }
}

impl UploadPolicy for CategoryPolicy<'_> {
    fn accept(&self, original_name: &str) -> Result<ExtensionMatch, ApiError> {
        validate_extension(original_name, &self.config.required_dirs)
    }

    fn resolve_destination(&self, matched: &ExtensionMatch) -> Result<PathBuf, ApiError> {
        Ok(self.storage.category_dir(&matched.category)?)
    }

    fn generate_stored_name(&self, original_name: &str) -> String {
        stored_name(&generate_prefix(self.config.rename), original_name)
    }
}

#[derive(Debug)]
pub struct StoredUpload {
    pub original_name: String,
    pub stored_name: String,
    pub category: String,
    pub path: PathBuf,
    pub size: u64,
    pub mimetype: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    original_name: String,
    stored_name: String,
    path: String,
    size: u64,
    mimetype: String,
    view_url: Option<String>,
}

impl UploadResponse {
    fn new(stored: StoredUpload, with_view_url: bool) -> Self {
        let view_url = with_view_url.then(|| view_url(&stored.stored_name));
        Self {
            original_name: stored.original_name,
            stored_name: stored.stored_name,
            path: stored.path.to_string_lossy().to_string(),
            size: stored.size,
            mimetype: stored.mimetype,
            view_url,
        }
    }
}

/// 存储名作为单个路径段编码后拼接到查看路由。
pub fn view_url(stored_name: &str) -> String {
    format!("{VIEW_ROUTE_PREFIX}/{}", urlencoding::encode(stored_name))
}

/// `POST /file/upload`：只处理第一个 `file` 字段，其余字段忽略。
pub async fn upload_file(
    Extension(config): Extension<Arc<FileServerConfig>>,
    Extension(storage): Extension<Arc<Storage>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<JsonResponse<UploadResponse>, ApiError> {
    let mut multipart = multipart?;
    let policy = CategoryPolicy::new(&config, &storage);
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let stored = match receive_upload(&policy, &storage, field, config.max_file_size_bytes())
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "upload rejected");
                return Err(err);
            }
        };
        info!(
            category = stored.category,
            stored_name = stored.stored_name,
            size = stored.size,
            "upload complete"
        );
        return Ok(JsonResponse(UploadResponse::new(
            stored,
            config.create_file_view_server,
        )));
    }
    Err(ApiError::BadRequest("No file uploaded".into()))
}

/// Validates the part, then streams it into its category directory. Nothing
/// is created on disk before the extension is accepted, and a rejected or
/// failed transfer leaves no file behind.
pub async fn receive_upload<P: UploadPolicy>(
    policy: &P,
    storage: &Storage,
    mut field: Field<'_>,
    max_bytes: u64,
) -> Result<StoredUpload, ApiError> {
    let original_name = field
        .file_name()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("file name is required".into()))?;
    let matched = policy.accept(&original_name)?;

    let dir = policy.resolve_destination(&matched)?;
    storage.ensure_dir(&dir).await?;
    let stored_name = policy.generate_stored_name(&original_name);
    let target = dir.join(&stored_name);
    let mimetype = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(&original_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

    let mut atomic = AtomicFile::new(&target).await?;
    let write_result: Result<u64, ApiError> = async {
        let mut total_written: u64 = 0;
        while let Some(chunk) = field.chunk().await? {
            if chunk.is_empty() {
                continue;
            }
            total_written += chunk.len() as u64;
            if total_written > max_bytes {
                return Err(ApiError::FileTooLarge);
            }
            atomic.file_mut()?.write_all(&chunk).await?;
        }
        Ok(total_written)
    }
    .await;
    let size = match write_result {
        Ok(size) => size,
        Err(err) => {
            atomic.cleanup().await;
            return Err(err);
        }
    };
    atomic.finalize().await?;

    Ok(StoredUpload {
        original_name,
        stored_name,
        category: matched.category,
        path: target,
        size,
        mimetype,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenamePolicy;
    use tempfile::tempdir;

    fn make_config(root: PathBuf) -> FileServerConfig {
        FileServerConfig::new(root)
            .with_dir("png", ["png"])
            .with_dir("docs", ["txt"])
            .with_rename(RenamePolicy::Uuid)
    }

    #[test]
    fn policy_routes_by_extension() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("uploads");
        let config = make_config(root.clone());
        let storage = Storage::new(root.clone());
        let policy = CategoryPolicy::new(&config, &storage);

        let matched = policy.accept("note.TXT").expect("accepted");
        assert_eq!(
            policy.resolve_destination(&matched).expect("dest"),
            root.join("docs")
        );
        assert!(matches!(
            policy.accept("evil.exe"),
            Err(ApiError::UnsupportedExtension(_))
        ));
        assert!(!root.exists(), "validation must not touch the disk");
    }

    #[test]
    fn policy_names_keep_original_suffix() {
        let temp = tempdir().expect("tempdir");
        let config = make_config(temp.path().to_path_buf());
        let storage = Storage::new(temp.path().to_path_buf());
        let policy = CategoryPolicy::new(&config, &storage);

        let name = policy.generate_stored_name("a/b.png");
        let (prefix, rest) = name.split_once("-original-").expect("marker");
        assert_eq!(prefix.len(), 36);
        assert_eq!(rest, "a_b.png");
    }

    #[test]
    fn response_view_url_follows_config() {
        let stored = || StoredUpload {
            original_name: "test.png".into(),
            stored_name: "abc-original-test.png".into(),
            category: "png".into(),
            path: PathBuf::from("uploads/png/abc-original-test.png"),
            size: 10,
            mimetype: "image/png".into(),
        };

        let with_url = serde_json::to_value(UploadResponse::new(stored(), true)).expect("json");
        assert_eq!(with_url["originalName"], "test.png");
        assert_eq!(with_url["storedName"], "abc-original-test.png");
        assert_eq!(with_url["viewUrl"], "/file/view/abc-original-test.png");
        assert_eq!(
            view_url("abc-original-100% done#1.txt"),
            "/file/view/abc-original-100%25%20done%231.txt"
        );
        assert_eq!(with_url["size"], 10);

        let without_url = serde_json::to_value(UploadResponse::new(stored(), false)).expect("json");
        assert!(without_url["viewUrl"].is_null());
    }
}
