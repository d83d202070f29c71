//! 上传目录统计：逐个分类目录汇总文件数量与大小。

use axum::extract::Extension;
use axum::response::Json as JsonResponse;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::fs;
use tokio::io::ErrorKind;
use tracing::debug;

use crate::atomic::is_temp_file_name;
use crate::config::BYTES_PER_MB;
use crate::error::ApiError;
use crate::storage::{Storage, StorageError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FolderStats {
    pub files: u64,
    #[serde(rename = "sizeMB")]
    pub size_mb: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    pub folders: BTreeMap<String, FolderStats>,
}

/// `GET /file/stats`
pub async fn folder_stats(
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<JsonResponse<StatsSnapshot>, ApiError> {
    let snapshot = collect_folder_stats(&storage).await?;
    Ok(JsonResponse(snapshot))
}

/// Point-in-time snapshot of the root's immediate subdirectories. Only the
/// regular files directly inside each subdirectory are counted.
pub async fn collect_folder_stats(storage: &Storage) -> Result<StatsSnapshot, StorageError> {
    let mut snapshot = StatsSnapshot::default();
    let mut root = match fs::read_dir(storage.root_path()).await {
        Ok(dir) => dir,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(root = ?storage.root_path(), "upload root missing, empty stats");
            return Ok(snapshot);
        }
        Err(err) => return Err(err.into()),
    };

    let mut total_bytes: u64 = 0;
    while let Some(entry) = root.next_entry().await? {
        let is_dir = match entry.file_type().await {
            Ok(file_type) => file_type.is_dir(),
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        };
        if !is_dir {
            continue;
        }

        let (files, bytes) = match sum_folder(&entry.path()).await {
            Ok(totals) => totals,
            Err(StorageError::Io(err)) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        };
        total_bytes += bytes;
        snapshot.folders.insert(
            entry.file_name().to_string_lossy().to_string(),
            FolderStats {
                files,
                size_mb: bytes_to_mb(bytes),
            },
        );
    }

    snapshot.total_size_mb = bytes_to_mb(total_bytes);
    Ok(snapshot)
}

async fn sum_folder(path: &std::path::Path) -> Result<(u64, u64), StorageError> {
    let mut dir = fs::read_dir(path).await?;
    let mut files = 0;
    let mut bytes = 0;
    while let Some(entry) = dir.next_entry().await? {
        if is_temp_file_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            // 列举后被删除
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        };
        if metadata.is_file() {
            files += 1;
            bytes += metadata.len();
        }
    }
    Ok((files, bytes))
}

fn bytes_to_mb(bytes: u64) -> f64 {
    let mb = bytes as f64 / BYTES_PER_MB as f64;
    (mb * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(bytes_to_mb(0), 0.0);
        assert_eq!(bytes_to_mb(BYTES_PER_MB), 1.0);
        assert_eq!(bytes_to_mb(BYTES_PER_MB / 2), 0.5);
        assert_eq!(bytes_to_mb(1234 * 1024), 1.21);
    }

    #[tokio::test]
    async fn missing_root_yields_empty_snapshot() {
        let temp = tempdir().expect("tempdir");
        let storage = Storage::new(temp.path().join("absent"));
        let snapshot = collect_folder_stats(&storage).await.expect("stats");
        assert_eq!(snapshot, StatsSnapshot::default());
    }

    #[tokio::test]
    async fn counts_top_level_files_only() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().to_path_buf();
        std::fs::create_dir_all(root.join("png")).expect("png dir");
        std::fs::create_dir_all(root.join("docs").join("nested")).expect("docs dir");
        std::fs::create_dir_all(root.join("empty")).expect("empty dir");
        std::fs::write(root.join("png").join("a.png"), vec![0u8; 1024 * 1024]).expect("write");
        std::fs::write(root.join("png").join("b.png"), vec![0u8; 512 * 1024]).expect("write");
        std::fs::write(root.join("docs").join("n.txt"), b"hello").expect("write");
        std::fs::write(root.join("docs").join("nested").join("deep.txt"), b"x").expect("write");
        std::fs::write(root.join("docs").join(".upload-abc.tmp"), b"partial").expect("write");
        std::fs::write(root.join("stray.txt"), b"ignored").expect("write");

        let storage = Storage::new(root);
        let snapshot = collect_folder_stats(&storage).await.expect("stats");

        assert_eq!(snapshot.folders.len(), 3);
        assert_eq!(snapshot.folders["png"], FolderStats { files: 2, size_mb: 1.5 });
        assert_eq!(snapshot.folders["docs"], FolderStats { files: 1, size_mb: 0.0 });
        assert_eq!(snapshot.folders["empty"], FolderStats { files: 0, size_mb: 0.0 });
        assert_eq!(snapshot.total_size_mb, 1.5);

        let again = collect_folder_stats(&storage).await.expect("stats");
        assert_eq!(snapshot, again);
    }

    #[test]
    fn serializes_with_wire_names() {
        let mut snapshot = StatsSnapshot::default();
        snapshot.folders.insert(
            "docs".into(),
            FolderStats {
                files: 1,
                size_mb: 0.25,
            },
        );
        let value = serde_json::to_value(&snapshot).expect("json");
        assert_eq!(value["totalSizeMB"], 0.0);
        assert_eq!(value["folders"]["docs"]["files"], 1);
        assert_eq!(value["folders"]["docs"]["sizeMB"], 0.25);
    }
}
