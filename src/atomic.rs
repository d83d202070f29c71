//! 上传临时文件：写入完成后原子改名，失败或任务取消时清理。

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use uuid::Uuid;

/// Prefix of in-flight upload files; stats and views skip these.
pub const TEMP_FILE_PREFIX: &str = ".upload-";
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

pub fn is_temp_file_name(name: &str) -> bool {
    name.starts_with(TEMP_FILE_PREFIX) && name.ends_with(TEMP_FILE_SUFFIX)
}

/// 目标文件同目录下的隐藏临时文件。
///
/// Until `finalize` succeeds or `cleanup` runs, dropping the value removes
/// the temp file, so a cancelled upload task leaves nothing behind.
pub struct AtomicFile {
    target: PathBuf,
    temp_path: PathBuf,
    file: Option<File>,
    settled: bool,
}

impl AtomicFile {
    pub async fn new(target: &Path) -> io::Result<Self> {
        let parent = target
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;
        let temp_path = parent.join(format!(
            "{TEMP_FILE_PREFIX}{}{TEMP_FILE_SUFFIX}",
            Uuid::new_v4().simple()
        ));
        let file = File::create(&temp_path).await?;
        Ok(Self {
            target: target.to_path_buf(),
            temp_path,
            file: Some(file),
            settled: false,
        })
    }

    pub fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("temp file already closed"))
    }

    /// 关闭句柄并删除临时文件。
    pub async fn cleanup(mut self) {
        drop(self.file.take());
        let _ = fs::remove_file(&self.temp_path).await;
        self.settled = true;
    }

    /// 落盘后改名到目标路径；出错时由 `Drop` 删除临时文件。
    pub async fn finalize(mut self) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all().await?;
        }
        fs::rename(&self.temp_path, &self.target).await?;
        self.settled = true;
        Ok(())
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        drop(self.file.take());
        let _ = std::fs::remove_file(&self.temp_path);
    }
}
