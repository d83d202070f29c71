use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::ErrorKind;

use crate::atomic::is_temp_file_name;

/// Upload root plus the path rules shared by uploads, views and stats.
#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// `<root>/<category>`，分类名必须是单个普通路径段。
    pub fn category_dir(&self, category: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(single_component(category)?))
    }

    /// 校验目录不经过符号链接后递归创建，已存在时直接返回。
    pub async fn ensure_dir(&self, dir: &Path) -> Result<(), StorageError> {
        self.ensure_no_symlink_components(dir, true).await?;
        fs::create_dir_all(dir).await?;
        Ok(())
    }

    /// 按声明顺序在各分类目录中查找同名普通文件，首个命中者胜出。
    pub async fn find_in_categories<'a, I>(
        &self,
        categories: I,
        filename: &str,
    ) -> Result<Option<PathBuf>, StorageError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let filename = single_component(filename)?;
        if filename.to_str().is_some_and(is_temp_file_name) {
            return Ok(None);
        }
        for category in categories {
            let candidate = self.category_dir(category)?.join(filename);
            match self.ensure_no_symlink_components(&candidate, false).await {
                Ok(()) => {}
                Err(StorageError::Io(err)) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            }
            if fs::metadata(&candidate).await?.is_file() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    async fn ensure_no_symlink_components(
        &self,
        target: &Path,
        allow_missing_leaf: bool,
    ) -> Result<(), StorageError> {
        let relative = target
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidPath)?;
        let mut current = PathBuf::from(&self.root);
        let mut components = relative.components().peekable();

        while let Some(component) = components.next() {
            current.push(component.as_os_str());
            match fs::symlink_metadata(&current).await {
                Ok(metadata) => {
                    if metadata.file_type().is_symlink() {
                        return Err(StorageError::InvalidPath);
                    }
                    if components.peek().is_some() && !metadata.is_dir() {
                        return Err(StorageError::InvalidPath);
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound && allow_missing_leaf => {
                    return Ok(());
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
        }

        Ok(())
    }
}

fn single_component(value: &str) -> Result<&OsStr, StorageError> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) if !value.contains(['/', '\\']) => Ok(segment),
        _ => Err(StorageError::InvalidPath),
    }
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}
