//! 服务配置：分类目录、重命名策略、分片大小与命令行参数。

use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

pub const BYTES_PER_MB: u64 = 1024 * 1024;
pub const DEFAULT_UPLOAD_ROOT: &str = "uploads";
pub const DEFAULT_RENAME_PREFIX: &str = "id";
pub const DEFAULT_MAX_FILE_SIZE_MB: f64 = 200.0;
pub const DEFAULT_CHUNK_SIZE_MB: f64 = 10.0;

/// 上传分类：目录名与允许的扩展名集合。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub extensions: Vec<String>,
}

impl Category {
    /// 扩展名统一转为小写并去掉前导 `.`，空值会被丢弃。
    pub fn new<I, S>(name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
            if !ext.is_empty() && !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        Self {
            name: name.into(),
            extensions: normalized,
        }
    }

    pub fn allows(&self, extension: &str) -> bool {
        self.extensions.iter().any(|ext| ext == extension)
    }
}

/// Parses `name=ext1,ext2` as used by `--dir`.
impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (name, extensions) = value
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=EXT[,EXT...], got `{value}`"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("category name is empty in `{value}`"));
        }
        Ok(Category::new(name, extensions.split(',')))
    }
}

/// 存储文件名前缀的生成策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenamePolicy {
    #[default]
    RandomHex,
    Uuid,
    Timestamp,
}

impl RenamePolicy {
    /// `"uuid"` 与 `"timestamp"` 之外的值（包括默认的 `"id"`）都使用随机十六进制。
    pub fn from_prefix(prefix: &str) -> Self {
        match prefix {
            "uuid" => RenamePolicy::Uuid,
            "timestamp" => RenamePolicy::Timestamp,
            _ => RenamePolicy::RandomHex,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StreamingConfig {
    pub enabled: bool,
    pub chunk_size_mb: f64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size_mb: DEFAULT_CHUNK_SIZE_MB,
        }
    }
}

impl StreamingConfig {
    /// 单次响应的最大字节数，至少为 1。
    pub fn chunk_size_bytes(&self) -> u64 {
        mb_to_bytes(self.chunk_size_mb, DEFAULT_CHUNK_SIZE_MB).max(1)
    }
}

/// Immutable server configuration, built once and shared behind an `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct FileServerConfig {
    pub upload_root: PathBuf,
    pub required_dirs: Vec<Category>,
    pub rename: RenamePolicy,
    pub create_file_view_server: bool,
    pub max_file_size_mb: f64,
    pub streaming: StreamingConfig,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from(DEFAULT_UPLOAD_ROOT),
            required_dirs: Vec::new(),
            rename: RenamePolicy::default(),
            create_file_view_server: true,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            streaming: StreamingConfig::default(),
        }
    }
}

impl FileServerConfig {
    pub fn new(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            ..Self::default()
        }
    }

    /// 追加分类；同名分类会原地替换扩展名集合并保留原有顺序。
    pub fn with_dir<I, S>(mut self, name: &str, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.push_category(Category::new(name, extensions));
        self
    }

    pub fn with_rename(mut self, rename: RenamePolicy) -> Self {
        self.rename = rename;
        self
    }

    pub fn with_max_file_size_mb(mut self, max_file_size_mb: f64) -> Self {
        self.max_file_size_mb = max_file_size_mb;
        self
    }

    pub fn with_streaming(mut self, enabled: bool, chunk_size_mb: f64) -> Self {
        self.streaming = StreamingConfig {
            enabled,
            chunk_size_mb,
        };
        self
    }

    pub fn with_view_server(mut self, enabled: bool) -> Self {
        self.create_file_view_server = enabled;
        self
    }

    pub fn push_category(&mut self, category: Category) {
        match self
            .required_dirs
            .iter_mut()
            .find(|existing| existing.name == category.name)
        {
            Some(existing) => existing.extensions = category.extensions,
            None => self.required_dirs.push(category),
        }
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.required_dirs.iter().map(|category| category.name.as_str())
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        mb_to_bytes(self.max_file_size_mb, DEFAULT_MAX_FILE_SIZE_MB)
    }
}

fn mb_to_bytes(value: f64, fallback: f64) -> u64 {
    let mb = if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    };
    (mb * BYTES_PER_MB as f64) as u64
}

/// CLI arguments and environment configuration for the host binary.
#[derive(Parser, Debug)]
#[command(name = "flex-file-server", version, about = "File upload and range streaming server")]
pub struct Args {
    #[arg(
        short = 'r',
        long,
        env = "FLEX_UPLOAD_ROOT",
        default_value = DEFAULT_UPLOAD_ROOT,
        help = "Root directory for uploaded files"
    )]
    pub upload_root: String,
    #[arg(
        short = 'd',
        long = "dir",
        env = "FLEX_DIRS",
        value_delimiter = ';',
        help = "Category and allowed extensions, e.g. video=mp4,webm (repeatable)"
    )]
    pub dirs: Vec<Category>,
    #[arg(
        long,
        env = "FLEX_RENAME_PREFIX",
        default_value = DEFAULT_RENAME_PREFIX,
        help = "Stored name prefix policy: id, uuid or timestamp"
    )]
    pub rename_prefix: String,
    #[arg(
        long,
        env = "FLEX_MAX_FILE_SIZE_MB",
        default_value_t = DEFAULT_MAX_FILE_SIZE_MB,
        help = "Max upload size in MB"
    )]
    pub max_file_size_mb: f64,
    #[arg(
        long,
        env = "FLEX_CHUNK_SIZE_MB",
        default_value_t = DEFAULT_CHUNK_SIZE_MB,
        help = "Max bytes per view response in MB"
    )]
    pub chunk_size_mb: f64,
    #[arg(
        long,
        env = "FLEX_DISABLE_STREAMING",
        help = "Serve whole files with 200 instead of 206 chunks"
    )]
    pub disable_streaming: bool,
    #[arg(
        long,
        env = "FLEX_DISABLE_VIEW_URL",
        help = "Omit viewUrl from upload responses"
    )]
    pub disable_view_url: bool,
    #[arg(
        short = 'b',
        long,
        env = "FLEX_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "FLEX_PORT",
        default_value_t = 5005,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(long, env = "FLEX_CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
}

impl Args {
    pub fn server_config(&self) -> FileServerConfig {
        let mut config = FileServerConfig::new(&self.upload_root)
            .with_rename(RenamePolicy::from_prefix(&self.rename_prefix))
            .with_max_file_size_mb(self.max_file_size_mb)
            .with_streaming(!self.disable_streaming, self.chunk_size_mb)
            .with_view_server(!self.disable_view_url);
        for category in &self.dirs {
            config.push_category(category.clone());
        }
        config
    }
}
