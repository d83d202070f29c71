//! Category-based file upload and range streaming for axum.
//!
//! Uploaded files are sorted into category directories by extension, served
//! back one bounded `206 Partial Content` chunk per request, and summarized
//! per folder. [`file_server_router`] builds the three endpoints from an
//! immutable [`FileServerConfig`].

pub mod atomic;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod naming;
pub mod server;
pub mod stats;
pub mod storage;
pub mod upload;
pub mod validator;
pub mod viewer;

pub use config::{Category, FileServerConfig, RenamePolicy, StreamingConfig};
pub use error::ApiError;
pub use server::{file_server_router, mount_file_server};
