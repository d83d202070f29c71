//! 路由装配：上传、查看与统计三个端点。

use axum::Router;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::{get, post};
use std::sync::Arc;

use crate::config::FileServerConfig;
use crate::storage::Storage;
use crate::{stats, upload, viewer};

pub const UPLOAD_ROUTE: &str = "/file/upload";
pub const VIEW_ROUTE_PREFIX: &str = "/file/view";
pub const STATS_ROUTE: &str = "/file/stats";

/// Builds the upload/view/stats router for `config`.
///
/// The config and storage are shared with the handlers through `Extension`
/// layers scoped to these routes, so the router can be merged into a host
/// application without leaking state into its other routes.
pub fn file_server_router(config: FileServerConfig) -> Router {
    let storage = Arc::new(Storage::new(config.upload_root.clone()));
    let config = Arc::new(config);

    Router::new()
        .route(
            UPLOAD_ROUTE,
            post(upload::upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route(VIEW_ROUTE_PREFIX, get(viewer::missing_filename))
        .route("/file/view/", get(viewer::missing_filename))
        .route("/file/view/{*filename}", get(viewer::view_file))
        .route(STATS_ROUTE, get(stats::folder_stats))
        .layer(Extension(storage))
        .layer(Extension(config))
}

/// 将文件服务路由合并进宿主应用。
pub fn mount_file_server(app: Router, config: FileServerConfig) -> Router {
    app.merge(file_server_router(config))
}
