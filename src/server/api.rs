use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum_typed_multipart::TypedMultipart;
use log::info;
use tokio::task::block_in_place;

use super::error::{BadRequest, Result};
use super::state::AppState;
use super::types::*;
use crate::searcher::DEFAULT_TOP_K;
use crate::{IndexPipeline, Searcher, metrics, store};

/// 搜索与探针图片最相似的人脸
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "图片无法解码、未检测到人脸或 top_k 无效"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let top_k = data.top_k.unwrap_or(DEFAULT_TOP_K);
    let start = Instant::now();

    info!("正在搜索上传图片，top_k = {}", top_k);

    let result = block_in_place(|| {
        Searcher::new(state.detector.as_ref()).search(&data.file, &state.store_path, top_k)
    })?;

    let results = result
        .into_iter()
        .map(|r| SearchMatch {
            url: image_url(&r.source_id),
            source_id: r.source_id,
            region_index: r.region_index,
            distance: r.distance,
        })
        .collect();

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, results }))
}

/// 图片在 `/images` 下的访问地址，每一级路径分别转义
fn image_url(source_id: &str) -> String {
    let path = source_id.split('/').map(urlencoding::encode).collect::<Vec<_>>().join("/");
    format!("/images/{path}")
}

/// 上传图片并索引其中的人脸
#[utoipa::path(
    post,
    path = "/index",
    request_body(content = IndexForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = IndexResponse),
        (status = 400, description = "上传文件缺少文件名"),
    )
)]
pub async fn index_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<IndexRequest>,
) -> Result<Json<IndexResponse>> {
    // NOTE: 整个索引过程持有写锁，避免两次索引互相覆盖
    let _guard = state.index_lock.lock().await;

    // 先检查全部文件名，任何一个不合法都不写入文件
    let files = data
        .files
        .iter()
        .map(|file| {
            let file_name = file
                .metadata
                .file_name
                .as_deref()
                .and_then(|name| Path::new(name).file_name())
                .ok_or_else(|| BadRequest("文件名不能为空".to_string()))?;
            Ok((file_name, &file.contents))
        })
        .collect::<Result<Vec<_>>>()?;

    tokio::fs::create_dir_all(&state.images_dir).await?;
    let mut saved_files = 0;
    for (file_name, contents) in files {
        tokio::fs::write(state.images_dir.join(file_name), contents).await?;
        saved_files += 1;
    }
    info!("保存了 {} 张上传图片", saved_files);

    let pipeline = IndexPipeline::new(state.detector.as_ref());
    let report =
        block_in_place(|| pipeline.index_directory(&state.images_dir, &state.store_path))?;

    Ok(Json(IndexResponse { saved_files, faces_indexed: report.added }))
}

/// 获取索引状态
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, body = StatusResponse),
    )
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    let entries = block_in_place(|| store::load(&state.store_path));
    Ok(Json(StatusResponse { indexed_faces: entries.len() }))
}

/// 导出 Prometheus 指标
#[utoipa::path(get, path = "/metrics")]
pub async fn metrics_handler() -> Result<String> {
    Ok(metrics::gather_text()?)
}
