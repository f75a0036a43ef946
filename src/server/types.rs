use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    #[form_data(limit = "10MiB")]
    pub file: Bytes,
    pub top_k: Option<usize>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 探针图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 返回的结果数量，默认为 5
    pub top_k: Option<usize>,
}

/// 单条搜索结果
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchMatch {
    /// 来源图片标识
    pub source_id: String,
    /// 人脸在来源图片中的序号
    pub region_index: usize,
    /// 欧氏距离，越小越相似
    pub distance: f32,
    /// 图片访问地址
    pub url: String,
}

/// 搜索响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 按距离从小到大排列的结果
    pub results: Vec<SearchMatch>,
}

/// 索引请求参数
#[derive(TryFromMultipart)]
pub struct IndexRequest {
    #[form_data(limit = "10MiB")]
    pub files: Vec<FieldData<Bytes>>,
}

/// 索引表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct IndexForm {
    /// 上传的图片文件，可以是多张图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub files: Vec<String>,
}

/// 索引响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IndexResponse {
    /// 保存的文件数量
    pub saved_files: usize,
    /// 新增的人脸数量
    pub faces_indexed: usize,
}

/// 索引状态
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// 索引中的人脸数量
    pub indexed_faces: usize,
}
