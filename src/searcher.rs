use std::path::Path;
use std::time::Instant;

use log::debug;

use crate::descriptor::{self, FaceDescriptor};
use crate::detector::FaceDetector;
use crate::error::{FaceSearchError, Result};
use crate::metrics;
use crate::ranker::{self, QueryResult};
use crate::store;
use crate::utils;

/// 默认返回的结果数量
pub const DEFAULT_TOP_K: usize = 5;

pub struct Searcher<'a> {
    detector: &'a dyn FaceDetector,
}

impl<'a> Searcher<'a> {
    pub fn new(detector: &'a dyn FaceDetector) -> Self {
        Self { detector }
    }

    /// 计算探针图片中第一张人脸的描述符
    ///
    /// 没有检测到人脸时返回 [`FaceSearchError::NoFaceDetected`]，
    /// 与“索引为空、没有结果”区分开
    pub fn probe(&self, bytes: &[u8]) -> Result<FaceDescriptor> {
        let image = utils::imdecode(bytes)?;
        let regions = self.detector.detect(&image)?;
        debug!("探针图片检测到 {} 个区域", regions.len());
        descriptor::extract(&image, &regions)?
            .into_iter()
            .next()
            .ok_or(FaceSearchError::NoFaceDetected)
    }

    /// 在索引中搜索与探针图片最相似的 `top_k` 张人脸
    pub fn search(
        &self,
        bytes: &[u8],
        store_path: impl AsRef<Path>,
        top_k: usize,
    ) -> Result<Vec<QueryResult>> {
        let start = Instant::now();
        let result = self.search_inner(bytes, store_path.as_ref(), top_k);
        metrics::observe_search(&result, start.elapsed().as_secs_f64());
        result
    }

    /// 从文件读取探针图片并搜索
    pub fn search_file(
        &self,
        path: impl AsRef<Path>,
        store_path: impl AsRef<Path>,
        top_k: usize,
    ) -> Result<Vec<QueryResult>> {
        let bytes = std::fs::read(path)?;
        self.search(&bytes, store_path, top_k)
    }

    fn search_inner(
        &self,
        bytes: &[u8],
        store_path: &Path,
        top_k: usize,
    ) -> Result<Vec<QueryResult>> {
        if top_k == 0 {
            return Err(FaceSearchError::InvalidTopK(top_k));
        }
        let query = self.probe(bytes)?;
        let entries = store::load(store_path);
        debug!("在 {} 条记录中搜索", entries.len());
        ranker::rank(&query, &entries, top_k)
    }
}
