use std::sync::LazyLock;

use prometheus::*;

use crate::error::{FaceSearchError, Result};

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("face_search_count", "count of the probe image to search", &["result"])
        .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("face_search_duration", "duration of the per-probe search in seconds")
        .unwrap()
});

static METRIC_FACES_INDEXED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("face_indexed_count", "count of the face descriptors added to the store")
        .unwrap()
});

static METRIC_FILES_SKIPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "face_index_skipped_count",
        "count of the image files skipped while indexing",
        &["reason"]
    )
    .unwrap()
});

/// 记录一次搜索的结果与耗时
pub fn observe_search<T>(result: &Result<T>, duration: f64) {
    let label = match result {
        Ok(_) => "ok",
        Err(FaceSearchError::NoFaceDetected) => "no_face",
        Err(FaceSearchError::Decode(_)) => "decode_error",
        Err(_) => "error",
    };
    METRIC_SEARCH_COUNT.with_label_values(&[label]).inc();
    METRIC_SEARCH_DURATION.observe(duration);
}

pub fn inc_faces_indexed(count: usize) {
    METRIC_FACES_INDEXED.inc_by(count as u64);
}

pub fn inc_files_skipped(reason: &str) {
    METRIC_FILES_SKIPPED.with_label_values(&[reason]).inc();
}

/// 以 Prometheus 文本格式导出所有指标
pub fn gather_text() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = String::new();
    encoder.encode_utf8(&prometheus::gather(), &mut buffer)?;
    Ok(buffer)
}
