use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ConfDir;
use crate::detector::FaceDetector;

/// 应用状态
pub struct AppState {
    /// 人脸检测器
    pub detector: Box<dyn FaceDetector>,
    /// 索引文件路径
    pub store_path: PathBuf,
    /// 上传图片的保存目录
    pub images_dir: PathBuf,
    /// 索引写锁，同一时间只允许一个索引操作
    pub index_lock: Mutex<()>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(detector: Box<dyn FaceDetector>, conf_dir: &ConfDir) -> Arc<Self> {
        Arc::new(AppState {
            detector,
            store_path: conf_dir.store(),
            images_dir: conf_dir.images(),
            index_lock: Mutex::new(()),
        })
    }
}
