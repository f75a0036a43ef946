use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceSearchError {
    #[error("无法解码图片: {0}")]
    Decode(String),
    #[error("探针图片中未检测到人脸")]
    NoFaceDetected,
    #[error("描述符维度不一致: 期望 {expected}，实际 {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("top_k 必须大于等于 1，实际为 {0}")]
    InvalidTopK(usize),
    #[error("人脸检测器不可用: {0}")]
    Detector(String),
    #[error("存储读写失败: {0}")]
    Storage(#[from] std::io::Error),
    #[error("序列化失败: {0}")]
    Serialize(#[from] bincode::Error),
    #[error("OpenCV 错误: {0}")]
    OpenCv(#[from] opencv::Error),
}

pub type Result<T> = std::result::Result<T, FaceSearchError>;
