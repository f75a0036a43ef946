use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;

use crate::config::DetectorOptions;
use crate::error::{FaceSearchError, Result};
use crate::utils;

thread_local! {
    // CascadeClassifier 不是线程安全的，每个线程各自持有一份
    static CASCADES: RefCell<HashMap<PathBuf, CascadeClassifier>> = RefCell::new(HashMap::new());
}

/// 图像中的一个矩形区域，单位为像素
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// 覆盖整张图片的区域
    pub fn full(image: &Mat) -> Self {
        Self::new(0, 0, image.cols(), image.rows())
    }

    /// 将区域裁剪到图片范围内，裁剪后面积为 0 时返回 None
    pub fn clip(&self, cols: i32, rows: i32) -> Option<Rect> {
        let x0 = self.x.clamp(0, cols);
        let y0 = self.y.clamp(0, rows);
        let x1 = self.x.saturating_add(self.width).clamp(0, cols);
        let y1 = self.y.saturating_add(self.height).clamp(0, rows);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height)
    }
}

/// 人脸区域检测器
///
/// 返回的区域顺序必须稳定，索引流程以该顺序作为 `region_index`
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &Mat) -> Result<Vec<Region>>;
}

/// 不做检测，直接把整张图片当作一个区域
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeImageDetector;

impl FaceDetector for WholeImageDetector {
    fn detect(&self, image: &Mat) -> Result<Vec<Region>> {
        if image.empty() {
            return Ok(vec![]);
        }
        Ok(vec![Region::full(image)])
    }
}

/// 基于 OpenCV Haar 级联分类器的人脸检测器
#[derive(Debug, Clone)]
pub struct CascadeDetector {
    path: PathBuf,
    scale_factor: f64,
    min_neighbors: i32,
    min_size: i32,
}

impl CascadeDetector {
    /// 加载级联分类器文件，文件无效时立即报错
    pub fn new(
        path: impl AsRef<Path>,
        scale_factor: f64,
        min_neighbors: i32,
        min_size: i32,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let detector = Self { path, scale_factor, min_neighbors, min_size };
        detector.with_classifier(|_| Ok(()))?;
        Ok(detector)
    }

    fn with_classifier<R>(&self, f: impl FnOnce(&mut CascadeClassifier) -> Result<R>) -> Result<R> {
        CASCADES.with(|cache| {
            let mut cache = cache.borrow_mut();
            let classifier = match cache.entry(self.path.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(load_cascade(&self.path)?),
            };
            f(classifier)
        })
    }
}

fn load_cascade(path: &Path) -> Result<CascadeClassifier> {
    debug!("加载级联分类器: {}", path.display());
    let classifier = CascadeClassifier::new(&path.to_string_lossy())?;
    if classifier.empty()? {
        let msg = format!("无法加载级联分类器: {}", path.display());
        return Err(FaceSearchError::Detector(msg));
    }
    Ok(classifier)
}

impl FaceDetector for CascadeDetector {
    fn detect(&self, image: &Mat) -> Result<Vec<Region>> {
        let gray = utils::to_gray(image)?;
        let min_size = Size::new(self.min_size, self.min_size);
        let mut faces = Vector::<Rect>::new();
        self.with_classifier(|classifier| {
            classifier.detect_multi_scale(
                &gray,
                &mut faces,
                self.scale_factor,
                self.min_neighbors,
                0,
                min_size,
                Size::default(),
            )?;
            Ok(())
        })?;
        Ok(faces.iter().map(Region::from).collect())
    }
}

/// 根据命令行参数构建检测器，未指定级联文件时退化为整图检测
pub fn build_detector(opts: &DetectorOptions) -> Result<Box<dyn FaceDetector>> {
    match &opts.cascade {
        Some(path) => Ok(Box::new(CascadeDetector::new(
            path,
            opts.scale_factor,
            opts.min_neighbors,
            opts.min_face_size,
        )?)),
        None => {
            warn!("未指定级联分类器文件，将整张图片视为一个人脸区域");
            Ok(Box::new(WholeImageDetector))
        }
    }
}
