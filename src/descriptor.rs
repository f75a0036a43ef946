//! 人脸区域的颜色直方图描述符
//!
//! 描述符是裁剪后人脸区域的三维 BGR 颜色直方图，每个通道等分为
//! [`BINS_PER_CHANNEL`] 个区间，归一化到单位 L2 范数后展平为长度
//! [`DESCRIPTOR_DIM`] 的向量。颜色分布只是人脸相似度的一个廉价近似，
//! 并不是训练得到的人脸特征，匹配质量有限。

use opencv::core::{self, Mat, NORM_L2, Vector};
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

use crate::detector::Region;
use crate::error::Result;
use crate::utils;

/// 每个颜色通道的直方图区间数
pub const BINS_PER_CHANNEL: i32 = 8;

/// 描述符维度，所有描述符长度都相同
pub const DESCRIPTOR_DIM: usize = BINS_PER_CHANNEL.pow(3) as usize;

/// 一个人脸区域的描述符，创建后不可修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDescriptor(Vec<f32>);

impl FaceDescriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 欧氏距离，调用方需保证两者维度一致
    pub fn distance(&self, other: &FaceDescriptor) -> f32 {
        debug_assert_eq!(self.len(), other.len());
        self.0.iter().zip(&other.0).map(|(a, b)| (a - b) * (a - b)).sum::<f32>().sqrt()
    }
}

impl From<Vec<f32>> for FaceDescriptor {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// 对每个区域计算一个描述符，顺序与 `regions` 一致
///
/// 裁剪后面积为 0 的区域会被直接丢弃，不产生描述符
pub fn extract(image: &Mat, regions: &[Region]) -> Result<Vec<FaceDescriptor>> {
    let image = utils::to_bgr(image)?;
    let (cols, rows) = (image.cols(), image.rows());

    let mut descriptors = Vec::with_capacity(regions.len());
    for region in regions {
        let Some(rect) = region.clip(cols, rows) else {
            continue;
        };
        let face = Mat::roi(&image, rect)?.try_clone()?;
        descriptors.push(color_histogram(face)?);
    }
    Ok(descriptors)
}

/// 以整张图片作为一个区域计算描述符
pub fn extract_whole(image: &Mat) -> Result<Option<FaceDescriptor>> {
    Ok(extract(image, &[Region::full(image)])?.into_iter().next())
}

fn color_histogram(face: Mat) -> Result<FaceDescriptor> {
    let images = Vector::<Mat>::from_iter([face]);
    let channels = Vector::<i32>::from_slice(&[0, 1, 2]);
    let hist_size = Vector::<i32>::from_slice(&[BINS_PER_CHANNEL; 3]);
    let ranges = Vector::<f32>::from_slice(&[0., 256., 0., 256., 0., 256.]);

    let mut hist = Mat::default();
    let mask = Mat::default();
    imgproc::calc_hist(&images, &channels, &mask, &mut hist, &hist_size, &ranges, false)?;

    let mut normalized = Mat::default();
    core::normalize(&hist, &mut normalized, 1., 0., NORM_L2, -1, &mask)?;

    let mut values = Vec::with_capacity(DESCRIPTOR_DIM);
    for b in 0..BINS_PER_CHANNEL {
        for g in 0..BINS_PER_CHANNEL {
            for r in 0..BINS_PER_CHANNEL {
                values.push(*normalized.at_3d::<f32>(b, g, r)?);
            }
        }
    }
    Ok(FaceDescriptor(values))
}
