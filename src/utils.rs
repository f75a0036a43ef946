use indicatif::ProgressStyle;
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;

use crate::error::{FaceSearchError, Result};

/// 将内存中的图片数据解码为 BGR 三通道图像
pub fn imdecode(bytes: &[u8]) -> Result<Mat> {
    let buf = Vector::<u8>::from_slice(bytes);
    // NOTE: 解码失败时 OpenCV 可能报错，也可能返回空矩阵，两种情况都视为解码错误
    let img = imgcodecs::imdecode(&buf, imgcodecs::IMREAD_COLOR)
        .map_err(|e| FaceSearchError::Decode(e.message))?;
    if img.empty() {
        let msg = format!("无法识别的图片格式（{} 字节）", bytes.len());
        return Err(FaceSearchError::Decode(msg));
    }
    Ok(img)
}

/// 将任意通道数的图像转换为 BGR 三通道
pub fn to_bgr(image: &Mat) -> Result<Mat> {
    let code = match image.channels() {
        3 => return Ok(image.try_clone()?),
        1 => imgproc::COLOR_GRAY2BGR,
        4 => imgproc::COLOR_BGRA2BGR,
        n => return Err(FaceSearchError::Decode(format!("不支持的通道数: {n}"))),
    };
    let mut output = Mat::default();
    imgproc::cvt_color_def(image, &mut output, code)?;
    Ok(output)
}

/// 将 BGR 图像转换为灰度图
pub fn to_gray(image: &Mat) -> Result<Mat> {
    if image.channels() == 1 {
        return Ok(image.try_clone()?);
    }
    let code = match image.channels() {
        4 => imgproc::COLOR_BGRA2GRAY,
        _ => imgproc::COLOR_BGR2GRAY,
    };
    let mut output = Mat::default();
    imgproc::cvt_color_def(image, &mut output, code)?;
    Ok(output)
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .expect("failed to build progress style")
        .progress_chars("##-")
}
