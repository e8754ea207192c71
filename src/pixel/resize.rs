//! # 参考图降采样
//!
//! ## 设计思路
//!
//! 图生图模式会把当前图层整张上传。超大画布既拖慢上传，也常超出生成服务的输入上限，
//! 因此在编码前按“单边最大值”等比缩小。只作用于上传的参考图，生成结果原尺寸落层。
//!
//! ## 实现思路
//!
//! 1. 未超限直接返回原缓冲（零拷贝）
//! 2. 预乘输入先转为非预乘
//! 3. 优先使用 `fast_image_resize`，失败时回退 `image::imageops::resize`

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{ImageBuffer, Rgb, Rgba};

use super::{PixelBuffer, PixelLayout};
use crate::pipeline::PipelineError;

/// 等比缩小到宽高均不超过 `max_dimension`。
pub fn fit_within(buffer: PixelBuffer, max_dimension: u32) -> Result<PixelBuffer, PipelineError> {
    if max_dimension == 0 {
        return Err(PipelineError::Encode("参考图单边上限不能为 0".to_string()));
    }

    let (width, height) = (buffer.width(), buffer.height());
    if width <= max_dimension && height <= max_dimension {
        return Ok(buffer);
    }

    let scale = (f64::from(max_dimension) / f64::from(width))
        .min(f64::from(max_dimension) / f64::from(height))
        .min(1.0);
    let target_width = ((f64::from(width) * scale).floor() as u32).clamp(1, max_dimension);
    let target_height = ((f64::from(height) * scale).floor() as u32).clamp(1, max_dimension);

    log::info!(
        "🧩 参考图降采样：{}x{} -> {}x{}",
        width,
        height,
        target_width,
        target_height
    );

    let straight = buffer.into_straight();
    match resize_with_fast_image_resize(&straight, target_width, target_height) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 降采样失败，回退 image::imageops::resize：{}", err);
            resize_with_image(straight, target_width, target_height)
        }
    }
}

fn resize_with_fast_image_resize(
    buffer: &PixelBuffer,
    target_width: u32,
    target_height: u32,
) -> Result<PixelBuffer, PipelineError> {
    let pixel_type = match buffer.layout() {
        PixelLayout::Rgb => fr::PixelType::U8x3,
        PixelLayout::Rgba => fr::PixelType::U8x4,
    };

    let src_image = fr::images::Image::from_vec_u8(
        buffer.width(),
        buffer.height(),
        buffer.as_bytes().to_vec(),
        pixel_type,
    )
    .map_err(|e| PipelineError::Encode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, pixel_type);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| PipelineError::Encode(format!("fast_image_resize 执行失败：{}", e)))?;

    PixelBuffer::new(
        target_width,
        target_height,
        buffer.layout(),
        buffer.alpha(),
        dst_image.into_vec(),
    )
}

fn resize_with_image(
    buffer: PixelBuffer,
    target_width: u32,
    target_height: u32,
) -> Result<PixelBuffer, PipelineError> {
    let (width, height, layout, alpha) = (
        buffer.width(),
        buffer.height(),
        buffer.layout(),
        buffer.alpha(),
    );
    let invalid = || PipelineError::Encode("降采样输入缓冲长度异常".to_string());

    let data = match layout {
        PixelLayout::Rgb => {
            let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(width, height, buffer.into_bytes())
                .ok_or_else(invalid)?;
            image::imageops::resize(&img, target_width, target_height, FilterType::Triangle)
                .into_raw()
        }
        PixelLayout::Rgba => {
            let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, buffer.into_bytes())
                .ok_or_else(invalid)?;
            image::imageops::resize(&img, target_width, target_height, FilterType::Triangle)
                .into_raw()
        }
    };

    PixelBuffer::new(target_width, target_height, layout, alpha, data)
}
