//! # 编解码模块
//!
//! ## 设计思路
//!
//! 将“像素缓冲 ⇄ 可传输字节”的过程集中管理，线上格式固定为 PNG（无损）。
//! 解码时优先做签名与尺寸检查，再进行完整解码，降低异常输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 编码：
//! 1. 预乘 Alpha 显式转换为非预乘（PNG 约定）
//! 2. 按布局写出 RGB8 / RGBA8 PNG
//!
//! 解码：
//! 1. 通过文件签名（magic bytes）校验声明格式
//! 2. 读取 header 尺寸并按像素上限快速拒绝
//! 3. 完整解码
//! 4. 归一化为 Rgb/None 或 Rgba/Straight，宽位深分量截断到 8 位

use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader};
use std::borrow::Cow;
use std::fmt;
use std::io::Cursor;

use super::convert::{narrow_f32, narrow_u16};
use super::{AlphaConvention, PixelBuffer, PixelLayout};
use crate::pipeline::PipelineError;

/// 编码字节的格式标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodedFormat {
    Png,
    Jpeg,
    Webp,
}

impl EncodedFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    /// 从 MIME 类型解析（忽略参数与大小写）。
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let base = mime.split(';').next()?.trim().to_ascii_lowercase();
        match base.as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// 按文件签名识别格式。
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        infer::get(bytes).and_then(|kind| Self::from_mime_type(kind.mime_type()))
    }

    fn to_image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Webp => image::ImageFormat::WebP,
        }
    }
}

/// 编码后的图片字节与格式标签。
///
/// 构造时不校验字节内容，结构合法性在 `decode` 时检查。
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Vec<u8>,
    format: EncodedFormat,
}

impl EncodedImage {
    pub fn new(bytes: Vec<u8>, format: EncodedFormat) -> Self {
        Self { bytes, format }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(bytes, EncodedFormat::Png)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn format(&self) -> EncodedFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// 解码阶段资源上限。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_decoded_pixels: 40_000_000,
        }
    }
}

/// 将像素缓冲编码为 PNG。
pub fn encode(buffer: &PixelBuffer) -> Result<EncodedImage, PipelineError> {
    // 预乘 → 非预乘：PNG 只承载非预乘 Alpha。
    let source = match buffer.alpha() {
        AlphaConvention::Premultiplied => Cow::Owned(buffer.clone().into_straight()),
        AlphaConvention::Straight | AlphaConvention::None => Cow::Borrowed(buffer),
    };

    let color_type = match source.layout() {
        PixelLayout::Rgb => ExtendedColorType::Rgb8,
        PixelLayout::Rgba => ExtendedColorType::Rgba8,
    };

    let mut out = Vec::with_capacity(source.as_bytes().len() / 2);
    PngEncoder::new(&mut out)
        .write_image(source.as_bytes(), source.width(), source.height(), color_type)
        .map_err(|e| PipelineError::Encode(format!("PNG 编码失败：{}", e)))?;

    log::debug!(
        "🗜️ 编码完成 - {}x{} {:?} -> {} KB",
        source.width(),
        source.height(),
        source.layout(),
        out.len() / 1024
    );

    Ok(EncodedImage::png(out))
}

/// 使用默认上限解码。
pub fn decode(encoded: &EncodedImage) -> Result<PixelBuffer, PipelineError> {
    decode_with_limits(encoded, &DecodeLimits::default())
}

/// 解码并归一化为 Rgb/None 或 Rgba/Straight。
pub fn decode_with_limits(
    encoded: &EncodedImage,
    limits: &DecodeLimits,
) -> Result<PixelBuffer, PipelineError> {
    validate_signature(encoded)?;

    let format = encoded.format().to_image_format();
    let (header_width, header_height) = ImageReader::with_format(Cursor::new(encoded.bytes()), format)
        .into_dimensions()
        .map_err(|e| PipelineError::Decode(format!("无法读取图片尺寸：{}", e)))?;
    validate_pixel_limits(limits, header_width, header_height)?;

    let decoded = image::load_from_memory_with_format(encoded.bytes(), format)
        .map_err(|e| PipelineError::Decode(format!("图片数据无效：{}", e)))?;

    let buffer = normalize(decoded)?;
    log::debug!(
        "🖼️ 解码完成 - {:?} {}x{} -> {:?}",
        encoded.format(),
        buffer.width(),
        buffer.height(),
        buffer.layout()
    );
    Ok(buffer)
}

fn validate_signature(encoded: &EncodedImage) -> Result<(), PipelineError> {
    if encoded.is_empty() {
        return Err(PipelineError::Decode("图片内容为空".to_string()));
    }

    let kind = infer::get(encoded.bytes())
        .ok_or_else(|| PipelineError::Decode("无法识别图片类型".to_string()))?;

    if kind.mime_type() != encoded.format().mime_type() {
        return Err(PipelineError::Decode(format!(
            "文件签名与声明格式不符：声明 {}，实际 {}",
            encoded.format().mime_type(),
            kind.mime_type()
        )));
    }

    Ok(())
}

fn validate_pixel_limits(limits: &DecodeLimits, width: u32, height: u32) -> Result<(), PipelineError> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels > limits.max_decoded_pixels {
        return Err(PipelineError::Decode(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, limits.max_decoded_pixels
        )));
    }
    Ok(())
}

fn normalize(decoded: DynamicImage) -> Result<PixelBuffer, PipelineError> {
    let (width, height) = (decoded.width(), decoded.height());

    match decoded {
        DynamicImage::ImageRgb8(img) => PixelBuffer::rgb(width, height, img.into_raw()),
        DynamicImage::ImageRgba8(img) => PixelBuffer::rgba(width, height, img.into_raw()),
        DynamicImage::ImageLuma8(img) => {
            let data = img.into_raw().into_iter().flat_map(|l| [l, l, l]).collect();
            PixelBuffer::rgb(width, height, data)
        }
        DynamicImage::ImageLumaA8(img) => {
            let data = img
                .into_raw()
                .chunks_exact(2)
                .flat_map(|la| [la[0], la[0], la[0], la[1]])
                .collect();
            PixelBuffer::rgba(width, height, data)
        }
        DynamicImage::ImageLuma16(img) => {
            let data = img
                .into_raw()
                .into_iter()
                .flat_map(|l| {
                    let l = narrow_u16(l);
                    [l, l, l]
                })
                .collect();
            PixelBuffer::rgb(width, height, data)
        }
        DynamicImage::ImageLumaA16(img) => {
            let data = img
                .into_raw()
                .chunks_exact(2)
                .flat_map(|la| {
                    let l = narrow_u16(la[0]);
                    [l, l, l, narrow_u16(la[1])]
                })
                .collect();
            PixelBuffer::rgba(width, height, data)
        }
        DynamicImage::ImageRgb16(img) => {
            let data = img.into_raw().into_iter().map(narrow_u16).collect();
            PixelBuffer::rgb(width, height, data)
        }
        DynamicImage::ImageRgba16(img) => {
            let data = img.into_raw().into_iter().map(narrow_u16).collect();
            PixelBuffer::rgba(width, height, data)
        }
        DynamicImage::ImageRgb32F(img) => {
            let data = img.into_raw().into_iter().map(narrow_f32).collect();
            PixelBuffer::rgb(width, height, data)
        }
        DynamicImage::ImageRgba32F(img) => {
            let data = img.into_raw().into_iter().map(narrow_f32).collect();
            PixelBuffer::rgba(width, height, data)
        }
        other => Err(PipelineError::Decode(format!(
            "不支持的像素布局：{:?}",
            other.color()
        ))),
    }
    .map_err(|e| match e {
        PipelineError::Decode(_) => e,
        other => PipelineError::Decode(other.to_string()),
    })
}
