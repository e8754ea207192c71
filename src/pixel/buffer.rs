//! # 像素缓冲模块
//!
//! ## 设计思路
//!
//! `PixelBuffer` 是流水线各阶段之间传递的唯一像素载体。
//! 通道布局用 `PixelLayout::{Rgb, Rgba}` 显式标记，不再以整数 bpp 在运行时分支；
//! Alpha 约定用 `AlphaConvention` 显式标记，跨边界时必须显式转换。
//!
//! ## 实现思路
//!
//! - 构造时校验 `data.len() == width * bpp * height`，不一致即构造失败。
//! - `Rgb` 只能搭配 `AlphaConvention::None`，`Rgba` 只能搭配 `Straight` / `Premultiplied`。
//! - 字段私有，所有权随阶段移动，不跨线程共享引用。

use crate::pipeline::PipelineError;

/// 通道布局。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// 3 字节：R, G, B。
    Rgb,
    /// 4 字节：R, G, B, A。
    Rgba,
}

impl PixelLayout {
    /// 将宿主报告的 bytes-per-pixel 转换为布局标签。
    ///
    /// 仅支持 3 / 4，其他值（如灰度 1 / 2）快速失败。
    pub fn from_bpp(bpp: u32) -> Result<Self, PipelineError> {
        match bpp {
            3 => Ok(Self::Rgb),
            4 => Ok(Self::Rgba),
            other => Err(PipelineError::UnsupportedFormat(format!(
                "bytes-per-pixel={}（仅支持 3 或 4）",
                other
            ))),
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// 宿主交付该布局时使用的 Alpha 约定（宿主 RGBA 为非预乘）。
    pub const fn host_alpha(self) -> AlphaConvention {
        match self {
            Self::Rgb => AlphaConvention::None,
            Self::Rgba => AlphaConvention::Straight,
        }
    }
}

/// Alpha 约定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaConvention {
    /// 无 Alpha 通道，视为完全不透明。
    None,
    /// 非预乘 Alpha。
    Straight,
    /// 预乘 Alpha：RGB 已按 A 缩放。
    Premultiplied,
}

/// 内存中的栅格像素数据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub(super) width: u32,
    pub(super) height: u32,
    pub(super) layout: PixelLayout,
    pub(super) alpha: AlphaConvention,
    pub(super) data: Vec<u8>,
}

impl PixelBuffer {
    /// 创建像素缓冲并校验长度与 Alpha 约定。
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        alpha: AlphaConvention,
        data: Vec<u8>,
    ) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::MalformedBuffer(format!(
                "尺寸不能为 0：{}x{}",
                width, height
            )));
        }

        match (layout, alpha) {
            (PixelLayout::Rgb, AlphaConvention::None)
            | (PixelLayout::Rgba, AlphaConvention::Straight)
            | (PixelLayout::Rgba, AlphaConvention::Premultiplied) => {}
            (layout, alpha) => {
                return Err(PipelineError::MalformedBuffer(format!(
                    "布局 {:?} 不能搭配 Alpha 约定 {:?}",
                    layout, alpha
                )));
            }
        }

        let expected = expected_len(width, height, layout)?;
        if data.len() != expected {
            return Err(PipelineError::MalformedBuffer(format!(
                "像素数据长度异常：{} 字节（期望 {} 字节，{}x{}x{}）",
                data.len(),
                expected,
                width,
                height,
                layout.bytes_per_pixel()
            )));
        }

        Ok(Self {
            width,
            height,
            layout,
            alpha,
            data,
        })
    }

    /// 3 通道、无 Alpha。
    pub fn rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        Self::new(width, height, PixelLayout::Rgb, AlphaConvention::None, data)
    }

    /// 4 通道、非预乘 Alpha。
    pub fn rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        Self::new(width, height, PixelLayout::Rgba, AlphaConvention::Straight, data)
    }

    /// 按宿主报告的 bpp 构造（宿主 RGBA 为非预乘）。
    pub fn from_host_bytes(
        width: u32,
        height: u32,
        bpp: u32,
        data: Vec<u8>,
    ) -> Result<Self, PipelineError> {
        let layout = PixelLayout::from_bpp(bpp)?;
        Self::new(width, height, layout, layout.host_alpha(), data)
    }

    /// 用单一像素值填充。`pixel` 长度必须等于布局的 bpp。
    pub fn filled(
        width: u32,
        height: u32,
        layout: PixelLayout,
        pixel: &[u8],
    ) -> Result<Self, PipelineError> {
        if pixel.len() != layout.bytes_per_pixel() {
            return Err(PipelineError::MalformedBuffer(format!(
                "填充像素长度 {} 与布局 {:?} 不匹配",
                pixel.len(),
                layout
            )));
        }

        let count = expected_len(width, height, layout)? / layout.bytes_per_pixel();
        let data = pixel.repeat(count);
        Self::new(width, height, layout, layout.host_alpha(), data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn alpha(&self) -> AlphaConvention {
        self.alpha
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.layout.bytes_per_pixel()
    }

    /// 每行字节数：`width * bpp`。
    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// 读取 `(x, y)` 处的像素字节。越界返回 `None`。
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.layout.bytes_per_pixel();
        let offset = y as usize * self.stride() + x as usize * bpp;
        self.data.get(offset..offset + bpp)
    }
}

fn expected_len(width: u32, height: u32, layout: PixelLayout) -> Result<usize, PipelineError> {
    (width as usize)
        .checked_mul(layout.bytes_per_pixel())
        .and_then(|stride| stride.checked_mul(height as usize))
        .ok_or_else(|| {
            PipelineError::MalformedBuffer(format!("尺寸导致长度溢出：{}x{}", width, height))
        })
}
