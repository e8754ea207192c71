//! # 宿主文档能力接口
//!
//! ## 设计思路
//!
//! 流水线只依赖宿主的极小能力集：枚举图层、读像素、建图层、经暂存区写像素并提交、
//! 删除图层，以及进度与消息展示。这些能力收敛为 `HostDocument` trait，
//! 真实编辑器与内存实现（`MemoryDocument`）都只需实现它。
//!
//! 所有方法都只在 `HostContext` 的专属线程上被调用，因此取 `&mut self`，
//! 实现方无需自行加锁。

use std::fmt;

/// 宿主图层标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 图层内的矩形区域（像素坐标）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 覆盖 `width x height` 整个图层的区域。
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// 区域非空且完全落在 `width x height` 之内。
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|right| right <= width)
            && self.y.checked_add(self.height).is_some_and(|bottom| bottom <= height)
    }
}

/// 宿主报告的图层几何信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerInfo {
    pub width: u32,
    pub height: u32,
    /// 宿主原始 bytes-per-pixel，可能是 1 / 2 / 3 / 4。
    pub bytes_per_pixel: u32,
}

/// 宿主调用失败。只携带描述文本，由桥接层归类为 `HostRead` / `HostWrite`。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostFault(pub String);

impl HostFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// 宿主光栅文档。
pub trait HostDocument: Send + 'static {
    /// 自底向上的图层列表。
    fn layers(&self) -> Vec<LayerId>;

    fn active_layer(&self) -> Option<LayerId>;

    fn layer_info(&self, layer: LayerId) -> Result<LayerInfo, HostFault>;

    /// 读取区域像素，按行紧密排列，宿主 RGBA 为非预乘。
    fn read_pixels(&self, layer: LayerId, rect: Rect) -> Result<Vec<u8>, HostFault>;

    /// 新建 RGBA 图层：不透明度 100，普通混合模式，插入到最顶层。
    fn create_layer(&mut self, name: &str, width: u32, height: u32) -> Result<LayerId, HostFault>;

    /// 写入暂存（shadow）区域，提交前对文档不可见。
    fn write_shadow(&mut self, layer: LayerId, rect: Rect, data: &[u8]) -> Result<(), HostFault>;

    fn flush(&mut self, layer: LayerId) -> Result<(), HostFault>;

    /// 将暂存区域合并进图层。
    fn merge_shadow(&mut self, layer: LayerId) -> Result<(), HostFault>;

    fn update_region(&mut self, layer: LayerId, rect: Rect) -> Result<(), HostFault>;

    fn delete_layer(&mut self, layer: LayerId) -> Result<(), HostFault>;

    fn set_progress_text(&mut self, text: &str);

    fn end_progress(&mut self);

    fn show_message(&mut self, text: &str);
}
