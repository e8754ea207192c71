//! # 内存宿主文档
//!
//! 无编辑器环境下的 `HostDocument` 实现，供命令行与测试使用。
//! 行为尽量贴近真实宿主：写入先落到暂存区，合并后才对图层可见；
//! 进度文本与消息按顺序记录，便于断言。
//!
//! `fail_on` 可让指定操作失败一次，用于演练提交失败后的回滚路径。

use std::collections::HashSet;

use super::{HostDocument, HostFault, LayerId, LayerInfo, Rect};
use crate::pipeline::PipelineError;
use crate::pixel::PixelBuffer;

/// 可注入故障的宿主操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOperation {
    ReadPixels,
    CreateLayer,
    WriteShadow,
    Flush,
    MergeShadow,
    UpdateRegion,
    DeleteLayer,
}

/// 进度面板事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Text(String),
    End,
}

#[derive(Debug, Clone)]
struct MemoryLayer {
    id: LayerId,
    name: String,
    width: u32,
    height: u32,
    bpp: u32,
    pixels: Vec<u8>,
    shadow: Option<Vec<u8>>,
    /// 创建该图层前的活动图层，删除时恢复。
    previous_active: Option<LayerId>,
}

impl MemoryLayer {
    fn info(&self) -> LayerInfo {
        LayerInfo {
            width: self.width,
            height: self.height,
            bytes_per_pixel: self.bpp,
        }
    }
}

/// 内存中的光栅文档。图层自底向上存放。
#[derive(Debug, Default)]
pub struct MemoryDocument {
    width: u32,
    height: u32,
    layers: Vec<MemoryLayer>,
    active: Option<LayerId>,
    next_id: u32,
    progress: Vec<ProgressEvent>,
    messages: Vec<String>,
    faults: HashSet<HostOperation>,
}

impl MemoryDocument {
    /// 空白文档（无图层）。
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            next_id: 1,
            ..Self::default()
        }
    }

    /// 以像素缓冲为唯一图层建立文档，尺寸取缓冲尺寸。预乘输入先转换为非预乘。
    pub fn from_buffer(name: &str, buffer: &PixelBuffer) -> Result<Self, HostFault> {
        let straight = buffer.clone().into_straight();
        let mut document = Self::new(straight.width(), straight.height());
        document.add_layer(
            name,
            straight.width(),
            straight.height(),
            straight.bytes_per_pixel() as u32,
            straight.into_bytes(),
        )?;
        Ok(document)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 追加一个图层到最顶层并设为活动图层。bpp 不做格式限制，便于模拟灰度图层。
    pub fn add_layer(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        bpp: u32,
        pixels: Vec<u8>,
    ) -> Result<LayerId, HostFault> {
        let expected = u64::from(width) * u64::from(height) * u64::from(bpp);
        if width == 0 || height == 0 || bpp == 0 || pixels.len() as u64 != expected {
            return Err(HostFault::new(format!(
                "图层数据无效：{}x{}x{}，{} 字节",
                width,
                height,
                bpp,
                pixels.len()
            )));
        }

        let id = LayerId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.layers.push(MemoryLayer {
            id,
            name: name.to_string(),
            width,
            height,
            bpp,
            pixels,
            shadow: None,
            previous_active: self.active,
        });
        self.active = Some(id);
        Ok(id)
    }

    pub fn set_active_layer(&mut self, layer: LayerId) -> Result<(), HostFault> {
        self.layer(layer)?;
        self.active = Some(layer);
        Ok(())
    }

    /// 让 `operation` 在下一次调用时失败。`ReadPixels` 只读无法消耗故障，会持续失败。
    pub fn fail_on(&mut self, operation: HostOperation) {
        self.faults.insert(operation);
    }

    pub fn layer_name(&self, layer: LayerId) -> Option<&str> {
        self.find(layer).map(|l| l.name.as_str())
    }

    /// 已合并的图层像素（不含未合并的暂存区）。
    pub fn layer_pixels(&self, layer: LayerId) -> Option<&[u8]> {
        self.find(layer).map(|l| l.pixels.as_slice())
    }

    /// 以 `PixelBuffer` 形式导出图层。
    pub fn export_layer(&self, layer: LayerId) -> Result<PixelBuffer, PipelineError> {
        let found = self
            .find(layer)
            .ok_or_else(|| PipelineError::HostRead(format!("图层 {} 不存在", layer)))?;
        PixelBuffer::from_host_bytes(found.width, found.height, found.bpp, found.pixels.clone())
    }

    pub fn progress_log(&self) -> &[ProgressEvent] {
        &self.progress
    }

    /// 仅进度文本，按出现顺序。
    pub fn progress_texts(&self) -> Vec<String> {
        self.progress
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Text(text) => Some(text.clone()),
                ProgressEvent::End => None,
            })
            .collect()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    fn find(&self, layer: LayerId) -> Option<&MemoryLayer> {
        self.layers.iter().find(|l| l.id == layer)
    }

    fn layer(&self, layer: LayerId) -> Result<&MemoryLayer, HostFault> {
        self.find(layer)
            .ok_or_else(|| HostFault::new(format!("图层 {} 不存在", layer)))
    }

    fn layer_mut(&mut self, layer: LayerId) -> Result<&mut MemoryLayer, HostFault> {
        self.layers
            .iter_mut()
            .find(|l| l.id == layer)
            .ok_or_else(|| HostFault::new(format!("图层 {} 不存在", layer)))
    }

    fn check_fault(&mut self, operation: HostOperation) -> Result<(), HostFault> {
        if self.faults.remove(&operation) {
            return Err(HostFault::new(format!("模拟宿主故障：{:?}", operation)));
        }
        Ok(())
    }
}

impl HostDocument for MemoryDocument {
    fn layers(&self) -> Vec<LayerId> {
        self.layers.iter().map(|l| l.id).collect()
    }

    fn active_layer(&self) -> Option<LayerId> {
        self.active
    }

    fn layer_info(&self, layer: LayerId) -> Result<LayerInfo, HostFault> {
        self.layer(layer).map(MemoryLayer::info)
    }

    fn read_pixels(&self, layer: LayerId, rect: Rect) -> Result<Vec<u8>, HostFault> {
        if self.faults.contains(&HostOperation::ReadPixels) {
            return Err(HostFault::new("模拟宿主故障：ReadPixels"));
        }

        let found = self.layer(layer)?;
        if !rect.fits_within(found.width, found.height) {
            return Err(HostFault::new(format!("区域越界：{:?}", rect)));
        }

        let bpp = found.bpp as usize;
        let stride = found.width as usize * bpp;
        let row_len = rect.width as usize * bpp;
        let mut out = Vec::with_capacity(row_len * rect.height as usize);
        for row in rect.y..rect.y + rect.height {
            let start = row as usize * stride + rect.x as usize * bpp;
            out.extend_from_slice(&found.pixels[start..start + row_len]);
        }
        Ok(out)
    }

    fn create_layer(&mut self, name: &str, width: u32, height: u32) -> Result<LayerId, HostFault> {
        self.check_fault(HostOperation::CreateLayer)?;
        let pixels = vec![0; width as usize * height as usize * 4];
        self.add_layer(name, width, height, 4, pixels)
    }

    fn write_shadow(&mut self, layer: LayerId, rect: Rect, data: &[u8]) -> Result<(), HostFault> {
        self.check_fault(HostOperation::WriteShadow)?;

        let target = self.layer_mut(layer)?;
        if !rect.fits_within(target.width, target.height) {
            return Err(HostFault::new(format!("区域越界：{:?}", rect)));
        }

        let bpp = target.bpp as usize;
        let row_len = rect.width as usize * bpp;
        if data.len() != row_len * rect.height as usize {
            return Err(HostFault::new(format!(
                "写入字节数异常：{}（期望 {}）",
                data.len(),
                row_len * rect.height as usize
            )));
        }

        let stride = target.width as usize * bpp;
        let shadow = target.shadow.get_or_insert_with(|| target.pixels.clone());
        for (i, row) in data.chunks_exact(row_len).enumerate() {
            let start = (rect.y as usize + i) * stride + rect.x as usize * bpp;
            shadow[start..start + row_len].copy_from_slice(row);
        }
        Ok(())
    }

    fn flush(&mut self, layer: LayerId) -> Result<(), HostFault> {
        self.check_fault(HostOperation::Flush)?;
        self.layer(layer).map(|_| ())
    }

    fn merge_shadow(&mut self, layer: LayerId) -> Result<(), HostFault> {
        self.check_fault(HostOperation::MergeShadow)?;
        let target = self.layer_mut(layer)?;
        if let Some(shadow) = target.shadow.take() {
            target.pixels = shadow;
        }
        Ok(())
    }

    fn update_region(&mut self, layer: LayerId, rect: Rect) -> Result<(), HostFault> {
        self.check_fault(HostOperation::UpdateRegion)?;
        let target = self.layer(layer)?;
        if !rect.fits_within(target.width, target.height) {
            return Err(HostFault::new(format!("更新区域越界：{:?}", rect)));
        }
        Ok(())
    }

    fn delete_layer(&mut self, layer: LayerId) -> Result<(), HostFault> {
        self.check_fault(HostOperation::DeleteLayer)?;
        let index = self
            .layers
            .iter()
            .position(|l| l.id == layer)
            .ok_or_else(|| HostFault::new(format!("图层 {} 不存在", layer)))?;
        let removed = self.layers.remove(index);

        if self.active == Some(layer) {
            self.active = removed
                .previous_active
                .filter(|id| self.find(*id).is_some())
                .or_else(|| self.layers.last().map(|l| l.id));
        }
        Ok(())
    }

    fn set_progress_text(&mut self, text: &str) {
        self.progress.push(ProgressEvent::Text(text.to_string()));
    }

    fn end_progress(&mut self) {
        self.progress.push(ProgressEvent::End);
    }

    fn show_message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }
}
