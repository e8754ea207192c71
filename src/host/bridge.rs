//! # 宿主桥接层
//!
//! ## 设计思路
//!
//! `HostBridge` 是流水线中唯一会修改宿主文档的组件。它把宿主的裸字节接口
//! 翻译成 `PixelBuffer`，并把宿主故障归类为 `HostRead` / `HostWrite`。
//!
//! ## 实现思路
//!
//! - 读取：校验图层与区域后读取像素，bpp 只接受 3 / 4。
//! - 写入：建层 → 写暂存区 → flush → merge → update 在同一个宿主任务里完成，
//!   任一步失败都删除刚建的图层，文档不会残留半成品。
//! - 进度与消息使用 `post` 投递，不阻塞调用方。

use std::time::Instant;

use super::{HostContext, HostDocument, HostFault, LayerId, Rect};
use crate::pipeline::PipelineError;
use crate::pixel::{PixelBuffer, PixelLayout};

/// 绑定到单个宿主文档的桥接句柄。
pub struct HostBridge<D> {
    context: HostContext<D>,
}

impl<D> Clone for HostBridge<D> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<D: HostDocument> HostBridge<D> {
    pub fn new(context: HostContext<D>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &HostContext<D> {
        &self.context
    }

    /// 当前活动图层。文档没有活动图层时返回 `HostRead`。
    pub async fn active_layer(&self) -> Result<LayerId, PipelineError> {
        self.context
            .run(|doc| doc.active_layer())
            .await
            .map_err(|e| PipelineError::HostRead(e.to_string()))?
            .ok_or_else(|| PipelineError::HostRead("文档没有活动图层".to_string()))
    }

    pub async fn layer_ids(&self) -> Result<Vec<LayerId>, PipelineError> {
        self.context
            .run(|doc| doc.layers())
            .await
            .map_err(|e| PipelineError::HostRead(e.to_string()))
    }

    /// 读取图层区域。`rect` 为 `None` 时读取整个图层。
    pub async fn read_region(
        &self,
        layer: LayerId,
        rect: Option<Rect>,
    ) -> Result<PixelBuffer, PipelineError> {
        self.context
            .run(move |doc| read_region_on_host(doc, layer, rect))
            .await
            .map_err(|e| PipelineError::HostRead(e.to_string()))?
    }

    /// 将缓冲写入新图层并提交，返回新图层 ID。
    ///
    /// 输入会先转为 RGBA/非预乘。提交过程任一步失败都会删除新图层。
    pub async fn write_new_layer(
        &self,
        name: &str,
        buffer: PixelBuffer,
    ) -> Result<LayerId, PipelineError> {
        let name = name.to_string();
        self.context
            .run(move |doc| write_layer_on_host(doc, &name, buffer))
            .await
            .map_err(|e| PipelineError::HostWrite(e.to_string()))?
    }

    pub fn set_progress(&self, text: &str) {
        let text = text.to_string();
        self.context.post(move |doc| doc.set_progress_text(&text));
    }

    pub fn end_progress(&self) {
        self.context.post(|doc| doc.end_progress());
    }

    pub fn show_message(&self, text: &str) {
        let text = text.to_string();
        self.context.post(move |doc| doc.show_message(&text));
    }
}

fn read_region_on_host<D: HostDocument>(
    doc: &D,
    layer: LayerId,
    rect: Option<Rect>,
) -> Result<PixelBuffer, PipelineError> {
    let info = doc
        .layer_info(layer)
        .map_err(|e| PipelineError::HostRead(format!("图层 {} 不可用：{}", layer, e)))?;
    let layout = PixelLayout::from_bpp(info.bytes_per_pixel)?;

    let rect = rect.unwrap_or_else(|| Rect::full(info.width, info.height));
    if !rect.fits_within(info.width, info.height) {
        return Err(PipelineError::HostRead(format!(
            "读取区域 {:?} 超出图层范围 {}x{}",
            rect, info.width, info.height
        )));
    }

    let data = doc
        .read_pixels(layer, rect)
        .map_err(|e| PipelineError::HostRead(format!("读取像素失败：{}", e)))?;

    PixelBuffer::new(rect.width, rect.height, layout, layout.host_alpha(), data).map_err(|e| match e {
        PipelineError::MalformedBuffer(m) => {
            PipelineError::HostRead(format!("宿主返回的像素数据异常：{}", m))
        }
        other => other,
    })
}

fn write_layer_on_host<D: HostDocument>(
    doc: &mut D,
    name: &str,
    buffer: PixelBuffer,
) -> Result<LayerId, PipelineError> {
    let start = Instant::now();
    let buffer = buffer.into_straight_rgba();
    let rect = Rect::full(buffer.width(), buffer.height());

    let layer = doc
        .create_layer(name, rect.width, rect.height)
        .map_err(|e| PipelineError::HostWrite(format!("创建图层失败：{}", e)))?;

    if let Err(fault) = commit_pixels(doc, layer, rect, buffer.as_bytes()) {
        if let Err(cleanup) = doc.delete_layer(layer) {
            log::error!("❌ 回滚失败，无法删除图层 {}：{}", layer, cleanup);
        } else {
            log::warn!("↩️ 提交失败，已删除图层 {}", layer);
        }
        return Err(PipelineError::HostWrite(format!("提交图层失败：{}", fault)));
    }

    log::debug!(
        "🖼️ 新图层 {} 已提交：{}x{} elapsed={}ms",
        layer,
        rect.width,
        rect.height,
        start.elapsed().as_millis()
    );
    Ok(layer)
}

fn commit_pixels<D: HostDocument>(
    doc: &mut D,
    layer: LayerId,
    rect: Rect,
    data: &[u8],
) -> Result<(), HostFault> {
    doc.write_shadow(layer, rect, data)?;
    doc.flush(layer)?;
    doc.merge_shadow(layer)?;
    doc.update_region(layer, rect)?;
    Ok(())
}
