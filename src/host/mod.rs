//! # 宿主模块（host）
//!
//! - `document`：宿主能力接口 `HostDocument` 及其值类型
//! - `context`：独占文档的宿主线程句柄
//! - `bridge`：像素读写与提交回滚
//! - `memory`：内存实现，供命令行与测试使用

mod bridge;
mod context;
mod document;
mod memory;

pub use bridge::HostBridge;
pub use context::{HOST_THREAD_NAME, HostContext};
pub use document::{HostDocument, HostFault, LayerId, LayerInfo, Rect};
pub use memory::{HostOperation, MemoryDocument, ProgressEvent};
