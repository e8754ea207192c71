//! # gimini 图层生成流水线：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                宿主（光栅编辑器 / 命令行）                 │
//! │                                                          │
//! │  对话框 ── DialogOutcome ──┐        HostDocument 实现     │
//! └────────────────────────────┼──────────────↑──────────────┘
//!                              ↓              │ 宿主线程（HostContext）
//! ┌────────────────────────────┼──────────────┼──────────────┐
//! │  pipeline::PipelineOrchestrator           │              │
//! │    Validating                             │              │
//! │    CapturingInput ── host::HostBridge ────┤ read_region  │
//! │         └─ pixel::encode (PNG)            │              │
//! │    Requesting ───── generation::ImageGenerator (Gemini)  │
//! │    Decoding ─────── pixel::decode                        │
//! │    Materializing ── host::HostBridge ─────┘ write_new_layer
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`pixel`] | 像素缓冲、Alpha 约定转换、PNG 编解码、参考图降采样 |
//! | [`host`] | 宿主能力接口、宿主线程句柄、读写桥接、内存文档 |
//! | [`generation`] | `ImageGenerator` 接口与 Gemini REST 客户端 |
//! | [`pipeline`] | 状态机编排、错误分类、结果与宿主状态码 |
//! | [`secret`] | API Key 持久化与预填 |
//! | [`config`] | JSON 配置文件加载与回退 |
//! | [`logging`] | 日志初始化（stderr / 追加文件） |
//! | [`error`] | 应用级错误类型 `AppError` |

pub mod config;
pub mod error;
pub mod generation;
pub mod host;
pub mod logging;
pub mod pipeline;
pub mod pixel;
pub mod secret;
