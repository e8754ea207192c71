//! # 生成流水线模块（pipeline）
//!
//! ## 设计思路
//!
//! 单次调用的完整链路：校验 → （图生图）读取图层并编码 → 请求生成 → 解码 → 写入新图层。
//!
//! - `error`：统一错误类型与分类
//! - `input`：不可变的用户输入与对话框结果
//! - `state`：状态机与合法迁移
//! - `result`：终态结果与宿主状态码
//! - `naming`：新图层命名
//! - `orchestrator`：驱动状态机

mod error;
mod input;
mod naming;
mod orchestrator;
mod result;
mod state;

pub use error::{ErrorKind, PipelineError};
pub use input::{DialogOutcome, GenerationMode, UserInput};
pub use naming::{LAYER_NAME_WORDS, layer_name};
pub use orchestrator::{
    ERROR_MESSAGE_PREFIX, OrchestratorOptions, PROGRESS_CONTACTING, PROGRESS_CREATING,
    PROGRESS_DECODING, PROGRESS_READING, PROGRESS_SENDING, PipelineOrchestrator,
};
pub use result::{HostStatus, PipelineResult};
pub use state::{PipelineState, Terminal};
