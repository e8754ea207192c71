//! 应用级错误类型模块
//!
//! # 设计思路
//!
//! 流水线内部统一使用 `PipelineError`；配置文件、凭据存储、日志初始化与命令行
//! 这一层使用 `AppError`，并通过 `From` 直接吸收流水线错误与 I/O 错误。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `PipelineError` 与 `std::io::Error` 提供 `From` 转换，无需手动 map。

use crate::pipeline::PipelineError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 生成流水线错误
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件无效
    #[error("配置错误: {0}")]
    Config(String),

    /// 凭据存储读写失败
    #[error("凭据存储错误: {0}")]
    Storage(String),

    /// 日志初始化失败
    #[error("日志初始化失败: {0}")]
    Logging(String),
}
