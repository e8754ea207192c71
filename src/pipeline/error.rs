//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载生成链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让编排器可按分支归类为 `ErrorKind`。
//!
//! ## 实现思路
//!
//! - 每个组件（像素缓冲 / 编解码 / 宿主桥 / 生成客户端）直接返回 `PipelineError`。
//! - `kind()` 给出终态分类，`code()` 给出稳定的机器可读编码。
//! - `scrub_secret()` 在错误向上传播前抹掉凭据字面量。

/// 错误消息中替换凭据时使用的占位符。
pub(crate) const REDACTED: &str = "***";

/// 生成流水线统一错误类型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("输入校验失败：{0}")]
    Validation(String),

    #[error("读取图层失败：{0}")]
    HostRead(String),

    #[error("写入图层失败：{0}")]
    HostWrite(String),

    #[error("图片编码失败：{0}")]
    Encode(String),

    #[error("图片解码失败：{0}")]
    Decode(String),

    #[error("网络错误：{0}")]
    Transport(String),

    #[error("生成服务返回错误（{code}）：{message}")]
    Service { code: String, message: String },

    #[error("生成服务未返回图片：{0}")]
    EmptyResult(String),

    #[error("不支持的像素格式：{0}")]
    UnsupportedFormat(String),

    #[error("像素缓冲无效：{0}")]
    MalformedBuffer(String),
}

/// 失败终态的分类标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    HostRead,
    HostWrite,
    Encode,
    Decode,
    Transport,
    Service,
    EmptyResult,
    UnsupportedFormat,
    MalformedBuffer,
}

impl ErrorKind {
    /// 稳定的机器可读编码。
    pub fn code(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::HostRead => "host_read",
            Self::HostWrite => "host_write",
            Self::Encode => "encode",
            Self::Decode => "decode",
            Self::Transport => "transport",
            Self::Service => "service",
            Self::EmptyResult => "empty_result",
            Self::UnsupportedFormat => "unsupported_format",
            Self::MalformedBuffer => "malformed_buffer",
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::HostRead(_) => ErrorKind::HostRead,
            Self::HostWrite(_) => ErrorKind::HostWrite,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Service { .. } => ErrorKind::Service,
            Self::EmptyResult(_) => ErrorKind::EmptyResult,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::MalformedBuffer(_) => ErrorKind::MalformedBuffer,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// 将消息中出现的凭据字面量替换为占位符。
    ///
    /// 空字符串不做替换，否则 `str::replace` 会在每个字符之间插入占位符。
    pub fn scrub_secret(self, secret: &str) -> Self {
        if secret.is_empty() {
            return self;
        }

        let scrub = |message: String| message.replace(secret, REDACTED);
        match self {
            Self::Validation(m) => Self::Validation(scrub(m)),
            Self::HostRead(m) => Self::HostRead(scrub(m)),
            Self::HostWrite(m) => Self::HostWrite(scrub(m)),
            Self::Encode(m) => Self::Encode(scrub(m)),
            Self::Decode(m) => Self::Decode(scrub(m)),
            Self::Transport(m) => Self::Transport(scrub(m)),
            Self::Service { code, message } => Self::Service {
                code: scrub(code),
                message: scrub(message),
            },
            Self::EmptyResult(m) => Self::EmptyResult(scrub(m)),
            Self::UnsupportedFormat(m) => Self::UnsupportedFormat(scrub(m)),
            Self::MalformedBuffer(m) => Self::MalformedBuffer(scrub(m)),
        }
    }
}
