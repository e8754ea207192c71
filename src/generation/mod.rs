//! # 生成客户端模块（generation）
//!
//! ## 设计思路
//!
//! 编排器只依赖 `ImageGenerator` trait：给定提示词与可选参考图，返回编码后的图片字节，
//! 或结构化的失败。具体服务（`GeminiClient`）与测试桩都实现该 trait。
//!
//! ## 实现思路
//!
//! - 单次调用，不做内部重试。
//! - 凭据以 `ApiKey` 新类型传递：`Debug` 输出已脱敏，且不实现 `Display`，
//!   只能通过 `expose()` 显式取值。

use std::fmt;
use std::future::Future;

mod config;
mod gemini;
mod wire;

pub use config::{AuthScheme, GeneratorConfig};
pub use gemini::GeminiClient;

use crate::pipeline::{GenerationMode, PipelineError};
use crate::pixel::EncodedImage;

/// 生成服务凭据。
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// 取出明文。调用方负责不把返回值写入日志或错误消息。
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// 空串或仅含空白。
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// 一次生成请求。模式由是否携带参考图决定，构造后不可变。
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    prompt: String,
    reference: Option<EncodedImage>,
    api_key: ApiKey,
}

impl GenerationRequest {
    pub fn text_to_image(prompt: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            prompt: prompt.into(),
            reference: None,
            api_key,
        }
    }

    pub fn image_to_image(
        prompt: impl Into<String>,
        reference: EncodedImage,
        api_key: ApiKey,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            reference: Some(reference),
            api_key,
        }
    }

    pub fn mode(&self) -> GenerationMode {
        match self.reference {
            Some(_) => GenerationMode::ImageToImage,
            None => GenerationMode::TextToImage,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn reference(&self) -> Option<&EncodedImage> {
        self.reference.as_ref()
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }
}

/// 图片生成服务。
pub trait ImageGenerator: Send + Sync {
    /// 发送请求并返回生成的图片字节。
    ///
    /// 失败分类：传输失败为 `Transport`，非 2xx 为 `Service`，
    /// 2xx 但无图片为 `EmptyResult`。返回的错误消息不含凭据。
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<EncodedImage, PipelineError>> + Send;
}
