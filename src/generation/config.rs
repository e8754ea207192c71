//! # 生成服务配置
//!
//! ## 设计思路
//!
//! 把端点、模型与传输限制集中到 `GeneratorConfig`，`Default` 即生产可用配置。
//! 字段可从应用配置文件反序列化，缺失字段回落到默认值。
//!
//! ## 实现思路
//!
//! - `validate()` 对超时与体积上限做区间校验，越界直接拒绝，不做静默钳制。
//! - 模型按生成模式区分：文生图用 `text_model`，图生图用 `edit_model`。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{GenerationMode, PipelineError};

/// 凭据携带方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    #[default]
    Bearer,
    /// `x-goog-api-key: <key>`
    ApiKeyHeader,
}

/// 生成服务客户端配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// 服务根地址，不含版本路径。
    pub endpoint: String,
    pub api_version: String,
    /// 文生图使用的模型。
    pub text_model: String,
    /// 图生图使用的模型。
    pub edit_model: String,
    pub auth_scheme: AuthScheme,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 单次请求总超时时间（秒），图片生成耗时较长。
    pub request_timeout: u64,
    /// 响应体上限（字节），Base64 图片会膨胀约 1/3。
    pub max_response_bytes: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            api_version: "v1beta".to_string(),
            text_model: "gemini-2.5-flash-image".to_string(),
            edit_model: "gemini-2.5-flash-image".to_string(),
            auth_scheme: AuthScheme::Bearer,
            connect_timeout: 8,
            request_timeout: 120,
            max_response_bytes: 32 * 1024 * 1024,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let endpoint = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| PipelineError::Validation(format!("endpoint 不是合法 URL：{}", e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(PipelineError::Validation(
                "endpoint 仅支持 http / https".to_string(),
            ));
        }
        if self.api_version.trim().is_empty() {
            return Err(PipelineError::Validation("api_version 不能为空".to_string()));
        }
        if self.text_model.trim().is_empty() || self.edit_model.trim().is_empty() {
            return Err(PipelineError::Validation("模型名称不能为空".to_string()));
        }
        if !(1..=120).contains(&self.connect_timeout) {
            return Err(PipelineError::Validation(
                "connect_timeout 必须在 1~120 秒之间".to_string(),
            ));
        }
        if !(5..=600).contains(&self.request_timeout) {
            return Err(PipelineError::Validation(
                "request_timeout 必须在 5~600 秒之间".to_string(),
            ));
        }
        if self.max_response_bytes < 1024 * 1024 {
            return Err(PipelineError::Validation(
                "max_response_bytes 不能小于 1MB".to_string(),
            ));
        }
        Ok(())
    }

    pub fn model_for(&self, mode: GenerationMode) -> &str {
        match mode {
            GenerationMode::TextToImage => &self.text_model,
            GenerationMode::ImageToImage => &self.edit_model,
        }
    }

    /// `{endpoint}/{api_version}/models/{model}:generateContent`
    pub fn generate_url(&self, mode: GenerationMode) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.api_version.trim_matches('/'),
            self.model_for(mode)
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}
