//! # Gemini 生成客户端
//!
//! ## 设计思路
//!
//! 对接 `models/{model}:generateContent` REST 接口。请求体为提示词与可选参考图，
//! 响应中第一个图片类型的内联数据即生成结果；模型附带的文本只记录日志。
//!
//! ## 实现思路
//!
//! 1. 按模式选择模型，拼接请求 URL
//! 2. 凭据放在请求头（Bearer 或 `x-goog-api-key`），URL 中不含凭据
//! 3. 按块读取响应体并累计字节数，超过 `max_response_bytes` 立即中止
//! 4. 非 2xx 解析服务错误信封，2xx 解析候选结果
//! 5. 所有错误在返回前抹掉凭据字面量，URL 只保留 scheme/host/path

use std::time::Instant;

use base64::{Engine as _, engine::general_purpose};

use super::wire::{ErrorEnvelope, GenerateContentRequest, GenerateContentResponse};
use super::{AuthScheme, GenerationRequest, GeneratorConfig, ImageGenerator};
use crate::pipeline::PipelineError;
use crate::pixel::{EncodedFormat, EncodedImage};

const API_KEY_HEADER: &str = "x-goog-api-key";
const BODY_INITIAL_CAPACITY: usize = 256 * 1024;
const ERROR_SNIPPET_CHARS: usize = 200;

/// Gemini REST 客户端。内部 `reqwest::Client` 复用连接池，可跨请求共享。
pub struct GeminiClient {
    config: GeneratorConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeneratorConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| PipelineError::Transport(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self { config, http })
    }

    async fn send(&self, request: &GenerationRequest) -> Result<EncodedImage, PipelineError> {
        let start = Instant::now();
        let mode = request.mode();
        let url = self.config.generate_url(mode);
        let body = GenerateContentRequest::new(request.prompt(), request.reference());

        log::info!(
            "🌐 请求生成服务：{} mode={} reference={}",
            redact_url_for_log(&url),
            mode.as_str(),
            request.reference().map(EncodedImage::len).unwrap_or(0)
        );

        let builder = self.http.post(&url).json(&body);
        let builder = match self.config.auth_scheme {
            AuthScheme::Bearer => builder.bearer_auth(request.api_key().expose()),
            AuthScheme::ApiKeyHeader => builder.header(API_KEY_HEADER, request.api_key().expose()),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, &url))?;
        let status = response.status();
        let bytes = self.read_body_limited(response, &url).await?;
        let request_ms = start.elapsed().as_millis();

        if !status.is_success() {
            let error = service_error(status, &bytes);
            log::warn!(
                "⚠️ 生成服务返回 HTTP {}：{} request={}ms",
                status.as_u16(),
                error,
                request_ms
            );
            return Err(error);
        }

        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::Service {
                code: "MALFORMED_RESPONSE".to_string(),
                message: format!("响应不是合法的 JSON：{}", e),
            }
        })?;

        for text in parsed.text_parts() {
            log::debug!("💬 模型文本回复：{}", text);
        }

        let Some(blob) = parsed.first_image() else {
            return Err(PipelineError::EmptyResult(parsed.missing_image_reason()));
        };

        let format = EncodedFormat::from_mime_type(&blob.mime_type).ok_or_else(|| {
            PipelineError::Decode(format!("不支持的图片类型：{}", blob.mime_type))
        })?;
        let image_bytes = general_purpose::STANDARD
            .decode(blob.data.trim())
            .map_err(|e| PipelineError::Decode(format!("Base64 解码失败：{}", e)))?;

        log::info!(
            "✅ 生成服务返回图片：{} {} bytes request={}ms",
            format.mime_type(),
            image_bytes.len(),
            request_ms
        );

        Ok(EncodedImage::new(image_bytes, format))
    }

    async fn read_body_limited(
        &self,
        response: reqwest::Response,
        url: &str,
    ) -> Result<Vec<u8>, PipelineError> {
        let limit = self.config.max_response_bytes;
        if let Some(len) = response.content_length() {
            if len > limit {
                return Err(too_large(len, limit));
            }
        }

        let initial_capacity = response
            .content_length()
            .map(|len| len.min(limit) as usize)
            .filter(|len| *len > 0)
            .unwrap_or(BODY_INITIAL_CAPACITY);
        let mut buffer = Vec::with_capacity(initial_capacity);
        let mut total: u64 = 0;
        let mut response = response;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_reqwest_error(e, url))?
        {
            total = total.saturating_add(chunk.len() as u64);
            if total > limit {
                return Err(too_large(total, limit));
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer)
    }

    /// 统一映射 reqwest 错误为传输错误。
    fn map_reqwest_error(&self, e: reqwest::Error, url: &str) -> PipelineError {
        let err_msg = sanitize_error_message_with_redacted_url(&e.to_string(), url);

        if e.is_timeout() {
            PipelineError::Transport(format!(
                "请求超时（{}秒）：{}",
                self.config.request_timeout, err_msg
            ))
        } else if e.is_connect() {
            PipelineError::Transport(format!("无法连接：{}", err_msg))
        } else {
            PipelineError::Transport(format!("请求失败：{}", err_msg))
        }
    }
}

impl ImageGenerator for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<EncodedImage, PipelineError> {
        self.send(&request)
            .await
            .map_err(|e| e.scrub_secret(request.api_key().expose()))
    }
}

fn too_large(size: u64, limit: u64) -> PipelineError {
    PipelineError::Transport(format!(
        "响应体超过大小限制：{:.2} MB（限制：{:.2} MB）",
        size as f64 / 1024.0 / 1024.0,
        limit as f64 / 1024.0 / 1024.0
    ))
}

/// 非 2xx 响应归类为 `Service`。`code` 优先取服务端状态名，其次 HTTP 状态码。
fn service_error(status: reqwest::StatusCode, body: &[u8]) -> PipelineError {
    let http_code = status.as_u16().to_string();

    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let error = envelope.error;
            let code = error
                .status
                .filter(|s| !s.trim().is_empty())
                .or_else(|| error.code.map(|c| c.to_string()))
                .unwrap_or(http_code);
            let message = if error.message.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                error.message
            };
            PipelineError::Service { code, message }
        }
        Err(_) => {
            let snippet: String = String::from_utf8_lossy(body)
                .chars()
                .take(ERROR_SNIPPET_CHARS)
                .collect();
            let message = if snippet.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                snippet.trim().to_string()
            };
            PipelineError::Service {
                code: http_code,
                message,
            }
        }
    }
}

fn redact_url_for_log(url: &str) -> String {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return "<invalid-url>".to_string();
    };

    let host = parsed.host_str().unwrap_or("<unknown-host>");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
    let path = parsed.path();

    format!("{}://{}{}{}", parsed.scheme(), host, port, path)
}

fn sanitize_error_message_with_redacted_url(error_msg: &str, url: &str) -> String {
    let redacted = redact_url_for_log(url);
    error_msg.replace(url, &redacted)
}
