//! `generateContent` 请求与响应的线上结构。
//!
//! 服务端输出 camelCase；解析时同时接受 snake_case 别名。

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

use crate::pixel::EncodedImage;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// 参考图在前、提示词在后。
    pub fn new(prompt: &str, reference: Option<&EncodedImage>) -> Self {
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = reference {
            parts.push(Part {
                text: None,
                inline_data: Some(Blob {
                    mime_type: image.format().mime_type().to_string(),
                    data: general_purpose::STANDARD.encode(image.bytes()),
                }),
            });
        }
        parts.push(Part {
            text: Some(prompt.to_string()),
            inline_data: None,
        });

        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            },
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, alias = "inline_data", skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Blob {
    #[serde(alias = "mime_type")]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, alias = "prompt_feedback")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default, alias = "finish_reason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default, alias = "block_reason")]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
    }

    /// 所有候选中第一个图片类型的内联数据。
    pub fn first_image(&self) -> Option<&Blob> {
        self.parts()
            .filter_map(|part| part.inline_data.as_ref())
            .find(|blob| blob.mime_type.trim().to_ascii_lowercase().starts_with("image/"))
    }

    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.parts().filter_map(|part| part.text.as_deref())
    }

    /// 没有图片时的原因：提示词被拦截，或候选的非正常结束原因。
    pub fn missing_image_reason(&self) -> String {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return format!("提示词被拦截（{}）", reason);
        }

        if let Some(reason) = self
            .candidates
            .iter()
            .filter_map(|c| c.finish_reason.as_deref())
            .find(|r| *r != "STOP")
        {
            return format!("生成提前结束（{}）", reason);
        }

        if self.candidates.is_empty() {
            "响应中没有候选结果".to_string()
        } else {
            "响应中没有图片数据".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ServiceErrorBody,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServiceErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}
