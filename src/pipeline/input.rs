//! 对话框产出的用户输入。
//!
//! `UserInput` 构造后不可变，以值的形式移交给编排器，不存在跨调用共享的可变状态。

use std::fmt;
use std::str::FromStr;

use super::PipelineError;
use crate::generation::ApiKey;

/// 生成模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GenerationMode {
    /// 仅凭提示词生成。
    #[default]
    TextToImage,
    /// 以当前图层为参考图进行编辑。
    ImageToImage,
}

impl GenerationMode {
    pub const ALL: [GenerationMode; 2] = [Self::TextToImage, Self::ImageToImage];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextToImage => "text",
            Self::ImageToImage => "image",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationMode {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "text" | "text-to-image" => Ok(Self::TextToImage),
            "image" | "image-to-image" => Ok(Self::ImageToImage),
            other => Err(PipelineError::Validation(format!(
                "未知生成模式：{}（可选：text / image）",
                other
            ))),
        }
    }
}

/// 一次调用的用户输入。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    prompt: String,
    api_key: ApiKey,
    mode: GenerationMode,
}

impl UserInput {
    pub fn new(prompt: impl Into<String>, api_key: ApiKey, mode: GenerationMode) -> Self {
        Self {
            prompt: prompt.into(),
            api_key,
            mode,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// 提示词与 API Key 都必须非空（仅含空白视为空）。
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.prompt.trim().is_empty() {
            return Err(PipelineError::Validation("提示词不能为空".to_string()));
        }
        if self.api_key.is_blank() {
            return Err(PipelineError::Validation("API Key 不能为空".to_string()));
        }
        Ok(())
    }
}

/// 对话框结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    Submitted(UserInput),
    Cancelled,
}
