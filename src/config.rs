//! # 应用配置模块
//!
//! ## 设计思路
//!
//! 一个 JSON 文件承载所有可调项：生成服务参数、参考图上限、解码上限、日志文件与凭据文件位置。
//! 文件缺失或内容无效时回退默认配置，不阻断运行。
//!
//! ## 实现思路
//!
//! - 默认目录按平台环境变量推导：Windows 用 `%APPDATA%`，macOS 用
//!   `~/Library/Application Support`，其余用 `$XDG_CONFIG_HOME` 或 `~/.config`。
//! - 加载后调用 `validate()`，越界值同样回退默认配置并记录警告。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::generation::GeneratorConfig;
use crate::pipeline::OrchestratorOptions;
use crate::pixel::DecodeLimits;

const APP_DIR_NAME: &str = "gimini";
const CONFIG_FILE_NAME: &str = "config.json";
const SECRET_FILE_NAME: &str = "secret.json";

/// 应用配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub generator: GeneratorConfig,
    /// 图生图参考图的单边上限（像素），`None` 表示原尺寸上传。
    pub reference_max_dimension: Option<u32>,
    /// 解码结果的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 追加写入的日志文件，`None` 表示只输出到 stderr。
    pub log_file: Option<PathBuf>,
    /// 凭据文件位置，`None` 表示使用默认目录。
    pub secret_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            reference_max_dimension: Some(2048),
            max_decoded_pixels: DecodeLimits::default().max_decoded_pixels,
            log_file: None,
            secret_path: None,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        self.generator
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if let Some(max) = self.reference_max_dimension {
            if !(64..=8192).contains(&max) {
                return Err(AppError::Config(
                    "reference_max_dimension 必须在 64~8192 之间".to_string(),
                ));
            }
        }
        if self.max_decoded_pixels < 1_000_000 {
            return Err(AppError::Config(
                "max_decoded_pixels 不能小于 1000000".to_string(),
            ));
        }
        Ok(())
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            reference_max_dimension: self.reference_max_dimension,
            decode_limits: DecodeLimits {
                max_decoded_pixels: self.max_decoded_pixels,
            },
        }
    }

    /// 配置的凭据文件，未配置时取默认目录下的 `secret.json`。
    pub fn resolved_secret_path(&self) -> PathBuf {
        self.secret_path
            .clone()
            .unwrap_or_else(|| config_dir().join(SECRET_FILE_NAME))
    }
}

/// 默认配置文件路径。
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// 加载配置。文件缺失、无法解析或校验失败时返回默认配置。
pub fn load_from_path(config_path: &Path) -> AppConfig {
    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(_) => {
            log::debug!("⚙️ 未找到配置文件 {}，使用默认配置", config_path.display());
            return AppConfig::default();
        }
    };

    let config = match serde_json::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("⚠️ 配置文件解析失败，使用默认配置: {}", e);
            return AppConfig::default();
        }
    };

    if let Err(e) = config.validate() {
        log::warn!("⚠️ 配置校验失败，使用默认配置: {}", e);
        return AppConfig::default();
    }
    config
}

pub fn save_to_path(config_path: &Path, config: &AppConfig) -> Result<(), AppError> {
    config.validate()?;

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Config(format!("序列化配置失败: {}", e)))?;
    fs::write(config_path, content)?;
    Ok(())
}

/// 平台配置目录（含应用子目录）。
fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR_NAME);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR_NAME);
        }
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join(APP_DIR_NAME);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config").join(APP_DIR_NAME);
    }
    PathBuf::from(".").join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock error")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("gimini-config-test-{nanos}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let dir = unique_temp_dir();
        let config_path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.reference_max_dimension = Some(1024);
        config.log_file = Some(dir.join("gimini-debug.log"));
        save_to_path(&config_path, &config).expect("save config");

        assert_eq!(load_from_path(&config_path), config);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_bad_config_falls_back_to_default() {
        let dir = unique_temp_dir();
        let config_path = dir.join("config.json");

        fs::write(&config_path, "not-json").expect("write invalid config");
        assert_eq!(load_from_path(&config_path), AppConfig::default());

        fs::write(&config_path, r#"{"reference_max_dimension": 1}"#).expect("write out-of-range config");
        assert_eq!(load_from_path(&config_path), AppConfig::default());

        assert_eq!(load_from_path(&dir.join("missing.json")), AppConfig::default());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let dir = unique_temp_dir();
        let config_path = dir.join("config.json");
        fs::write(&config_path, r#"{"generator":{"text_model":"custom-model"}}"#)
            .expect("write partial config");

        let config = load_from_path(&config_path);
        assert_eq!(config.generator.text_model, "custom-model");
        assert_eq!(config.generator.api_version, "v1beta");
        assert_eq!(config.reference_max_dimension, Some(2048));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn save_rejects_invalid_config() {
        let dir = unique_temp_dir();
        let mut config = AppConfig::default();
        config.max_decoded_pixels = 10;

        assert!(matches!(
            save_to_path(&dir.join("config.json"), &config),
            Err(AppError::Config(_))
        ));
        let _ = fs::remove_dir_all(dir);
    }
}
