//! # 凭据存储模块
//!
//! ## 设计思路
//!
//! API Key 在两次调用之间持久化，下次打开时预填。凭据存储不属于核心链路：
//! 读取失败一律降级为“无预填”，绝不中断流程。
//!
//! ## 实现思路
//!
//! - `SecretStore` trait：`load_secret` 返回 `Option`，`save_secret` 返回 `Result`。
//! - `FileSecretStore`：JSON 文件 `{"api_key": "..."}`，Unix 下权限收紧为 0600。
//! - `MemorySecretStore`：进程内实现，供测试与一次性运行使用。
//! - 预填优先级：命令行参数 → 环境变量 `GEMINI_API_KEY` → 凭据存储。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::generation::ApiKey;

/// 预填 API Key 时读取的环境变量。
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// API Key 持久化接口。
pub trait SecretStore: Send + Sync {
    /// 读取已保存的凭据。不存在或读取失败都返回 `None`。
    fn load_secret(&self) -> Option<String>;

    fn save_secret(&self, secret: &str) -> Result<(), AppError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretFile {
    #[serde(default)]
    api_key: Option<String>,
}

/// 基于 JSON 文件的凭据存储。
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretStore for FileSecretStore {
    fn load_secret(&self) -> Option<String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                log::debug!("🔑 未读取到已保存的 API Key（{}）: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<SecretFile>(&content) {
            Ok(file) => file.api_key.filter(|key| !key.trim().is_empty()),
            Err(e) => {
                log::warn!("⚠️ 凭据文件格式无效，忽略: {}", e);
                None
            }
        }
    }

    fn save_secret(&self, secret: &str) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("创建凭据目录 '{}' 失败: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(&SecretFile {
            api_key: Some(secret.to_string()),
        })
        .map_err(|e| AppError::Storage(format!("序列化凭据失败: {}", e)))?;

        fs::write(&self.path, content).map_err(|e| {
            AppError::Storage(format!("写入凭据文件 '{}' 失败: {}", self.path.display(), e))
        })?;
        restrict_permissions(&self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), AppError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| AppError::Storage(format!("设置凭据文件权限失败: {}", e)))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), AppError> {
    Ok(())
}

/// 进程内凭据存储。
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secret: Mutex<Option<String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Mutex::new(Some(secret.into())),
        }
    }
}

impl SecretStore for MemorySecretStore {
    fn load_secret(&self) -> Option<String> {
        self.secret.lock().ok().and_then(|guard| guard.clone())
    }

    fn save_secret(&self, secret: &str) -> Result<(), AppError> {
        let mut guard = self
            .secret
            .lock()
            .map_err(|_| AppError::Storage("凭据存储锁已中毒".to_string()))?;
        *guard = Some(secret.to_string());
        Ok(())
    }
}

/// 计算对话框预填的 API Key。
///
/// 依次尝试显式传入值、环境变量值与凭据存储，第一个非空者胜出；都没有时返回空 Key。
pub fn prefill_api_key(
    explicit: Option<&str>,
    env_value: Option<&str>,
    store: &dyn SecretStore,
) -> ApiKey {
    explicit
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            env_value
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        })
        .or_else(|| store.load_secret())
        .map(ApiKey::new)
        .unwrap_or_default()
}
