//! # 日志初始化
//!
//! 默认输出到 stderr，过滤级别取 `RUST_LOG`，未设置时为 `info`。
//! 配置了日志文件时以追加模式写入该文件，每行带本地时间戳，便于宿主环境下事后排查。

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use env_logger::Env;

use crate::error::AppError;

/// 初始化全局日志。只能调用一次，重复调用返回 `AppError::Logging`。
pub fn init(log_file: Option<&Path>) -> Result<(), AppError> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::Logging(format!("无法打开日志文件 '{}': {}", path.display(), e)))?;

        builder.target(env_logger::Target::Pipe(Box::new(file)));
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{}",
                format_line(record.level(), record.target(), record.args())
            )
        });
    }

    builder
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}

fn format_line(level: log::Level, target: &str, args: &fmt::Arguments<'_>) -> String {
    format!(
        "[{}] [{:<5}] {}: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        level,
        target,
        args
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_line_carries_timestamp_level_and_target() {
        let line = format_line(log::Level::Warn, "gimini::pipeline", &format_args!("hello {}", 42));

        assert!(line.starts_with('['));
        assert!(line.contains("] [WARN ] gimini::pipeline: hello 42"));
    }
}
