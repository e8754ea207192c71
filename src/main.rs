//! # gimini 命令行入口
//!
//! 无编辑器环境下扮演宿主：把输入图片载入内存文档，以命令行参数充当对话框输入，
//! 执行一次流水线，并把生成的新图层导出为 PNG。
//!
//! 退出码：0 成功或取消，1 流水线失败，2 启动失败（配置、文件读写等）。

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use gimini::config::{self, AppConfig};
use gimini::error::AppError;
use gimini::generation::GeminiClient;
use gimini::host::{HostBridge, HostContext, HostDocument, MemoryDocument};
use gimini::logging;
use gimini::pipeline::{
    DialogOutcome, ERROR_MESSAGE_PREFIX, GenerationMode, HostStatus, PipelineError,
    PipelineOrchestrator, UserInput,
};
use gimini::pixel::{self, EncodedFormat, EncodedImage, PixelLayout};
use gimini::secret::{API_KEY_ENV, FileSecretStore, SecretStore, prefill_api_key};

/// Generate a new layer with Gemini from a text prompt.
#[derive(Parser, Debug)]
#[command(
    name = "gimini",
    about = "Generate or edit an image layer with the Gemini API",
    long_about = "Loads an image (or a blank canvas) as a one-layer document, sends the\n\
                  prompt to Gemini and writes the generated layer to a PNG file.\n\n\
                  Example:\n  \
                  gimini --prompt \"a red fox in the snow\" --output fox.png\n  \
                  gimini -i photo.png --mode image --prompt \"make it night\" -o night.png"
)]
struct CliArgs {
    /// Prompt text. When omitted the run behaves like a dismissed dialog.
    #[arg(short, long)]
    prompt: Option<String>,

    /// Generation mode: text (prompt only) or image (edit the input layer).
    #[arg(short, long, value_enum, default_value_t = ModeArg::Text)]
    mode: ModeArg,

    /// API key. Falls back to $GEMINI_API_KEY, then to the saved key.
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Input image used as the document's only layer.
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Where to write the generated layer.
    #[arg(short, long, value_name = "FILE", default_value = "gimini-output.png")]
    output: PathBuf,

    /// Configuration file (JSON). Defaults to the platform config directory.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Append log lines to this file instead of stderr.
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Canvas width when no input image is given.
    #[arg(long, default_value_t = 512)]
    width: u32,

    /// Canvas height when no input image is given.
    #[arg(long, default_value_t = 512)]
    height: u32,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Text,
    Image,
}

impl From<ModeArg> for GenerationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Text => GenerationMode::TextToImage,
            ModeArg::Image => GenerationMode::ImageToImage,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let app_config = config::load_from_path(&config_path);

    let log_file = args.log_file.clone().or_else(|| app_config.log_file.clone());
    if let Err(err) = logging::init(log_file.as_deref()) {
        eprintln!("{}", err);
    }
    log::info!("⚙️ 配置文件: {}", config_path.display());

    match run(args, app_config).await {
        Ok(HostStatus::Success) => ExitCode::SUCCESS,
        Ok(HostStatus::Cancelled) => {
            log::info!("🚫 未提供提示词，已取消");
            ExitCode::SUCCESS
        }
        Ok(HostStatus::ExecutionError(message)) => {
            eprintln!("{}{}", ERROR_MESSAGE_PREFIX, message);
            ExitCode::from(1)
        }
        Err(err) => {
            log::error!("❌ 启动失败: {}", err);
            eprintln!("{}{}", ERROR_MESSAGE_PREFIX, err);
            ExitCode::from(2)
        }
    }
}

async fn run(args: CliArgs, app_config: AppConfig) -> Result<HostStatus, AppError> {
    let document = match &args.input {
        Some(path) => load_document(path)?,
        None => blank_document(args.width, args.height)?,
    };
    let context = HostContext::spawn(document)?;

    let secrets: Arc<dyn SecretStore> =
        Arc::new(FileSecretStore::new(app_config.resolved_secret_path()));
    let env_key = std::env::var(API_KEY_ENV).ok();
    let api_key = prefill_api_key(args.api_key.as_deref(), env_key.as_deref(), secrets.as_ref());

    let outcome = match args.prompt {
        Some(prompt) => DialogOutcome::Submitted(UserInput::new(prompt, api_key, args.mode.into())),
        None => DialogOutcome::Cancelled,
    };

    let client = GeminiClient::new(app_config.generator.clone())?;
    let status = PipelineOrchestrator::new(HostBridge::new(context.clone()), client)
        .with_secret_store(secrets)
        .with_options(app_config.orchestrator_options())
        .execute(outcome)
        .await;

    if status == HostStatus::Success {
        export_active_layer(&context, &args.output).await?;
    }
    Ok(status)
}

fn load_document(path: &Path) -> Result<MemoryDocument, AppError> {
    let bytes = fs::read(path)?;
    let format = EncodedFormat::sniff(&bytes).ok_or_else(|| {
        PipelineError::Decode(format!("无法识别输入图片格式: {}", path.display()))
    })?;
    let buffer = pixel::decode(&EncodedImage::new(bytes, format))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "Background".to_string());

    let document = MemoryDocument::from_buffer(&name, &buffer)
        .map_err(|e| AppError::Pipeline(PipelineError::HostWrite(e.to_string())))?;
    log::info!("📂 载入输入图片 {}: {}x{}", name, document.width(), document.height());
    Ok(document)
}

/// 白色不透明背景层，对应编辑器新建画布的默认状态。
fn blank_document(width: u32, height: u32) -> Result<MemoryDocument, AppError> {
    let background = pixel::PixelBuffer::filled(width, height, PixelLayout::Rgb, &[255, 255, 255])?;
    let document = MemoryDocument::from_buffer("Background", &background)
        .map_err(|e| AppError::Pipeline(PipelineError::HostWrite(e.to_string())))?;
    log::info!("📄 新建空白画布: {}x{}", document.width(), document.height());
    Ok(document)
}

/// 新图层创建后即为活动图层，导出它。
async fn export_active_layer(
    context: &HostContext<MemoryDocument>,
    output: &Path,
) -> Result<(), AppError> {
    let buffer = context
        .run(|doc| match doc.active_layer() {
            Some(layer) => doc.export_layer(layer),
            None => Err(PipelineError::HostRead("文档没有活动图层".to_string())),
        })
        .await
        .map_err(|e| AppError::Pipeline(PipelineError::HostRead(e.to_string())))??;

    let encoded = pixel::encode(&buffer)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, encoded.bytes())?;

    log::info!(
        "💾 已导出新图层: {} ({}x{}, {} bytes)",
        output.display(),
        buffer.width(),
        buffer.height(),
        encoded.len()
    );
    Ok(())
}
