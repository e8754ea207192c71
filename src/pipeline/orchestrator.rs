//! # 流水线编排器
//!
//! ## 设计思路
//!
//! 每次调用创建一个编排器，跑完即丢弃。编排器只负责推进状态与归类错误，
//! 不做本地恢复，也不重试。
//!
//! ## 实现思路
//!
//! 1. 显示联系服务的进度文本，校验输入（任何网络请求与图层读写之前）
//! 2. 图生图：读取活动图层 → 可选降采样 → PNG 编码
//! 3. 请求生成服务（唯一的长耗时挂起点，运行在异步运行时上，不占宿主线程）
//! 4. 解码返回图片
//! 5. 写入新图层（唯一修改宿主文档的步骤，本身原子）
//!
//! 第 5 步之前的任何失败都不会改动文档。错误消息在离开编排器前抹掉凭据。

use std::sync::Arc;
use std::time::Instant;

use super::naming::layer_name;
use super::{
    DialogOutcome, GenerationMode, HostStatus, PipelineError, PipelineResult, PipelineState,
    Terminal, UserInput,
};
use crate::generation::{ApiKey, GenerationRequest, ImageGenerator};
use crate::host::{HostBridge, HostDocument, LayerId};
use crate::pixel::{self, DecodeLimits, EncodedImage};
use crate::secret::SecretStore;

pub const PROGRESS_CONTACTING: &str = "Contacting Gemini API...";
pub const PROGRESS_READING: &str = "Reading layer data...";
pub const PROGRESS_SENDING: &str = "Sending data to Gemini API...";
pub const PROGRESS_DECODING: &str = "Decoding generated image...";
pub const PROGRESS_CREATING: &str = "Creating layer...";

/// 宿主错误提示的前缀。
pub const ERROR_MESSAGE_PREFIX: &str = "GIMini Error: ";

/// 编排器可调参数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// 图生图参考图的单边上限，`None` 表示原尺寸上传。
    pub reference_max_dimension: Option<u32>,
    pub decode_limits: DecodeLimits,
}

/// 单次调用的状态机。
pub struct PipelineOrchestrator<D, G> {
    bridge: HostBridge<D>,
    generator: G,
    secrets: Option<Arc<dyn SecretStore>>,
    options: OrchestratorOptions,
    state: PipelineState,
    trace: Vec<PipelineState>,
}

impl<D: HostDocument, G: ImageGenerator> PipelineOrchestrator<D, G> {
    pub fn new(bridge: HostBridge<D>, generator: G) -> Self {
        Self {
            bridge,
            generator,
            secrets: None,
            options: OrchestratorOptions::default(),
            state: PipelineState::Idle,
            trace: vec![PipelineState::Idle],
        }
    }

    /// 校验通过后把 API Key 写入该存储，写入失败只记日志。
    pub fn with_secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(store);
        self
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn run(self, outcome: DialogOutcome) -> PipelineResult {
        self.run_traced(outcome).await.0
    }

    /// 同 `run`，额外返回途经的状态序列（含初始 `Idle` 与终态）。
    pub async fn run_traced(
        mut self,
        outcome: DialogOutcome,
    ) -> (PipelineResult, Vec<PipelineState>) {
        let result = match outcome {
            DialogOutcome::Cancelled => {
                log::info!("🚫 用户取消，流水线未启动");
                self.advance(PipelineState::Done(Terminal::Cancelled));
                PipelineResult::Cancelled
            }
            DialogOutcome::Submitted(input) => match self.drive(&input).await {
                Ok(layer) => {
                    self.advance(PipelineState::Done(Terminal::Success));
                    PipelineResult::Success(layer)
                }
                Err(error) => {
                    let error = error.scrub_secret(input.api_key().expose());
                    log::error!(
                        "❌ 流水线失败：stage={} code={} {}",
                        self.state.name(),
                        error.code(),
                        error
                    );
                    self.advance(PipelineState::Done(Terminal::Failed));
                    PipelineResult::failed(&error)
                }
            },
        };

        (result, self.trace)
    }

    /// 执行并把结果报告给宿主：失败时弹出错误提示，启动过的流水线结束进度显示。
    pub async fn execute(self, outcome: DialogOutcome) -> HostStatus {
        let bridge = self.bridge.clone();
        let result = self.run(outcome).await;

        match &result {
            PipelineResult::Cancelled => {}
            PipelineResult::Success(_) => bridge.end_progress(),
            PipelineResult::Failed(_, message) => {
                bridge.show_message(&format!("{}{}", ERROR_MESSAGE_PREFIX, message));
                bridge.end_progress();
            }
        }

        HostStatus::from(result)
    }

    async fn drive(&mut self, input: &UserInput) -> Result<LayerId, PipelineError> {
        let total_start = Instant::now();

        self.advance(PipelineState::Validating);
        self.bridge.set_progress(PROGRESS_CONTACTING);
        input.validate()?;
        self.persist_api_key(input.api_key()).await;
        log::info!("🎨 开始生成：mode={} prompt={:?}", input.mode(), input.prompt());

        let capture_start = Instant::now();
        let request = match input.mode() {
            GenerationMode::TextToImage => {
                self.advance(PipelineState::Requesting);
                GenerationRequest::text_to_image(input.prompt(), input.api_key().clone())
            }
            GenerationMode::ImageToImage => {
                self.advance(PipelineState::CapturingInput);
                self.bridge.set_progress(PROGRESS_READING);
                let reference = self.capture_reference().await?;

                self.advance(PipelineState::Requesting);
                self.bridge.set_progress(PROGRESS_SENDING);
                GenerationRequest::image_to_image(input.prompt(), reference, input.api_key().clone())
            }
        };
        let capture_ms = capture_start.elapsed().as_millis();

        let request_start = Instant::now();
        let encoded = self.generator.generate(request).await?;
        let request_ms = request_start.elapsed().as_millis();

        self.advance(PipelineState::Decoding);
        self.bridge.set_progress(PROGRESS_DECODING);
        let decode_start = Instant::now();
        let buffer = pixel::decode_with_limits(&encoded, &self.options.decode_limits)?;
        let decode_ms = decode_start.elapsed().as_millis();

        self.advance(PipelineState::Materializing);
        self.bridge.set_progress(PROGRESS_CREATING);
        let write_start = Instant::now();
        let (width, height) = (buffer.width(), buffer.height());
        let layer = self
            .bridge
            .write_new_layer(&layer_name(input.prompt()), buffer)
            .await?;
        let write_ms = write_start.elapsed().as_millis();

        log::info!(
            "✅ 新图层 {} 已创建：{}x{} capture={}ms request={}ms decode={}ms write={}ms total={}ms",
            layer,
            width,
            height,
            capture_ms,
            request_ms,
            decode_ms,
            write_ms,
            total_start.elapsed().as_millis()
        );

        Ok(layer)
    }

    /// 读取活动图层并编码为 PNG 参考图。
    async fn capture_reference(&self) -> Result<EncodedImage, PipelineError> {
        let layer = self.bridge.active_layer().await?;
        let mut buffer = self.bridge.read_region(layer, None).await?;
        log::debug!(
            "📥 读取图层 {}：{}x{} {:?}",
            layer,
            buffer.width(),
            buffer.height(),
            buffer.layout()
        );

        if let Some(max_dimension) = self.options.reference_max_dimension {
            buffer = pixel::resize::fit_within(buffer, max_dimension)?;
        }

        let encoded = pixel::encode(&buffer)?;
        log::debug!("📦 参考图编码完成：{} bytes", encoded.len());
        Ok(encoded)
    }

    /// 文件存储是同步磁盘写入，放到阻塞线程池执行，不占用异步工作线程。
    async fn persist_api_key(&self, api_key: &ApiKey) {
        let Some(store) = self.secrets.clone() else {
            return;
        };

        let secret = api_key.expose().to_string();
        match tokio::task::spawn_blocking(move || store.save_secret(&secret)).await {
            Ok(Ok(())) => log::debug!("🔑 API Key 已保存"),
            Ok(Err(e)) => log::warn!("⚠️ 保存 API Key 失败（忽略）：{}", e),
            Err(e) => log::warn!("⚠️ 保存 API Key 的任务异常退出（忽略）：{}", e),
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "非法状态迁移：{} -> {}",
            self.state.name(),
            next.name()
        );
        log::debug!("🔀 {} -> {}", self.state.name(), next.name());
        self.state = next;
        self.trace.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::host::{HostContext, MemoryDocument};
    use crate::pixel::{PixelBuffer, PixelLayout};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ReadOnlySecretStore;

    impl SecretStore for ReadOnlySecretStore {
        fn load_secret(&self) -> Option<String> {
            None
        }

        fn save_secret(&self, _secret: &str) -> Result<(), AppError> {
            Err(AppError::Storage("只读存储".to_string()))
        }
    }

    struct FixedGenerator {
        image: EncodedImage,
        calls: Arc<AtomicUsize>,
    }

    impl ImageGenerator for FixedGenerator {
        async fn generate(&self, _request: GenerationRequest) -> Result<EncodedImage, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.image.clone())
        }
    }

    fn opaque_png(width: u32, height: u32) -> EncodedImage {
        let buffer = PixelBuffer::filled(width, height, PixelLayout::Rgb, &[10, 20, 30]).expect("buffer");
        pixel::encode(&buffer).expect("encode")
    }

    #[tokio::test]
    async fn text_to_image_skips_capture() {
        let context = HostContext::spawn(MemoryDocument::new(8, 8)).expect("spawn");
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = FixedGenerator {
            image: opaque_png(8, 8),
            calls: calls.clone(),
        };

        let input = UserInput::new("cat", ApiKey::new("key"), GenerationMode::TextToImage);
        let (result, trace) = PipelineOrchestrator::new(HostBridge::new(context), generator)
            .run_traced(DialogOutcome::Submitted(input))
            .await;

        assert!(result.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            trace,
            vec![
                PipelineState::Idle,
                PipelineState::Validating,
                PipelineState::Requesting,
                PipelineState::Decoding,
                PipelineState::Materializing,
                PipelineState::Done(Terminal::Success),
            ]
        );
    }

    #[tokio::test]
    async fn cancellation_is_not_a_failure() {
        let context = HostContext::spawn(MemoryDocument::new(1, 1)).expect("spawn");
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = FixedGenerator {
            image: opaque_png(1, 1),
            calls: calls.clone(),
        };

        let status = PipelineOrchestrator::new(HostBridge::new(context.clone()), generator)
            .execute(DialogOutcome::Cancelled)
            .await;

        assert_eq!(status, HostStatus::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let (messages, progress) = context
            .run(|doc| (doc.messages().to_vec(), doc.progress_log().to_vec()))
            .await
            .expect("inspect");
        assert!(messages.is_empty());
        assert!(progress.is_empty());
    }

    #[tokio::test]
    async fn secret_save_failure_does_not_fail_the_run() {
        let context = HostContext::spawn(MemoryDocument::new(4, 4)).expect("spawn");
        let generator = FixedGenerator {
            image: opaque_png(4, 4),
            calls: Arc::new(AtomicUsize::new(0)),
        };

        let input = UserInput::new("cat", ApiKey::new("key"), GenerationMode::TextToImage);
        let result = PipelineOrchestrator::new(HostBridge::new(context), generator)
            .with_secret_store(Arc::new(ReadOnlySecretStore))
            .run(DialogOutcome::Submitted(input))
            .await;

        assert!(result.is_success(), "{:?}", result);
    }

    #[tokio::test]
    async fn both_modes_announce_contact_before_anything_else() {
        for mode in GenerationMode::ALL {
            let mut doc = MemoryDocument::new(2, 2);
            doc.add_layer("base", 2, 2, 4, vec![0; 16]).expect("add");
            let context = HostContext::spawn(doc).expect("spawn");
            let generator = FixedGenerator {
                image: opaque_png(2, 2),
                calls: Arc::new(AtomicUsize::new(0)),
            };

            let input = UserInput::new("cat", ApiKey::new("key"), mode);
            let result = PipelineOrchestrator::new(HostBridge::new(context.clone()), generator)
                .run(DialogOutcome::Submitted(input))
                .await;
            assert!(result.is_success(), "{:?}", result);

            let texts = context.run(|doc| doc.progress_texts()).await.expect("inspect");
            assert_eq!(texts.first().map(String::as_str), Some(PROGRESS_CONTACTING), "{:?}", mode);
        }
    }
}
