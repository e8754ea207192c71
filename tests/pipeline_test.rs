//! 流水线端到端测试：内存文档 + 生成服务桩。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gimini::generation::{ApiKey, GenerationRequest, ImageGenerator};
use gimini::host::{HostBridge, HostContext, HostDocument, HostOperation, LayerId, MemoryDocument};
use gimini::pipeline::{
    DialogOutcome, ErrorKind, GenerationMode, HostStatus, OrchestratorOptions, PROGRESS_CONTACTING,
    PROGRESS_CREATING, PROGRESS_DECODING, PROGRESS_READING, PROGRESS_SENDING, PipelineError,
    PipelineOrchestrator, PipelineState, Terminal, UserInput,
};
use gimini::pixel::{self, EncodedImage, PixelBuffer, PixelLayout};
use gimini::secret::{MemorySecretStore, SecretStore};

const API_KEY: &str = "AIza-integration-secret";

#[derive(Clone)]
struct StubGenerator {
    response: Result<EncodedImage, PipelineError>,
    calls: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<GenerationRequest>>>,
}

impl StubGenerator {
    fn returning(response: Result<EncodedImage, PipelineError>) -> Self {
        Self {
            response,
            calls: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().expect("lock").clone()
    }
}

impl ImageGenerator for StubGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<EncodedImage, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().expect("lock") = Some(request);
        self.response.clone()
    }
}

fn opaque_png(width: u32, height: u32) -> EncodedImage {
    let buffer = PixelBuffer::filled(width, height, PixelLayout::Rgb, &[200, 40, 10]).expect("buffer");
    pixel::encode(&buffer).expect("encode")
}

fn document_with_layer(width: u32, height: u32, bpp: u32) -> (MemoryDocument, LayerId) {
    let mut doc = MemoryDocument::new(width, height);
    let pixels = (0..width * height * bpp).map(|i| (i % 256) as u8).collect();
    let layer = doc.add_layer("Background", width, height, bpp, pixels).expect("add layer");
    (doc, layer)
}

fn submitted(prompt: &str, mode: GenerationMode) -> DialogOutcome {
    DialogOutcome::Submitted(UserInput::new(prompt, ApiKey::new(API_KEY), mode))
}

async fn layers(context: &HostContext<MemoryDocument>) -> Vec<LayerId> {
    context.run(|doc| doc.layers()).await.expect("layers")
}

#[tokio::test]
async fn text_to_image_creates_512_rgba_layer() {
    let (doc, _) = document_with_layer(64, 64, 4);
    let context = HostContext::spawn(doc).expect("spawn");
    let generator = StubGenerator::returning(Ok(opaque_png(512, 512)));

    let result = PipelineOrchestrator::new(HostBridge::new(context.clone()), generator.clone())
        .run(submitted("fox", GenerationMode::TextToImage))
        .await;

    let Some(layer) = result.layer() else {
        panic!("unexpected result: {:?}", result);
    };
    let (info, name, pixels) = context
        .run(move |doc| {
            (
                doc.layer_info(layer),
                doc.layer_name(layer).map(str::to_string),
                doc.layer_pixels(layer).map(<[u8]>::to_vec),
            )
        })
        .await
        .expect("inspect");

    let info = info.expect("layer info");
    assert_eq!((info.width, info.height, info.bytes_per_pixel), (512, 512, 4));
    assert_eq!(name.as_deref(), Some("Gemini Gen: fox..."));
    let pixels = pixels.expect("pixels");
    assert_eq!(&pixels[..4], &[200, 40, 10, 255]);
    assert!(pixels.chunks_exact(4).all(|px| px[3] == 255));

    let request = generator.last_request().expect("request");
    assert_eq!(request.mode(), GenerationMode::TextToImage);
    assert!(request.reference().is_none());
}

#[tokio::test]
async fn empty_prompt_short_circuits_before_any_io() {
    let (doc, base) = document_with_layer(8, 8, 4);
    let context = HostContext::spawn(doc).expect("spawn");
    let generator = StubGenerator::returning(Ok(opaque_png(8, 8)));
    let secrets = Arc::new(MemorySecretStore::new());

    for mode in GenerationMode::ALL {
        let (result, trace) = PipelineOrchestrator::new(HostBridge::new(context.clone()), generator.clone())
            .with_secret_store(secrets.clone())
            .run_traced(submitted("", mode))
            .await;

        assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
        assert_eq!(
            trace,
            vec![
                PipelineState::Idle,
                PipelineState::Validating,
                PipelineState::Done(Terminal::Failed),
            ]
        );
    }

    assert_eq!(generator.calls(), 0);
    assert_eq!(secrets.load_secret(), None);
    assert_eq!(layers(&context).await, vec![base]);
    let texts = context
        .run(|doc| doc.progress_texts())
        .await
        .expect("progress");
    assert_eq!(texts, vec![PROGRESS_CONTACTING.to_string(); GenerationMode::ALL.len()]);
}

#[tokio::test]
async fn blank_api_key_is_a_validation_error() {
    let context = HostContext::spawn(MemoryDocument::new(4, 4)).expect("spawn");
    let generator = StubGenerator::returning(Ok(opaque_png(4, 4)));

    let outcome = DialogOutcome::Submitted(UserInput::new(
        "a cat",
        ApiKey::new("   "),
        GenerationMode::TextToImage,
    ));
    let result = PipelineOrchestrator::new(HostBridge::new(context), generator.clone())
        .run(outcome)
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn every_mode_reaches_a_terminal_state() {
    for mode in GenerationMode::ALL {
        let (doc, _) = document_with_layer(16, 16, 3);
        let context = HostContext::spawn(doc).expect("spawn");
        let generator = StubGenerator::returning(Ok(opaque_png(16, 16)));

        let (result, trace) = PipelineOrchestrator::new(HostBridge::new(context), generator)
            .run_traced(submitted("paint a lighthouse", mode))
            .await;

        assert!(result.is_success(), "{:?}: {:?}", mode, result);
        assert_eq!(trace.first(), Some(&PipelineState::Idle));
        assert_eq!(trace.last(), Some(&PipelineState::Done(Terminal::Success)));
        assert_eq!(
            trace.contains(&PipelineState::CapturingInput),
            mode == GenerationMode::ImageToImage
        );
    }
}

#[tokio::test]
async fn image_to_image_sends_current_layer_as_png() {
    let (doc, base) = document_with_layer(6, 4, 3);
    let expected = doc.export_layer(base).expect("export");
    let context = HostContext::spawn(doc).expect("spawn");
    let generator = StubGenerator::returning(Ok(opaque_png(6, 4)));

    let result = PipelineOrchestrator::new(HostBridge::new(context.clone()), generator.clone())
        .run(submitted("make it night", GenerationMode::ImageToImage))
        .await;
    assert!(result.is_success(), "{:?}", result);

    let request = generator.last_request().expect("request");
    assert_eq!(request.mode(), GenerationMode::ImageToImage);
    assert_eq!(request.prompt(), "make it night");
    let reference = request.reference().expect("reference");
    assert_eq!(pixel::decode(reference).expect("decode reference"), expected);

    let texts = context
        .run(|doc| doc.progress_texts())
        .await
        .expect("progress");
    assert_eq!(
        texts,
        vec![
            PROGRESS_CONTACTING.to_string(),
            PROGRESS_READING.to_string(),
            PROGRESS_SENDING.to_string(),
            PROGRESS_DECODING.to_string(),
            PROGRESS_CREATING.to_string(),
        ]
    );
}

#[tokio::test]
async fn large_reference_is_downscaled_before_upload() {
    let (doc, _) = document_with_layer(300, 150, 4);
    let context = HostContext::spawn(doc).expect("spawn");
    let generator = StubGenerator::returning(Ok(opaque_png(32, 32)));

    let options = OrchestratorOptions {
        reference_max_dimension: Some(100),
        ..OrchestratorOptions::default()
    };
    let result = PipelineOrchestrator::new(HostBridge::new(context), generator.clone())
        .with_options(options)
        .run(submitted("watercolor", GenerationMode::ImageToImage))
        .await;
    assert!(result.is_success(), "{:?}", result);

    let request = generator.last_request().expect("request");
    let reference = pixel::decode(request.reference().expect("reference")).expect("decode");
    assert_eq!((reference.width(), reference.height()), (100, 50));
    assert_eq!(reference.layout(), PixelLayout::Rgba);
}

#[tokio::test]
async fn failures_before_materializing_leave_layers_untouched() {
    let cases: Vec<(&str, Result<EncodedImage, PipelineError>, ErrorKind)> = vec![
        (
            "transport",
            Err(PipelineError::Transport("无法连接".to_string())),
            ErrorKind::Transport,
        ),
        (
            "service",
            Err(PipelineError::Service {
                code: "RESOURCE_EXHAUSTED".to_string(),
                message: "quota".to_string(),
            }),
            ErrorKind::Service,
        ),
        (
            "empty",
            Err(PipelineError::EmptyResult("响应中没有图片数据".to_string())),
            ErrorKind::EmptyResult,
        ),
        (
            "garbage",
            Ok(EncodedImage::png(b"definitely not a png".to_vec())),
            ErrorKind::Decode,
        ),
    ];

    for mode in GenerationMode::ALL {
        for (label, response, kind) in cases.clone() {
            let (doc, base) = document_with_layer(8, 8, 4);
            let context = HostContext::spawn(doc).expect("spawn");
            let before = context
                .run(move |doc| doc.layer_pixels(base).map(<[u8]>::to_vec))
                .await
                .expect("snapshot");

            let result = PipelineOrchestrator::new(
                HostBridge::new(context.clone()),
                StubGenerator::returning(response),
            )
            .run(submitted("anything", mode))
            .await;

            assert_eq!(result.error_kind(), Some(kind), "{} {:?}", label, mode);
            assert_eq!(layers(&context).await, vec![base], "{} {:?}", label, mode);
            let after = context
                .run(move |doc| doc.layer_pixels(base).map(<[u8]>::to_vec))
                .await
                .expect("snapshot");
            assert_eq!(before, after, "{} {:?}", label, mode);
        }
    }
}

#[tokio::test]
async fn capture_failures_never_reach_the_generator() {
    let (gray_doc, gray) = document_with_layer(4, 4, 1);
    let (mut faulty_doc, faulty) = document_with_layer(4, 4, 4);
    faulty_doc.fail_on(HostOperation::ReadPixels);

    for (doc, base, kind) in [
        (gray_doc, gray, ErrorKind::UnsupportedFormat),
        (faulty_doc, faulty, ErrorKind::HostRead),
    ] {
        let context = HostContext::spawn(doc).expect("spawn");
        let generator = StubGenerator::returning(Ok(opaque_png(4, 4)));

        let result = PipelineOrchestrator::new(HostBridge::new(context.clone()), generator.clone())
            .run(submitted("edit", GenerationMode::ImageToImage))
            .await;

        assert_eq!(result.error_kind(), Some(kind));
        assert_eq!(generator.calls(), 0);
        assert_eq!(layers(&context).await, vec![base]);
    }
}

#[tokio::test]
async fn image_mode_without_active_layer_fails_as_host_read() {
    let context = HostContext::spawn(MemoryDocument::new(4, 4)).expect("spawn");
    let generator = StubGenerator::returning(Ok(opaque_png(4, 4)));

    let result = PipelineOrchestrator::new(HostBridge::new(context), generator.clone())
        .run(submitted("edit", GenerationMode::ImageToImage))
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::HostRead));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn commit_failure_rolls_back_new_layer() {
    let (mut doc, base) = document_with_layer(8, 8, 4);
    doc.fail_on(HostOperation::MergeShadow);
    let context = HostContext::spawn(doc).expect("spawn");

    let result = PipelineOrchestrator::new(
        HostBridge::new(context.clone()),
        StubGenerator::returning(Ok(opaque_png(8, 8))),
    )
    .run(submitted("fox", GenerationMode::TextToImage))
    .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::HostWrite));
    assert_eq!(layers(&context).await, vec![base]);
}

#[tokio::test]
async fn api_key_is_saved_after_validation() {
    let context = HostContext::spawn(MemoryDocument::new(4, 4)).expect("spawn");
    let secrets = Arc::new(MemorySecretStore::new());

    let result = PipelineOrchestrator::new(
        HostBridge::new(context),
        StubGenerator::returning(Err(PipelineError::Transport("offline".to_string()))),
    )
    .with_secret_store(secrets.clone())
    .run(submitted("fox", GenerationMode::TextToImage))
    .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Transport));
    assert_eq!(secrets.load_secret().as_deref(), Some(API_KEY));
}

#[tokio::test]
async fn execute_reports_sanitized_error_to_host() {
    let context = HostContext::spawn(MemoryDocument::new(4, 4)).expect("spawn");
    let generator = StubGenerator::returning(Err(PipelineError::Service {
        code: "INVALID_ARGUMENT".to_string(),
        message: format!("API key {} not valid", API_KEY),
    }));

    let status = PipelineOrchestrator::new(HostBridge::new(context.clone()), generator)
        .execute(submitted("fox", GenerationMode::TextToImage))
        .await;

    let message = match status {
        HostStatus::ExecutionError(message) => message,
        other => panic!("unexpected status: {:?}", other),
    };
    assert!(!message.contains(API_KEY));
    assert!(message.contains("INVALID_ARGUMENT"));

    let (messages, texts, log) = context
        .run(|doc| (doc.messages().to_vec(), doc.progress_texts(), doc.progress_log().to_vec()))
        .await
        .expect("inspect");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("GIMini Error: "));
    assert!(!messages[0].contains(API_KEY));
    assert_eq!(texts, vec![PROGRESS_CONTACTING.to_string()]);
    assert_eq!(log.last(), Some(&gimini::host::ProgressEvent::End));
}

#[tokio::test]
async fn execute_success_reports_success() {
    let context = HostContext::spawn(MemoryDocument::new(4, 4)).expect("spawn");

    let status = PipelineOrchestrator::new(
        HostBridge::new(context.clone()),
        StubGenerator::returning(Ok(opaque_png(4, 4))),
    )
    .execute(submitted("a red fox jumping over seven lazy dogs quickly", GenerationMode::TextToImage))
    .await;

    assert_eq!(status, HostStatus::Success);
    let name = context
        .run(|doc| {
            doc.active_layer()
                .and_then(|layer| doc.layer_name(layer).map(str::to_string))
        })
        .await
        .expect("inspect");
    assert_eq!(name.as_deref(), Some("Gemini Gen: a red fox jumping over..."));
}
