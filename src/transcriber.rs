use std::path::PathBuf;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::error::VoicyError;

const MODEL_URL_BASE: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// The speech-to-text collaborator: mono 16kHz f32 samples plus an optional
/// language hint in, recognized text segments out. Blocking; the pipeline
/// always calls it from a worker.
pub trait SpeechModel: Send + Sync {
    fn transcribe(&self, samples: &[f32], language: Option<&str>)
        -> Result<Vec<String>, VoicyError>;
}

/// Directory for model storage: ~/.local/share/voicy/models/
fn models_dir() -> PathBuf {
    let mut p = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("voicy");
    p.push("models");
    p
}

fn model_filename(model_size: &str) -> String {
    format!("ggml-{model_size}.bin")
}

pub fn model_path(model_size: &str) -> PathBuf {
    models_dir().join(model_filename(model_size))
}

/// Check whether the whisper model file exists.
pub fn model_exists(model_size: &str) -> bool {
    model_path(model_size).exists()
}

/// Download the whisper model, logging progress as it streams in.
pub async fn download_model(model_size: &str) -> Result<(), VoicyError> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let dir = models_dir();
    tokio::fs::create_dir_all(&dir).await?;

    let url = format!("{MODEL_URL_BASE}/{}", model_filename(model_size));
    log::info!("Downloading whisper model from {url}");

    let response = reqwest::get(&url).await?.error_for_status()?;
    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut last_logged: u64 = 0;

    let path = model_path(model_size);
    let mut file = tokio::fs::File::create(&path).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        // A log line every ~25 MiB is enough to show liveness.
        if downloaded - last_logged >= 25 * 1_048_576 {
            last_logged = downloaded;
            if total > 0 {
                log::info!(
                    "Model download: {:.0} / {:.0} MiB",
                    downloaded as f64 / 1_048_576.0,
                    total as f64 / 1_048_576.0
                );
            } else {
                log::info!("Model download: {:.0} MiB", downloaded as f64 / 1_048_576.0);
            }
        }
    }

    file.flush().await?;
    log::info!("Model downloaded to {}", path.display());
    Ok(())
}

/// Whisper-backed speech model. Loading is CPU-heavy; transcription even
/// more so — both belong on a blocking thread.
pub struct WhisperModel {
    ctx: WhisperContext,
}

impl WhisperModel {
    /// Load the whisper model from disk.
    pub fn load(model_size: &str) -> Result<Self, VoicyError> {
        let path = model_path(model_size);
        let ctx = WhisperContext::new_with_params(
            path.to_str()
                .ok_or_else(|| VoicyError::Model("invalid model path".into()))?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| VoicyError::Model(format!("failed to load whisper model: {e}")))?;
        log::info!("Whisper model '{model_size}' loaded");
        Ok(Self { ctx })
    }
}

impl SpeechModel for WhisperModel {
    fn transcribe(
        &self,
        samples: &[f32],
        language: Option<&str>,
    ) -> Result<Vec<String>, VoicyError> {
        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| VoicyError::Transcription(format!("state error: {e}")))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        // whisper expects "auto" for language detection rather than no value.
        params.set_language(Some(language.unwrap_or("auto")));
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        let cpus = std::thread::available_parallelism()
            .map(|n| n.get() as i32)
            .unwrap_or(4);
        params.set_n_threads(cpus);

        state
            .full(params, samples)
            .map_err(|e| VoicyError::Transcription(e.to_string()))?;

        let mut segments = Vec::new();
        for segment in state.as_iter() {
            // WhisperSegment implements Display
            segments.push(format!("{segment}"));
        }
        Ok(segments)
    }
}
