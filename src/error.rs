use thiserror::Error;

/// Errors produced by the capture, transcription and injection components.
///
/// Every variant is contained at the boundary where it occurs: callers log
/// it and carry on, they never let it take the recording state with it.
#[derive(Debug, Error)]
pub enum VoicyError {
    #[error("no input device found")]
    NoInputDevice,

    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("model download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("text injection failed: {0}")]
    Injection(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
