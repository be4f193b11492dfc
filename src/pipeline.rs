use std::sync::Arc;

use crate::events::AppEvent;
use crate::transcriber::SpeechModel;

/// Turns finished clips into published text without blocking the caller.
///
/// Each submission gets its own task; the model call runs inside
/// `spawn_blocking`. Submissions are not serialized against each other, so
/// text may be published out of submission order when an earlier clip takes
/// longer to transcribe.
pub struct Pipeline {
    model: Arc<dyn SpeechModel>,
    events: async_channel::Sender<AppEvent>,
    runtime: tokio::runtime::Handle,
}

impl Pipeline {
    pub fn new(
        model: Arc<dyn SpeechModel>,
        events: async_channel::Sender<AppEvent>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            model,
            events,
            runtime,
        }
    }

    /// Hand a clip to the speech model. Returns immediately; the worker
    /// publishes `TextReady` when it has a non-empty transcript. Model
    /// failures and panics are logged here and terminate only this worker.
    pub fn submit(&self, clip: Vec<f32>, language: Option<String>, auto_punct: bool) {
        let model = Arc::clone(&self.model);
        let events = self.events.clone();

        self.runtime.spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                model.transcribe(&clip, language.as_deref())
            })
            .await;

            match result {
                Ok(Ok(segments)) => {
                    let mut text = join_segments(&segments);
                    if text.is_empty() {
                        log::debug!("Transcription came back empty, nothing to publish");
                        return;
                    }
                    if auto_punct {
                        text = auto_punctuate(&text);
                    }
                    let _ = events.send(AppEvent::TextReady(text)).await;
                }
                Ok(Err(e)) => log::error!("Transcription failed: {e}"),
                Err(e) => log::error!("Transcription task panicked: {e}"),
            }
        });
    }
}

/// Join recognized segments with single spaces, dropping empty ones.
fn join_segments(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Light punctuation heuristic: capitalize the first character and make
/// sure the text ends in sentence-terminal punctuation. Interior text is
/// never touched.
fn auto_punctuate(text: &str) -> String {
    let t = text.trim();
    let mut out = String::with_capacity(t.len() + 1);
    let mut chars = t.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    } else {
        return out;
    }
    if !out.ends_with(['.', '?', '!']) {
        out.push('.');
    }
    out
}
