use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::events::AppEvent;
use crate::pipeline::Pipeline;
use crate::recorder::{CaptureSource, TARGET_SAMPLE_RATE};

/// The recording state machine: Idle or Recording, flipped only through the
/// three trigger entry points.
///
/// Hold and toggle triggers fire from independent threads; the check and the
/// transition happen under one mutex, so at most one capture session is ever
/// open and stop is only requested against an open session. The mutex stays
/// held through the stop-and-drain, which keeps a rapid re-press from
/// starting a new session while the previous clip is still being drained.
pub struct Controller<C: CaptureSource> {
    capture: C,
    pipeline: Pipeline,
    settings: Arc<Mutex<Config>>,
    events: async_channel::Sender<AppEvent>,
    recording: Mutex<bool>,
}

impl<C: CaptureSource> Controller<C> {
    pub fn new(
        capture: C,
        pipeline: Pipeline,
        settings: Arc<Mutex<Config>>,
        events: async_channel::Sender<AppEvent>,
    ) -> Self {
        Self {
            capture,
            pipeline,
            settings,
            events,
            recording: Mutex::new(false),
        }
    }

    pub fn is_recording(&self) -> bool {
        *self.recording.lock().unwrap()
    }

    /// Hold-to-talk key went down. No-op while already recording.
    pub fn hold_down(&self) {
        let mut recording = self.recording.lock().unwrap();
        if *recording {
            return;
        }
        self.begin_session(&mut recording);
    }

    /// Hold-to-talk key came back up. No-op while idle.
    pub fn hold_up(&self) {
        let mut recording = self.recording.lock().unwrap();
        if !*recording {
            return;
        }
        self.finish_session(&mut recording);
    }

    /// Single control that flips between Recording and Idle.
    pub fn toggle(&self) {
        let mut recording = self.recording.lock().unwrap();
        if *recording {
            self.finish_session(&mut recording);
        } else {
            self.begin_session(&mut recording);
        }
    }

    fn begin_session(&self, recording: &mut bool) {
        match self.capture.start() {
            Ok(()) => {
                *recording = true;
                self.notify(true);
            }
            Err(e) => {
                // Session never started: stay Idle, no notification.
                log::error!("Failed to start recording: {e}");
            }
        }
    }

    fn finish_session(&self, recording: &mut bool) {
        *recording = false;
        self.notify(false);

        let Some(clip) = self.capture.stop_and_get_audio() else {
            log::info!("No audio captured");
            return;
        };

        log::info!(
            "Captured {} samples ({:.1}s at {}Hz)",
            clip.len(),
            clip.len() as f32 / TARGET_SAMPLE_RATE as f32,
            TARGET_SAMPLE_RATE
        );

        // Snapshot at submit time so settings edits apply to new clips only.
        let (language, auto_punct) = {
            let cfg = self.settings.lock().unwrap();
            (cfg.language_hint(), cfg.auto_punct)
        };
        self.pipeline.submit(clip, language, auto_punct);
    }

    fn notify(&self, is_recording: bool) {
        // Unbounded channel: try_send only fails once the consumer is gone.
        let _ = self
            .events
            .try_send(AppEvent::RecordingChanged(is_recording));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoicyError;
    use crate::transcriber::SpeechModel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeCapture {
        active: Mutex<bool>,
        clip: Option<Vec<f32>>,
        fail_start: bool,
        start_calls: AtomicUsize,
    }

    impl FakeCapture {
        fn with_clip(clip: Option<Vec<f32>>) -> Self {
            Self {
                active: Mutex::new(false),
                clip,
                fail_start: false,
                start_calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail_start: true,
                ..Self::with_clip(None)
            }
        }
    }

    impl CaptureSource for FakeCapture {
        fn start(&self) -> Result<(), VoicyError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(VoicyError::NoInputDevice);
            }
            *self.active.lock().unwrap() = true;
            Ok(())
        }

        fn stop_and_get_audio(&self) -> Option<Vec<f32>> {
            let mut active = self.active.lock().unwrap();
            if !*active {
                return None;
            }
            *active = false;
            self.clip.clone()
        }
    }

    struct CountingModel {
        calls: Arc<AtomicUsize>,
    }

    impl SpeechModel for CountingModel {
        fn transcribe(
            &self,
            _samples: &[f32],
            _language: Option<&str>,
        ) -> Result<Vec<String>, VoicyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["ok".into()])
        }
    }

    struct Harness {
        controller: Controller<FakeCapture>,
        rx: async_channel::Receiver<AppEvent>,
        model_calls: Arc<AtomicUsize>,
        _rt: tokio::runtime::Runtime,
    }

    fn harness(capture: FakeCapture) -> Harness {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = async_channel::unbounded();
        let model_calls = Arc::new(AtomicUsize::new(0));
        let model = Arc::new(CountingModel {
            calls: model_calls.clone(),
        });
        let pipeline = Pipeline::new(model, tx.clone(), rt.handle().clone());
        let settings = Arc::new(Mutex::new(Config::default()));
        Harness {
            controller: Controller::new(capture, pipeline, settings, tx),
            rx,
            model_calls,
            _rt: rt,
        }
    }

    /// Drain the notifications that were emitted synchronously so far.
    fn transitions(rx: &async_channel::Receiver<AppEvent>) -> Vec<bool> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let AppEvent::RecordingChanged(b) = ev {
                out.push(b);
            }
        }
        out
    }

    #[test]
    fn hold_session_emits_one_notification_per_transition() {
        let h = harness(FakeCapture::with_clip(Some(vec![0.1; 320])));
        h.controller.hold_down();
        h.controller.hold_up();

        // Channel order: both transitions were emitted before the clip was
        // submitted, so they arrive ahead of the published text.
        assert_eq!(
            h.rx.recv_blocking().unwrap(),
            AppEvent::RecordingChanged(true)
        );
        assert_eq!(
            h.rx.recv_blocking().unwrap(),
            AppEvent::RecordingChanged(false)
        );
        assert_eq!(
            h.rx.recv_blocking().unwrap(),
            AppEvent::TextReady("Ok.".into())
        );
        assert_eq!(h.model_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_hold_down_is_idempotent() {
        let h = harness(FakeCapture::with_clip(Some(vec![0.1; 320])));
        h.controller.hold_down();
        h.controller.hold_down();
        assert_eq!(transitions(&h.rx), vec![true]);
        assert_eq!(h.controller.capture.start_calls.load(Ordering::SeqCst), 1);
        assert!(h.controller.is_recording());
    }

    #[test]
    fn hold_up_while_idle_is_a_noop() {
        let h = harness(FakeCapture::with_clip(Some(vec![0.1; 320])));
        h.controller.hold_up();
        assert!(transitions(&h.rx).is_empty());
        assert_eq!(h.model_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn toggle_flips_between_states() {
        let h = harness(FakeCapture::with_clip(Some(vec![0.1; 320])));
        h.controller.toggle();
        assert!(h.controller.is_recording());
        h.controller.toggle();
        assert!(!h.controller.is_recording());
        assert_eq!(transitions(&h.rx), vec![true, false]);
    }

    #[test]
    fn hold_and_toggle_share_one_session() {
        let h = harness(FakeCapture::with_clip(Some(vec![0.1; 320])));
        h.controller.hold_down();
        h.controller.toggle(); // stops the session the hold opened
        h.controller.hold_up(); // already idle, no-op
        assert_eq!(transitions(&h.rx), vec![true, false]);
        assert_eq!(h.controller.capture.start_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_capture_triggers_no_submission() {
        let h = harness(FakeCapture::with_clip(None));
        h.controller.hold_down();
        h.controller.hold_up();
        assert_eq!(transitions(&h.rx), vec![true, false]);
        assert_eq!(h.model_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_device_open_stays_idle() {
        let h = harness(FakeCapture::failing());
        h.controller.hold_down();
        assert!(!h.controller.is_recording());
        assert!(transitions(&h.rx).is_empty());

        // A later stop request remains a no-op.
        h.controller.hold_up();
        assert!(transitions(&h.rx).is_empty());
    }

    #[test]
    fn scripted_trigger_sequence_notifies_exactly_per_transition() {
        let h = harness(FakeCapture::with_clip(None));
        h.controller.hold_down(); // -> true
        h.controller.hold_down(); // no-op
        h.controller.toggle(); // -> false
        h.controller.toggle(); // -> true
        h.controller.hold_up(); // -> false
        h.controller.hold_up(); // no-op
        h.controller.toggle(); // -> true
        h.controller.toggle(); // -> false
        assert_eq!(
            transitions(&h.rx),
            vec![true, false, true, false, true, false]
        );
    }
}
