use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::VoicyError;

/// Nominal capture rate expected by the speech model.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Something the controller can record from. The one real implementation is
/// [`Recorder`]; tests substitute a fake so no audio device is needed.
pub trait CaptureSource: Send + Sync {
    /// Begin a capture session. Calling this while a session is already
    /// active is a no-op.
    fn start(&self) -> Result<(), VoicyError>;

    /// End the session and return the captured clip as mono f32 samples.
    /// Returns `None` when no session was active or nothing was captured.
    fn stop_and_get_audio(&self) -> Option<Vec<f32>>;
}

/// A capture session in flight: the thread parked holding the cpal stream,
/// plus what we need to interpret the raw frames at drain time.
struct SessionHandle {
    stop_tx: mpsc::Sender<()>,
    thread: thread::JoinHandle<()>,
    channels: usize,
    decimation: usize,
}

/// Microphone capture with thread-safe start/stop.
///
/// The cpal stream is opened, held and dropped on a dedicated
/// `audio-capture` thread (the stream handle is not `Send`). Its callback
/// appends raw interleaved frame blocks to a mutex-protected FIFO; the FIFO
/// is only drained after the stream has been torn down, so the producer is
/// gone before the consumer reads.
pub struct Recorder {
    session: Mutex<Option<SessionHandle>>,
    frames: Arc<Mutex<VecDeque<Vec<f32>>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            frames: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for Recorder {
    fn start(&self) -> Result<(), VoicyError> {
        let mut session = self.session.lock().unwrap();
        if session.is_some() {
            return Ok(());
        }

        // Stale frames from a previous incomplete session must not leak
        // into the new clip.
        self.frames.lock().unwrap().clear();

        let frames = Arc::clone(&self.frames);
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || match open_stream(frames) {
                Ok((stream, channels, decimation)) => {
                    if ready_tx.send(Ok((channels, decimation))).is_err() {
                        return;
                    }
                    // Park until stop() signals (or the Recorder is dropped,
                    // which closes the channel). Dropping the stream closes it.
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok((channels, decimation))) => {
                *session = Some(SessionHandle {
                    stop_tx,
                    thread,
                    channels,
                    decimation,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(VoicyError::DeviceUnavailable(
                "capture thread exited before the stream opened".into(),
            )),
        }
    }

    fn stop_and_get_audio(&self) -> Option<Vec<f32>> {
        let mut session = self.session.lock().unwrap();
        let handle = session.take()?;

        // Close the stream first so no further frames can arrive.
        let _ = handle.stop_tx.send(());
        if handle.thread.join().is_err() {
            log::error!("audio-capture thread panicked");
        }

        let chunks: Vec<Vec<f32>> = self.frames.lock().unwrap().drain(..).collect();
        let clip = mix_down(&chunks, handle.channels, handle.decimation);
        if clip.is_empty() {
            None
        } else {
            Some(clip)
        }
    }
}

/// Open the default input stream, preferring 16kHz mono f32 and falling
/// back to the device default with integer decimation.
fn open_stream(
    frames: Arc<Mutex<VecDeque<Vec<f32>>>>,
) -> Result<(cpal::Stream, usize, usize), VoicyError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(VoicyError::NoInputDevice)?;

    log::info!("Input device: {:?}", device.description());

    let supported: Vec<_> = device
        .supported_input_configs()
        .map_err(device_err)?
        .collect();

    let desired = supported.iter().find(|c| {
        c.channels() == 1
            && c.min_sample_rate() <= TARGET_SAMPLE_RATE
            && c.max_sample_rate() >= TARGET_SAMPLE_RATE
            && c.sample_format() == cpal::SampleFormat::F32
    });

    let (config, decimation) = if let Some(cfg) = desired {
        (cfg.with_sample_rate(TARGET_SAMPLE_RATE).config(), 1usize)
    } else {
        let default_config = device.default_input_config().map_err(device_err)?;
        let rate = default_config.sample_rate();
        let factor = (rate / TARGET_SAMPLE_RATE).max(1) as usize;
        log::info!(
            "Using native rate {rate}Hz, decimating by {factor}x to ~{}Hz",
            rate / factor as u32
        );
        (default_config.config(), factor)
    };

    let channels = config.channels as usize;

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                frames.lock().unwrap().push_back(data.to_vec());
            },
            |err| log::error!("Input stream error: {err}"),
            None,
        )
        .map_err(device_err)?;

    stream.play().map_err(device_err)?;
    Ok((stream, channels, decimation))
}

fn device_err(e: impl std::fmt::Display) -> VoicyError {
    VoicyError::DeviceUnavailable(e.to_string())
}

/// Concatenate raw interleaved chunks into one mono clip: average across
/// channels per frame, keep every `decimation`-th frame.
fn mix_down(chunks: &[Vec<f32>], channels: usize, decimation: usize) -> Vec<f32> {
    let channels = channels.max(1);
    let decimation = decimation.max(1);
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    let mut mono = Vec::with_capacity(total / channels / decimation + 1);

    let mut frame_idx = 0usize;
    for chunk in chunks {
        for frame in chunk.chunks(channels) {
            if frame_idx % decimation == 0 {
                mono.push(frame.iter().sum::<f32>() / frame.len() as f32);
            }
            frame_idx += 1;
        }
    }
    mono
}
