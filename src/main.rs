mod config;
mod controller;
mod error;
mod events;
mod hotkey;
mod injector;
mod pipeline;
mod recorder;
mod transcriber;

use std::sync::{Arc, Mutex};

use config::Config;
use controller::Controller;
use events::AppEvent;
use hotkey::{Bindings, TriggerEvent};
use pipeline::Pipeline;
use recorder::Recorder;
use transcriber::WhisperModel;

fn main() {
    env_logger::init();
    log::info!("Voicy starting");

    let config = Config::load();
    // Write the merged option set back so first-run users have a file to edit.
    if let Err(e) = config.save() {
        log::warn!("Failed to save config: {e}");
    }

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");

    if !transcriber::model_exists(&config.model_size) {
        log::info!("Whisper model '{}' not found, downloading", config.model_size);
        if let Err(e) = rt.block_on(transcriber::download_model(&config.model_size)) {
            log::error!("Model download failed: {e}");
            std::process::exit(1);
        }
    }

    let model = match WhisperModel::load(&config.model_size) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    let (event_tx, event_rx) = async_channel::unbounded::<AppEvent>();
    let settings = Arc::new(Mutex::new(config.clone()));

    let pipeline = Pipeline::new(model, event_tx.clone(), rt.handle().clone());
    let controller = Arc::new(Controller::new(
        Recorder::new(),
        pipeline,
        settings,
        event_tx,
    ));

    let (trigger_tx, trigger_rx) = async_channel::unbounded::<TriggerEvent>();
    let bindings = Arc::new(Mutex::new(Bindings {
        hold: config.hold_hotkey.clone(),
        toggle: config.toggle_hotkey.clone(),
    }));
    hotkey::start_listener(trigger_tx, bindings);

    // Triggers can block briefly on stop (stream close + drain), so they get
    // their own thread rather than running on the listener.
    {
        let controller = controller.clone();
        std::thread::Builder::new()
            .name("trigger-dispatch".into())
            .spawn(move || {
                while let Ok(trigger) = trigger_rx.recv_blocking() {
                    match trigger {
                        TriggerEvent::HoldPressed => controller.hold_down(),
                        TriggerEvent::HoldReleased => controller.hold_up(),
                        TriggerEvent::Toggled => controller.toggle(),
                    }
                    log::debug!(
                        "State: {}",
                        if controller.is_recording() {
                            "recording"
                        } else {
                            "idle"
                        }
                    );
                }
            })
            .expect("Failed to spawn trigger dispatch thread");
    }

    log::info!(
        "Ready. Hold {} to talk, press {} to toggle",
        config.hold_hotkey.display_name,
        config.toggle_hotkey.display_name
    );

    // Notification consumer: status lines stand in for the indicator widget;
    // finished transcripts go to the focused window.
    while let Ok(event) = event_rx.recv_blocking() {
        match event {
            AppEvent::RecordingChanged(true) => log::info!("Recording..."),
            AppEvent::RecordingChanged(false) => log::info!("Recording stopped"),
            AppEvent::TextReady(text) => {
                log::info!("Transcript: {text}");
                if let Err(e) = injector::type_text(&text) {
                    log::error!("{e}");
                }
            }
        }
    }
}
