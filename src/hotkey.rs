use evdev::{Device, EventType, KeyCode};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::HotkeyConfig;

/// Trigger events delivered to the recording state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    HoldPressed,
    HoldReleased,
    Toggled,
}

/// The two configured combos, shared so later settings updates reach the
/// running listener.
#[derive(Debug, Clone)]
pub struct Bindings {
    pub hold: HotkeyConfig,
    pub toggle: HotkeyConfig,
}

/// Start the hotkey listener on a dedicated OS thread.
/// Sends a `TriggerEvent` through the channel for each recognized gesture.
pub fn start_listener(
    sender: async_channel::Sender<TriggerEvent>,
    bindings: Arc<Mutex<Bindings>>,
) {
    std::thread::Builder::new()
        .name("hotkey-listener".into())
        .spawn(move || {
            if let Err(e) = listener_loop(sender, bindings) {
                log::error!("Hotkey listener exited: {e}");
            }
        })
        .expect("Failed to spawn hotkey thread");
}

fn listener_loop(
    sender: async_channel::Sender<TriggerEvent>,
    bindings: Arc<Mutex<Bindings>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut devices = open_keyboard_devices();
    if devices.is_empty() {
        return Err("No keyboard devices found. Is the user in the 'input' group?".into());
    }
    log::info!("Opened {} keyboard device(s)", devices.len());

    // Set non-blocking
    for dev in &devices {
        dev.set_nonblocking(true)?;
    }

    let mut tracker = KeyTracker::new();

    loop {
        let mut any_event = false;

        for dev in &mut devices {
            if let Ok(events) = dev.fetch_events() {
                for event in events {
                    if event.event_type() != EventType::KEY {
                        continue;
                    }
                    any_event = true;
                    let pressed = match event.value() {
                        1 => true,
                        0 => false,
                        _ => continue, // repeat events
                    };

                    let current = bindings.lock().unwrap().clone();
                    if let Some(trigger) = tracker.on_key(event.code(), pressed, &current) {
                        log::debug!("Trigger: {trigger:?}");
                        if sender.try_send(trigger).is_err() {
                            log::info!("Trigger channel closed, exiting hotkey listener");
                            return Ok(());
                        }
                    }
                }
            }
        }

        if !any_event {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Pure key-event tracker turning raw press/release pairs into trigger
/// events. The hold gesture is strictly paired: the release fires for the
/// key that engaged it, even if the modifiers (or the configured combo)
/// changed while the key was down.
struct KeyTracker {
    held: HashSet<u16>,
    /// Key code whose press engaged the hold gesture, while it is down.
    hold_engaged: Option<u16>,
    last_toggle: Instant,
    debounce: Duration,
}

impl KeyTracker {
    fn new() -> Self {
        Self {
            held: HashSet::new(),
            hold_engaged: None,
            last_toggle: Instant::now() - Duration::from_secs(10),
            debounce: Duration::from_millis(500),
        }
    }

    fn on_key(&mut self, code: u16, pressed: bool, bindings: &Bindings) -> Option<TriggerEvent> {
        if pressed {
            if !self.held.insert(code) {
                return None;
            }
            // Toggle wins when both combos match (it carries more modifiers).
            if code == bindings.toggle.trigger && self.combo_held(&bindings.toggle) {
                if self.last_toggle.elapsed() > self.debounce {
                    self.last_toggle = Instant::now();
                    return Some(TriggerEvent::Toggled);
                }
                return None;
            }
            if self.hold_engaged.is_none()
                && code == bindings.hold.trigger
                && self.combo_held(&bindings.hold)
            {
                self.hold_engaged = Some(code);
                return Some(TriggerEvent::HoldPressed);
            }
            None
        } else {
            self.held.remove(&code);
            if self.hold_engaged == Some(code) {
                self.hold_engaged = None;
                return Some(TriggerEvent::HoldReleased);
            }
            None
        }
    }

    fn combo_held(&self, combo: &HotkeyConfig) -> bool {
        combo.modifiers.iter().all(|m| self.held.contains(m)) && self.held.contains(&combo.trigger)
    }
}

/// Open all /dev/input/event* devices that look like keyboards.
fn open_keyboard_devices() -> Vec<Device> {
    let mut devices = Vec::new();
    let Ok(entries) = std::fs::read_dir("/dev/input") else {
        return devices;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if !name.starts_with("event") {
            continue;
        }
        if let Ok(dev) = Device::open(&path) {
            // Check that the device supports EV_KEY and has KEY_A
            let has_key = dev.supported_events().contains(EventType::KEY);
            let has_key_a = dev
                .supported_keys()
                .map(|keys| keys.contains(KeyCode::KEY_A))
                .unwrap_or(false);
            if has_key && has_key_a {
                log::info!(
                    "Opened keyboard: {} ({})",
                    dev.name().unwrap_or("unknown"),
                    path.display()
                );
                devices.push(dev);
            }
        }
    }
    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTRL: u16 = 29;
    const SHIFT: u16 = 42;
    const SPACE: u16 = 57;

    fn bindings() -> Bindings {
        Bindings {
            hold: HotkeyConfig {
                modifiers: vec![CTRL],
                trigger: SPACE,
                display_name: "Ctrl+Space".into(),
            },
            toggle: HotkeyConfig {
                modifiers: vec![CTRL, SHIFT],
                trigger: SPACE,
                display_name: "Ctrl+Shift+Space".into(),
            },
        }
    }

    #[test]
    fn hold_gesture_pairs_press_and_release() {
        let b = bindings();
        let mut t = KeyTracker::new();
        assert_eq!(t.on_key(CTRL, true, &b), None);
        assert_eq!(t.on_key(SPACE, true, &b), Some(TriggerEvent::HoldPressed));
        assert_eq!(t.on_key(SPACE, false, &b), Some(TriggerEvent::HoldReleased));
    }

    #[test]
    fn hold_release_fires_even_after_modifier_released_first() {
        let b = bindings();
        let mut t = KeyTracker::new();
        t.on_key(CTRL, true, &b);
        assert_eq!(t.on_key(SPACE, true, &b), Some(TriggerEvent::HoldPressed));
        assert_eq!(t.on_key(CTRL, false, &b), None);
        assert_eq!(t.on_key(SPACE, false, &b), Some(TriggerEvent::HoldReleased));
    }

    #[test]
    fn trigger_without_modifiers_does_nothing() {
        let b = bindings();
        let mut t = KeyTracker::new();
        assert_eq!(t.on_key(SPACE, true, &b), None);
        assert_eq!(t.on_key(SPACE, false, &b), None);
    }

    #[test]
    fn toggle_takes_precedence_over_hold() {
        let b = bindings();
        let mut t = KeyTracker::new();
        t.on_key(CTRL, true, &b);
        t.on_key(SHIFT, true, &b);
        assert_eq!(t.on_key(SPACE, true, &b), Some(TriggerEvent::Toggled));
        // No hold was engaged, so the release is silent.
        assert_eq!(t.on_key(SPACE, false, &b), None);
    }

    #[test]
    fn toggle_is_debounced() {
        let b = bindings();
        let mut t = KeyTracker::new();
        t.on_key(CTRL, true, &b);
        t.on_key(SHIFT, true, &b);
        assert_eq!(t.on_key(SPACE, true, &b), Some(TriggerEvent::Toggled));
        t.on_key(SPACE, false, &b);
        assert_eq!(t.on_key(SPACE, true, &b), None);

        // With the debounce window elapsed it fires again.
        t.last_toggle = Instant::now() - Duration::from_secs(1);
        t.on_key(SPACE, false, &b);
        assert_eq!(t.on_key(SPACE, true, &b), Some(TriggerEvent::Toggled));
    }

    #[test]
    fn duplicate_key_down_is_ignored() {
        let b = bindings();
        let mut t = KeyTracker::new();
        t.on_key(CTRL, true, &b);
        assert_eq!(t.on_key(SPACE, true, &b), Some(TriggerEvent::HoldPressed));
        assert_eq!(t.on_key(SPACE, true, &b), None);
    }
}
