use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Key codes for a hotkey combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// evdev key codes for modifier keys (e.g. 29 = KEY_LEFTCTRL)
    pub modifiers: Vec<u16>,
    /// evdev key code for the trigger key (e.g. 57 = KEY_SPACE)
    pub trigger: u16,
    /// Human-readable name like "Ctrl+Space"
    pub display_name: String,
}

impl HotkeyConfig {
    fn hold_default() -> Self {
        Self {
            modifiers: vec![29], // KEY_LEFTCTRL
            trigger: 57,         // KEY_SPACE
            display_name: "Ctrl+Space".into(),
        }
    }

    fn toggle_default() -> Self {
        Self {
            modifiers: vec![29, 42], // KEY_LEFTCTRL + KEY_LEFTSHIFT
            trigger: 57,             // KEY_SPACE
            display_name: "Ctrl+Shift+Space".into(),
        }
    }
}

/// Top-level application configuration.
///
/// Loaded once at startup; language and auto_punct are re-read when a clip
/// is submitted, so edits apply to subsequent recordings only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whisper model size: tiny, base, small, medium, large-v3
    pub model_size: String,
    /// Language code like "en", or "auto" for auto-detect
    pub language: String,
    pub hold_hotkey: HotkeyConfig,
    pub toggle_hotkey: HotkeyConfig,
    pub auto_punct: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_size: "small".into(),
            language: "auto".into(),
            hold_hotkey: HotkeyConfig::hold_default(),
            toggle_hotkey: HotkeyConfig::toggle_default(),
            auto_punct: true,
        }
    }
}

impl Config {
    /// Directory: ~/.config/voicy/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("voicy");
        p
    }

    fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from disk, returning defaults if file doesn't exist or is invalid.
    pub fn load() -> Self {
        let path = Self::path();
        match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let dir = Self::dir();
        fs::create_dir_all(&dir)?;
        let data = serde_json::to_string_pretty(self)?;
        fs::write(Self::path(), data)?;
        Ok(())
    }

    /// Language hint for the speech model: `None` means auto-detect.
    pub fn language_hint(&self) -> Option<String> {
        if self.language == "auto" {
            None
        } else {
            Some(self.language.clone())
        }
    }
}
