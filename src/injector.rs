use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::error::VoicyError;

/// Type text into the currently focused window.
/// Uses wtype on Wayland, xdotool on X11.
pub fn type_text(text: &str) -> Result<(), VoicyError> {
    // Give the hotkey release a moment to reach the focused app, so the
    // first typed characters don't land inside the still-held combo.
    std::thread::sleep(Duration::from_millis(50));

    let session_type = std::env::var("XDG_SESSION_TYPE").unwrap_or_default();
    let (cmd, args): (&str, Vec<&str>) = if session_type == "wayland" {
        ("wtype", vec!["-"])
    } else {
        ("xdotool", vec!["type", "--clearmodifiers", "--file", "-"])
    };

    let mut child = Command::new(cmd)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| VoicyError::Injection(format!("failed to spawn {cmd}: {e}")))?;

    if let Some(ref mut stdin) = child.stdin {
        stdin
            .write_all(text.as_bytes())
            .map_err(|e| VoicyError::Injection(e.to_string()))?;
    }
    // Close stdin so the typing tool sees EOF.
    drop(child.stdin.take());

    let status = child
        .wait()
        .map_err(|e| VoicyError::Injection(e.to_string()))?;
    if !status.success() {
        return Err(VoicyError::Injection(format!(
            "{cmd} exited with status {status}"
        )));
    }

    Ok(())
}
