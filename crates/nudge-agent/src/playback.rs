use tokio::process::Command;
use tracing::{info, warn};

/// The agent's only media seam: flip play/pause on whatever is playing.
pub trait PlaybackToggle: Send + Sync {
    fn toggle_playback(&self);
}

/// Runs an external program that emits a media play/pause key. The child is
/// spawned and left to finish on its own; its exit status is not inspected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandToggle {
    program: String,
    args: Vec<String>,
}

impl CommandToggle {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a command line on whitespace. `None` for a blank line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new(
                "osascript",
                vec![
                    "-e".to_string(),
                    "tell application \"Music\" to playpause".to_string(),
                ],
            )
        } else if cfg!(target_os = "windows") {
            Self::new(
                "powershell",
                vec![
                    "-NoProfile".to_string(),
                    "-Command".to_string(),
                    "(New-Object -ComObject WScript.Shell).SendKeys([char]179)".to_string(),
                ],
            )
        } else {
            Self::new("playerctl", vec!["play-pause".to_string()])
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl PlaybackToggle for CommandToggle {
    fn toggle_playback(&self) {
        match Command::new(&self.program).args(&self.args).spawn() {
            Ok(_) => info!(event = "playback_toggled", program = %self.program),
            Err(err) => {
                warn!(event = "playback_toggle_failed", program = %self.program, error = %err)
            }
        }
    }
}

/// Logs instead of touching media. Used with `--dry-run`.
pub struct LogToggle;

impl PlaybackToggle for LogToggle {
    fn toggle_playback(&self) {
        info!(event = "playback_toggled", program = "dry-run");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_splits_program_and_args() {
        let toggle = CommandToggle::from_command_line("  playerctl  --player spotify play-pause ")
            .expect("parsed");
        assert_eq!(
            toggle,
            CommandToggle::new(
                "playerctl",
                vec![
                    "--player".to_string(),
                    "spotify".to_string(),
                    "play-pause".to_string()
                ]
            )
        );
    }

    #[test]
    fn blank_command_line_is_rejected() {
        assert!(CommandToggle::from_command_line("   ").is_none());
    }

    #[test]
    fn platform_default_names_a_program() {
        assert!(!CommandToggle::platform_default().program().is_empty());
    }

    #[tokio::test]
    async fn missing_program_is_logged_not_fatal() {
        let toggle = CommandToggle::new("nudge-definitely-not-installed", Vec::new());
        toggle.toggle_playback();
    }
}
