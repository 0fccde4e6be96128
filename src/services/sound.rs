//! Completion-sound playback

use futures::future::{BoxFuture, FutureExt};
use tokio::process::Command;
use tracing::debug;

/// Fire-and-forget media playback
pub trait SoundPlayer: Send + Sync {
    fn play(&self) -> BoxFuture<'static, Result<(), String>>;
}

/// Plays a sound by running a shell command, e.g. `paplay bell.oga`
#[derive(Debug, Clone)]
pub struct CommandSoundPlayer {
    command: String,
}

impl CommandSoundPlayer {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

impl SoundPlayer for CommandSoundPlayer {
    fn play(&self) -> BoxFuture<'static, Result<(), String>> {
        run_sound_command(self.command.clone()).boxed()
    }
}

async fn run_sound_command(command: String) -> Result<(), String> {
    debug!("Playing completion sound: {}", command);

    let output = Command::new("sh")
        .args(["-c", &command])
        .output()
        .await
        .map_err(|e| format!("Failed to execute sound command: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("Sound command failed: {}", stderr.trim()));
    }
    Ok(())
}

/// Used when no sound command is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPlayer;

impl SoundPlayer for SilentPlayer {
    fn play(&self) -> BoxFuture<'static, Result<(), String>> {
        async { Ok::<(), String>(()) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_command_player_reports_failure() {
        let player = CommandSoundPlayer::new("exit 3");
        assert!(player.play().await.is_err());
    }

    #[tokio::test]
    async fn test_command_player_success() {
        let player = CommandSoundPlayer::new("true");
        assert!(player.play().await.is_ok());
    }

    #[tokio::test]
    async fn test_silent_player() {
        assert!(SilentPlayer.play().await.is_ok());
    }
}
