//! Audio playback as a cancellable background task.
//!
//! [`spawn_playback`] starts an [`AudioPlayer`] on its own tokio task and
//! returns a [`PlaybackHandle`]; the caller can await completion, poll it,
//! or cancel it without blocking turn processing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PlaybackConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// Plays one audio file until it finishes or `cancel` fires.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, path: &Path, cancel: CancellationToken) -> PlaybackOutcome;
}

/// Runs an external player command with the audio path as its last argument.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    command: String,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, path: &Path, cancel: CancellationToken) -> PlaybackOutcome {
        let mut child = match tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return PlaybackOutcome::Failed(format!("{}: {}", self.command, e)),
        };

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => PlaybackOutcome::Completed,
                Ok(status) => {
                    PlaybackOutcome::Failed(format!("{} exited with {}", self.command, status))
                }
                Err(e) => PlaybackOutcome::Failed(e.to_string()),
            },
            _ = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to stop player");
                }
                PlaybackOutcome::Cancelled
            }
        }
    }
}

/// Handle to a running playback task.
#[derive(Debug)]
pub struct PlaybackHandle {
    path: PathBuf,
    cancel: CancellationToken,
    task: JoinHandle<PlaybackOutcome>,
}

impl PlaybackHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Request cancellation; [`wait`](Self::wait) then yields `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> PlaybackOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => PlaybackOutcome::Failed(format!("playback task failed: {}", e)),
        }
    }
}

pub fn spawn_playback(player: Arc<dyn AudioPlayer>, path: PathBuf) -> PlaybackHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task_path = path.clone();

    let task = tokio::spawn(async move {
        tracing::debug!(path = %task_path.display(), "playback started");
        let outcome = player.play(&task_path, token).await;
        tracing::debug!(path = %task_path.display(), ?outcome, "playback finished");
        outcome
    });

    PlaybackHandle { path, cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Player that "plays" for a fixed duration.
    struct TimedPlayer(Duration);

    #[async_trait]
    impl AudioPlayer for TimedPlayer {
        async fn play(&self, _path: &Path, cancel: CancellationToken) -> PlaybackOutcome {
            tokio::select! {
                _ = tokio::time::sleep(self.0) => PlaybackOutcome::Completed,
                _ = cancel.cancelled() => PlaybackOutcome::Cancelled,
            }
        }
    }

    #[tokio::test]
    async fn test_completes() {
        let h = spawn_playback(
            Arc::new(TimedPlayer(Duration::from_millis(5))),
            PathBuf::from("a.mp3"),
        );
        assert_eq!(h.path(), Path::new("a.mp3"));
        assert_eq!(h.wait().await, PlaybackOutcome::Completed);
    }

    #[tokio::test]
    async fn test_cancel() {
        let h = spawn_playback(
            Arc::new(TimedPlayer(Duration::from_secs(60))),
            PathBuf::from("a.mp3"),
        );
        assert!(!h.is_finished());
        h.cancel();
        assert_eq!(h.wait().await, PlaybackOutcome::Cancelled);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_player_outcomes() {
        let ok = CommandPlayer::new("true", vec![]);
        assert_eq!(
            ok.play(Path::new("x.mp3"), CancellationToken::new()).await,
            PlaybackOutcome::Completed
        );

        let bad = CommandPlayer::new("false", vec![]);
        assert!(matches!(
            bad.play(Path::new("x.mp3"), CancellationToken::new()).await,
            PlaybackOutcome::Failed(_)
        ));

        let missing = CommandPlayer::new("docent-no-such-player", vec![]);
        assert!(matches!(
            missing.play(Path::new("x.mp3"), CancellationToken::new()).await,
            PlaybackOutcome::Failed(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_player_cancel_kills_process() {
        let player = CommandPlayer::new(
            "sh",
            vec!["-c".to_string(), "sleep 30".to_string(), "sh".to_string()],
        );
        let h = spawn_playback(Arc::new(player), PathBuf::from("x.mp3"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(5), h.wait())
            .await
            .unwrap();
        assert_eq!(outcome, PlaybackOutcome::Cancelled);
    }
}
