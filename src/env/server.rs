//! Game server processes for live runs.
//!
//! When a game has a `server_command`, the evaluation starts the server
//! itself instead of expecting one to be listening already. The process gets
//! `PORT`, `GAME_ID` and `GAME_DATA_DIR` in its environment and writes
//! stdout and stderr to `<game dir>/game_server.log`.
//!
//! Shutdown asks the server to terminate and kills it if it is still running
//! after the configured timeout. A server that exits on its own before
//! shutdown has crashed.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::game::Game;

/// A running game server process.
#[derive(Debug)]
pub struct GameServer {
    game: Game,
    child: Child,
    port: u16,
    log_path: PathBuf,
    shutdown_timeout: Duration,
}

impl GameServer {
    pub const LOG_FILE: &'static str = "game_server.log";

    /// Spawn `command` (program first) for `game` and wait out the startup
    /// grace period. Fails if the process cannot start or exits during it.
    pub async fn launch(
        game: Game,
        command: &[String],
        port: u16,
        data_dir: &Path,
        config: &ServerConfig,
    ) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .with_context(|| format!("{game}: server_command is empty"))?;

        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        let log_path = data_dir.join(Self::LOG_FILE);
        let stdout = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create {}", log_path.display()))?;
        let stderr = stdout
            .try_clone()
            .context("Failed to share the server log handle")?;

        let child = Command::new(program)
            .args(args)
            .env("PORT", port.to_string())
            .env("GAME_ID", game.as_str())
            .env("GAME_DATA_DIR", data_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {game} server ({program})"))?;

        info!(
            %game,
            port,
            pid = child.id(),
            log = %log_path.display(),
            "launched game server"
        );

        let mut server = Self {
            game,
            child,
            port,
            log_path,
            shutdown_timeout: config.shutdown_timeout(),
        };
        tokio::time::sleep(config.startup_grace()).await;
        server.check_alive()?;
        Ok(server)
    }

    pub fn game(&self) -> Game {
        self.game
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Fails when the process has already exited.
    pub fn check_alive(&mut self) -> Result<()> {
        let status = self
            .child
            .try_wait()
            .with_context(|| format!("Failed to poll {} server", self.game))?;
        match status {
            None => Ok(()),
            Some(status) => anyhow::bail!(
                "{} server exited with {status} (see {})",
                self.game,
                self.log_path.display()
            ),
        }
    }

    /// Stop the server and return its exit status.
    pub async fn shutdown(mut self) -> Result<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            return Ok(status);
        }

        self.terminate().await;
        match tokio::time::timeout(self.shutdown_timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status
                    .with_context(|| format!("Failed to wait for {} server", self.game))?;
                info!(game = %self.game, %status, "game server stopped");
                Ok(status)
            }
            Err(_) => {
                warn!(game = %self.game, "game server ignored terminate; killing");
                self.child
                    .kill()
                    .await
                    .with_context(|| format!("Failed to kill {} server", self.game))?;
                self.child
                    .wait()
                    .await
                    .with_context(|| format!("Failed to reap {} server", self.game))
            }
        }
    }

    /// Ask the process to exit. tokio only delivers SIGKILL, so SIGTERM goes
    /// through `kill(1)`.
    #[cfg(unix)]
    async fn terminate(&mut self) {
        let Some(pid) = self.child.id() else {
            return;
        };
        let pid = pid.to_string();
        let sent = Command::new("kill")
            .args(["-TERM", pid.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if !matches!(sent, Ok(status) if status.success()) {
            warn!(game = %self.game, %pid, "could not send SIGTERM");
        }
    }

    #[cfg(not(unix))]
    async fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!(game = %self.game, error = %e, "could not stop game server");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    fn fast() -> ServerConfig {
        ServerConfig {
            startup_grace_ms: 100,
            shutdown_timeout_ms: 300,
        }
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("orak-server-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn launch_passes_environment_and_logs_output() {
        let dir = temp_dir();
        let command = sh("echo \"$GAME_ID on $PORT\"; exec sleep 30");
        let mut server = GameServer::launch(Game::SuperMario, &command, 4993, &dir, &fast())
            .await
            .unwrap();

        assert!(server.check_alive().is_ok());
        let status = server.shutdown().await.unwrap();
        assert!(!status.success());

        let log = std::fs::read_to_string(dir.join(GameServer::LOG_FILE)).unwrap();
        assert!(log.contains("super_mario on 4993"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn crash_during_startup_is_an_error() {
        let dir = temp_dir();
        let command = sh("echo boom >&2; exit 3");
        let err = GameServer::launch(Game::StarCraft, &command, 4994, &dir, &fast())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("exited"));
        let log = std::fs::read_to_string(dir.join(GameServer::LOG_FILE)).unwrap();
        assert!(log.contains("boom"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn stubborn_server_is_killed() {
        let dir = temp_dir();
        let command = sh("trap '' TERM; exec sleep 30");
        let server = GameServer::launch(Game::PokemonRed, &command, 4995, &dir, &fast())
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let status = server.shutdown().await.unwrap();

        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let err = GameServer::launch(Game::PokemonRed, &[], 4996, &temp_dir(), &fast())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("server_command is empty"));
    }
}
