//! ydotool backed injection and lifecycle of the `ydotoold` helper

use super::{OutputSink, SinkError};
use crate::mapping::{CLICK_LEFT_DOWN, CLICK_LEFT_UP};
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const HELPER_STARTUP_DELAY: Duration = Duration::from_millis(2200);
pub const HELPER_TERMINATE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("Failed to spawn helper: {0}")]
    SpawnError(String),

    #[error("Failed to signal helper: {0}")]
    SignalError(String),

    #[error("Failed to kill helper: {0}")]
    KillError(String),
}

/// Arguments of a key press followed by its release
pub fn key_tap_args(code: u16) -> Vec<String> {
    vec![
        "key".to_string(),
        format!("{}:1", code),
        format!("{}:0", code),
    ]
}

pub fn click_args(code: u8) -> Vec<String> {
    vec!["click".to_string(), format!("0x{:02X}", code)]
}

/// Arguments for a relative move, `None` when there is nothing to move
pub fn move_args(dx: i32, dy: i32) -> Option<Vec<String>> {
    if dx == 0 && dy == 0 {
        return None;
    }
    Some(vec![
        "mousemove".to_string(),
        "-x".to_string(),
        dx.to_string(),
        "-y".to_string(),
        dy.to_string(),
    ])
}

/// [`OutputSink`] that shells out to the `ydotool` client
#[derive(Debug, Clone)]
pub struct YdotoolSink {
    program: String,
}

impl Default for YdotoolSink {
    fn default() -> Self {
        Self::new("ydotool")
    }
}

impl YdotoolSink {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<(), SinkError> {
        let status = Command::new(&self.program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| SinkError::CommandError(format!("{} {}: {}", self.program, args.join(" "), e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(SinkError::ExitStatusError(format!(
                "{} {} exited with {}",
                self.program,
                args.join(" "),
                status
            )))
        }
    }
}

#[async_trait]
impl OutputSink for YdotoolSink {
    async fn move_pointer(&mut self, dx: i32, dy: i32) -> Result<(), SinkError> {
        match move_args(dx, dy) {
            Some(args) => self.run(&args).await,
            None => Ok(()),
        }
    }

    async fn click(&mut self, code: u8) -> Result<(), SinkError> {
        self.run(&click_args(code)).await
    }

    async fn drag_begin(&mut self) -> Result<(), SinkError> {
        self.run(&click_args(CLICK_LEFT_DOWN)).await
    }

    async fn drag_end(&mut self) -> Result<(), SinkError> {
        self.run(&click_args(CLICK_LEFT_UP)).await
    }

    async fn key_tap(&mut self, code: u16) -> Result<(), SinkError> {
        self.run(&key_tap_args(code)).await
    }
}

/// The injection helper process, if one was started
#[derive(Debug)]
pub struct HelperDaemon {
    command: String,
    child: Option<Child>,
}

impl HelperDaemon {
    pub fn disabled() -> Self {
        Self {
            command: String::new(),
            child: None,
        }
    }

    /// Starts `command` (program and whitespace separated arguments) with its
    /// output discarded and waits `startup_delay`
    ///
    /// The wait ends early when `shutdown` is cancelled; the daemon is still
    /// returned so the caller can stop it. A daemon dropped without
    /// [`HelperDaemon::shutdown`] kills its child.
    pub async fn spawn(
        command: &str,
        startup_delay: Duration,
        shutdown: &CancellationToken,
    ) -> Result<Self, HelperError> {
        info!("Starting injection helper: {}", command);
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| HelperError::SpawnError("empty helper command".to_string()))?;
        let child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HelperError::SpawnError(format!("{}: {}", command, e)))?;

        debug!("Helper pid {:?}, waiting {:?}", child.id(), startup_delay);
        tokio::select! {
            _ = shutdown.cancelled() => info!("Shutdown requested during helper startup"),
            _ = tokio::time::sleep(startup_delay) => {}
        }

        Ok(Self {
            command: command.to_string(),
            child: Some(child),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.child.is_some()
    }

    /// SIGTERM, a bounded wait, then SIGKILL
    ///
    /// Failures are logged; calling it again is a no-op.
    pub async fn shutdown(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match terminate(&mut child, HELPER_TERMINATE_TIMEOUT).await {
            Ok(()) => info!("Injection helper {} stopped", self.command),
            Err(e) => error!("Failed to stop injection helper {}: {}", self.command, e),
        }
    }
}

async fn terminate(child: &mut Child, timeout: Duration) -> Result<(), HelperError> {
    if let Ok(Some(status)) = child.try_wait() {
        debug!("Helper already exited with {}", status);
        return Ok(());
    }

    let Some(pid) = child.id() else {
        return Ok(());
    };
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .map_err(|e| HelperError::SignalError(e.to_string()))?;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            debug!("Helper exited with {}", status);
            Ok(())
        }
        Ok(Err(e)) => Err(HelperError::SignalError(e.to_string())),
        Err(_) => {
            warn!("Helper ignored SIGTERM for {:?}, killing it", timeout);
            child
                .kill()
                .await
                .map_err(|e| HelperError::KillError(e.to_string()))
        }
    }
}
