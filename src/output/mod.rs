//! Output side of the control loop
//!
//! Actions leave the loop through a bounded [`queue::OutputQueue`] and are
//! executed by a single worker against an [`OutputSink`]. A slow or hung
//! injection call therefore only backs up the queue, never the tick.

pub mod queue;
pub mod ydotool;

use crate::mapping::Action;
use async_trait::async_trait;
use thiserror::Error;

pub use queue::{spawn_output_worker, OutputQueue, OUTPUT_QUEUE_CAPACITY};
pub use ydotool::{HelperDaemon, YdotoolSink};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to run injection command: {0}")]
    CommandError(String),

    #[error("Injection command failed: {0}")]
    ExitStatusError(String),

    #[error("Failed to queue actions: {0}")]
    QueueError(String),
}

/// OS input injection
///
/// Calls are fire-and-forget from the loop's point of view; the worker
/// only logs the returned error.
#[async_trait]
pub trait OutputSink: Send {
    async fn move_pointer(&mut self, dx: i32, dy: i32) -> Result<(), SinkError>;
    async fn click(&mut self, code: u8) -> Result<(), SinkError>;
    async fn drag_begin(&mut self) -> Result<(), SinkError>;
    async fn drag_end(&mut self) -> Result<(), SinkError>;
    async fn key_tap(&mut self, code: u16) -> Result<(), SinkError>;

    async fn execute(&mut self, action: &Action) -> Result<(), SinkError> {
        match action {
            Action::Move { dx, dy } => self.move_pointer(*dx, *dy).await,
            Action::Click { code } => self.click(*code).await,
            Action::DragBegin => self.drag_begin().await,
            Action::DragEnd => self.drag_end().await,
            Action::KeyTap { code } => self.key_tap(*code).await,
            Action::AdjustParameter { .. } => Ok(()),
        }
    }
}
