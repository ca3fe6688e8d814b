use super::{OutputSink, SinkError};
use crate::mapping::Action;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const OUTPUT_QUEUE_CAPACITY: usize = 64;

/// Bounded action queue between the control loop and the output worker
///
/// Backed by a broadcast ring buffer: pushing never waits, and once the
/// worker falls `capacity` actions behind the oldest ones are overwritten.
#[derive(Debug, Clone)]
pub struct OutputQueue {
    sender: broadcast::Sender<Action>,
}

impl OutputQueue {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Action>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Queues the injected actions of one tick, preserving their order
    ///
    /// Returns how many actions were queued.
    pub fn push_batch(&self, actions: &[Action]) -> Result<usize, SinkError> {
        let mut queued = 0;
        for action in actions.iter().filter(|a| a.is_injected()) {
            self.sender
                .send(action.clone())
                .map_err(|e| SinkError::QueueError(format!("no output worker: {}", e)))?;
            queued += 1;
        }
        Ok(queued)
    }
}

/// Executes queued actions until every queue handle is dropped
///
/// Returns the number of actions handed to the sink.
pub async fn run_output_worker(
    mut sink: Box<dyn OutputSink>,
    mut receiver: broadcast::Receiver<Action>,
) -> usize {
    let mut executed = 0;
    loop {
        match receiver.recv().await {
            Ok(action) => {
                if let Err(e) = sink.execute(&action).await {
                    warn!("Failed to execute {:?}: {}", action, e);
                }
                executed += 1;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Output worker lagged; dropped {} actions", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Output queue closed");
                break;
            }
        }
    }
    info!("Output worker stopped after {} actions", executed);
    executed
}

pub fn spawn_output_worker(
    sink: Box<dyn OutputSink>,
    receiver: broadcast::Receiver<Action>,
) -> JoinHandle<usize> {
    tokio::spawn(run_output_worker(sink, receiver))
}
