//! Control loop with statum state machine for its lifecycle
//!
//! One tick reads the device, advances every piece of loop state and hands
//! the resulting actions to the output queue. All loop state lives in a
//! single [`LoopContext`] owned by the running loop.
//!
//! # State Machine
//!
//! ```text
//! Starting ──► Running ──► Stopping
//!   (start)      (shutdown token)   (finish → final parameters)
//! ```
//!
//! # Tick
//!
//! ```text
//! SampleSource ──► LoopContext::tick ──► TickOutput ──┬──► OutputQueue
//!                                                     ├──► ActivityLog
//!                                                     └──► StatusSnapshot (watch)
//! ```

use super::dispatcher::ActionDispatcher;
use super::mode::{Mode, ModeController};
use super::Action;
use crate::config::Params;
use crate::controller::{
    ControlId, DeviceSnapshot, EdgeDetector, InputConditioner, PadChangeDetector, PadDirection,
    PadGate, SampleSource, VelocityState,
};
use crate::output::OutputQueue;
use crate::persistence::ParameterStore;
use crate::status::{ActivityLog, StatusSnapshot};
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Failed to hand actions to output: {0}")]
    OutputError(String),
}

/// Everything one tick produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutput {
    /// Actions in emission order
    pub actions: Vec<Action>,
    /// Activity log messages
    pub notes: Vec<String>,
    /// Result of a save, when one was requested this tick
    pub saved: Option<bool>,
}

/// All mutable state carried from one tick to the next
#[derive(Debug)]
pub struct LoopContext {
    params: Params,
    conditioner: InputConditioner,
    edges: EdgeDetector,
    pad: PadChangeDetector,
    modes: ModeController,
    dispatcher: ActionDispatcher,
}

impl LoopContext {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            conditioner: InputConditioner::new(),
            edges: EdgeDetector::new(),
            pad: PadChangeDetector::new(),
            modes: ModeController::new(),
            dispatcher: ActionDispatcher::new(),
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn into_params(self) -> Params {
        self.params
    }

    pub fn mode(&self) -> Mode {
        self.modes.mode()
    }

    pub fn selection(&self) -> usize {
        self.modes.selection()
    }

    pub fn velocity(&self) -> VelocityState {
        self.conditioner.velocity()
    }

    pub fn motion_active(&self) -> bool {
        self.dispatcher.motion_active()
    }

    pub fn release_drag(&mut self) -> Option<Action> {
        self.dispatcher.release_drag()
    }

    /// Advances the loop state by one device sample
    ///
    /// A disconnected sample leaves every piece of state untouched and
    /// produces nothing.
    pub fn tick(
        &mut self,
        snapshot: &DeviceSnapshot,
        now: Instant,
        store: &dyn ParameterStore,
    ) -> TickOutput {
        let mut out = TickOutput::default();
        if !snapshot.is_connected() {
            return out;
        }

        if self.edges.edge(
            ControlId::ToggleConfig,
            snapshot.button(self.params.btn_enter_config),
        ) {
            let note = match self.modes.toggle() {
                Mode::Config => "CONFIG MODE",
                Mode::Normal => "NORMAL MODE",
            };
            out.notes.push(note.to_string());
        }

        match self.modes.mode() {
            Mode::Config => {
                let gate = PadGate::Debounced(Duration::from_millis(self.params.pad_debounce_ms));
                if let Some(direction) = self
                    .pad
                    .transition(snapshot.hat(), now, gate)
                    .and_then(PadDirection::from_hat)
                {
                    self.dispatcher.dispatch_config(
                        direction,
                        &mut self.modes,
                        &mut self.params,
                        &mut out,
                    );
                }

                if self.edges.edge(
                    ControlId::SaveConfig,
                    snapshot.button(self.params.btn_save_config),
                ) {
                    let saved = self.modes.save_and_exit(store, &self.params);
                    out.notes
                        .push(if saved { "SAVED CONFIG" } else { "SAVE FAILED" }.to_string());
                    out.saved = Some(saved);
                }
            }
            Mode::Normal => {
                let pad_change = self.pad.transition(snapshot.hat(), now, PadGate::Immediate);
                self.dispatcher.dispatch_normal(
                    snapshot,
                    pad_change,
                    &mut self.edges,
                    &mut self.conditioner,
                    &self.params,
                    &mut out,
                );
            }
        }

        out
    }
}

/// Fixed-rate tick source
///
/// A tick that runs late pushes the following ones back instead of
/// bursting to catch up.
#[derive(Debug)]
pub struct TickScheduler {
    interval: Interval,
    period: Duration,
}

impl TickScheduler {
    pub fn new(fps: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await.into_std()
    }
}

/// States for the control loop lifecycle using statum
#[state]
#[derive(Debug, Clone)]
pub enum LoopState {
    Starting, // Built, nothing published yet
    Running,  // Ticking at the target rate
    Stopping, // Shutdown requested, releasing held outputs
}

/// Control loop with compile-time lifecycle safety via statum
#[machine]
pub struct ControlLoop<S: LoopState> {
    context: LoopContext,
    source: Box<dyn SampleSource>,
    store: Box<dyn ParameterStore>,
    queue: OutputQueue,
    log: ActivityLog,
    status_tx: watch::Sender<StatusSnapshot>,
    using_file: bool,
    last_saved: Option<DateTime<Local>>,
    last_snapshot: DeviceSnapshot,
}

impl<S: LoopState> ControlLoop<S> {
    fn status(&self) -> StatusSnapshot {
        let snapshot = &self.last_snapshot;
        StatusSnapshot {
            connected: snapshot.is_connected(),
            device_name: snapshot.name.clone(),
            mode: self.context.mode(),
            selection: self.context.selection(),
            params: self.context.params().clone(),
            motion_active: self.context.motion_active(),
            speed: self.context.velocity().speed(),
            pressed_buttons: snapshot.pressed_buttons(),
            using_file: self.using_file,
            last_saved: self.last_saved,
            axes: [
                snapshot.axis(0),
                snapshot.axis(1),
                snapshot.axis(2),
                snapshot.axis(3),
            ],
            log: self.log.lines(),
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.status());
    }
}

impl ControlLoop<Starting> {
    pub fn create(
        params: Params,
        source: Box<dyn SampleSource>,
        store: Box<dyn ParameterStore>,
        queue: OutputQueue,
        status_tx: watch::Sender<StatusSnapshot>,
        using_file: bool,
    ) -> Self {
        info!("Initializing control loop at {} fps", params.fps);

        Self::new(
            LoopContext::new(params),
            source,
            store,
            queue,
            ActivityLog::new(),
            status_tx,
            using_file,
            None,                           // last_saved
            DeviceSnapshot::disconnected(), // last_snapshot
        )
    }

    pub fn start(mut self) -> ControlLoop<Running> {
        let params = self.context.params();
        info!(
            "Starting control loop (sensitivity {}, deadzone {}, max velocity {}, friction {}, acceleration {}, parameter file: {})",
            params.sensitivity,
            params.deadzone,
            params.max_velocity,
            params.friction,
            params.acceleration,
            self.using_file
        );
        let ready = format!("Ready – Btn{} = Config", params.btn_enter_config);
        self.log.add(&ready);
        self.publish_status();
        self.transition()
    }
}

impl ControlLoop<Running> {
    /// Runs one tick and queues its actions
    pub fn tick_once(&mut self, now: Instant) -> Result<TickOutput, LoopError> {
        let snapshot = self.source.poll();
        let out = self.context.tick(&snapshot, now, self.store.as_ref());

        for note in &out.notes {
            self.log.add(note);
        }
        if out.saved == Some(true) {
            self.last_saved = Some(Local::now());
        }
        self.last_snapshot = snapshot;
        self.publish_status();

        let queued = self
            .queue
            .push_batch(&out.actions)
            .map_err(|e| LoopError::OutputError(e.to_string()))?;
        if queued > 0 {
            debug!("Queued {} actions", queued);
        }
        Ok(out)
    }

    /// Ticks at the target rate until `shutdown` is cancelled
    ///
    /// Tick errors are logged and do not stop the loop.
    pub async fn run_until_shutdown(mut self, shutdown: CancellationToken) -> ControlLoop<Stopping> {
        let mut scheduler = TickScheduler::new(self.context.params().fps);
        info!("Control loop running, tick period {:?}", scheduler.period());

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received by control loop");
                    break;
                }

                now = scheduler.tick() => {
                    if let Err(e) = self.tick_once(now) {
                        error!("Error in control loop tick: {}", e);
                    }
                }
            }
        }

        info!("Transitioning to Stopping state");
        self.transition()
    }
}

impl ControlLoop<Stopping> {
    /// Releases a held drag and returns the final parameter values
    pub fn finish(mut self) -> Params {
        if let Some(action) = self.context.release_drag() {
            info!("Releasing active drag");
            if let Err(e) = self.queue.push_batch(&[action]) {
                warn!("Failed to release drag: {}", e);
            }
        }
        self.publish_status();
        info!("Control loop stopped");
        self.context.into_params()
    }
}
