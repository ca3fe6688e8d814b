//! Controller subsystem for gamepad input handling
//!
//! Implements the input side of the control loop:
//!
//! 1. [`sample_source`] - Per-tick device snapshot (gilrs backed)
//! 2. [`conditioner`] - Deadzone filtering and velocity integration
//! 3. [`edge_detector`] - Rising edges for buttons, change detection for the pad
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► SampleSource ──► DeviceSnapshot ──┬──► InputConditioner ──► pixel delta
//!                                               └──► EdgeDetector ──────► one-shot events
//! ```
//!
//! Everything here is owned by the control loop and runs on its task; none of
//! these types are shared across threads.

pub mod conditioner;
pub mod edge_detector;
pub mod sample_source;

pub use conditioner::{InputConditioner, VelocityState};
pub use edge_detector::{ControlId, EdgeDetector, PadChangeDetector, PadDirection, PadGate};
pub use sample_source::{DeviceSnapshot, GilrsSource, SampleSource};
