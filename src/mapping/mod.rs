//! Mode-aware interpretation of conditioned input
//!
//! The same raw input stream means different things depending on the mode:
//! in normal mode the stick drives the pointer and buttons emit clicks and
//! media keys; in configuration mode the pad walks and edits the parameter
//! menu. The engine ties one tick together and produces an ordered list of
//! [`Action`]s.

pub mod dispatcher;
pub mod engine;
pub mod mode;

pub use dispatcher::ActionDispatcher;
pub use engine::{ControlLoop, LoopContext, LoopState, TickOutput, TickScheduler};
pub use mode::{Mode, ModeController};

/// Linux key code for mute
pub const KEY_MUTE: u16 = 113;
/// Linux key code for play/pause
pub const KEY_PLAY_PAUSE: u16 = 164;
/// ydotool click code: right button down and up
pub const CLICK_RIGHT: u8 = 0xC1;
/// ydotool click code: left button down
pub const CLICK_LEFT_DOWN: u8 = 0x40;
/// ydotool click code: left button up
pub const CLICK_LEFT_UP: u8 = 0x80;

/// One output of a tick, in emission order
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Relative pointer motion in pixels
    Move { dx: i32, dy: i32 },
    Click { code: u8 },
    DragBegin,
    DragEnd,
    /// Press and release of a key code
    KeyTap { code: u16 },
    /// A menu parameter changed value
    AdjustParameter { name: &'static str, value: f64 },
}

impl Action {
    /// Whether the action has to reach the OS injection facility
    pub fn is_injected(&self) -> bool {
        !matches!(self, Action::AdjustParameter { .. })
    }
}
