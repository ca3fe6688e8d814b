use gilrs::{Axis, Button, EventType, Gamepad, Gilrs};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Logical button index → gilrs button, in the usual SDL order
pub const BUTTON_TABLE: [Button; 11] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
];

/// Logical axis index → gilrs axis
pub const AXIS_TABLE: [Axis; 6] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
];

const REINIT_INTERVAL: Duration = Duration::from_secs(1);

// Source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to initialize gamepad backend: {0}")]
    InitializationError(String),

    #[error("No gamepad connected at index {0}")]
    NoGamepadError(usize),
}

/// One tick worth of device state
///
/// Every accessor degrades to a neutral value (axis 0, button released,
/// centered pad) when the device is absent or the index is out of range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceSnapshot {
    pub connected: bool,
    pub name: Option<String>,
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
    pub hat: (i8, i8),
}

impl DeviceSnapshot {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn axis(&self, index: usize) -> f32 {
        if !self.connected {
            return 0.0;
        }
        self.axes.get(index).copied().unwrap_or(0.0)
    }

    pub fn button(&self, index: usize) -> bool {
        self.connected && self.buttons.get(index).copied().unwrap_or(false)
    }

    pub fn hat(&self) -> (i8, i8) {
        if self.connected {
            self.hat
        } else {
            (0, 0)
        }
    }

    pub fn button_count(&self) -> usize {
        if self.connected {
            self.buttons.len()
        } else {
            0
        }
    }

    /// Indices of all buttons currently held
    pub fn pressed_buttons(&self) -> Vec<usize> {
        (0..self.button_count())
            .filter(|&index| self.button(index))
            .collect()
    }
}

/// Per-tick device reader
///
/// `poll` is called once at the start of every tick and must re-check the
/// device, so a controller that was unplugged and plugged back in is picked
/// up again without a restart.
pub trait SampleSource {
    fn poll(&mut self) -> DeviceSnapshot;
}

/// Pad tuple from the four d-pad buttons, `y = 1` is up
pub fn hat_from_dpad(up: bool, down: bool, left: bool, right: bool) -> (i8, i8) {
    (right as i8 - left as i8, up as i8 - down as i8)
}

/// [`SampleSource`] backed by gilrs
pub struct GilrsSource {
    gilrs: Option<Gilrs>,
    joystick_index: usize,
    last_init_attempt: Instant,
    was_connected: bool,
}

impl GilrsSource {
    pub fn create(joystick_index: usize) -> Self {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                Some(g)
            }
            Err(e) => {
                warn!("Failed to initialize gilrs, retrying later: {}", e);
                None
            }
        };

        Self {
            gilrs,
            joystick_index,
            last_init_attempt: Instant::now(),
            was_connected: false,
        }
    }

    fn backend(&mut self) -> Result<&mut Gilrs, SourceError> {
        if self.gilrs.is_none() && self.last_init_attempt.elapsed() >= REINIT_INTERVAL {
            self.last_init_attempt = Instant::now();
            match Gilrs::new() {
                Ok(g) => {
                    info!("gilrs initialized after retry");
                    self.gilrs = Some(g);
                }
                Err(e) => debug!("gilrs still unavailable: {}", e),
            }
        }

        self.gilrs
            .as_mut()
            .ok_or_else(|| SourceError::InitializationError("gilrs unavailable".to_string()))
    }

    fn read_device(&mut self) -> Result<DeviceSnapshot, SourceError> {
        let joystick_index = self.joystick_index;
        let gilrs = self.backend()?;

        // Drain pending events so the cached gamepad state is current
        while let Some(event) = gilrs.next_event() {
            match event.event {
                EventType::Connected => info!("Controller connected: {}", event.id),
                EventType::Disconnected => warn!("Controller disconnected: {}", event.id),
                _ => {}
            }
        }

        let (_, gamepad) = gilrs
            .gamepads()
            .nth(joystick_index)
            .ok_or(SourceError::NoGamepadError(joystick_index))?;

        Ok(snapshot_of(&gamepad))
    }
}

fn snapshot_of(gamepad: &Gamepad<'_>) -> DeviceSnapshot {
    let axes = AXIS_TABLE
        .iter()
        .map(|&axis| {
            let value = gamepad.value(axis).clamp(-1.0, 1.0);
            // gilrs reports stick Y as positive-up, screen Y grows downwards
            match axis {
                Axis::LeftStickY | Axis::RightStickY => -value,
                _ => value,
            }
        })
        .collect();

    let buttons = BUTTON_TABLE
        .iter()
        .map(|&button| gamepad.is_pressed(button))
        .collect();

    let hat = hat_from_dpad(
        gamepad.is_pressed(Button::DPadUp),
        gamepad.is_pressed(Button::DPadDown),
        gamepad.is_pressed(Button::DPadLeft),
        gamepad.is_pressed(Button::DPadRight),
    );

    DeviceSnapshot {
        connected: gamepad.is_connected(),
        name: Some(gamepad.name().to_string()),
        axes,
        buttons,
        hat,
    }
}

impl SampleSource for GilrsSource {
    fn poll(&mut self) -> DeviceSnapshot {
        let snapshot = match self.read_device() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if self.was_connected {
                    warn!("Gamepad unavailable: {}", e);
                }
                DeviceSnapshot::disconnected()
            }
        };

        if snapshot.connected != self.was_connected {
            if snapshot.connected {
                info!(
                    "Gamepad {} active: {}",
                    self.joystick_index,
                    snapshot.name.as_deref().unwrap_or("unknown")
                );
            } else {
                warn!("Gamepad {} lost, reading neutral input", self.joystick_index);
            }
            self.was_connected = snapshot.connected;
        }

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(buttons: Vec<bool>, axes: Vec<f32>, hat: (i8, i8)) -> DeviceSnapshot {
        DeviceSnapshot {
            connected: true,
            name: Some("Test Pad".to_string()),
            axes,
            buttons,
            hat,
        }
    }

    #[test]
    fn disconnected_snapshot_is_neutral() {
        let mut snapshot = connected(vec![true; 4], vec![0.9; 2], (1, 0));
        snapshot.connected = false;

        assert_eq!(snapshot.axis(0), 0.0);
        assert!(!snapshot.button(0));
        assert_eq!(snapshot.hat(), (0, 0));
        assert_eq!(snapshot.button_count(), 0);
        assert!(snapshot.pressed_buttons().is_empty());
    }

    #[test]
    fn out_of_range_indices_are_neutral() {
        let snapshot = connected(vec![true], vec![0.5], (0, 1));
        assert!(snapshot.button(0));
        assert!(!snapshot.button(10));
        assert_eq!(snapshot.axis(0), 0.5);
        assert_eq!(snapshot.axis(3), 0.0);
        assert_eq!(snapshot.hat(), (0, 1));
    }

    #[test]
    fn pressed_buttons_lists_held_indices() {
        let snapshot = connected(vec![false, true, false, true], Vec::new(), (0, 0));
        assert_eq!(snapshot.pressed_buttons(), vec![1, 3]);
    }

    #[test]
    fn dpad_maps_to_pad_tuple() {
        assert_eq!(hat_from_dpad(false, false, false, false), (0, 0));
        assert_eq!(hat_from_dpad(true, false, false, false), (0, 1));
        assert_eq!(hat_from_dpad(false, true, false, false), (0, -1));
        assert_eq!(hat_from_dpad(false, false, true, false), (-1, 0));
        assert_eq!(hat_from_dpad(false, false, false, true), (1, 0));
        assert_eq!(hat_from_dpad(true, false, false, true), (1, 1));
    }

    #[test]
    fn default_bindings_fit_the_index_tables() {
        let params = crate::config::Params::default();
        for index in [
            params.btn_left_drag,
            params.btn_right_click,
            params.btn_mute,
            params.btn_play_pause,
            params.btn_stop_mouse,
            params.btn_resume_mouse,
            params.btn_enter_config,
            params.btn_save_config,
        ] {
            assert!(index < BUTTON_TABLE.len());
        }
        assert!(params.mouse_x_axis < AXIS_TABLE.len());
        assert!(params.mouse_y_axis < AXIS_TABLE.len());
    }
}
