//! Tunable parameters, command line surface and startup precedence
//!
//! [`Params`] is used three ways: as the clap argument group (one flag per
//! parameter), as the serde model of the persisted parameter file, and as the
//! live value mapping the control loop reads every tick.
//!
//! Startup precedence is fixed: built-in defaults < command line < parameter
//! file. The file is consulted once, at process start.

use crate::persistence::{ParamMap, ParameterStore};
use clap::{Args, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const DEFAULT_SENSITIVITY: f64 = 1.2;
pub const DEFAULT_DEADZONE: f64 = 0.07;
pub const DEFAULT_MAX_VELOCITY: f64 = 13.0;
pub const DEFAULT_FRICTION: f64 = 0.6;
pub const DEFAULT_ACCELERATION: f64 = 10.0;
pub const DEFAULT_FPS: u32 = 144;
pub const DEFAULT_PAD_DEBOUNCE_MS: u64 = 180;

/// Command line of the `joymouse` binary
#[derive(Parser, Debug)]
#[command(
    name = "joymouse",
    version,
    about = "Drive the pointer and media keys from a gamepad"
)]
pub struct Cli {
    #[command(flatten)]
    pub params: Params,

    /// Parameter file to load at startup and write on save
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Do not spawn the input injection helper daemon
    #[arg(long)]
    pub no_helper: bool,

    /// Injection helper daemon to spawn
    #[arg(long, default_value = "ydotoold")]
    pub helper: String,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,
}

/// All tunable parameters with their current values
#[derive(Args, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Params {
    /// Pixels per tick per unit of velocity
    #[arg(long, default_value_t = DEFAULT_SENSITIVITY)]
    pub sensitivity: f64,

    /// Stick values below this magnitude are treated as zero
    #[arg(long, default_value_t = DEFAULT_DEADZONE)]
    pub deadzone: f64,

    /// Upper bound for the pointer velocity magnitude
    #[arg(long, default_value_t = DEFAULT_MAX_VELOCITY)]
    pub max_velocity: f64,

    /// Per-tick velocity decay factor
    #[arg(long, default_value_t = DEFAULT_FRICTION)]
    pub friction: f64,

    /// Velocity gained per tick at full stick deflection
    #[arg(long, default_value_t = DEFAULT_ACCELERATION)]
    pub acceleration: f64,

    /// Target tick rate of the control loop
    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    #[arg(long, default_value_t = 0)]
    pub joystick_index: usize,

    #[arg(long, default_value_t = 0)]
    pub mouse_x_axis: usize,

    #[arg(long, default_value_t = 1)]
    pub mouse_y_axis: usize,

    #[arg(long, default_value_t = 0)]
    pub btn_left_drag: usize,

    #[arg(long, default_value_t = 1)]
    pub btn_right_click: usize,

    #[arg(long, default_value_t = 2)]
    pub btn_mute: usize,

    #[arg(long, default_value_t = 3)]
    pub btn_play_pause: usize,

    #[arg(long, default_value_t = 6)]
    pub btn_stop_mouse: usize,

    #[arg(long, default_value_t = 5)]
    pub btn_resume_mouse: usize,

    /// Button toggling configuration mode
    #[arg(long, default_value_t = 10)]
    pub btn_enter_config: usize,

    /// Button saving the parameters and leaving configuration mode
    #[arg(long, default_value_t = 9)]
    pub btn_save_config: usize,

    /// Key code tapped for pad up (volume up)
    #[arg(long, default_value_t = 115)]
    pub hat_up_key: u16,

    /// Key code tapped for pad down (volume down)
    #[arg(long, default_value_t = 114)]
    pub hat_down_key: u16,

    /// Key code tapped for pad right (next song)
    #[arg(long, default_value_t = 163)]
    pub hat_right_key: u16,

    /// Key code tapped for pad left (previous song)
    #[arg(long, default_value_t = 165)]
    pub hat_left_key: u16,

    /// Minimum interval between accepted pad changes in configuration mode
    #[arg(long, default_value_t = DEFAULT_PAD_DEBOUNCE_MS)]
    pub pad_debounce_ms: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            deadzone: DEFAULT_DEADZONE,
            max_velocity: DEFAULT_MAX_VELOCITY,
            friction: DEFAULT_FRICTION,
            acceleration: DEFAULT_ACCELERATION,
            fps: DEFAULT_FPS,
            joystick_index: 0,
            mouse_x_axis: 0,
            mouse_y_axis: 1,
            btn_left_drag: 0,
            btn_right_click: 1,
            btn_mute: 2,
            btn_play_pause: 3,
            btn_stop_mouse: 6,
            btn_resume_mouse: 5,
            btn_enter_config: 10,
            btn_save_config: 9,
            hat_up_key: 115,
            hat_down_key: 114,
            hat_right_key: 163,
            hat_left_key: 165,
            pad_debounce_ms: DEFAULT_PAD_DEBOUNCE_MS,
        }
    }
}

impl Params {
    /// Current value of one of the menu-adjustable parameters
    pub fn value_of(&self, name: &str) -> Option<f64> {
        match name {
            "sensitivity" => Some(self.sensitivity),
            "deadzone" => Some(self.deadzone),
            "max_velocity" => Some(self.max_velocity),
            "friction" => Some(self.friction),
            "acceleration" => Some(self.acceleration),
            _ => None,
        }
    }

    /// Overwrites a menu-adjustable parameter, returns false for unknown names
    pub fn set_value(&mut self, name: &str, value: f64) -> bool {
        let slot = match name {
            "sensitivity" => &mut self.sensitivity,
            "deadzone" => &mut self.deadzone,
            "max_velocity" => &mut self.max_velocity,
            "friction" => &mut self.friction,
            "acceleration" => &mut self.acceleration,
            _ => return false,
        };
        *slot = value;
        true
    }

    pub fn to_table(&self) -> Result<ParamMap, toml::ser::Error> {
        match toml::Value::try_from(self)? {
            toml::Value::Table(table) => Ok(table),
            other => Err(serde::ser::Error::custom(format!(
                "parameters serialized to {} instead of a table",
                other.type_str()
            ))),
        }
    }

    pub fn from_table(table: ParamMap) -> Result<Self, toml::de::Error> {
        toml::Value::Table(table).try_into()
    }

    /// Names of every key the parameter file may contain
    pub fn recognized_keys() -> Vec<String> {
        Params::default()
            .to_table()
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Applies recognized keys from `overrides` on top of `self`
    ///
    /// Unknown keys are ignored. A key whose value does not fit the
    /// parameter's type is skipped; the remaining keys still apply.
    /// Returns the merged parameters and the names of the applied keys.
    pub fn merged_with(&self, overrides: &ParamMap) -> (Params, Vec<String>) {
        let mut merged = self.clone();
        let mut applied = Vec::new();

        for (key, value) in overrides {
            let mut table = match merged.to_table() {
                Ok(table) => table,
                Err(e) => {
                    warn!("Failed to serialize parameters for merging: {}", e);
                    break;
                }
            };
            if !table.contains_key(key) {
                debug!("Ignoring unknown parameter key: {}", key);
                continue;
            }
            table.insert(key.clone(), value.clone());
            match Params::from_table(table) {
                Ok(params) => {
                    merged = params;
                    applied.push(key.clone());
                }
                Err(e) => warn!("Ignoring invalid value for {}: {}", key, e),
            }
        }

        (merged, applied)
    }
}

/// One entry of the configuration mode menu
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfigParameter {
    pub name: &'static str,
    pub step: f64,
    pub min: f64,
    pub max: f64,
    /// Decimals shown when the value is displayed
    pub precision: usize,
}

/// Menu order defines configuration mode navigation
pub const CONFIG_ITEMS: [ConfigParameter; 5] = [
    ConfigParameter {
        name: "sensitivity",
        step: 0.1,
        min: 0.1,
        max: 7.0,
        precision: 1,
    },
    ConfigParameter {
        name: "deadzone",
        step: 0.01,
        min: 0.0,
        max: 0.3,
        precision: 3,
    },
    ConfigParameter {
        name: "max_velocity",
        step: 1.0,
        min: 1.0,
        max: 30.0,
        precision: 0,
    },
    ConfigParameter {
        name: "friction",
        step: 0.1,
        min: 0.1,
        max: 1.0,
        precision: 1,
    },
    ConfigParameter {
        name: "acceleration",
        step: 0.1,
        min: 1.0,
        max: 20.0,
        precision: 1,
    },
];

impl ConfigParameter {
    /// Moves `value` one step up or down and clamps it into `[min, max]`
    ///
    /// Fractional steps round the result to two decimals so repeated
    /// adjustments do not accumulate float noise.
    pub fn apply_step(&self, value: f64, increase: bool) -> f64 {
        let delta = if increase { self.step } else { -self.step };
        let stepped = if self.step < 1.0 {
            ((value + delta) * 100.0).round() / 100.0
        } else {
            value + delta
        };
        stepped.clamp(self.min, self.max)
    }

    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.precision, value)
    }

    /// Human readable label, `max_velocity` becomes `Max Velocity`
    pub fn label(&self) -> String {
        self.name
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parameters in effect after startup
#[derive(Clone, Debug)]
pub struct StartupParams {
    pub params: Params,
    /// Whether a parameter file was found and used
    pub using_file: bool,
    pub applied_keys: Vec<String>,
}

/// Layers persisted values over the command line values
pub fn resolve_startup(cli_params: Params, store: &dyn ParameterStore) -> StartupParams {
    let (saved, found) = store.load();
    if !found {
        info!("No saved parameters found, using defaults and command line values");
        return StartupParams {
            params: cli_params,
            using_file: false,
            applied_keys: Vec::new(),
        };
    }

    let (params, applied_keys) = cli_params.merged_with(&saved);
    info!(
        "Loaded {} saved parameters: {}",
        applied_keys.len(),
        applied_keys.join(", ")
    );
    StartupParams {
        params,
        using_file: true,
        applied_keys,
    }
}
