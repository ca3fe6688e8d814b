use crate::config::{ConfigParameter, Params, CONFIG_ITEMS};
use crate::persistence::ParameterStore;
use std::fmt;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Config,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => write!(f, "NORMAL"),
            Mode::Config => write!(f, "CONFIG"),
        }
    }
}

/// Two-state mode machine plus the configuration menu cursor
///
/// The selection survives leaving and re-entering configuration mode.
#[derive(Debug)]
pub struct ModeController {
    mode: Mode,
    selection: usize,
    items: &'static [ConfigParameter],
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeController {
    pub fn new() -> Self {
        Self {
            mode: Mode::Normal,
            selection: 0,
            items: &CONFIG_ITEMS,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn selection(&self) -> usize {
        self.selection
    }

    pub fn selected(&self) -> &'static ConfigParameter {
        &self.items[self.selection]
    }

    /// Flips between normal and configuration mode
    pub fn toggle(&mut self) -> Mode {
        self.mode = match self.mode {
            Mode::Normal => Mode::Config,
            Mode::Config => Mode::Normal,
        };
        info!("Switched to {} mode", self.mode);
        self.mode
    }

    pub fn select_next(&mut self) -> usize {
        self.selection = (self.selection + 1) % self.items.len();
        self.selection
    }

    pub fn select_previous(&mut self) -> usize {
        self.selection = (self.selection + self.items.len() - 1) % self.items.len();
        self.selection
    }

    /// Persists `params` and returns to normal mode
    ///
    /// The mode change happens whether or not the save succeeded; the return
    /// value only reports the save.
    pub fn save_and_exit(&mut self, store: &dyn ParameterStore, params: &Params) -> bool {
        let saved = match params.to_table() {
            Ok(table) => store.save(&table),
            Err(e) => {
                error!("Failed to serialize parameters: {}", e);
                false
            }
        };
        self.mode = Mode::Normal;
        info!("Left CONFIG mode (saved: {})", saved);
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::ParamMap;
    use std::cell::RefCell;

    struct RecordingStore {
        succeed: bool,
        saved: RefCell<Vec<ParamMap>>,
    }

    impl ParameterStore for RecordingStore {
        fn load(&self) -> (ParamMap, bool) {
            (ParamMap::new(), false)
        }

        fn save(&self, params: &ParamMap) -> bool {
            self.saved.borrow_mut().push(params.clone());
            self.succeed
        }
    }

    #[test]
    fn toggle_is_symmetric() {
        let mut modes = ModeController::new();
        assert_eq!(modes.mode(), Mode::Normal);
        assert_eq!(modes.toggle(), Mode::Config);
        assert_eq!(modes.toggle(), Mode::Normal);
    }

    #[test]
    fn selection_wraps_both_ways() {
        let mut modes = ModeController::new();
        let len = CONFIG_ITEMS.len();
        assert_eq!(modes.select_previous(), len - 1);
        assert_eq!(modes.select_next(), 0);
        for _ in 0..len {
            modes.select_next();
        }
        assert_eq!(modes.selection(), 0);
        assert_eq!(modes.selected().name, "sensitivity");
    }

    #[test]
    fn save_returns_to_normal_even_on_failure() {
        let store = RecordingStore {
            succeed: false,
            saved: RefCell::new(Vec::new()),
        };
        let mut modes = ModeController::new();
        modes.toggle();

        assert!(!modes.save_and_exit(&store, &Params::default()));
        assert_eq!(modes.mode(), Mode::Normal);
        assert_eq!(store.saved.borrow().len(), 1);
    }

    #[test]
    fn save_persists_current_values() {
        let store = RecordingStore {
            succeed: true,
            saved: RefCell::new(Vec::new()),
        };
        let mut params = Params::default();
        params.friction = 0.8;
        let mut modes = ModeController::new();
        modes.toggle();

        assert!(modes.save_and_exit(&store, &params));
        let saved = store.saved.borrow();
        assert_eq!(saved[0].get("friction"), Some(&toml::Value::Float(0.8)));
    }
}
