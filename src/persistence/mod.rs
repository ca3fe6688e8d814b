//! # Parameter persistence
//!
//! Stores the tunable parameter mapping as a flat TOML table. Only keys the
//! current [`Params`](crate::config::Params) model recognizes are written;
//! unknown keys found on load are dropped.
//!
//! ## Failure policy
//! Loading never fails from the caller's point of view: a missing or malformed
//! file is reported as "no saved parameters". Saving reports success as a
//! plain boolean, and the caller decides what to do with a failed save (the
//! mode controller leaves configuration mode regardless).

use crate::config::Params;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const CONFIG_DIR: &str = "joymouse";
pub const CONFIG_FILE: &str = "joymouse_config.toml";

/// Flat parameter name → value mapping as found in the parameter file
pub type ParamMap = toml::Table;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read parameter file: {0}")]
    ReadError(String),

    #[error("Failed to parse parameter file: {0}")]
    ParseError(String),

    #[error("Failed to serialize parameters: {0}")]
    SerializeError(String),

    #[error("Failed to write parameter file: {0}")]
    WriteError(String),
}

/// Load/save interface for the tunable parameter mapping
pub trait ParameterStore {
    /// Returns the saved mapping and whether a usable file was found
    fn load(&self) -> (ParamMap, bool);

    /// Persists the recognized keys of `params`, returns false on failure
    fn save(&self, params: &ParamMap) -> bool;
}

/// Parameter file next to the user's other configuration
pub fn default_config_path() -> PathBuf {
    match dirs::config_dir() {
        Some(mut base) => {
            base.push(CONFIG_DIR);
            base.push(CONFIG_FILE);
            base
        }
        None => {
            warn!("No configuration directory available, using working directory");
            PathBuf::from(CONFIG_FILE)
        }
    }
}

/// Keeps only the keys the parameter model knows about
pub fn recognized_only(params: &ParamMap) -> ParamMap {
    let known = Params::recognized_keys();
    params
        .iter()
        .filter(|(key, _)| {
            let keep = known.contains(key);
            if !keep {
                debug!("Dropping unrecognized parameter key: {}", key);
            }
            keep
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// TOML file backed [`ParameterStore`]
#[derive(Clone, Debug)]
pub struct TomlParameterStore {
    path: PathBuf,
}

impl TomlParameterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no file exists yet
    pub fn try_load(&self) -> Result<Option<ParamMap>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::ReadError(format!("{}: {}", self.path.display(), e)))?;
        let table: ParamMap = toml::from_str(&content)
            .map_err(|e| StoreError::ParseError(format!("{}: {}", self.path.display(), e)))?;

        Ok(Some(recognized_only(&table)))
    }

    pub fn try_save(&self, params: &ParamMap) -> Result<(), StoreError> {
        let saveable = recognized_only(params);
        let content = toml::to_string_pretty(&saveable)
            .map_err(|e| StoreError::SerializeError(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError::WriteError(format!("{}: {}", parent.display(), e))
                })?;
            }
        }

        fs::write(&self.path, content)
            .map_err(|e| StoreError::WriteError(format!("{}: {}", self.path.display(), e)))
    }
}

impl ParameterStore for TomlParameterStore {
    fn load(&self) -> (ParamMap, bool) {
        match self.try_load() {
            Ok(Some(table)) => {
                info!("Using parameter file {}", self.path.display());
                (table, true)
            }
            Ok(None) => {
                debug!("No parameter file at {}", self.path.display());
                (ParamMap::new(), false)
            }
            Err(e) => {
                warn!("Ignoring parameter file: {}", e);
                (ParamMap::new(), false)
            }
        }
    }

    fn save(&self, params: &ParamMap) -> bool {
        match self.try_save(params) {
            Ok(()) => {
                info!("Parameters saved to {}", self.path.display());
                true
            }
            Err(e) => {
                error!("Saving parameters failed: {}", e);
                false
            }
        }
    }
}
