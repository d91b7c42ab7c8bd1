use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::debug::{DebugRecorder, DEFAULT_CAPACITY};
use crate::core::error::{Result, WalkthroughError};
use crate::core::options::WalkthroughOptions;
use crate::core::route::RouteMode;

/// Top-level walkthrough configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkthroughConfig {
    /// Defaults applied to every engine built from this config.
    pub options: WalkthroughOptions,
    pub debug: DebugConfig,
    pub route: RouteConfig,
}

/// Debug recorder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Record events even without the runtime debug flag.
    pub enabled: bool,
    /// Ring buffer size.
    pub capacity: usize,
}

/// Route runner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub mode: RouteMode,
    /// Tour module loaded before matching, if any.
    pub module: Option<String>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl WalkthroughConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| WalkthroughError::Config(e.to_string()))
    }

    /// Load configuration from `path`.
    /// Returns `Default` if the file is missing or unparseable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded walkthrough config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => {
                log::debug!("No walkthrough config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Recorder sized by this config; enabled by config or by the runtime flag.
    pub fn debug_recorder(&self) -> DebugRecorder {
        let recorder = DebugRecorder::with_capacity(self.debug.capacity);
        if self.debug.enabled || DebugRecorder::from_env().is_enabled() {
            recorder.enable();
        }
        recorder
    }
}
