//! Engine configuration.
//!
//! Every field has a default, so partial JSON documents are accepted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::clear_pulse::DEFAULT_CLEAR_PULSE_MS;
use crate::cursor::DEFAULT_EASE;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-frame cursor easing factor in `(0,1]`.
    pub ease: f32,
    /// Length of the clear pulse in milliseconds.
    pub clear_pulse_ms: f64,
    /// Treat the platform as touch-first: continuous pointer movement is ignored.
    pub touch_platform: bool,
    /// Seed for the stop-event random draws. `None` seeds from the OS.
    pub seed: Option<u64>,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ease: DEFAULT_EASE,
            clear_pulse_ms: DEFAULT_CLEAR_PULSE_MS,
            touch_platform: false,
            seed: None,
            vertex_entry: "vs_main".to_string(),
            fragment_entry: "fs_main".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse engine config")
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        Self::from_json(&contents)
    }
}
