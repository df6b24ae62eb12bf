//! FILENAME: core/engine/src/config.rs
//! PURPOSE: Engine configuration: calculation mode and evaluation limits.
//! CONTEXT: Hosts construct this directly or read it from JSON. Every field has
//! a default, so an empty JSON object is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

/// Whether edits trigger recalculation immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationMode {
    /// Every `set_cell` recalculates the affected cells before returning.
    #[default]
    Automatic,
    /// Edits only maintain dependency edges; values refresh on `calculate_now`.
    Manual,
}

impl CalculationMode {
    /// Parses the user-facing mode name ("automatic" / "manual"), ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "automatic" => Some(CalculationMode::Automatic),
            "manual" => Some(CalculationMode::Manual),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CalculationMode::Automatic => "automatic",
            CalculationMode::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub calculation_mode: CalculationMode,

    /// Deepest chain of formula-inside-formula evaluation allowed before the
    /// chain is cut off and treated like a circular reference.
    pub max_nesting_depth: usize,

    /// Extra fixed-point passes granted to a full recalculation on top of
    /// `formula count + 1`.
    pub pass_limit_slack: usize,
}

pub const DEFAULT_MAX_NESTING_DEPTH: usize = 256;

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            calculation_mode: CalculationMode::Automatic,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            pass_limit_slack: 0,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        log_debug!("CONFIG", "loaded {:?}", config);
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
