//! Aggregation configuration: canonical k-grid window and the policy for
//! signals that are too short to interpolate.
//!
//! Configuration files are JSON with camelCase keys; every key is optional and
//! falls back to the defaults in [`super::constants`].

use super::constants::{DEFAULT_K_MAX, DEFAULT_K_MIN, DEFAULT_K_STEP};
use crate::domain::{ChiError, ChiResult};
use crate::numerics::CanonicalGrid;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridSpec {
    pub k_min: f64,
    pub k_max: f64,
    pub k_step: f64,
}

impl GridSpec {
    pub const fn new(k_min: f64, k_max: f64, k_step: f64) -> Self {
        Self {
            k_min,
            k_max,
            k_step,
        }
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::new(DEFAULT_K_MIN, DEFAULT_K_MAX, DEFAULT_K_STEP)
    }
}

/// What to do with a signal that cannot support cubic interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientDataPolicy {
    /// Abort the whole aggregation with an insufficient-data error.
    #[default]
    Fail,
    /// Drop the signal, log it and report it in the result.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregationConfig {
    pub grid: GridSpec,
    pub insufficient_data: InsufficientDataPolicy,
}

impl AggregationConfig {
    pub fn with_grid(mut self, grid: GridSpec) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_insufficient_data(mut self, policy: InsufficientDataPolicy) -> Self {
        self.insufficient_data = policy;
        self
    }

    /// Validates the grid window and materializes the canonical grid.
    pub fn canonical_grid(&self) -> ChiResult<CanonicalGrid> {
        CanonicalGrid::from_spec(self.grid).map_err(ChiError::from)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read aggregation config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse aggregation config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ConfigLoadError> for ChiError {
    fn from(error: ConfigLoadError) -> Self {
        let placeholder = match error {
            ConfigLoadError::Read { .. } => "CONFIG.READ",
            ConfigLoadError::Parse { .. } => "CONFIG.PARSE",
        };
        ChiError::configuration(placeholder, error.to_string())
    }
}

pub fn load_aggregation_config(
    config_path: impl AsRef<Path>,
) -> Result<AggregationConfig, ConfigLoadError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| ConfigLoadError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| ConfigLoadError::Parse {
        path: config_path.to_path_buf(),
        source,
    })
}
