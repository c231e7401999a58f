use crate::common::GridSpec;
use crate::common::constants::GRID_ENDPOINT_TOLERANCE;
use crate::domain::ChiError;

/// Upper bound on canonical grid size; anything larger is a misconfigured step.
pub const MAX_GRID_POINTS: usize = 10_000_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("k grid bounds must be finite, got k_min={k_min}, k_max={k_max}")]
    NonFiniteBounds { k_min: f64, k_max: f64 },
    #[error("k_step must be finite and > 0, got {value}")]
    InvalidStep { value: f64 },
    #[error("k_max must be >= k_min, got k_min={k_min}, k_max={k_max}")]
    InvertedBounds { k_min: f64, k_max: f64 },
    #[error("k grid would hold {count} points, limit is {limit}")]
    TooManyPoints { count: f64, limit: usize },
}

impl From<GridError> for ChiError {
    fn from(error: GridError) -> Self {
        let placeholder = match error {
            GridError::NonFiniteBounds { .. } => "CONFIG.K_BOUNDS",
            GridError::InvalidStep { .. } => "CONFIG.K_STEP",
            GridError::InvertedBounds { .. } => "CONFIG.K_RANGE",
            GridError::TooManyPoints { .. } => "CONFIG.K_POINTS",
        };
        ChiError::configuration(placeholder, error.to_string())
    }
}

/// Uniform k axis `k_min, k_min + step, ...` whose last point is the first
/// one at or beyond `k_max`.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalGrid {
    points: Vec<f64>,
}

impl CanonicalGrid {
    pub fn from_spec(spec: GridSpec) -> Result<Self, GridError> {
        let GridSpec {
            k_min,
            k_max,
            k_step,
        } = spec;

        if !k_min.is_finite() || !k_max.is_finite() {
            return Err(GridError::NonFiniteBounds { k_min, k_max });
        }
        if !k_step.is_finite() || k_step <= 0.0 {
            return Err(GridError::InvalidStep { value: k_step });
        }
        if k_max < k_min {
            return Err(GridError::InvertedBounds { k_min, k_max });
        }

        let span = (k_max - k_min) / k_step;
        let steps = if (span - span.round()).abs() <= GRID_ENDPOINT_TOLERANCE * span.max(1.0) {
            span.round()
        } else {
            span.ceil()
        };
        if !steps.is_finite() || steps + 1.0 > MAX_GRID_POINTS as f64 {
            return Err(GridError::TooManyPoints {
                count: steps + 1.0,
                limit: MAX_GRID_POINTS,
            });
        }

        let count = steps as usize + 1;
        let points = (0..count)
            .map(|index| k_min + k_step * index as f64)
            .collect();

        Ok(Self { points })
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
