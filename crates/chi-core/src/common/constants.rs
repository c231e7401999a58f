//! Defaults shared by the aggregation configuration and the command line.
//!
//! The k-grid defaults describe the usual EXAFS window in inverse angstrom.

pub const DEFAULT_K_MIN: f64 = 0.0;
pub const DEFAULT_K_MAX: f64 = 20.0;
pub const DEFAULT_K_STEP: f64 = 0.05;

/// A not-a-knot cubic spline needs four knots.
pub const MIN_SPLINE_POINTS: usize = 4;

/// Relative slack, in ulps, used when deciding whether `k_max` lands on a grid point.
pub const GRID_ENDPOINT_TOLERANCE: f64 = 4.0 * f64::EPSILON;
