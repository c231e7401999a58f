pub mod grid;
pub mod spline;

pub use grid::{CanonicalGrid, GridError, MAX_GRID_POINTS};
pub use spline::{CubicSpline, SplineError};
