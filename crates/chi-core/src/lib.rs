//! Resampling and aggregation of per-path EXAFS chi(k) signals.
//!
//! Signals stored on heterogeneous k grids are interpolated onto one canonical
//! grid and combined either directly (sum or average) or with the two-level
//! policy that sums the paths of each absorbing atom before averaging atoms.

pub mod common;
pub mod domain;
pub mod modules;
pub mod numerics;
pub mod store;
