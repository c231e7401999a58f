pub mod config;
pub mod constants;

pub use config::{
    AggregationConfig, ConfigLoadError, GridSpec, InsufficientDataPolicy,
    load_aggregation_config,
};
