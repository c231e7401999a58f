pub mod aggregate;
pub mod combine;
pub mod grouping;
pub mod resample;
pub mod serialization;
mod traits;

pub use aggregate::{
    MultipathSelection, average_multipath, average_signals, combine_signals, multipath_queries,
    paths_with_signals, sum_signals,
};
pub use grouping::{
    GroupingRoute, grouped_average_by_ids, grouped_average_by_queries, grouped_average_by_query,
    grouped_average_via, partition_by_group, sum_within_groups_then_average,
};
pub use resample::{OUT_OF_RANGE_FILL, ResampledSet, resample, resample_all};
pub use traits::{PathCatalog, SelectionProvider};
