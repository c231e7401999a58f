//! Two-level aggregation: paths of one atom are summed, then the per-atom sums
//! are averaged with equal weight per atom.
//!
//! Three entry points differ only in how the (frame, atom) grouping is
//! obtained; they share [`sum_within_groups_then_average`] and therefore agree
//! on the same grouped selection.

use super::combine::{average, sum};
use super::resample::resample_all;
use super::traits::SelectionProvider;
use crate::common::AggregationConfig;
use crate::domain::{
    ChiResult, CombinedCurve, GroupKey, GroupedCurve, GroupedSelection, PathId, PathQuery,
};
use crate::numerics::CanonicalGrid;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// How the grouping step is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupingRoute {
    /// Flat id list grouped client-side after a key lookup.
    Ids,
    /// Provider-side grouping of one criteria set.
    Grouped,
    /// Provider-side grouping of the union of several criteria sets.
    Union,
}

impl GroupingRoute {
    pub const ALL: [GroupingRoute; 3] = [Self::Ids, Self::Grouped, Self::Union];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ids => "ids",
            Self::Grouped => "grouped",
            Self::Union => "union",
        }
    }
}

impl Display for GroupingRoute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Partitions ids by their group key. Ids without a key are dropped and
/// duplicate ids collapse into one.
pub fn partition_by_group(
    ids: &[PathId],
    keys: &HashMap<PathId, GroupKey>,
) -> GroupedSelection {
    let mut grouped = GroupedSelection::new();
    for id in ids {
        if let Some(key) = keys.get(id) {
            grouped.entry(*key).or_default().insert(*id);
        }
    }
    grouped
}

/// Core of every route: per group fetch, resample and SUM; then AVERAGE
/// across groups that produced a curve.
pub fn sum_within_groups_then_average<P>(
    provider: &P,
    selection: &GroupedSelection,
    grid: &CanonicalGrid,
    config: &AggregationConfig,
) -> ChiResult<Option<GroupedCurve>>
where
    P: SelectionProvider + ?Sized,
{
    tracing::info!(groups = selection.len(), "processing unique atoms");

    let mut group_sums = Vec::with_capacity(selection.len());
    let mut skipped = Vec::new();
    for (key, ids) in selection {
        let ids: Vec<PathId> = ids.iter().copied().collect();
        let signals = provider.fetch_signals(&ids)?;
        if signals.len() < ids.len() {
            tracing::warn!(
                group = %key,
                requested = ids.len(),
                found = signals.len(),
                "paths without chi data in group"
            );
        }

        let resampled = resample_all(signals.values(), grid, config.insufficient_data)?;
        skipped.extend(resampled.skipped);
        match sum(&resampled.curves)? {
            Some(group_sum) => group_sums.push(group_sum),
            None => tracing::debug!(group = %key, "group has no usable signals"),
        }
    }

    let Some(chi) = average(&group_sums)? else {
        return Ok(None);
    };
    tracing::info!(groups = group_sums.len(), "averaged atom sums");

    Ok(Some(GroupedCurve {
        curve: CombinedCurve::new(grid.points().to_vec(), chi),
        group_count: group_sums.len(),
        skipped,
    }))
}

/// Flat-id route: looks up each id's group key, partitions in memory, then
/// aggregates.
pub fn grouped_average_by_ids<P>(
    provider: &P,
    ids: &[PathId],
    config: &AggregationConfig,
) -> ChiResult<Option<GroupedCurve>>
where
    P: SelectionProvider + ?Sized,
{
    let grid = config.canonical_grid()?;
    if ids.is_empty() {
        return Ok(None);
    }

    let keys = provider.group_keys(ids)?;
    let selection = partition_by_group(ids, &keys);
    sum_within_groups_then_average(provider, &selection, &grid, config)
}

/// Single-criterion route: the provider groups the matches itself.
pub fn grouped_average_by_query<P>(
    provider: &P,
    query: &PathQuery,
    config: &AggregationConfig,
) -> ChiResult<Option<GroupedCurve>>
where
    P: SelectionProvider + ?Sized,
{
    let grid = config.canonical_grid()?;
    let selection = provider.resolve_grouped(query)?;
    sum_within_groups_then_average(provider, &selection, &grid, config)
}

/// Multi-criterion route: the provider unions the matches of every query
/// (deduplicated) and groups them.
pub fn grouped_average_by_queries<P>(
    provider: &P,
    queries: &[PathQuery],
    config: &AggregationConfig,
) -> ChiResult<Option<GroupedCurve>>
where
    P: SelectionProvider + ?Sized,
{
    let grid = config.canonical_grid()?;
    if queries.is_empty() {
        return Ok(None);
    }

    let selection = provider.resolve_grouped_union(queries)?;
    sum_within_groups_then_average(provider, &selection, &grid, config)
}

/// Runs the two-level policy for one criteria set through the chosen route.
pub fn grouped_average_via<P>(
    provider: &P,
    query: &PathQuery,
    route: GroupingRoute,
    config: &AggregationConfig,
) -> ChiResult<Option<GroupedCurve>>
where
    P: SelectionProvider + ?Sized,
{
    match route {
        GroupingRoute::Ids => {
            config.canonical_grid()?;
            let ids: Vec<PathId> = provider
                .resolve_flat(query)?
                .into_iter()
                .map(|(id, _)| id)
                .collect();
            grouped_average_by_ids(provider, &ids, config)
        }
        GroupingRoute::Grouped => grouped_average_by_query(provider, query, config),
        GroupingRoute::Union => {
            grouped_average_by_queries(provider, std::slice::from_ref(query), config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        GroupingRoute, grouped_average_by_ids, grouped_average_by_queries,
        grouped_average_by_query, grouped_average_via, partition_by_group,
    };
    use crate::common::{AggregationConfig, GridSpec, InsufficientDataPolicy};
    use crate::domain::{
        ChiError, ChiErrorCategory, GroupKey, GroupedSelection, PathId, PathQuery, PathRecord,
        ProviderResult, RawSignal,
    };
    use crate::modules::SelectionProvider;
    use crate::store::MemoryProvider;
    use std::collections::{BTreeMap, HashMap};

    fn record(id: i64, frame: i64, atom_id: i64, path_type: &str, reff: f64) -> PathRecord {
        PathRecord {
            id: PathId(id),
            frame,
            atom_id,
            path_num: id,
            nleg: 2,
            degeneracy: 1.0,
            reff,
            path_type: path_type.to_string(),
            atom_sequence: vec![atom_id, 0],
        }
    }

    fn constant_signal(id: i64, value: f64) -> RawSignal {
        RawSignal::new(id, vec![0.0, 0.25, 0.5, 0.75, 1.0], vec![value; 5])
    }

    fn config() -> AggregationConfig {
        AggregationConfig::default().with_grid(GridSpec::new(0.0, 1.0, 0.5))
    }

    /// Atom A has 2 paths, atom B 1 path, atom C 3 paths.
    fn three_atom_provider() -> MemoryProvider {
        let mut provider = MemoryProvider::new();
        provider.insert(record(1, 0, 10, "Fe-O", 2.0), Some(constant_signal(1, 1.0)));
        provider.insert(record(2, 0, 10, "Fe-O", 2.1), Some(constant_signal(2, 2.0)));
        provider.insert(record(3, 0, 11, "Fe-O", 2.0), Some(constant_signal(3, 4.0)));
        provider.insert(record(4, 1, 10, "Fe-O", 2.0), Some(constant_signal(4, 1.0)));
        provider.insert(record(5, 1, 10, "Fe-O", 2.2), Some(constant_signal(5, 1.0)));
        provider.insert(record(6, 1, 10, "Fe-Fe", 3.0), Some(constant_signal(6, 1.0)));
        provider
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Outage {
        Fetch,
        Grouping,
    }

    /// Delegates to a healthy store except for the operation that is down.
    struct FlakyProvider {
        inner: MemoryProvider,
        outage: Outage,
    }

    impl SelectionProvider for FlakyProvider {
        fn resolve_flat(&self, query: &PathQuery) -> ProviderResult<Vec<(PathId, GroupKey)>> {
            self.inner.resolve_flat(query)
        }

        fn group_keys(&self, ids: &[PathId]) -> ProviderResult<HashMap<PathId, GroupKey>> {
            self.inner.group_keys(ids)
        }

        fn fetch_signals(&self, ids: &[PathId]) -> ProviderResult<BTreeMap<PathId, RawSignal>> {
            if self.outage == Outage::Fetch {
                return Err(ChiError::provider("PROVIDER.OFFLINE", "chi_data unavailable"));
            }
            self.inner.fetch_signals(ids)
        }

        fn resolve_grouped(&self, query: &PathQuery) -> ProviderResult<GroupedSelection> {
            if self.outage == Outage::Grouping {
                return Err(ChiError::provider("PROVIDER.GROUP_QUERY", "grouping failed"));
            }
            self.inner.resolve_grouped(query)
        }
    }

    fn flaky(outage: Outage) -> FlakyProvider {
        FlakyProvider {
            inner: three_atom_provider(),
            outage,
        }
    }

    fn assert_constant(values: &[f64], expected: f64) {
        for value in values {
            assert!((value - expected).abs() < 1.0e-12, "{value} != {expected}");
        }
    }

    #[test]
    fn per_atom_sums_are_averaged_without_path_count_weighting() {
        let grouped = grouped_average_by_query(&three_atom_provider(), &PathQuery::new(), &config())
            .expect("aggregation")
            .expect("non-empty");

        // Sums: A = 3, B = 4, C = 3 -> mean 10/3. A path-weighted mean would be 10/6.
        assert_eq!(grouped.group_count, 3);
        assert_eq!(grouped.curve.k, vec![0.0, 0.5, 1.0]);
        assert_constant(&grouped.curve.chi, 10.0 / 3.0);
    }

    #[test]
    fn routes_agree_on_the_same_selection() {
        let provider = three_atom_provider();
        let query = PathQuery::new().with_max_reff(2.15);
        let results: Vec<_> = GroupingRoute::ALL
            .into_iter()
            .map(|route| {
                grouped_average_via(&provider, &query, route, &config())
                    .expect("aggregation")
                    .expect("non-empty")
            })
            .collect();

        for result in &results[1..] {
            assert_eq!(result.group_count, results[0].group_count);
            let deviation = result
                .curve
                .max_abs_deviation(&results[0].curve)
                .expect("same grid");
            assert!(deviation <= 1.0e-9);
        }
        // A = 1 + 2, B = 4, C = 1 (reff 2.2 and 3.0 excluded).
        assert_constant(&results[0].curve.chi, 8.0 / 3.0);
    }

    #[test]
    fn union_counts_overlapping_matches_once() {
        let provider = three_atom_provider();
        let queries = [
            PathQuery::new().with_path_types(["Fe-O"]),
            PathQuery::new().with_max_reff(2.05),
        ];
        let grouped = grouped_average_by_queries(&provider, &queries, &config())
            .expect("aggregation")
            .expect("non-empty");
        // Everything except the Fe-Fe path; double matches must not double count.
        assert_eq!(grouped.group_count, 3);
        assert_constant(&grouped.curve.chi, (3.0 + 4.0 + 2.0) / 3.0);
    }

    #[test]
    fn empty_selection_is_absent_not_zero() {
        let provider = three_atom_provider();
        let query = PathQuery::new().with_path_types(["Cu-Cu"]);
        for route in GroupingRoute::ALL {
            let result = grouped_average_via(&provider, &query, route, &config())
                .expect("empty selection is not an error");
            assert!(result.is_none(), "route {route} should be absent");
        }
        assert!(
            grouped_average_by_ids(&provider, &[], &config())
                .expect("empty ids")
                .is_none()
        );
        assert!(
            grouped_average_by_queries(&provider, &[], &config())
                .expect("no queries")
                .is_none()
        );
    }

    #[test]
    fn groups_without_retrievable_signals_are_not_counted() {
        let mut provider = three_atom_provider();
        provider.insert(record(7, 2, 99, "Fe-O", 2.0), None);
        let grouped = grouped_average_by_query(&provider, &PathQuery::new(), &config())
            .expect("aggregation")
            .expect("non-empty");
        assert_eq!(grouped.group_count, 3);

        let only_missing = PathQuery::new().with_frames([2]);
        assert!(
            grouped_average_by_query(&provider, &only_missing, &config())
                .expect("aggregation")
                .is_none()
        );
    }

    #[test]
    fn malformed_group_is_excluded_under_skip_policy() {
        let mut provider = three_atom_provider();
        provider.insert(
            record(8, 3, 1, "Fe-O", 2.0),
            Some(RawSignal::new(8, vec![0.0, 1.0], vec![5.0, 5.0])),
        );

        let strict = grouped_average_by_query(&provider, &PathQuery::new(), &config())
            .expect_err("fail policy rejects short signals");
        assert_eq!(strict.category(), ChiErrorCategory::InsufficientDataError);

        let lenient = config().with_insufficient_data(InsufficientDataPolicy::Skip);
        let grouped = grouped_average_by_query(&provider, &PathQuery::new(), &lenient)
            .expect("aggregation")
            .expect("non-empty");
        assert_eq!(grouped.group_count, 3);
        assert_eq!(grouped.skipped, vec![PathId(8)]);
        assert_constant(&grouped.curve.chi, 10.0 / 3.0);
    }

    #[test]
    fn invalid_grid_fails_before_any_fetch() {
        let bad = AggregationConfig::default().with_grid(GridSpec::new(1.0, 0.0, 0.1));
        let error = grouped_average_by_ids(&three_atom_provider(), &[], &bad)
            .expect_err("grid is validated first");
        assert_eq!(error.category(), ChiErrorCategory::ConfigurationError);
        assert_eq!(error.placeholder(), "CONFIG.K_RANGE");
    }

    #[test]
    fn fetch_failures_end_every_route_unchanged() {
        let provider = flaky(Outage::Fetch);
        let ids = [PathId(1), PathId(3)];
        let failures = [
            grouped_average_by_query(&provider, &PathQuery::new(), &config()),
            grouped_average_by_ids(&provider, &ids, &config()),
            grouped_average_by_queries(&provider, &[PathQuery::new()], &config()),
        ];
        for failure in failures {
            let error = failure.expect_err("fetch outage must abort");
            assert_eq!(error.category(), ChiErrorCategory::ProviderError);
            assert_eq!(error.placeholder(), "PROVIDER.OFFLINE");
            assert_eq!(error.message(), "chi_data unavailable");
        }
    }

    #[test]
    fn grouping_failures_end_provider_side_routes_unchanged() {
        let provider = flaky(Outage::Grouping);
        for result in [
            grouped_average_by_query(&provider, &PathQuery::new(), &config()),
            grouped_average_by_queries(&provider, &[PathQuery::new()], &config()),
        ] {
            let error = result.expect_err("grouping outage must abort");
            assert_eq!(error.category(), ChiErrorCategory::ProviderError);
            assert_eq!(error.placeholder(), "PROVIDER.GROUP_QUERY");
        }

        // The flat-id route never asks the provider to group.
        let grouped = grouped_average_by_ids(&provider, &[PathId(1), PathId(3)], &config())
            .expect("ids route")
            .expect("non-empty");
        assert_eq!(grouped.group_count, 2);
    }

    #[test]
    fn partition_drops_unknown_and_duplicate_ids() {
        let keys = HashMap::from([
            (PathId(1), GroupKey::new(0, 1)),
            (PathId(2), GroupKey::new(0, 1)),
        ]);
        let grouped = partition_by_group(&[PathId(2), PathId(1), PathId(2), PathId(9)], &keys);
        assert_eq!(grouped.len(), 1);
        let ids: Vec<_> = grouped[&GroupKey::new(0, 1)].iter().copied().collect();
        assert_eq!(ids, vec![PathId(1), PathId(2)]);
    }
}
