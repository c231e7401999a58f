use crate::domain::{
    GroupKey, GroupedSelection, PathId, PathQuery, PathRecord, ProviderResult, RawSignal,
};
use std::collections::{BTreeMap, HashMap};

/// Turns physical criteria into path identifiers and fetches their signals.
///
/// Implementations hold their own connection handle; callers acquire one
/// provider per aggregation request and drop it afterwards.
pub trait SelectionProvider {
    /// Matching ids ordered by (frame, atom, path number), each with its group key.
    fn resolve_flat(&self, query: &PathQuery) -> ProviderResult<Vec<(PathId, GroupKey)>>;

    /// Group keys of the given ids; unknown ids are absent from the map.
    fn group_keys(&self, ids: &[PathId]) -> ProviderResult<HashMap<PathId, GroupKey>>;

    /// Signals of the given ids; ids without stored data are absent from the map.
    fn fetch_signals(&self, ids: &[PathId]) -> ProviderResult<BTreeMap<PathId, RawSignal>>;

    fn resolve_grouped(&self, query: &PathQuery) -> ProviderResult<GroupedSelection> {
        let mut grouped = GroupedSelection::new();
        for (id, key) in self.resolve_flat(query)? {
            grouped.entry(key).or_default().insert(id);
        }
        Ok(grouped)
    }

    /// Union of the matches of every query, grouped; a path matched by several
    /// queries appears once.
    fn resolve_grouped_union(&self, queries: &[PathQuery]) -> ProviderResult<GroupedSelection> {
        let mut grouped = GroupedSelection::new();
        for query in queries {
            for (key, ids) in self.resolve_grouped(query)? {
                grouped.entry(key).or_default().extend(ids);
            }
        }
        Ok(grouped)
    }
}

/// Read-only metadata queries over the stored paths.
pub trait PathCatalog {
    fn query_paths(&self, query: &PathQuery) -> ProviderResult<Vec<PathRecord>>;

    fn unique_path_types(&self) -> ProviderResult<Vec<String>>;

    /// `(min, max)` effective distance, `(0.0, 0.0)` when nothing is stored.
    fn reff_range(&self) -> ProviderResult<(f64, f64)>;

    fn frame_atom_counts(&self) -> ProviderResult<BTreeMap<i64, usize>>;
}
