use crate::domain::{GroupKey, PathId, PathQuery, PathRecord, ProviderResult, RawSignal};
use crate::modules::{PathCatalog, SelectionProvider};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// In-memory path store for small datasets and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    records: BTreeMap<PathId, PathRecord>,
    signals: BTreeMap<PathId, RawSignal>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a path. A `None` signal models a path whose chi data
    /// was never stored.
    pub fn insert(&mut self, record: PathRecord, signal: Option<RawSignal>) {
        let id = record.id;
        self.records.insert(id, record);
        match signal {
            Some(signal) => {
                self.signals.insert(id, RawSignal { id, ..signal });
            }
            None => {
                self.signals.remove(&id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SelectionProvider for MemoryProvider {
    fn resolve_flat(&self, query: &PathQuery) -> ProviderResult<Vec<(PathId, GroupKey)>> {
        Ok(self
            .query_paths(query)?
            .into_iter()
            .map(|record| (record.id, record.group_key()))
            .collect())
    }

    fn group_keys(&self, ids: &[PathId]) -> ProviderResult<HashMap<PathId, GroupKey>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|record| (record.id, record.group_key()))
            .collect())
    }

    fn fetch_signals(&self, ids: &[PathId]) -> ProviderResult<BTreeMap<PathId, RawSignal>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.signals.get(id))
            .map(|signal| (signal.id, signal.clone()))
            .collect())
    }
}

impl PathCatalog for MemoryProvider {
    fn query_paths(&self, query: &PathQuery) -> ProviderResult<Vec<PathRecord>> {
        let mut records: Vec<PathRecord> = self
            .records
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.frame, record.atom_id, record.path_num, record.id));
        Ok(records)
    }

    fn unique_path_types(&self) -> ProviderResult<Vec<String>> {
        let types: BTreeSet<&str> = self
            .records
            .values()
            .map(|record| record.path_type.as_str())
            .collect();
        Ok(types.into_iter().map(str::to_string).collect())
    }

    fn reff_range(&self) -> ProviderResult<(f64, f64)> {
        let mut reffs = self.records.values().map(|record| record.reff);
        let Some(first) = reffs.next() else {
            return Ok((0.0, 0.0));
        };
        Ok(reffs.fold((first, first), |(min, max), reff| (min.min(reff), max.max(reff))))
    }

    fn frame_atom_counts(&self) -> ProviderResult<BTreeMap<i64, usize>> {
        let mut atoms: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for record in self.records.values() {
            atoms.entry(record.frame).or_default().insert(record.atom_id);
        }
        Ok(atoms
            .into_iter()
            .map(|(frame, atoms)| (frame, atoms.len()))
            .collect())
    }
}
