//! Single-level aggregation over flat id lists.

use super::combine::combine;
use super::resample::resample_all;
use super::traits::{PathCatalog, SelectionProvider};
use crate::common::AggregationConfig;
use crate::domain::{
    AggregationPolicy, ChiError, ChiResult, CombinedCurve, PathId, PathQuery, PathRecord,
    RawSignal,
};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Fetches, resamples and combines the signals of `ids` with `policy`.
///
/// An empty id list, or one whose ids have no stored data, yields `None`.
pub fn combine_signals<P>(
    provider: &P,
    ids: &[PathId],
    policy: AggregationPolicy,
    config: &AggregationConfig,
) -> ChiResult<Option<CombinedCurve>>
where
    P: SelectionProvider + ?Sized,
{
    let grid = config.canonical_grid()?;
    if ids.is_empty() {
        return Ok(None);
    }

    let signals = provider.fetch_signals(ids)?;
    if signals.len() < ids.len() {
        tracing::warn!(
            requested = ids.len(),
            found = signals.len(),
            "some paths have no chi data"
        );
    }

    let resampled = resample_all(signals.values(), &grid, config.insufficient_data)?;
    let combined = combine(&resampled.curves, policy)?;
    if let Some(chi) = &combined {
        tracing::info!(
            %policy,
            signals = resampled.curves.len(),
            skipped = resampled.skipped.len(),
            "combined signals"
        );
        debug_assert_eq!(chi.len(), grid.len());
    }
    Ok(combined.map(|chi| CombinedCurve::new(grid.points().to_vec(), chi)))
}

pub fn sum_signals<P>(
    provider: &P,
    ids: &[PathId],
    config: &AggregationConfig,
) -> ChiResult<Option<CombinedCurve>>
where
    P: SelectionProvider + ?Sized,
{
    combine_signals(provider, ids, AggregationPolicy::Sum, config)
}

pub fn average_signals<P>(
    provider: &P,
    ids: &[PathId],
    config: &AggregationConfig,
) -> ChiResult<Option<CombinedCurve>>
where
    P: SelectionProvider + ?Sized,
{
    combine_signals(provider, ids, AggregationPolicy::Average, config)
}

/// One path type, optionally limited to a maximum effective distance.
///
/// Parsed from `TYPE` or `TYPE:MAX_REFF`.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipathSelection {
    pub path_type: String,
    pub max_reff: Option<f64>,
}

impl MultipathSelection {
    pub fn new(path_type: impl Into<String>, max_reff: Option<f64>) -> Self {
        Self {
            path_type: path_type.into(),
            max_reff,
        }
    }

    pub fn to_query(&self, frames: &[i64]) -> PathQuery {
        let query = PathQuery::new()
            .with_path_types([self.path_type.clone()])
            .with_frames(frames.iter().copied());
        match self.max_reff {
            Some(max_reff) => query.with_max_reff(max_reff),
            None => query,
        }
    }
}

impl Display for MultipathSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.max_reff {
            Some(max_reff) => write!(f, "{}:{}", self.path_type, max_reff),
            None => f.write_str(&self.path_type),
        }
    }
}

impl FromStr for MultipathSelection {
    type Err = ChiError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| {
            ChiError::input_validation(
                "INPUT.SELECTION",
                format!("invalid path selection '{raw}': {reason}"),
            )
        };

        let (path_type, max_reff) = match raw.rsplit_once(':') {
            Some((path_type, max_reff)) => {
                let max_reff = max_reff
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| invalid("distance limit is not a number"))?;
                if !max_reff.is_finite() {
                    return Err(invalid("distance limit must be finite"));
                }
                (path_type.trim(), Some(max_reff))
            }
            None => (raw.trim(), None),
        };

        if path_type.is_empty() {
            return Err(invalid("path type is empty"));
        }
        Ok(Self::new(path_type, max_reff))
    }
}

pub fn multipath_queries(selections: &[MultipathSelection], frames: &[i64]) -> Vec<PathQuery> {
    selections
        .iter()
        .map(|selection| selection.to_query(frames))
        .collect()
}

/// Averages every path matched by any of the selections; a path matched by
/// several selections is counted once.
pub fn average_multipath<P>(
    provider: &P,
    selections: &[MultipathSelection],
    frames: &[i64],
    config: &AggregationConfig,
) -> ChiResult<Option<CombinedCurve>>
where
    P: SelectionProvider + ?Sized,
{
    config.canonical_grid()?;

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for selection in selections {
        let matched = provider.resolve_flat(&selection.to_query(frames))?;
        tracing::info!(selection = %selection, paths = matched.len(), "resolved path type");
        for (id, _) in matched {
            if seen.insert(id) {
                ids.push(id);
            }
        }
    }

    if ids.is_empty() {
        tracing::warn!(selections = selections.len(), "no paths matched any selection");
        return Ok(None);
    }
    average_signals(provider, &ids, config)
}

/// Records matching `query`, each paired with its stored signal if any.
pub fn paths_with_signals<P>(
    provider: &P,
    query: &PathQuery,
) -> ChiResult<Vec<(PathRecord, Option<RawSignal>)>>
where
    P: PathCatalog + SelectionProvider + ?Sized,
{
    let records = provider.query_paths(query)?;
    let ids: Vec<PathId> = records.iter().map(|record| record.id).collect();
    let mut signals = provider.fetch_signals(&ids)?;
    Ok(records
        .into_iter()
        .map(|record| {
            let signal = signals.remove(&record.id);
            (record, signal)
        })
        .collect())
}
