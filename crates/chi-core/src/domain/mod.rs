pub mod errors;

pub use errors::{ChiError, ChiErrorCategory, ChiResult, ProviderResult};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Opaque identifier of one stored scattering path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathId(pub i64);

impl PathId {
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl Display for PathId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PathId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// The physical atom whose outgoing paths are summed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub frame: i64,
    pub atom_id: i64,
}

impl GroupKey {
    pub const fn new(frame: i64, atom_id: i64) -> Self {
        Self { frame, atom_id }
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame {} atom {}", self.frame, self.atom_id)
    }
}

/// Grouped selection as produced by a selection provider. Ids inside a group
/// are unique and ascending, so every grouping route iterates them identically.
pub type GroupedSelection = BTreeMap<GroupKey, BTreeSet<PathId>>;

/// One chi(k) curve sampled on the path's own k grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    pub id: PathId,
    pub k_grid: Vec<f64>,
    pub chi_values: Vec<f64>,
}

impl RawSignal {
    pub fn new(id: impl Into<PathId>, k_grid: Vec<f64>, chi_values: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            k_grid,
            chi_values,
        }
    }

    pub fn len(&self) -> usize {
        self.k_grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.k_grid.is_empty()
    }

    /// Native `[min, max]` k domain, `None` for an empty signal.
    pub fn k_range(&self) -> Option<(f64, f64)> {
        Some((*self.k_grid.first()?, *self.k_grid.last()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    Sum,
    #[default]
    Average,
}

impl AggregationPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
        }
    }
}

impl Display for AggregationPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Aggregated values on the canonical k grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedCurve {
    pub k: Vec<f64>,
    pub chi: Vec<f64>,
}

impl CombinedCurve {
    pub fn new(k: Vec<f64>, chi: Vec<f64>) -> Self {
        debug_assert_eq!(k.len(), chi.len());
        Self { k, chi }
    }

    pub fn len(&self) -> usize {
        self.k.len()
    }

    pub fn is_empty(&self) -> bool {
        self.k.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.k.iter().copied().zip(self.chi.iter().copied())
    }

    /// Largest pointwise absolute difference, `None` when the grids differ in length.
    pub fn max_abs_deviation(&self, other: &CombinedCurve) -> Option<f64> {
        if self.len() != other.len() {
            return None;
        }
        Some(
            self.chi
                .iter()
                .zip(&other.chi)
                .map(|(lhs, rhs)| (lhs - rhs).abs())
                .fold(0.0, f64::max),
        )
    }
}

/// Result of the sum-within-atom, average-across-atoms policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedCurve {
    pub curve: CombinedCurve,
    /// Groups that contributed at least one resampled signal.
    pub group_count: usize,
    /// Signals dropped because they could not be resampled.
    pub skipped: Vec<PathId>,
}

/// Group count of an optional grouped result; an absent result counts zero groups.
pub fn group_count(result: Option<&GroupedCurve>) -> usize {
    result.map_or(0, |grouped| grouped.group_count)
}

/// Physical selection criteria. Empty lists and `None` mean "no restriction".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path_types: Vec<String>,
    pub min_reff: Option<f64>,
    pub max_reff: Option<f64>,
    #[serde(default)]
    pub frames: Vec<i64>,
    #[serde(default)]
    pub atom_ids: Vec<i64>,
    pub nleg: Option<i64>,
}

impl PathQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path_types<I, S>(mut self, path_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_types = path_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_reff(mut self, min_reff: f64) -> Self {
        self.min_reff = Some(min_reff);
        self
    }

    pub fn with_max_reff(mut self, max_reff: f64) -> Self {
        self.max_reff = Some(max_reff);
        self
    }

    pub fn with_frames(mut self, frames: impl IntoIterator<Item = i64>) -> Self {
        self.frames = frames.into_iter().collect();
        self
    }

    pub fn with_atom_ids(mut self, atom_ids: impl IntoIterator<Item = i64>) -> Self {
        self.atom_ids = atom_ids.into_iter().collect();
        self
    }

    pub fn with_nleg(mut self, nleg: i64) -> Self {
        self.nleg = Some(nleg);
        self
    }

    pub fn matches(&self, record: &PathRecord) -> bool {
        (self.path_types.is_empty() || self.path_types.contains(&record.path_type))
            && self.min_reff.is_none_or(|min| record.reff >= min)
            && self.max_reff.is_none_or(|max| record.reff <= max)
            && (self.frames.is_empty() || self.frames.contains(&record.frame))
            && (self.atom_ids.is_empty() || self.atom_ids.contains(&record.atom_id))
            && self.nleg.is_none_or(|nleg| record.nleg == nleg)
    }
}

/// Typed metadata row of one scattering path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRecord {
    pub id: PathId,
    pub frame: i64,
    pub atom_id: i64,
    pub path_num: i64,
    pub nleg: i64,
    pub degeneracy: f64,
    pub reff: f64,
    pub path_type: String,
    pub atom_sequence: Vec<i64>,
}

impl PathRecord {
    pub const fn group_key(&self) -> GroupKey {
        GroupKey::new(self.frame, self.atom_id)
    }
}
