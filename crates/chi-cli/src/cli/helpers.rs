use super::CliError;
use super::commands::{CriteriaFlags, GridFlags};
use anyhow::Context;
use chi_core::common::{AggregationConfig, InsufficientDataPolicy, load_aggregation_config};
use chi_core::domain::{ChiError, CombinedCurve, GroupedCurve, PathQuery, group_count};
use chi_core::modules::GroupingRoute;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the stderr log subscriber. `RUST_LOG` wins over `-v` flags.
pub(super) fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A subscriber may already be installed when commands run in-process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub(super) fn resolve_aggregation_config(
    flags: &GridFlags,
) -> Result<AggregationConfig, CliError> {
    let mut config = match &flags.config {
        Some(path) => load_aggregation_config(path).map_err(ChiError::from)?,
        None => AggregationConfig::default(),
    };

    if let Some(k_min) = flags.k_min {
        config.grid.k_min = k_min;
    }
    if let Some(k_max) = flags.k_max {
        config.grid.k_max = k_max;
    }
    if let Some(k_step) = flags.k_step {
        config.grid.k_step = k_step;
    }
    if flags.skip_malformed {
        config.insufficient_data = InsufficientDataPolicy::Skip;
    }

    let grid = config.canonical_grid()?;
    tracing::info!(
        k_min = config.grid.k_min,
        k_max = config.grid.k_max,
        k_step = config.grid.k_step,
        points = grid.len(),
        insufficient_data = ?config.insufficient_data,
        "resolved canonical grid"
    );
    Ok(config)
}

pub(super) fn criteria_query(flags: &CriteriaFlags) -> PathQuery {
    PathQuery {
        path_types: flags.path_types.clone(),
        min_reff: flags.min_reff,
        max_reff: flags.max_reff,
        frames: flags.frames.clone(),
        atom_ids: flags.atom_ids.clone(),
        nleg: flags.nleg,
    }
}

pub(super) fn emit_curve(
    curve: Option<&CombinedCurve>,
    output: Option<&Path>,
) -> Result<i32, CliError> {
    let Some(curve) = curve else {
        println!("# no signals matched the selection");
        return Ok(0);
    };

    match output {
        Some(path) => {
            curve.write_columns(path)?;
            println!("wrote {} points to {}", curve.len(), path.display());
        }
        None => print!("{}", curve.to_columns()),
    }
    Ok(0)
}

pub(super) fn emit_grouped(
    grouped: Option<&GroupedCurve>,
    output: Option<&Path>,
) -> Result<i32, CliError> {
    println!("# groups: {}", group_count(grouped));
    if let Some(grouped) = grouped.filter(|grouped| !grouped.skipped.is_empty()) {
        let skipped: Vec<String> = grouped.skipped.iter().map(ToString::to_string).collect();
        println!("# skipped paths: {}", skipped.join(", "));
    }
    emit_curve(grouped.map(|grouped| &grouped.curve), output)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DatabaseSummary {
    pub(super) database: String,
    pub(super) path_count: usize,
    pub(super) path_types: Vec<String>,
    pub(super) reff_min: f64,
    pub(super) reff_max: f64,
    pub(super) atoms_per_frame: BTreeMap<i64, usize>,
}

pub(super) fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON summary")?;
    println!("{rendered}");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct RouteComparison {
    /// `None` when one route produced a curve and another did not.
    pub(super) max_deviation: Option<f64>,
    pub(super) group_counts_match: bool,
}

impl RouteComparison {
    pub(super) fn agrees(&self, tolerance: f64) -> bool {
        self.group_counts_match
            && self
                .max_deviation
                .is_some_and(|deviation| deviation <= tolerance)
    }
}

/// Compares every route result against the first one.
pub(super) fn compare_routes(
    results: &[(GroupingRoute, Option<GroupedCurve>)],
) -> RouteComparison {
    let Some((_, reference)) = results.first() else {
        return RouteComparison {
            max_deviation: Some(0.0),
            group_counts_match: true,
        };
    };

    let mut max_deviation = Some(0.0_f64);
    let mut group_counts_match = true;
    for (_, other) in &results[1..] {
        group_counts_match &= group_count(reference.as_ref()) == group_count(other.as_ref());
        let deviation = match (reference, other) {
            (None, None) => Some(0.0),
            (Some(lhs), Some(rhs)) => lhs.curve.max_abs_deviation(&rhs.curve),
            _ => None,
        };
        max_deviation = match (max_deviation, deviation) {
            (Some(current), Some(deviation)) => Some(current.max(deviation)),
            _ => None,
        };
    }

    RouteComparison {
        max_deviation,
        group_counts_match,
    }
}
