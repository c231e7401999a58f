use super::CliError;
use super::helpers::*;
use chi_core::domain::{ChiResult, PathId, PathQuery, group_count};
use chi_core::modules::{
    GroupingRoute, MultipathSelection, PathCatalog, SelectionProvider, average_multipath,
    average_signals, grouped_average_by_queries, grouped_average_via, multipath_queries,
    sum_signals,
};
use chi_core::store::ChiDatabase;
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct DatabaseFlags {
    /// Path database (SQLite)
    #[arg(long)]
    db: PathBuf,
}

impl DatabaseFlags {
    pub(super) fn open(&self) -> Result<ChiDatabase, CliError> {
        Ok(ChiDatabase::open(&self.db)?)
    }
}

#[derive(clap::Args, Default)]
pub(super) struct GridFlags {
    /// JSON aggregation config; flags below override its values
    #[arg(long)]
    pub(super) config: Option<PathBuf>,

    /// Lower bound of the canonical k grid
    #[arg(long, allow_negative_numbers = true)]
    pub(super) k_min: Option<f64>,

    /// Upper bound of the canonical k grid (inclusive)
    #[arg(long, allow_negative_numbers = true)]
    pub(super) k_max: Option<f64>,

    /// Spacing of the canonical k grid
    #[arg(long)]
    pub(super) k_step: Option<f64>,

    /// Skip signals with too few points instead of failing
    #[arg(long)]
    pub(super) skip_malformed: bool,
}

#[derive(clap::Args, Default)]
pub(super) struct CriteriaFlags {
    /// Path type to include (repeatable)
    #[arg(long = "path-type", value_name = "TYPE")]
    pub(super) path_types: Vec<String>,

    /// Minimum effective path length (inclusive)
    #[arg(long)]
    pub(super) min_reff: Option<f64>,

    /// Maximum effective path length (inclusive)
    #[arg(long)]
    pub(super) max_reff: Option<f64>,

    /// Frame to include (repeatable)
    #[arg(long = "frame", value_name = "FRAME")]
    pub(super) frames: Vec<i64>,

    /// Absorbing atom id to include (repeatable)
    #[arg(long = "atom", value_name = "ATOM")]
    pub(super) atom_ids: Vec<i64>,

    /// Number of legs
    #[arg(long)]
    pub(super) nleg: Option<i64>,
}

#[derive(clap::Args)]
pub(super) struct OutputFlags {
    /// Write the curve to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct CombineArgs {
    #[command(flatten)]
    database: DatabaseFlags,

    #[command(flatten)]
    criteria: CriteriaFlags,

    #[command(flatten)]
    grid: GridFlags,

    #[command(flatten)]
    output: OutputFlags,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub(super) enum RouteArg {
    Ids,
    Grouped,
    Union,
}

impl From<RouteArg> for GroupingRoute {
    fn from(route: RouteArg) -> Self {
        match route {
            RouteArg::Ids => GroupingRoute::Ids,
            RouteArg::Grouped => GroupingRoute::Grouped,
            RouteArg::Union => GroupingRoute::Union,
        }
    }
}

#[derive(clap::Args)]
pub(super) struct GroupedArgs {
    #[command(flatten)]
    combine: CombineArgs,

    /// How atoms are grouped
    #[arg(long, value_enum, default_value = "grouped")]
    route: RouteArg,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub(super) enum MultipathPolicyArg {
    /// Average every selected path
    Average,
    /// Sum per atom, then average across atoms
    Grouped,
}

#[derive(clap::Args)]
pub(super) struct MultipathArgs {
    #[command(flatten)]
    database: DatabaseFlags,

    /// Path type with optional distance limit, e.g. `Fe-O:2.2` (repeatable)
    #[arg(long = "select", value_name = "TYPE[:MAX_REFF]", required = true)]
    selections: Vec<MultipathSelection>,

    /// Frame to include (repeatable)
    #[arg(long = "frame", value_name = "FRAME")]
    frames: Vec<i64>,

    /// Aggregation applied to the union of selections
    #[arg(long, value_enum, default_value = "average")]
    policy: MultipathPolicyArg,

    #[command(flatten)]
    grid: GridFlags,

    #[command(flatten)]
    output: OutputFlags,
}

#[derive(clap::Args)]
pub(super) struct InfoArgs {
    #[command(flatten)]
    database: DatabaseFlags,
}

#[derive(clap::Args)]
pub(super) struct VerifyRoutesArgs {
    #[command(flatten)]
    database: DatabaseFlags,

    #[command(flatten)]
    criteria: CriteriaFlags,

    #[command(flatten)]
    grid: GridFlags,

    /// Largest accepted absolute deviation between routes
    #[arg(long, default_value_t = 1.0e-9)]
    tolerance: f64,
}

pub(super) fn run_sum_command(args: CombineArgs) -> Result<i32, CliError> {
    let config = resolve_aggregation_config(&args.grid)?;
    let query = criteria_query(&args.criteria);
    let database = args.database.open()?;

    let curve = database.with_session(|session| {
        let ids = selected_ids(session, &query)?;
        sum_signals(session, &ids, &config)
    })?;
    emit_curve(curve.as_ref(), args.output.output.as_deref())
}

pub(super) fn run_average_command(args: CombineArgs) -> Result<i32, CliError> {
    let config = resolve_aggregation_config(&args.grid)?;
    let query = criteria_query(&args.criteria);
    let database = args.database.open()?;

    let curve = database.with_session(|session| {
        let ids = selected_ids(session, &query)?;
        average_signals(session, &ids, &config)
    })?;
    emit_curve(curve.as_ref(), args.output.output.as_deref())
}

pub(super) fn run_grouped_command(args: GroupedArgs) -> Result<i32, CliError> {
    let combine = args.combine;
    let config = resolve_aggregation_config(&combine.grid)?;
    let query = criteria_query(&combine.criteria);
    let database = combine.database.open()?;

    let grouped = database.with_session(|session| {
        grouped_average_via(session, &query, args.route.into(), &config)
    })?;
    emit_grouped(grouped.as_ref(), combine.output.output.as_deref())
}

pub(super) fn run_multipath_command(args: MultipathArgs) -> Result<i32, CliError> {
    let config = resolve_aggregation_config(&args.grid)?;
    let database = args.database.open()?;

    match args.policy {
        MultipathPolicyArg::Average => {
            let curve = database.with_session(|session| {
                average_multipath(session, &args.selections, &args.frames, &config)
            })?;
            emit_curve(curve.as_ref(), args.output.output.as_deref())
        }
        MultipathPolicyArg::Grouped => {
            let queries = multipath_queries(&args.selections, &args.frames);
            let grouped = database.with_session(|session| {
                grouped_average_by_queries(session, &queries, &config)
            })?;
            emit_grouped(grouped.as_ref(), args.output.output.as_deref())
        }
    }
}

pub(super) fn run_info_command(args: InfoArgs) -> Result<i32, CliError> {
    let database = args.database.open()?;
    let summary = database.with_session(|session| {
        let (reff_min, reff_max) = session.reff_range()?;
        Ok(DatabaseSummary {
            database: database.path().display().to_string(),
            path_count: session.query_paths(&PathQuery::new())?.len(),
            path_types: session.unique_path_types()?,
            reff_min,
            reff_max,
            atoms_per_frame: session.frame_atom_counts()?,
        })
    })?;
    print_json(&summary)?;
    Ok(0)
}

pub(super) fn run_verify_routes_command(args: VerifyRoutesArgs) -> Result<i32, CliError> {
    if !args.tolerance.is_finite() || args.tolerance < 0.0 {
        return Err(CliError::Usage(format!(
            "--tolerance must be a non-negative number, got {}",
            args.tolerance
        )));
    }
    let config = resolve_aggregation_config(&args.grid)?;
    let query = criteria_query(&args.criteria);
    let database = args.database.open()?;

    let results = database.with_session(|session| {
        GroupingRoute::ALL
            .into_iter()
            .map(|route| Ok((route, grouped_average_via(session, &query, route, &config)?)))
            .collect::<ChiResult<Vec<_>>>()
    })?;

    for (route, grouped) in &results {
        println!("route {route}: groups {}", group_count(grouped.as_ref()));
    }
    let comparison = compare_routes(&results);
    match comparison.max_deviation {
        Some(deviation) => println!("max deviation: {deviation:e}"),
        None => println!("max deviation: undefined"),
    }

    if comparison.agrees(args.tolerance) {
        println!("routes agree within {:e}", args.tolerance);
        Ok(0)
    } else {
        println!("routes disagree (tolerance {:e})", args.tolerance);
        Ok(1)
    }
}

fn selected_ids<P>(provider: &P, query: &PathQuery) -> ChiResult<Vec<PathId>>
where
    P: SelectionProvider + ?Sized,
{
    Ok(provider
        .resolve_flat(query)?
        .into_iter()
        .map(|(id, _)| id)
        .collect())
}
