mod commands;
mod helpers;

use chi_core::domain::ChiError;
use clap::Parser;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let chi_error = error.as_chi_error();
            eprintln!("{}", chi_error.diagnostic_line());
            tracing::debug!(
                category = %chi_error.category(),
                exit_code = chi_error.exit_code(),
                "command failed"
            );
            chi_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("chi-aggregate".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_logging(cli.verbose);
            tracing::info!(command = cli.command.name(), "starting");
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "chi-aggregate",
    version,
    about = "Resample and aggregate EXAFS chi(k) path signals"
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Sum the selected signals on the canonical grid
    Sum(commands::CombineArgs),
    /// Average the selected signals on the canonical grid
    Average(commands::CombineArgs),
    /// Sum paths per absorbing atom, then average across atoms
    Grouped(commands::GroupedArgs),
    /// Aggregate several path types, each with an optional distance limit
    Multipath(commands::MultipathArgs),
    /// Summarize the paths stored in a database
    Info(commands::InfoArgs),
    /// Run every grouping route on one selection and compare the results
    VerifyRoutes(commands::VerifyRoutesArgs),
}

impl CliCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Sum(_) => "sum",
            Self::Average(_) => "average",
            Self::Grouped(_) => "grouped",
            Self::Multipath(_) => "multipath",
            Self::Info(_) => "info",
            Self::VerifyRoutes(_) => "verify-routes",
        }
    }
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Sum(args) => commands::run_sum_command(args),
        CliCommand::Average(args) => commands::run_average_command(args),
        CliCommand::Grouped(args) => commands::run_grouped_command(args),
        CliCommand::Multipath(args) => commands::run_multipath_command(args),
        CliCommand::Info(args) => commands::run_info_command(args),
        CliCommand::VerifyRoutes(args) => commands::run_verify_routes_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(#[from] ChiError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_chi_error(&self) -> ChiError {
        match self {
            Self::Usage(message) => ChiError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => ChiError::internal("IO.CLI", format!("{error:#}")),
        }
    }
}
