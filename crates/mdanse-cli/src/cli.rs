use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "MDANSE developers",
    version,
    about = "MDANSE CLI - Run neutron scattering and dynamics analyses on molecular dynamics trajectories.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Upper bound on the number of workers of multiprocessor jobs.
    /// Overrides MDANSE_NUM_WORKERS.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the job described by a parameters file.
    Run(RunArgs),
    /// List registered components (jobs, selectors, formats, ...).
    List(ListArgs),
    /// Show the parameters of a job, with their kinds and defaults.
    Describe(DescribeArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the parameters file in TOML format.
    #[arg(required = true, value_name = "PATH")]
    pub parameters: PathBuf,
}

/// Arguments for the `list` subcommand.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list this category (e.g. 'job', 'selector', 'format').
    #[arg(value_name = "CATEGORY")]
    pub category: Option<String>,
}

/// Arguments for the `describe` subcommand.
#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Registered name of the job.
    #[arg(required = true, value_name = "JOB")]
    pub job: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_takes_a_parameters_file() {
        let cli = Cli::try_parse_from(["mdanse", "-vv", "run", "msd.toml", "-j", "4"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.threads, Some(4));
        match cli.command {
            Commands::Run(args) => assert_eq!(args.parameters, PathBuf::from("msd.toml")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["mdanse", "-q", "-v", "list"]).is_err());
    }

    #[test]
    fn list_category_is_optional() {
        let cli = Cli::try_parse_from(["mdanse", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::List(ListArgs { category: None })));
    }
}
