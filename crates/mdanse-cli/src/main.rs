mod cli;
mod commands;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use mdanse::engine::context::{EngineContext, EngineSettings};
use mdanse::engine::error::EngineError;
use mdanse::engine::registry::Registry;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run_app(cli) {
        error!("❌ Command failed: {}", e);
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run_app(cli: Cli) -> Result<()> {
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("🚀 MDANSE CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let mut settings = EngineSettings::from_env().map_err(EngineError::from)?;
    if let Some(threads) = cli.threads {
        if threads == 0 {
            return Err(CliError::Argument("--threads must be at least 1".into()));
        }
        info!("Capping multiprocessor jobs at {} worker(s).", threads);
        settings = settings.with_max_workers(threads);
    }
    debug!(workers = settings.worker_cap(), "Engine settings resolved.");

    let registry = Registry::with_defaults().map_err(EngineError::from)?;
    for warning in registry.warnings() {
        warn!("{}", warning);
    }
    let context = EngineContext::new(Arc::new(registry), settings);

    match cli.command {
        Commands::Run(args) => {
            info!("Dispatching to 'run' command.");
            commands::run::run(args, &context)?;
            info!("✅ Command completed successfully.");
        }
        Commands::List(args) => {
            info!("Dispatching to 'list' command.");
            commands::list::run(args, context.registry())?;
        }
        Commands::Describe(args) => {
            info!("Dispatching to 'describe' command.");
            commands::describe::run(args, context.registry())?;
        }
    }
    Ok(())
}
