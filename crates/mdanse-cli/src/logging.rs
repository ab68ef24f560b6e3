use crate::error::Result;
use std::fs::File;
use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Crates whose events follow the verbosity flags.
const OWN_TARGETS: [&str; 2] = ["mdanse", "mdanse_cli"];

fn console_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Dependencies are never louder than warnings on the console.
fn console_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_targets(OWN_TARGETS.map(|target| (target, level)))
        .with_default(level.min(LevelFilter::WARN))
}

/// The log file keeps at least the engine's debug output, whatever the
/// console shows.
fn file_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_targets(OWN_TARGETS.map(|target| (target, level.max(LevelFilter::DEBUG))))
        .with_default(LevelFilter::WARN)
}

/// Log file layer. Jobs run inside `run_workflow{job=...}` spans, whose
/// close events carry the time spent in each phase.
fn file_layer<S>(path: &Path, level: LevelFilter) -> Result<impl Layer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = File::create(path)?;
    Ok(fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(file_filter(level)))
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let level = console_level(verbosity, quiet);
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(console_filter(level));
    let file_layer = log_file.map(|path| file_layer(path, level)).transpose()?;

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}
