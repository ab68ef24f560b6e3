use super::config::{ConfiguratorSlot, Configuration, SlotKind};
use super::context::EngineContext;
use super::error::{ConfigurationError, EngineError, KernelError};
use super::progress::{Progress, ProgressReporter};
use super::runner::{self, RunnerOptions};
use crate::core::instrument::Instrument;
use crate::core::io::OutputSet;
use crate::core::io::atomic::commit_outputs;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use toml::Value;
use tracing::{info, instrument, warn};

pub const Q_AXIS: &str = "q";
pub const OMEGA_AXIS: &str = "omega";
pub const TIME_AXIS: &str = "time";

pub const RUNNING_MODE_SLOT: &str = "running_mode";
pub const OUTPUT_FILES_SLOT: &str = "output_files";
pub const UNIT_TIMEOUT_SLOT: &str = "unit_timeout";
pub const JOB_TIMEOUT_SLOT: &str = "job_timeout";

/// An output variable a job promises to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDecl {
    pub name: String,
    pub axes: Vec<String>,
    pub units: String,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, axes: &[&str], units: &str) -> Self {
        Self {
            name: name.into(),
            axes: axes.iter().map(|a| a.to_string()).collect(),
            units: units.to_string(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }
}

/// The typed kernel of an analysis.
///
/// The engine calls `initialize` once with the resolved configuration, asks
/// for the work units with `split`, runs `run_step` on each unit (possibly on
/// several workers at once) and folds the partial results into the
/// accumulator with `combine` in unit order. `finalize` turns the
/// accumulator into the output variables, which must match
/// `declared_outputs`.
pub trait Analysis: Sized + Send + Sync + 'static {
    const NAME: &'static str;
    const CATEGORY: &'static str;
    const LABEL: &'static str;

    type Unit: Send + Sync;
    type Partial: Send;
    type Accumulator: Send;

    /// Job-specific slots; the common ones are appended by the engine.
    fn settings() -> Vec<ConfiguratorSlot>;

    fn initialize(configuration: &Configuration, context: &EngineContext) -> Result<Self, EngineError>;

    fn declared_outputs(&self) -> Vec<VariableDecl>;

    /// Units depend only on the configuration.
    fn split(&self) -> Vec<Self::Unit>;

    fn accumulator(&self) -> Self::Accumulator;

    fn run_step(&self, unit_id: usize, unit: &Self::Unit) -> Result<Self::Partial, KernelError>;

    fn combine(&self, accumulator: &mut Self::Accumulator, partial: Self::Partial);

    fn finalize(&self, accumulator: Self::Accumulator) -> Result<OutputSet, EngineError>;

    /// Instrument applied to the finalized outputs, for analyses that opt in.
    fn instrument(&self) -> Option<&Instrument> {
        None
    }
}

/// Object-safe face of a job, as stored in the registry.
pub trait JobDefinition: Send + Sync {
    fn name(&self) -> &'static str;
    fn category(&self) -> &'static str;
    fn label(&self) -> &'static str;
    fn settings(&self) -> Vec<ConfiguratorSlot>;
    fn execute(
        &self,
        configuration: Configuration,
        context: &EngineContext,
        reporter: &ProgressReporter,
    ) -> Result<JobReport, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Created,
    Configured,
    Running,
    Aggregating,
    Writing,
    Finished,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed)
    }

    fn can_advance_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Configured)
                | (Configured, Running)
                | (Running, Aggregating)
                | (Aggregating, Writing)
                | (Writing, Finished)
        ) || (!self.is_terminal() && next == Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Created => "created",
            JobState::Configured => "configured",
            JobState::Running => "running",
            JobState::Aggregating => "aggregating",
            JobState::Writing => "writing",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The state machine every job run goes through.
#[derive(Debug)]
pub struct JobLifecycle {
    job: &'static str,
    state: JobState,
}

impl JobLifecycle {
    pub fn new(job: &'static str) -> Self {
        Self {
            job,
            state: JobState::Created,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn advance(&mut self, next: JobState, reporter: &ProgressReporter) -> Result<(), EngineError> {
        if !self.state.can_advance_to(next) {
            return Err(EngineError::Internal(format!(
                "job '{}' cannot go from {} to {next}",
                self.job, self.state
            )));
        }
        self.state = next;
        reporter.report(Progress::StateChanged {
            job: self.job,
            state: next,
        });
        Ok(())
    }

    /// Moves to `Failed` unless the run already ended.
    pub fn fail(&mut self, reporter: &ProgressReporter) {
        if !self.state.is_terminal() {
            self.state = JobState::Failed;
            reporter.report(Progress::StateChanged {
                job: self.job,
                state: JobState::Failed,
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub job: &'static str,
    pub state: JobState,
    pub units: usize,
    pub workers: usize,
    pub outputs: Vec<PathBuf>,
    pub elapsed: Duration,
}

/// Slots every job carries after its own.
pub fn common_settings() -> Vec<ConfiguratorSlot> {
    vec![
        ConfiguratorSlot::new(RUNNING_MODE_SLOT, SlotKind::RunningMode)
            .default_value(vec![Value::from("monoprocessor"), Value::from(1i64)])
            .label("Running mode"),
        ConfiguratorSlot::new(OUTPUT_FILES_SLOT, SlotKind::OutputFiles).label("Output files"),
        ConfiguratorSlot::new(
            UNIT_TIMEOUT_SLOT,
            SlotKind::Float {
                min: Some(0.0),
                max: None,
            },
        )
        .default_value(0.0)
        .label("Work unit time limit (s, 0 for none)"),
        ConfiguratorSlot::new(
            JOB_TIMEOUT_SLOT,
            SlotKind::Float {
                min: Some(0.0),
                max: None,
            },
        )
        .default_value(0.0)
        .label("Job time limit (s, 0 for none)"),
    ]
}

fn timeout(configuration: &Configuration, slot: &str) -> Result<Option<Duration>, EngineError> {
    let seconds = *configuration.float(slot)?;
    if seconds <= 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(|e| ConfigurationError::new(slot, "float", seconds.to_string(), e.to_string()).into())
}

fn runner_options(configuration: &Configuration, context: &EngineContext) -> Result<RunnerOptions, EngineError> {
    Ok(RunnerOptions::new(*configuration.running_mode(RUNNING_MODE_SLOT)?)
        .with_worker_cap(context.settings().worker_cap())
        .with_unit_timeout(timeout(configuration, UNIT_TIMEOUT_SLOT)?)
        .with_job_timeout(timeout(configuration, JOB_TIMEOUT_SLOT)?))
}

/// Finalized outputs must hold exactly the declared variables, each with
/// the declared axes.
fn check_outputs(job: &str, declared: &[VariableDecl], outputs: &OutputSet) -> Result<(), EngineError> {
    for decl in declared {
        let variable = outputs.variable(&decl.name).ok_or_else(|| {
            EngineError::Internal(format!("job '{job}' did not produce '{}'", decl.name))
        })?;
        if variable.ndim() != decl.ndim() || variable.axes != decl.axes {
            return Err(EngineError::Internal(format!(
                "job '{job}' produced '{}' over [{}], declared over [{}]",
                decl.name,
                variable.axes.join(", "),
                decl.axes.join(", ")
            )));
        }
    }
    if let Some(extra) = outputs
        .variables
        .keys()
        .find(|name| !declared.iter().any(|d| &d.name == *name))
    {
        return Err(EngineError::Internal(format!(
            "job '{job}' produced the undeclared variable '{extra}'"
        )));
    }
    Ok(())
}

/// Adapts an [`Analysis`] to [`JobDefinition`].
pub struct AnalysisJob<A> {
    _analysis: PhantomData<fn() -> A>,
}

impl<A> AnalysisJob<A> {
    pub fn new() -> Self {
        Self {
            _analysis: PhantomData,
        }
    }
}

impl<A> Default for AnalysisJob<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Analysis> AnalysisJob<A> {
    fn run(
        &self,
        configuration: &Configuration,
        context: &EngineContext,
        reporter: &ProgressReporter,
        lifecycle: &mut JobLifecycle,
        started: Instant,
    ) -> Result<JobReport, EngineError> {
        let analysis = reporter.phase("Initialize", || A::initialize(configuration, context))?;
        let declared = analysis.declared_outputs();
        let units = analysis.split();
        let options = runner_options(configuration, context)?;

        lifecycle.advance(JobState::Running, reporter)?;
        let mut accumulator = analysis.accumulator();
        let summary = reporter.phase("Run", || {
            runner::run_units(
                &units,
                |unit_id, unit| analysis.run_step(unit_id, unit),
                |partial| analysis.combine(&mut accumulator, partial),
                &options,
                reporter,
            )
        })?;

        lifecycle.advance(JobState::Aggregating, reporter)?;
        let mut outputs = reporter.phase("Finalize", || analysis.finalize(accumulator))?;
        check_outputs(A::NAME, &declared, &outputs)?;
        if let Some(instrument) = analysis.instrument() {
            instrument.apply(&mut outputs, Q_AXIS, OMEGA_AXIS);
        }
        let mut header = vec![format!("{} ({})", A::LABEL, A::NAME)];
        header.extend(configuration.describe());
        outputs.header = header.join("\n");

        lifecycle.advance(JobState::Writing, reporter)?;
        let files = configuration.output_files(OUTPUT_FILES_SLOT)?;
        let written = reporter.phase("Write", || {
            commit_outputs(
                &files.basename,
                &files.formats,
                &outputs,
                context.settings().temp_dir.as_deref(),
            )
        })?;

        lifecycle.advance(JobState::Finished, reporter)?;
        Ok(JobReport {
            job: A::NAME,
            state: lifecycle.state(),
            units: summary.units,
            workers: summary.workers,
            outputs: written,
            elapsed: started.elapsed(),
        })
    }
}

impl<A: Analysis> JobDefinition for AnalysisJob<A> {
    fn name(&self) -> &'static str {
        A::NAME
    }

    fn category(&self) -> &'static str {
        A::CATEGORY
    }

    fn label(&self) -> &'static str {
        A::LABEL
    }

    fn settings(&self) -> Vec<ConfiguratorSlot> {
        let mut slots = A::settings();
        slots.extend(common_settings());
        slots
    }

    #[instrument(skip_all, name = "job", fields(job = A::NAME))]
    fn execute(
        &self,
        configuration: Configuration,
        context: &EngineContext,
        reporter: &ProgressReporter,
    ) -> Result<JobReport, EngineError> {
        let started = Instant::now();
        let mut lifecycle = JobLifecycle::new(A::NAME);
        if let Some(slot) = self
            .settings()
            .iter()
            .find(|slot| !configuration.contains(slot.name))
        {
            return Err(EngineError::Internal(format!(
                "job '{}' was handed a configuration without '{}'",
                A::NAME,
                slot.name
            )));
        }
        lifecycle.advance(JobState::Configured, reporter)?;

        match self.run(&configuration, context, reporter, &mut lifecycle, started) {
            Ok(report) => {
                info!(
                    units = report.units,
                    workers = report.workers,
                    outputs = report.outputs.len(),
                    elapsed = ?report.elapsed,
                    "Job finished"
                );
                Ok(report)
            }
            Err(error) => {
                lifecycle.fail(reporter);
                warn!(%error, "Job failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::configure;
    use crate::engine::registry::Registry;
    use toml::Table;

    fn common_configuration(extra: &str) -> Configuration {
        let mut parameters: Table = extra.parse().unwrap();
        parameters.insert(
            OUTPUT_FILES_SLOT.into(),
            Value::from(vec![Value::from("out"), Value::from(vec![Value::from("ascii")])]),
        );
        configure(&common_settings(), &parameters, &Registry::with_defaults().unwrap()).unwrap()
    }

    #[test]
    fn zero_timeouts_mean_no_limit() {
        let configuration = common_configuration("job_timeout = 2.5");
        assert_eq!(timeout(&configuration, UNIT_TIMEOUT_SLOT).unwrap(), None);
        assert_eq!(
            timeout(&configuration, JOB_TIMEOUT_SLOT).unwrap(),
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn timeouts_beyond_any_duration_are_configuration_errors() {
        let configuration = common_configuration("unit_timeout = 1e300");
        let err = timeout(&configuration, UNIT_TIMEOUT_SLOT).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(e) if e.slot == UNIT_TIMEOUT_SLOT));
    }

    #[test]
    fn the_lifecycle_follows_the_declared_order() {
        let reporter = ProgressReporter::new();
        let mut lifecycle = JobLifecycle::new("test");
        for state in [
            JobState::Configured,
            JobState::Running,
            JobState::Aggregating,
            JobState::Writing,
            JobState::Finished,
        ] {
            lifecycle.advance(state, &reporter).unwrap();
        }
        assert_eq!(lifecycle.state(), JobState::Finished);
        assert!(lifecycle.advance(JobState::Failed, &reporter).is_err());
    }

    #[test]
    fn skipping_a_state_is_an_internal_error() {
        let reporter = ProgressReporter::new();
        let mut lifecycle = JobLifecycle::new("test");
        lifecycle.advance(JobState::Configured, &reporter).unwrap();
        let err = lifecycle.advance(JobState::Writing, &reporter).unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
        assert_eq!(lifecycle.state(), JobState::Configured);
    }

    #[test]
    fn failed_is_terminal() {
        let reporter = ProgressReporter::new();
        let mut lifecycle = JobLifecycle::new("test");
        lifecycle.advance(JobState::Configured, &reporter).unwrap();
        lifecycle.fail(&reporter);
        assert_eq!(lifecycle.state(), JobState::Failed);
        for state in [JobState::Running, JobState::Finished, JobState::Failed] {
            assert!(lifecycle.advance(state, &reporter).is_err());
        }
    }

    #[test]
    fn outputs_must_match_their_declarations() {
        use crate::core::io::{OutputAxis, OutputVariable};

        let declared = vec![VariableDecl::new("msd_total", &[TIME_AXIS], "nm2")];
        let mut outputs = OutputSet::new("header");
        outputs.add_axis(TIME_AXIS, OutputAxis::new(vec![0.0, 1.0], "ps"));
        outputs.add_variable(OutputVariable::from_vec("msd_total", vec![0.0, 1.0], TIME_AXIS, "nm2"));
        check_outputs("msd", &declared, &outputs).unwrap();

        let mut extra = outputs.clone();
        extra.add_variable(OutputVariable::from_vec("msd_H", vec![0.0, 1.0], TIME_AXIS, "nm2"));
        assert!(check_outputs("msd", &declared, &extra).is_err());

        let missing = OutputSet::new("header");
        assert!(check_outputs("msd", &declared, &missing).is_err());
    }

    #[test]
    fn common_settings_have_sensible_defaults() {
        let slots = common_settings();
        let names: Vec<_> = slots.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [RUNNING_MODE_SLOT, OUTPUT_FILES_SLOT, UNIT_TIMEOUT_SLOT, JOB_TIMEOUT_SLOT]
        );
        assert!(slots[1].default.is_none());
        assert!(slots[0].default.is_some());
    }
}
