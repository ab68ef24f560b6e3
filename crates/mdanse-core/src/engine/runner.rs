use super::error::{EngineError, KernelError};
use super::progress::{Progress, ProgressReporter};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningMode {
    Monoprocessor,
    Multiprocessor(usize),
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunningMode::Monoprocessor => f.write_str("monoprocessor"),
            RunningMode::Multiprocessor(n) => write!(f, "multiprocessor({n})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub mode: RunningMode,
    /// Upper bound on the number of workers, whatever the mode asks for.
    pub worker_cap: usize,
    pub unit_timeout: Option<Duration>,
    pub job_timeout: Option<Duration>,
    /// Set from outside to stop the run between units.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl RunnerOptions {
    pub fn new(mode: RunningMode) -> Self {
        Self {
            mode,
            worker_cap: usize::MAX,
            unit_timeout: None,
            job_timeout: None,
            cancel: None,
        }
    }

    pub fn with_worker_cap(mut self, cap: usize) -> Self {
        self.worker_cap = cap.max(1);
        self
    }

    pub fn with_unit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.unit_timeout = timeout;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn workers(&self) -> usize {
        match self.mode {
            RunningMode::Monoprocessor => 1,
            RunningMode::Multiprocessor(n) => n.min(self.worker_cap).max(1),
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn job_expired(&self, started: Instant) -> bool {
        self.job_timeout.is_some_and(|limit| started.elapsed() > limit)
    }

    fn unit_expired(&self, elapsed: Duration) -> bool {
        self.unit_timeout.is_some_and(|limit| elapsed > limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub units: usize,
    pub workers: usize,
}

fn unit_timeout_error(unit_id: usize, elapsed: Duration, options: &RunnerOptions) -> EngineError {
    EngineError::Timeout(format!(
        "work unit {unit_id} ran for {elapsed:?} (limit {:?})",
        options.unit_timeout.unwrap_or_default()
    ))
}

fn job_timeout_error(options: &RunnerOptions) -> EngineError {
    EngineError::Timeout(format!(
        "job exceeded its limit of {:?}",
        options.job_timeout.unwrap_or_default()
    ))
}

/// Runs `step` over every unit and folds the partial results with `fold`.
///
/// Partial results are always folded in unit order, whatever the mode and
/// the order in which workers finish, so the folded state does not depend
/// on the number of workers. The first failure cancels the units that have
/// not started yet; later failures are dropped.
pub fn run_units<U, P, S, F>(
    units: &[U],
    step: S,
    fold: F,
    options: &RunnerOptions,
    reporter: &ProgressReporter,
) -> Result<RunSummary, EngineError>
where
    U: Sync,
    P: Send,
    S: Fn(usize, &U) -> Result<P, KernelError> + Sync,
    F: FnMut(P),
{
    let workers = options.workers();
    info!(units = units.len(), workers, mode = %options.mode, "Running work units");
    reporter.report(Progress::TaskStart {
        total_steps: units.len() as u64,
    });
    let result = match options.mode {
        RunningMode::Monoprocessor => run_serial(units, step, fold, options, reporter),
        RunningMode::Multiprocessor(_) => run_parallel(units, step, fold, workers, options, reporter),
    };
    reporter.report(Progress::TaskFinish);
    result.map(|()| RunSummary {
        units: units.len(),
        workers,
    })
}

fn run_serial<U, P, S, F>(
    units: &[U],
    step: S,
    mut fold: F,
    options: &RunnerOptions,
    reporter: &ProgressReporter,
) -> Result<(), EngineError>
where
    S: Fn(usize, &U) -> Result<P, KernelError>,
    F: FnMut(P),
{
    let started = Instant::now();
    for (unit_id, unit) in units.iter().enumerate() {
        if options.cancelled() {
            return Err(EngineError::Cancelled);
        }
        if options.job_expired(started) {
            return Err(job_timeout_error(options));
        }
        let unit_started = Instant::now();
        let partial = step(unit_id, unit).map_err(|source| EngineError::Kernel { unit_id, source })?;
        let elapsed = unit_started.elapsed();
        if options.unit_expired(elapsed) {
            return Err(unit_timeout_error(unit_id, elapsed, options));
        }
        fold(partial);
        reporter.report(Progress::TaskIncrement);
    }
    Ok(())
}

type Delivery<P> = (usize, Duration, Result<P, KernelError>);

fn run_parallel<U, P, S, F>(
    units: &[U],
    step: S,
    mut fold: F,
    workers: usize,
    options: &RunnerOptions,
    reporter: &ProgressReporter,
) -> Result<(), EngineError>
where
    U: Sync,
    P: Send,
    S: Fn(usize, &U) -> Result<P, KernelError> + Sync,
    F: FnMut(P),
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("mdanse-worker-{i}"))
        .build()
        .map_err(|e| EngineError::Internal(format!("cannot start the worker pool: {e}")))?;

    let abort = AtomicBool::new(false);
    let external = options.cancel.clone();
    let (sender, receiver) = mpsc::channel::<Delivery<P>>();
    let started = Instant::now();

    let mut pending: BTreeMap<usize, P> = BTreeMap::new();
    let mut next = 0;
    let mut failure: Option<EngineError> = None;

    thread::scope(|scope| {
        let abort = &abort;
        let step = &step;
        let external = external.as_deref();
        scope.spawn(move || {
            pool.scope_fifo(|fifo| {
                for (unit_id, unit) in units.iter().enumerate() {
                    let sender = sender.clone();
                    fifo.spawn_fifo(move |_| {
                        let stopped = abort.load(Ordering::Relaxed)
                            || external.is_some_and(|flag| flag.load(Ordering::Relaxed));
                        if stopped {
                            return;
                        }
                        let unit_started = Instant::now();
                        let result = step(unit_id, unit);
                        // The controller only hangs up after every sender is gone.
                        let _ = sender.send((unit_id, unit_started.elapsed(), result));
                    });
                }
            });
            drop(sender);
        });

        let fail = |error: EngineError, failure: &mut Option<EngineError>| {
            if failure.is_none() {
                warn!(%error, "Aborting run");
                abort.store(true, Ordering::Relaxed);
                *failure = Some(error);
            } else {
                debug!(%error, "Discarding error after the first failure");
            }
        };

        loop {
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok((unit_id, elapsed, result)) => match result {
                    Err(source) => fail(EngineError::Kernel { unit_id, source }, &mut failure),
                    Ok(_) if options.unit_expired(elapsed) => {
                        fail(unit_timeout_error(unit_id, elapsed, options), &mut failure)
                    }
                    Ok(partial) if failure.is_none() => {
                        pending.insert(unit_id, partial);
                        while let Some(partial) = pending.remove(&next) {
                            fold(partial);
                            next += 1;
                            reporter.report(Progress::TaskIncrement);
                        }
                    }
                    Ok(_) => {}
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if failure.is_none() {
                if options.cancelled() {
                    fail(EngineError::Cancelled, &mut failure);
                } else if options.job_expired(started) {
                    fail(job_timeout_error(options), &mut failure);
                }
            }
        }
    });

    if let Some(error) = failure {
        return Err(error);
    }
    if next != units.len() {
        return Err(EngineError::Internal(format!(
            "{} of {} work units delivered no result",
            units.len() - next,
            units.len()
        )));
    }
    Ok(())
}
