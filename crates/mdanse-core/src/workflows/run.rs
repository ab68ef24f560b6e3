use crate::engine::config::configure;
use crate::engine::context::EngineContext;
use crate::engine::error::{ConfigurationError, EngineError};
use crate::engine::job::JobReport;
use crate::engine::parameters::{ParametersError, ParametersFile};
use crate::engine::progress::ProgressReporter;
use std::path::Path;
use toml::Table;
use tracing::{info, instrument};

const PARAMETERS_FILE: &str = "parameters file";

/// Configures and executes the job registered as `name`.
///
/// Every parameter is resolved before the job starts, so a configuration
/// error never leaves a worker or an output file behind.
#[instrument(skip_all, name = "run_workflow", fields(job = name))]
pub fn run_job(
    context: &EngineContext,
    name: &str,
    parameters: &Table,
    reporter: &ProgressReporter,
) -> Result<JobReport, EngineError> {
    let job = context.registry().job(name)?;
    let settings = job.settings();
    let configuration = reporter.phase("Configure", || {
        configure(&settings, parameters, context.registry())
    })?;
    info!(slots = configuration.len(), "Configuration resolved");
    for line in configuration.describe() {
        info!("  {line}");
    }
    job.execute(configuration, context, reporter)
}

/// Loads a saved parameters file and runs the job it names.
///
/// Relative paths in the file are taken relative to the file's directory.
#[instrument(skip_all, name = "run_parameters_file", fields(path = %path.display()))]
pub fn run_parameters_file(
    context: &EngineContext,
    path: &Path,
    reporter: &ProgressReporter,
) -> Result<JobReport, EngineError> {
    let mut document = ParametersFile::load(path).map_err(parameters_error)?;
    let job = context.registry().job(&document.mdanse_type)?;
    if document.mdanse_category != job.category() {
        return Err(ConfigurationError::new(
            "mdanse_category",
            PARAMETERS_FILE,
            document.mdanse_category.clone(),
            format!("job '{}' belongs to '{}'", job.name(), job.category()),
        )
        .into());
    }
    document.resolve_paths(&job.settings());
    run_job(context, job.name(), &document.parameters, reporter)
}

fn parameters_error(error: ParametersError) -> EngineError {
    match error {
        ParametersError::Io { path, source } => EngineError::Io { path, source },
        ParametersError::Parse { path, source } => ConfigurationError::new(
            PARAMETERS_FILE,
            "toml",
            path.display().to_string(),
            source.to_string(),
        )
        .into(),
        ParametersError::Serialize(e) => EngineError::Internal(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::EngineSettings;
    use crate::engine::job::JobState;
    use crate::engine::progress::Progress;
    use crate::engine::registry::{Category, Registry};
    use crate::jobs::testing::Fixture;
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use toml::Value;

    const DISF: &str = "dynamic_incoherent_structure_factor";
    const MSD: &str = "mean_square_displacement";
    const LINEAR_Q: &str = "q_vectors = [\"linear\", { shells = [1.0, 4.0, 1.0], width = 1.0 }]";

    fn context() -> EngineContext {
        EngineContext::new(
            Arc::new(Registry::with_defaults().unwrap()),
            EngineSettings::default(),
        )
    }

    fn output_files(basename: &Path) -> Value {
        Value::from(vec![
            Value::String(basename.to_string_lossy().to_string()),
            Value::from(vec![Value::from("ascii")]),
        ])
    }

    #[test]
    fn out_of_order_frames_fail_before_anything_runs() {
        let fixture = Fixture::linear_motion(20, 0.1);
        let parameters = fixture.parameters("frames = [10, 5, 1]");
        let started = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if matches!(event, Progress::TaskStart { .. }) {
                started.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let err = run_job(&context(), MSD, &parameters, &reporter).unwrap_err();
        match err {
            EngineError::Configuration(e) => assert_eq!(e.slot, "frames"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert!(!fixture.dir.path().join("out.dat").exists());
    }

    #[test]
    fn unknown_jobs_are_named_in_the_error() {
        let fixture = Fixture::linear_motion(4, 0.1);
        let err = run_job(&context(), "nope", &fixture.parameters(""), &ProgressReporter::new())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnknownName { category: Category::Job, ref name } if name == "nope"
        ));
    }

    #[test]
    fn worker_count_does_not_change_the_output_bytes() {
        let fixture = Fixture::linear_motion(100, 0.05);
        let outputs = tempfile::tempdir().unwrap();
        let extra = format!("{LINEAR_Q}\nframes = [0, 100, 1]");

        let mut payloads = Vec::new();
        for (run, mode) in [
            ("mono", ("monoprocessor", 1i64)),
            ("multi", ("multiprocessor", 4)),
            ("again", ("multiprocessor", 4)),
        ] {
            let mut parameters = fixture.parameters(&extra);
            parameters.insert(
                "running_mode".into(),
                Value::from(vec![Value::from(mode.0), Value::from(mode.1)]),
            );
            let basename = outputs.path().join(run).join("disf");
            parameters.insert("output_files".into(), output_files(&basename));

            let increments = AtomicUsize::new(0);
            let reporter = ProgressReporter::with_callback(Box::new(|event| {
                if matches!(event, Progress::TaskIncrement) {
                    increments.fetch_add(1, Ordering::SeqCst);
                }
            }));
            let report = run_job(&context(), DISF, &parameters, &reporter).unwrap();
            assert_eq!(report.state, JobState::Finished);
            assert_eq!(report.units, 6);
            assert_eq!(increments.load(Ordering::SeqCst), 6);
            assert_eq!(report.outputs, vec![basename.with_extension("dat")]);
            payloads.push(fs::read(&report.outputs[0]).unwrap());
        }
        assert!(!payloads[0].is_empty());
        assert_eq!(payloads[0], payloads[1]);
        assert_eq!(payloads[1], payloads[2]);
    }

    #[test]
    fn parameters_files_resolve_paths_against_their_directory() {
        let fixture = Fixture::linear_motion(5, 0.1);
        let path = fixture.dir.path().join("msd.toml");
        fs::write(
            &path,
            r#"
mdanse_category = "Dynamics"
mdanse_type = "mean_square_displacement"

[parameters]
trajectory = "trajectory.json"
frames = [0, 5, 1]
output_files = ["results/msd", ["ascii"]]
"#,
        )
        .unwrap();

        let report = run_parameters_file(&context(), &path, &ProgressReporter::new()).unwrap();
        let expected = fixture.dir.path().join("results").join("msd.dat");
        assert_eq!(report.outputs, vec![expected.clone()]);
        let text = fs::read_to_string(expected).unwrap();
        assert!(text.contains("msd_total"));
    }

    #[test]
    fn parameters_files_must_name_the_right_category() {
        let fixture = Fixture::linear_motion(5, 0.1);
        let path = fixture.dir.path().join("msd.toml");
        fs::write(
            &path,
            "mdanse_category = \"Scattering\"\nmdanse_type = \"mean_square_displacement\"\n",
        )
        .unwrap();
        let err = run_parameters_file(&context(), &path, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(e) if e.slot == "mdanse_category"));
    }

    #[test]
    fn unreadable_parameters_files_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let missing = run_parameters_file(&context(), &dir.path().join("none.toml"), &ProgressReporter::new())
            .unwrap_err();
        assert!(matches!(missing, EngineError::Io { .. }));

        let path = dir.path().join("bad.toml");
        fs::write(&path, "mdanse_type = \"x\"\nextra = 1\n").unwrap();
        let malformed = run_parameters_file(&context(), &path, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(malformed, EngineError::Configuration(e) if e.slot == PARAMETERS_FILE));
    }
}
