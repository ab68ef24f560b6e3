use crate::cli::RunArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use mdanse::engine::context::EngineContext;
use mdanse::engine::progress::ProgressReporter;
use mdanse::workflows;
use tracing::info;

pub fn run(args: RunArgs, context: &EngineContext) -> Result<()> {
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Running parameters file {:?}", &args.parameters);
    let report = workflows::run::run_parameters_file(context, &args.parameters, &reporter)?;

    info!(
        "Job '{}' finished: {} unit(s) on {} worker(s) in {:.2?}.",
        report.job, report.units, report.workers, report.elapsed
    );
    println!(
        "✓ {} finished in {:.2?} ({} units, {} workers).",
        report.job, report.elapsed, report.units, report.workers
    );
    for path in &report.outputs {
        println!("  Output written to: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use mdanse::core::models::system::ChemicalSystemBuilder;
    use mdanse::core::trajectory::{Configuration, TrajectoryError};
    use mdanse::core::trajectory::json::write_trajectory;
    use mdanse::core::trajectory::memory::InMemoryTrajectory;
    use mdanse::engine::context::EngineSettings;
    use mdanse::engine::error::EngineError;
    use mdanse::engine::registry::Registry;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    fn context() -> EngineContext {
        EngineContext::new(
            Arc::new(Registry::with_defaults().unwrap()),
            EngineSettings::default(),
        )
    }

    fn write_argon(dir: &Path) {
        let mut builder = ChemicalSystemBuilder::new("argon");
        builder.add_atom("Ar", "AR");
        builder.add_atom("Ar", "AR");
        let system = builder.build().unwrap();
        let frames = (0..4)
            .map(|t| {
                let x = 0.1 * t as f64;
                Configuration::new(vec![[x, 0.0, 0.0].into(), [0.0, x, 0.5].into()])
            })
            .collect();
        let times = (0..4).map(|t| t as f64).collect();
        let trajectory = InMemoryTrajectory::new(system, times, frames).unwrap();
        write_trajectory(&dir.join("argon.json"), &trajectory).unwrap();
    }

    #[test]
    fn a_parameters_file_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        write_argon(dir.path());
        let parameters = dir.path().join("msd.toml");
        fs::write(
            &parameters,
            "mdanse_category = \"Dynamics\"\n\
             mdanse_type = \"mean_square_displacement\"\n\n\
             [parameters]\n\
             trajectory = \"argon.json\"\n\
             output_files = [\"msd\", [\"ascii\", \"svg\"]]\n",
        )
        .unwrap();

        run(RunArgs { parameters }, &context()).unwrap();
        assert!(dir.path().join("msd.dat").is_file());
        assert!(dir.path().join("msd.svg").is_file());
    }

    #[test]
    fn configuration_errors_exit_with_code_one() {
        let dir = tempfile::tempdir().unwrap();
        write_argon(dir.path());
        let parameters = dir.path().join("msd.toml");
        fs::write(
            &parameters,
            "mdanse_category = \"Dynamics\"\n\
             mdanse_type = \"mean_square_displacement\"\n\n\
             [parameters]\n\
             trajectory = \"argon.json\"\n\
             frames = [3, 1, 1]\n\
             output_files = [\"msd\", [\"ascii\"]]\n",
        )
        .unwrap();

        let err = run(RunArgs { parameters }, &context()).unwrap_err();
        assert!(matches!(err, CliError::Engine(EngineError::Configuration(_))));
        assert_eq!(err.exit_code(), 1);
        assert!(!dir.path().join("msd.dat").exists());
    }

    fn msd_parameters(dir: &Path, trajectory: &str) -> std::path::PathBuf {
        let parameters = dir.join("msd.toml");
        fs::write(
            &parameters,
            format!(
                "mdanse_category = \"Dynamics\"\n\
                 mdanse_type = \"mean_square_displacement\"\n\n\
                 [parameters]\n\
                 trajectory = \"{trajectory}\"\n\
                 output_files = [\"msd\", [\"ascii\"]]\n"
            ),
        )
        .unwrap();
        parameters
    }

    #[test]
    fn unreadable_trajectories_exit_with_code_three() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), [0xff, 0xfe, 0x00]).unwrap();
        let parameters = msd_parameters(dir.path(), "broken.json");

        let err = run(RunArgs { parameters }, &context()).unwrap_err();
        assert!(matches!(
            err,
            CliError::Engine(EngineError::Trajectory(TrajectoryError::Unreadable { .. }))
        ));
        assert_eq!(err.exit_code(), 3);
        assert!(!dir.path().join("msd.dat").exists());
    }

    #[test]
    fn missing_trajectories_are_rejected_while_configuring() {
        let dir = tempfile::tempdir().unwrap();
        let parameters = msd_parameters(dir.path(), "missing.json");

        let err = run(RunArgs { parameters }, &context()).unwrap_err();
        assert!(matches!(err, CliError::Engine(EngineError::Configuration(ref e)) if e.slot == "trajectory"));
        assert_eq!(err.exit_code(), 1);
    }
}
