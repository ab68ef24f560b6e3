use super::common::{self, ElementGroups, FRAMES, INSTRUMENT_RESOLUTION, TRAJECTORY};
use crate::core::cell::UnitCell;
use crate::core::io::{OutputAxis, OutputSet, OutputVariable};
use crate::core::math::correlation::autocorrelation_vectors;
use crate::core::math::spectrum::spectrum;
use crate::core::math::unfold::unfold;
use crate::core::trajectory::TrajectoryReader;
use crate::engine::config::{
    ConfiguratorSlot, Configuration, FrameSelection, ResolutionValue, SlotKind,
};
use crate::engine::context::EngineContext;
use crate::engine::error::{EngineError, KernelError};
use crate::engine::job::{Analysis, OMEGA_AXIS, TIME_AXIS, VariableDecl};
use nalgebra::Vector3;
use tracing::debug;

const NORMALIZE: &str = "normalize";

/// Velocity autocorrelation function and the density of states it implies.
///
/// Velocities come from the trajectory when it stores them, otherwise they
/// are differentiated from the unfolded positions.
pub struct VelocityAutocorrelation {
    reader: TrajectoryReader,
    frames: FrameSelection,
    cells: Vec<Option<UnitCell>>,
    groups: ElementGroups,
    resolution: ResolutionValue,
    stored_velocities: bool,
    normalize: bool,
}

/// Central differences inside the series, one-sided at both ends.
fn differentiate(positions: &[Vector3<f64>], dt: f64) -> Vec<Vector3<f64>> {
    let n = positions.len();
    if n < 2 {
        return vec![Vector3::zeros(); n];
    }
    (0..n)
        .map(|i| match i {
            0 => (positions[1] - positions[0]) / dt,
            i if i == n - 1 => (positions[n - 1] - positions[n - 2]) / dt,
            i => (positions[i + 1] - positions[i - 1]) / (2.0 * dt),
        })
        .collect()
}

impl VelocityAutocorrelation {
    fn velocities(&self, atom: usize) -> Result<Vec<Vector3<f64>>, KernelError> {
        if self.stored_velocities {
            return Ok(self.reader.atom_velocity_series(atom, &self.frames.indices)?);
        }
        let positions = self.reader.atom_series(atom, &self.frames.indices)?;
        Ok(differentiate(&unfold(&positions, &self.cells), self.frames.time_step))
    }

    fn scaled(&self, mut vacf: Vec<f64>) -> Vec<f64> {
        if self.normalize {
            if let Some(&first) = vacf.first().filter(|v| **v != 0.0) {
                vacf.iter_mut().for_each(|v| *v /= first);
            }
        }
        vacf
    }

    fn density_of_states(&self, vacf: &[f64]) -> Vec<f64> {
        self.resolution
            .sampled
            .convolve(&spectrum(vacf, self.frames.time_step))
    }
}

impl Analysis for VelocityAutocorrelation {
    const NAME: &'static str = "velocity_autocorrelation_function";
    const CATEGORY: &'static str = "Dynamics";
    const LABEL: &'static str = "Velocity AutoCorrelation Function";

    type Unit = usize;
    type Partial = (usize, Vec<f64>);
    type Accumulator = Vec<Vec<f64>>;

    fn settings() -> Vec<ConfiguratorSlot> {
        vec![
            common::trajectory_slot(),
            common::frames_slot(),
            common::resolution_slot(),
            common::atom_selection_slot(),
            common::weights_slot("equal"),
            ConfiguratorSlot::new(NORMALIZE, SlotKind::Boolean)
                .default_value(false)
                .label("Normalize to 1 at t = 0"),
        ]
    }

    fn initialize(configuration: &Configuration, _context: &EngineContext) -> Result<Self, EngineError> {
        let reader = configuration.trajectory(TRAJECTORY)?.reader.clone();
        let frames = configuration.frames(FRAMES)?.clone();
        let stored_velocities = reader.has_velocities();
        debug!(stored_velocities, "Velocity source");
        let cells = if stored_velocities {
            Vec::new()
        } else {
            common::frame_cells(&reader, &frames.indices)?
        };
        Ok(Self {
            groups: ElementGroups::from_configuration(configuration)?,
            resolution: configuration.resolution(INSTRUMENT_RESOLUTION)?.clone(),
            normalize: *configuration.boolean(NORMALIZE)?,
            reader,
            frames,
            cells,
            stored_velocities,
        })
    }

    fn declared_outputs(&self) -> Vec<VariableDecl> {
        let suffixes: Vec<&str> = self
            .groups
            .elements
            .iter()
            .map(String::as_str)
            .chain(["total"])
            .collect();
        let mut declared = Vec::with_capacity(2 * suffixes.len());
        for suffix in &suffixes {
            declared.push(VariableDecl::new(format!("vacf_{suffix}"), &[TIME_AXIS], "nm2/ps2"));
        }
        for suffix in &suffixes {
            declared.push(VariableDecl::new(format!("dos_{suffix}"), &[OMEGA_AXIS], "nm2/ps"));
        }
        declared
    }

    fn split(&self) -> Vec<usize> {
        (0..self.groups.atoms.len()).collect()
    }

    fn accumulator(&self) -> Vec<Vec<f64>> {
        vec![vec![0.0; self.frames.len()]; self.groups.elements.len()]
    }

    fn run_step(&self, _unit_id: usize, unit: &usize) -> Result<(usize, Vec<f64>), KernelError> {
        let velocities = self.velocities(self.groups.atoms[*unit])?;
        let vacf = autocorrelation_vectors(&velocities);
        common::ensure_finite("velocity autocorrelation", &vacf)?;
        Ok((self.groups.element_of[*unit], vacf))
    }

    fn combine(&self, accumulator: &mut Vec<Vec<f64>>, (element, vacf): (usize, Vec<f64>)) {
        common::add_into(&mut accumulator[element], &vacf);
    }

    fn finalize(&self, accumulator: Vec<Vec<f64>>) -> Result<OutputSet, EngineError> {
        let mut outputs = OutputSet::default();
        outputs.add_axis(TIME_AXIS, OutputAxis::new(self.frames.times.clone(), "ps"));
        outputs.add_axis(OMEGA_AXIS, OutputAxis::new(self.resolution.omega.clone(), "rad/ps"));

        let mut total = vec![0.0; self.frames.len()];
        let mut partials = Vec::with_capacity(accumulator.len() + 1);
        for (i, sum) in accumulator.into_iter().enumerate() {
            let count = self.groups.counts[i] as f64;
            let vacf: Vec<f64> = sum.into_iter().map(|v| v / count).collect();
            for (t, v) in total.iter_mut().zip(&vacf) {
                *t += self.groups.weights[i] * v;
            }
            partials.push((self.groups.elements[i].as_str(), vacf));
        }
        partials.push(("total", total));

        for (suffix, vacf) in partials {
            let vacf = self.scaled(vacf);
            let dos = self.density_of_states(&vacf);
            outputs.add_variable(OutputVariable::from_vec(
                format!("dos_{suffix}"),
                dos,
                OMEGA_AXIS,
                "nm2/ps",
            ));
            outputs.add_variable(OutputVariable::from_vec(
                format!("vacf_{suffix}"),
                vacf,
                TIME_AXIS,
                "nm2/ps2",
            ));
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{Fixture, run};

    #[test]
    fn derivatives_use_central_differences() {
        let positions: Vec<_> = [0.0, 1.0, 4.0, 9.0]
            .iter()
            .map(|&x| Vector3::new(x, 0.0, 0.0))
            .collect();
        let v: Vec<f64> = differentiate(&positions, 1.0).iter().map(|v| v.x).collect();
        assert_eq!(v, vec![1.0, 2.0, 4.0, 5.0]);
        assert!(differentiate(&positions[..1], 1.0)[0].norm() == 0.0);
    }

    #[test]
    fn constant_velocity_gives_a_flat_vacf() {
        let fixture = Fixture::linear_motion(8, 0.1);
        let outputs = run::<VelocityAutocorrelation>(&fixture, "");
        let vacf = outputs.variable("vacf_total").unwrap();
        assert!(vacf.data.iter().all(|v| (v - 0.01).abs() < 1e-12));
        assert_eq!(outputs.variable("dos_total").unwrap().shape(), &[15]);
    }

    #[test]
    fn stored_velocities_are_preferred() {
        let fixture = Fixture::with_velocities(6, 2.0);
        let outputs = run::<VelocityAutocorrelation>(&fixture, "normalize = false");
        let vacf = outputs.variable("vacf_total").unwrap();
        assert!((vacf.data[[0]] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn the_density_of_states_integrates_to_the_vacf_origin() {
        let fixture = Fixture::linear_motion(8, 0.1);
        let outputs = run::<VelocityAutocorrelation>(
            &fixture,
            "normalize = true\ninstrument_resolution = [\"gaussian\", { sigma = 0.5 }]",
        );
        let omega = &outputs.axis(OMEGA_AXIS).unwrap().values;
        let d_omega = omega[1] - omega[0];
        let dos = outputs.variable("dos_total").unwrap();
        let integral: f64 = dos.data.iter().sum::<f64>() * d_omega;
        assert!((integral - 1.0).abs() < 1e-6, "integral {integral}");
    }
}
