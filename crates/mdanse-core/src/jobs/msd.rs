use super::common::{self, ElementGroups, FRAMES, TRAJECTORY};
use crate::core::cell::UnitCell;
use crate::core::io::{OutputAxis, OutputSet, OutputVariable};
use crate::core::math::correlation::mean_square_displacement;
use crate::core::math::unfold::unfold;
use crate::core::trajectory::TrajectoryReader;
use crate::engine::config::{ConfiguratorSlot, Configuration, FrameSelection};
use crate::engine::context::EngineContext;
use crate::engine::error::{EngineError, KernelError};
use crate::engine::job::{Analysis, TIME_AXIS, VariableDecl};

/// Mean square displacement of the selected atoms, per element and
/// weighted over elements.
///
/// One work unit per selected atom: the atom's path is unfolded across
/// periodic boundaries and its MSD computed over all time origins.
pub struct MeanSquareDisplacement {
    reader: TrajectoryReader,
    frames: FrameSelection,
    cells: Vec<Option<UnitCell>>,
    groups: ElementGroups,
}

impl Analysis for MeanSquareDisplacement {
    const NAME: &'static str = "mean_square_displacement";
    const CATEGORY: &'static str = "Dynamics";
    const LABEL: &'static str = "Mean Square Displacement";

    /// Position of the atom in the selection.
    type Unit = usize;
    /// Element position and the atom's MSD.
    type Partial = (usize, Vec<f64>);
    /// Summed MSD per element.
    type Accumulator = Vec<Vec<f64>>;

    fn settings() -> Vec<ConfiguratorSlot> {
        vec![
            common::trajectory_slot(),
            common::frames_slot(),
            common::atom_selection_slot(),
            common::weights_slot("equal"),
        ]
    }

    fn initialize(configuration: &Configuration, _context: &EngineContext) -> Result<Self, EngineError> {
        let reader = configuration.trajectory(TRAJECTORY)?.reader.clone();
        let frames = configuration.frames(FRAMES)?.clone();
        let cells = common::frame_cells(&reader, &frames.indices)?;
        let groups = ElementGroups::from_configuration(configuration)?;
        Ok(Self {
            reader,
            frames,
            cells,
            groups,
        })
    }

    fn declared_outputs(&self) -> Vec<VariableDecl> {
        self.groups
            .elements
            .iter()
            .map(|e| format!("msd_{e}"))
            .chain(["msd_total".to_string()])
            .map(|name| VariableDecl::new(name, &[TIME_AXIS], "nm2"))
            .collect()
    }

    fn split(&self) -> Vec<usize> {
        (0..self.groups.atoms.len()).collect()
    }

    fn accumulator(&self) -> Vec<Vec<f64>> {
        vec![vec![0.0; self.frames.len()]; self.groups.elements.len()]
    }

    fn run_step(&self, _unit_id: usize, unit: &usize) -> Result<(usize, Vec<f64>), KernelError> {
        let atom = self.groups.atoms[*unit];
        let positions = self.reader.atom_series(atom, &self.frames.indices)?;
        let msd = mean_square_displacement(&unfold(&positions, &self.cells));
        common::ensure_finite("mean square displacement", &msd)?;
        Ok((self.groups.element_of[*unit], msd))
    }

    fn combine(&self, accumulator: &mut Vec<Vec<f64>>, (element, msd): (usize, Vec<f64>)) {
        common::add_into(&mut accumulator[element], &msd);
    }

    fn finalize(&self, accumulator: Vec<Vec<f64>>) -> Result<OutputSet, EngineError> {
        let n = self.frames.len();
        let mut outputs = OutputSet::default();
        outputs.add_axis(TIME_AXIS, OutputAxis::new(self.frames.times.clone(), "ps"));

        let mut total = vec![0.0; n];
        for (i, (element, sum)) in self.groups.elements.iter().zip(accumulator).enumerate() {
            let count = self.groups.counts[i] as f64;
            let msd: Vec<f64> = sum.into_iter().map(|v| v / count).collect();
            for (t, v) in total.iter_mut().zip(&msd) {
                *t += self.groups.weights[i] * v;
            }
            outputs.add_variable(
                OutputVariable::from_vec(format!("msd_{element}"), msd, TIME_AXIS, "nm2")
                    .with_description(format!("mean square displacement of {element}")),
            );
        }
        outputs.add_variable(
            OutputVariable::from_vec("msd_total", total, TIME_AXIS, "nm2")
                .with_description("weighted mean square displacement"),
        );
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{Fixture, run};

    #[test]
    fn ballistic_motion_gives_quadratic_msd() {
        // Every atom moves 0.1 nm per ps along x, frames 1 ps apart.
        let fixture = Fixture::linear_motion(8, 0.1);
        let outputs = run::<MeanSquareDisplacement>(&fixture, "");
        let total = outputs.variable("msd_total").unwrap();
        for (k, value) in total.data.iter().enumerate() {
            let expected = (0.1 * k as f64).powi(2);
            assert!((value - expected).abs() < 1e-9, "lag {k}: {value} vs {expected}");
        }
        assert!(outputs.variable("msd_H").is_some());
        assert!(outputs.variable("msd_O").is_some());
        assert_eq!(outputs.axis(TIME_AXIS).unwrap().values[1], 1.0);
    }

    #[test]
    fn paths_are_unfolded_before_the_msd() {
        // One atom hopping across the boundary of a 1 nm box every frame.
        let fixture = Fixture::boundary_crossing();
        let outputs = run::<MeanSquareDisplacement>(&fixture, "");
        let total = outputs.variable("msd_total").unwrap();
        assert!((total.data[[1]] - 0.04).abs() < 1e-9);
    }

    #[test]
    fn empty_selections_give_zero_totals() {
        let fixture = Fixture::linear_motion(4, 0.1);
        let outputs = run::<MeanSquareDisplacement>(
            &fixture,
            "atom_selection = { atom_index = [\"100\"] }",
        );
        let names: Vec<_> = outputs.variables.keys().cloned().collect();
        assert_eq!(names, ["msd_total"]);
        assert!(outputs.variable("msd_total").unwrap().data.iter().all(|v| *v == 0.0));
    }
}
