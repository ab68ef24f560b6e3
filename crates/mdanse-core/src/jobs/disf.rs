use super::common::{self, ElementGroups, FRAMES, INSTRUMENT, INSTRUMENT_RESOLUTION, Q_VECTORS, TRAJECTORY};
use crate::core::cell::UnitCell;
use crate::core::instrument::Instrument;
use crate::core::io::{OutputAxis, OutputSet, OutputVariable};
use crate::core::math::correlation::autocorrelation_complex;
use crate::core::math::qvectors::{self, QShell};
use crate::core::math::spectrum::spectrum;
use crate::core::math::unfold::unfold;
use crate::core::trajectory::TrajectoryReader;
use crate::engine::config::{ConfiguratorSlot, Configuration, FrameSelection, ResolutionValue};
use crate::engine::context::EngineContext;
use crate::engine::error::{EngineError, KernelError};
use crate::engine::job::{Analysis, OMEGA_AXIS, Q_AXIS, TIME_AXIS, VariableDecl};
use rustfft::num_complex::Complex;

/// Incoherent intermediate scattering function F(Q,t) and its dynamic
/// structure factor S(Q,ω).
///
/// `F_a(Q,t) = <exp(-iQ·r_a(0)) exp(iQ·r_a(t))>`, averaged over time origins
/// and over the vectors of each shell, then over the atoms of each element.
pub struct DynamicIncoherentStructureFactor {
    reader: TrajectoryReader,
    frames: FrameSelection,
    cells: Vec<Option<UnitCell>>,
    groups: ElementGroups,
    shells: Vec<QShell>,
    resolution: ResolutionValue,
    instrument: Instrument,
}

impl DynamicIncoherentStructureFactor {
    fn shell_correlation(&self, shell: &QShell, positions: &[nalgebra::Vector3<f64>]) -> Vec<f64> {
        let n = positions.len();
        let mut sum = vec![0.0; n];
        if shell.vectors.is_empty() {
            return sum;
        }
        for q in &shell.vectors {
            let series: Vec<Complex<f64>> = positions
                .iter()
                .map(|r| Complex::from_polar(1.0, q.dot(r)))
                .collect();
            for (s, c) in sum.iter_mut().zip(autocorrelation_complex(&series)) {
                *s += c.re;
            }
        }
        let count = shell.vectors.len() as f64;
        sum.iter_mut().for_each(|s| *s /= count);
        sum
    }

    fn structure_factor(&self, f_qt: &[f64]) -> Vec<f64> {
        let n = self.frames.len();
        f_qt.chunks(n.max(1))
            .flat_map(|row| {
                self.resolution
                    .sampled
                    .convolve(&spectrum(row, self.frames.time_step))
            })
            .collect()
    }
}

impl Analysis for DynamicIncoherentStructureFactor {
    const NAME: &'static str = "dynamic_incoherent_structure_factor";
    const CATEGORY: &'static str = "Scattering";
    const LABEL: &'static str = "Dynamic Incoherent Structure Factor";

    type Unit = usize;
    /// Element position and F(Q,t) of one atom, shells by rows.
    type Partial = (usize, Vec<f64>);
    type Accumulator = Vec<Vec<f64>>;

    fn settings() -> Vec<ConfiguratorSlot> {
        vec![
            common::trajectory_slot(),
            common::frames_slot(),
            common::resolution_slot(),
            common::q_vectors_slot(),
            common::atom_selection_slot(),
            common::weights_slot("b_incoherent2"),
            common::instrument_slot(),
        ]
    }

    fn initialize(configuration: &Configuration, _context: &EngineContext) -> Result<Self, EngineError> {
        let reader = configuration.trajectory(TRAJECTORY)?.reader.clone();
        let frames = configuration.frames(FRAMES)?.clone();
        let generator = &configuration.q_vectors(Q_VECTORS)?.shells;
        Ok(Self {
            cells: common::frame_cells(&reader, &frames.indices)?,
            groups: ElementGroups::from_configuration(configuration)?,
            shells: qvectors::shells(generator.as_ref()).collect(),
            resolution: configuration.resolution(INSTRUMENT_RESOLUTION)?.clone(),
            instrument: configuration.instrument(INSTRUMENT)?.clone(),
            reader,
            frames,
        })
    }

    fn declared_outputs(&self) -> Vec<VariableDecl> {
        let suffixes = self
            .groups
            .elements
            .iter()
            .map(String::as_str)
            .chain(["total"]);
        suffixes
            .flat_map(|suffix| {
                [
                    VariableDecl::new(format!("f(q,t)_{suffix}"), &[Q_AXIS, TIME_AXIS], "au"),
                    VariableDecl::new(format!("s(q,f)_{suffix}"), &[Q_AXIS, OMEGA_AXIS], "au"),
                ]
            })
            .collect()
    }

    fn split(&self) -> Vec<usize> {
        (0..self.groups.atoms.len()).collect()
    }

    fn accumulator(&self) -> Vec<Vec<f64>> {
        vec![vec![0.0; self.shells.len() * self.frames.len()]; self.groups.elements.len()]
    }

    fn run_step(&self, _unit_id: usize, unit: &usize) -> Result<(usize, Vec<f64>), KernelError> {
        let atom = self.groups.atoms[*unit];
        let positions = unfold(&self.reader.atom_series(atom, &self.frames.indices)?, &self.cells);
        let f_qt: Vec<f64> = self
            .shells
            .iter()
            .flat_map(|shell| self.shell_correlation(shell, &positions))
            .collect();
        common::ensure_finite("intermediate scattering function", &f_qt)?;
        Ok((self.groups.element_of[*unit], f_qt))
    }

    fn combine(&self, accumulator: &mut Vec<Vec<f64>>, (element, f_qt): (usize, Vec<f64>)) {
        common::add_into(&mut accumulator[element], &f_qt);
    }

    fn finalize(&self, accumulator: Vec<Vec<f64>>) -> Result<OutputSet, EngineError> {
        let (nq, nt) = (self.shells.len(), self.frames.len());
        let nw = self.resolution.omega.len();
        let mut outputs = OutputSet::default();
        let q_values: Vec<f64> = self.shells.iter().map(|shell| shell.q).collect();
        outputs.add_axis(Q_AXIS, OutputAxis::new(q_values, "nm-1"));
        outputs.add_axis(TIME_AXIS, OutputAxis::new(self.frames.times.clone(), "ps"));
        outputs.add_axis(OMEGA_AXIS, OutputAxis::new(self.resolution.omega.clone(), "rad/ps"));

        let mut total = vec![0.0; nq * nt];
        let mut partials = Vec::with_capacity(accumulator.len() + 1);
        for (i, sum) in accumulator.into_iter().enumerate() {
            let count = self.groups.counts[i] as f64;
            let f_qt: Vec<f64> = sum.into_iter().map(|v| v / count).collect();
            for (t, v) in total.iter_mut().zip(&f_qt) {
                *t += self.groups.weights[i] * v;
            }
            partials.push((self.groups.elements[i].clone(), f_qt));
        }
        partials.push(("total".to_string(), total));

        for (suffix, f_qt) in partials {
            let s_qw = self.structure_factor(&f_qt);
            outputs.add_variable(OutputVariable::new(
                format!("s(q,f)_{suffix}"),
                common::array(&[nq, nw], s_qw)?,
                &[Q_AXIS, OMEGA_AXIS],
                "au",
            ));
            outputs.add_variable(OutputVariable::new(
                format!("f(q,t)_{suffix}"),
                common::array(&[nq, nt], f_qt)?,
                &[Q_AXIS, TIME_AXIS],
                "au",
            ));
        }
        Ok(outputs)
    }

    fn instrument(&self) -> Option<&Instrument> {
        Some(&self.instrument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{Fixture, run};

    const LINEAR_Q: &str = "q_vectors = [\"linear\", { shells = [1.0, 4.0, 1.0], width = 1.0 }]";

    #[test]
    fn resting_atoms_do_not_decorrelate() {
        let fixture = Fixture::linear_motion(6, 0.0);
        let outputs = run::<DynamicIncoherentStructureFactor>(&fixture, LINEAR_Q);
        let f = outputs.variable("f(q,t)_total").unwrap();
        assert_eq!(f.shape(), &[3, 6]);
        assert!(f.data.iter().all(|v| (v - 1.0).abs() < 1e-12));
        let s = outputs.variable("s(q,f)_total").unwrap();
        assert_eq!(s.shape(), &[3, 11]);
    }

    #[test]
    fn ballistic_motion_follows_the_phase() {
        // x(t) = x0 + v t along the Q direction, so F(Q,t) = cos(Q v t).
        let fixture = Fixture::linear_motion(6, 0.1);
        let outputs = run::<DynamicIncoherentStructureFactor>(&fixture, LINEAR_Q);
        let f = outputs.variable("f(q,t)_H").unwrap();
        let q = outputs.axis(Q_AXIS).unwrap().values.clone();
        for (iq, qv) in q.iter().enumerate() {
            for t in 0..6 {
                let expected = (qv * 0.1 * t as f64).cos();
                assert!((f.data[[iq, t]] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn the_instrument_culls_uncovered_shells() {
        let fixture = Fixture::linear_motion(6, 0.0);
        let extra = format!(
            "{LINEAR_Q}\ninstrument = {{ coverage = [\"angular\", {{ wavelength = 5.0, min_angle = 0.0, max_angle = 60.0 }}] }}"
        );
        // 4π sin(30°) / 5 ≈ 1.2566 nm⁻¹, so only the first shell is covered.
        let outputs = run::<DynamicIncoherentStructureFactor>(&fixture, &extra);
        let f = outputs.variable("f(q,t)_total").unwrap();
        assert!(f.data[[0, 0]] > 0.0);
        assert!(f.data.index_axis(ndarray::Axis(0), 2).iter().all(|v| *v == 0.0));
    }
}
