use super::common::{self, ElementGroups, FRAMES, TRAJECTORY, WEIGHTS};
use crate::core::cell::UnitCell;
use crate::core::io::{OutputAxis, OutputSet, OutputVariable};
use crate::core::math::van_hove::{RadialBins, pair_histogram};
use crate::core::math::weights::weights;
use crate::core::trajectory::TrajectoryReader;
use crate::engine::config::{ConfiguratorSlot, Configuration, FrameSelection, SlotKind};
use crate::engine::context::EngineContext;
use crate::engine::error::{ConfigurationError, EngineError, KernelError};
use crate::engine::job::{Analysis, VariableDecl};
use nalgebra::Vector3;
use std::collections::BTreeMap;
use toml::Value;

const R_VALUES: &str = "r_values";
const R_AXIS: &str = "r";

/// Partial and total pair distribution functions g(r).
///
/// One work unit per frame. Each unit bins the minimum-image distances of
/// every element pair; the histograms are normalized by the ideal-gas pair
/// density of the average cell volume.
pub struct PairDistributionFunction {
    reader: TrajectoryReader,
    frames: FrameSelection,
    cells: Vec<UnitCell>,
    groups: ElementGroups,
    property: BTreeMap<String, f64>,
    bins: RadialBins,
    /// Element positions of each pair, `a <= b`.
    pairs: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameHistograms {
    histograms: Vec<Vec<f64>>,
    volume: f64,
}

impl PairDistributionFunction {
    fn pair_name(&self, (a, b): (usize, usize)) -> String {
        format!("pdf_{}{}", self.groups.elements[a], self.groups.elements[b])
    }

    /// Number of distinct atom pairs of a pair of elements.
    fn pair_count(&self, (a, b): (usize, usize)) -> f64 {
        let na = self.groups.counts[a] as f64;
        if a == b {
            na * (na - 1.0) / 2.0
        } else {
            na * self.groups.counts[b] as f64
        }
    }
}

impl Analysis for PairDistributionFunction {
    const NAME: &'static str = "pair_distribution_function";
    const CATEGORY: &'static str = "Structure";
    const LABEL: &'static str = "Pair Distribution Function";

    /// Position of the frame in the frame selection.
    type Unit = usize;
    type Partial = FrameHistograms;
    type Accumulator = FrameHistograms;

    fn settings() -> Vec<ConfiguratorSlot> {
        vec![
            common::trajectory_slot(),
            common::frames_slot(),
            ConfiguratorSlot::new(R_VALUES, SlotKind::Range { min: Some(0.0) })
                .default_value(vec![Value::from(0.0), Value::from(1.0), Value::from(0.01)])
                .label("Distances [start, stop, step] (nm)"),
            common::atom_selection_slot(),
            common::weights_slot("b_coherent"),
        ]
    }

    fn initialize(configuration: &Configuration, _context: &EngineContext) -> Result<Self, EngineError> {
        let input = configuration.trajectory(TRAJECTORY)?;
        let reader = input.reader.clone();
        let frames = configuration.frames(FRAMES)?.clone();
        let cells = common::frame_cells(&reader, &frames.indices)?
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ConfigurationError::new(
                    TRAJECTORY,
                    "trajectory",
                    input.path.display().to_string(),
                    "the pair distribution function needs a periodic trajectory",
                )
            })?;
        let range = configuration.range(R_VALUES)?;
        let bins = RadialBins::new(range.start, range.stop, range.step)
            .map_err(|e| ConfigurationError::new(R_VALUES, "range", "", e.to_string()))?;
        let groups = ElementGroups::from_configuration(configuration)?;
        let n = groups.elements.len();
        let pairs = (0..n).flat_map(|a| (a..n).map(move |b| (a, b))).collect();
        Ok(Self {
            property: configuration.weights(WEIGHTS)?.values.clone(),
            reader,
            frames,
            cells,
            groups,
            bins,
            pairs,
        })
    }

    fn declared_outputs(&self) -> Vec<VariableDecl> {
        self.pairs
            .iter()
            .map(|&pair| self.pair_name(pair))
            .chain(["pdf_total".to_string()])
            .map(|name| VariableDecl::new(name, &[R_AXIS], "au"))
            .collect()
    }

    fn split(&self) -> Vec<usize> {
        (0..self.frames.len()).collect()
    }

    fn accumulator(&self) -> FrameHistograms {
        FrameHistograms {
            histograms: vec![vec![0.0; self.bins.count]; self.pairs.len()],
            volume: 0.0,
        }
    }

    fn run_step(&self, _unit_id: usize, unit: &usize) -> Result<FrameHistograms, KernelError> {
        let cell = &self.cells[*unit];
        let coordinates = self.reader.coordinates(self.frames.indices[*unit])?;
        let mut by_element: Vec<Vec<Vector3<f64>>> = vec![Vec::new(); self.groups.elements.len()];
        for (position, &atom) in self.groups.atoms.iter().enumerate() {
            let r = coordinates.get(atom).ok_or_else(|| {
                KernelError::Failed(format!("atom {atom} missing from frame {}", self.frames.indices[*unit]))
            })?;
            by_element[self.groups.element_of[position]].push(*r);
        }
        let histograms = self
            .pairs
            .iter()
            .map(|&(a, b)| pair_histogram(&by_element[a], &by_element[b], a == b, Some(cell), &self.bins))
            .collect();
        Ok(FrameHistograms {
            histograms,
            volume: cell.volume(),
        })
    }

    fn combine(&self, accumulator: &mut FrameHistograms, partial: FrameHistograms) {
        for (sum, histogram) in accumulator.histograms.iter_mut().zip(&partial.histograms) {
            common::add_into(sum, histogram);
        }
        accumulator.volume += partial.volume;
    }

    fn finalize(&self, accumulator: FrameHistograms) -> Result<OutputSet, EngineError> {
        let n_frames = self.frames.len().max(1) as f64;
        let volume = accumulator.volume / n_frames;
        let shells = self.bins.shell_volumes();
        let pair_weights = weights(&self.property, &self.groups.count_map(), 2, true);

        let mut outputs = OutputSet::default();
        outputs.add_axis(R_AXIS, OutputAxis::new(self.bins.centers(), "nm"));
        let mut total = vec![0.0; self.bins.count];
        for (&pair, histogram) in self.pairs.iter().zip(accumulator.histograms) {
            let pairs = self.pair_count(pair);
            let g: Vec<f64> = histogram
                .iter()
                .zip(&shells)
                .map(|(count, shell)| {
                    let ideal = pairs * shell / volume;
                    if ideal > 0.0 { count / n_frames / ideal } else { 0.0 }
                })
                .collect();
            let key = vec![
                self.groups.elements[pair.0].clone(),
                self.groups.elements[pair.1].clone(),
            ];
            let weight = pair_weights.get(&key).copied().unwrap_or(0.0);
            for (t, v) in total.iter_mut().zip(&g) {
                *t += weight * v;
            }
            outputs.add_variable(OutputVariable::from_vec(self.pair_name(pair), g, R_AXIS, "au"));
        }
        outputs.add_variable(
            OutputVariable::from_vec("pdf_total", total, R_AXIS, "au")
                .with_description("weighted pair distribution function"),
        );
        Ok(outputs)
    }
}
