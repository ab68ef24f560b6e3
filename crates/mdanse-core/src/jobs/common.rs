use crate::core::cell::UnitCell;
use crate::core::math::weights::element_weights;
use crate::core::models::system::ChemicalSystem;
use crate::engine::config::{ConfiguratorSlot, Configuration, SlotKind, WeightsValue};
use crate::engine::error::{EngineError, KernelError};
use crate::core::trajectory::TrajectoryReader;
use ndarray::{ArrayD, IxDyn};
use std::collections::{BTreeMap, HashMap};
use toml::{Table, Value};

pub(crate) const TRAJECTORY: &str = "trajectory";
pub(crate) const FRAMES: &str = "frames";
pub(crate) const ATOM_SELECTION: &str = "atom_selection";
pub(crate) const WEIGHTS: &str = "weights";
pub(crate) const Q_VECTORS: &str = "q_vectors";
pub(crate) const INSTRUMENT_RESOLUTION: &str = "instrument_resolution";
pub(crate) const INSTRUMENT: &str = "instrument";

pub(crate) fn trajectory_slot() -> ConfiguratorSlot {
    ConfiguratorSlot::new(TRAJECTORY, SlotKind::Trajectory).label("Trajectory file")
}

pub(crate) fn frames_slot() -> ConfiguratorSlot {
    ConfiguratorSlot::new(FRAMES, SlotKind::Frames)
        .default_value("all")
        .depends_on(&[TRAJECTORY])
        .label("Frames [first, last, step]")
}

pub(crate) fn atom_selection_slot() -> ConfiguratorSlot {
    let mut all = Table::new();
    all.insert("all".into(), Value::Array(vec![Value::from("*")]));
    ConfiguratorSlot::new(ATOM_SELECTION, SlotKind::AtomSelection)
        .default_value(Value::Table(all))
        .depends_on(&[TRAJECTORY])
        .label("Atom selection")
}

pub(crate) fn weights_slot(default: &str) -> ConfiguratorSlot {
    ConfiguratorSlot::new(WEIGHTS, SlotKind::Weights)
        .default_value(default)
        .depends_on(&[TRAJECTORY, ATOM_SELECTION])
        .label("Weights")
}

pub(crate) fn q_vectors_slot() -> ConfiguratorSlot {
    let mut params = Table::new();
    params.insert("shells".into(), Value::from(vec![Value::from(5.0), Value::from(50.0), Value::from(5.0)]));
    params.insert("width".into(), Value::from(1.0));
    params.insert("n_vectors".into(), Value::from(50i64));
    ConfiguratorSlot::new(Q_VECTORS, SlotKind::QVectors)
        .default_value(vec![Value::from("spherical_lattice"), Value::Table(params)])
        .depends_on(&[TRAJECTORY, FRAMES])
        .label("Q-vectors")
}

pub(crate) fn resolution_slot() -> ConfiguratorSlot {
    ConfiguratorSlot::new(INSTRUMENT_RESOLUTION, SlotKind::InstrumentResolution)
        .default_value(vec![Value::from("ideal"), Value::Table(Table::new())])
        .depends_on(&[FRAMES])
        .label("Instrument resolution")
}

pub(crate) fn instrument_slot() -> ConfiguratorSlot {
    ConfiguratorSlot::new(INSTRUMENT, SlotKind::Instrument)
        .default_value(Value::Table(Table::new()))
        .label("Instrument")
}

/// Selected atoms grouped by element, as positions into the element list.
#[derive(Debug, Clone)]
pub(crate) struct ElementGroups {
    /// Sorted element symbols present in the selection.
    pub elements: Vec<String>,
    /// Selected atom indices, ascending.
    pub atoms: Vec<usize>,
    /// For each entry of `atoms`, its position in `elements`.
    pub element_of: Vec<usize>,
    /// Number of selected atoms per element.
    pub counts: Vec<usize>,
    /// Normalized per-element weights, in `elements` order.
    pub weights: Vec<f64>,
}

impl ElementGroups {
    pub fn new(system: &ChemicalSystem, atoms: &[usize], weights: &WeightsValue) -> Self {
        let counts_by_name = system.element_counts(atoms);
        let elements: Vec<String> = counts_by_name.keys().cloned().collect();
        let position: HashMap<&str, usize> = elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.as_str(), i))
            .collect();
        let element_of = atoms
            .iter()
            .map(|&i| {
                system
                    .atom(i)
                    .and_then(|atom| position.get(atom.element.as_str()).copied())
                    .unwrap_or(0)
            })
            .collect();
        let normalized = element_weights(&weights.values, &counts_by_name);
        Self {
            counts: elements.iter().map(|e| counts_by_name[e]).collect(),
            weights: elements
                .iter()
                .map(|e| normalized.get(e).copied().unwrap_or(0.0))
                .collect(),
            elements,
            atoms: atoms.to_vec(),
            element_of,
        }
    }

    pub fn from_configuration(configuration: &Configuration) -> Result<Self, EngineError> {
        let system = configuration.trajectory(TRAJECTORY)?.reader.chemical_system();
        let selection = configuration.atom_selection(ATOM_SELECTION)?;
        let weights = configuration.weights(WEIGHTS)?;
        Ok(Self::new(system, selection.indices(), weights))
    }

    /// Counts of each element as a map, for the pair weighting helpers.
    pub fn count_map(&self) -> BTreeMap<String, usize> {
        self.elements.iter().cloned().zip(self.counts.iter().copied()).collect()
    }
}

pub(crate) fn frame_cells(
    reader: &TrajectoryReader,
    frames: &[usize],
) -> Result<Vec<Option<UnitCell>>, EngineError> {
    Ok(reader.unit_cells(frames)?)
}

pub(crate) fn ensure_finite(what: &str, values: &[f64]) -> Result<(), KernelError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(KernelError::NonFinite(what.to_string()))
    }
}

/// Adds `values` into `target` elementwise.
pub(crate) fn add_into(target: &mut [f64], values: &[f64]) {
    for (t, v) in target.iter_mut().zip(values) {
        *t += v;
    }
}

/// Row-major data of the given shape as an output array.
pub(crate) fn array(shape: &[usize], data: Vec<f64>) -> Result<ArrayD<f64>, EngineError> {
    ArrayD::from_shape_vec(IxDyn(shape), data)
        .map_err(|e| EngineError::Internal(format!("output shape {shape:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::system::tests::two_waters;

    fn weights(property: &str, values: &[(&str, f64)]) -> WeightsValue {
        WeightsValue {
            property: property.into(),
            values: values.iter().map(|(e, v)| (e.to_string(), *v)).collect(),
            counts: BTreeMap::new(),
        }
    }

    #[test]
    fn groups_follow_the_selection() {
        let system = two_waters();
        let groups = ElementGroups::new(&system, &[0, 1, 2, 4], &weights("equal", &[("H", 1.0), ("O", 1.0)]));
        assert_eq!(groups.elements, vec!["H", "O"]);
        assert_eq!(groups.counts, vec![3, 1]);
        assert_eq!(groups.element_of, vec![1, 0, 0, 0]);
        assert_eq!(groups.weights, vec![0.75, 0.25]);
    }

    #[test]
    fn empty_selections_have_no_groups() {
        let groups = ElementGroups::new(&two_waters(), &[], &weights("mass", &[]));
        assert!(groups.elements.is_empty());
        assert!(groups.weights.is_empty());
    }

    #[test]
    fn non_finite_values_are_kernel_errors() {
        assert!(ensure_finite("x", &[0.0, 1.0]).is_ok());
        assert_eq!(
            ensure_finite("x", &[0.0, f64::NAN]),
            Err(KernelError::NonFinite("x".into()))
        );
    }
}
