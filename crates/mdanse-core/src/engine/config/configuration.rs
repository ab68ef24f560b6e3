use super::resolve::resolve;
use super::slot::ConfiguratorSlot;
use super::value::{
    ConfiguredValue, FrameSelection, OutputFiles, QVectorsValue, RangeValue, ResolutionValue,
    TrajectoryInput, WeightsValue,
};
use crate::core::instrument::Instrument;
use crate::core::selection::Selection;
use crate::engine::error::{ConfigurationError, EngineError};
use crate::engine::registry::Registry;
use crate::engine::runner::RunningMode;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use toml::Table;
use tracing::{debug, instrument};

/// Resolved slot values of one job, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    values: BTreeMap<String, ConfiguredValue>,
    order: Vec<String>,
}

macro_rules! typed_accessor {
    ($(#[$meta:meta])* $fn:ident, $variant:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn(&self, name: &str) -> Result<&$ty, EngineError> {
            match self.get(name) {
                Some(ConfiguredValue::$variant(value)) => Ok(value),
                Some(other) => Err(EngineError::Internal(format!(
                    "slot '{name}' holds '{other}', not a {} value",
                    stringify!($variant)
                ))),
                None => Err(EngineError::Internal(format!("slot '{name}' is not configured"))),
            }
        }
    };
}

impl Configuration {
    pub fn get(&self, name: &str) -> Option<&ConfiguredValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn insert(&mut self, name: &str, value: ConfiguredValue) {
        if self.values.insert(name.to_string(), value).is_none() {
            self.order.push(name.to_string());
        }
    }

    /// Values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfiguredValue)> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.values.get(name).map(|value| (name.as_str(), value)))
    }

    typed_accessor!(integer, Integer, i64);
    typed_accessor!(float, Float, f64);
    typed_accessor!(boolean, Boolean, bool);
    typed_accessor!(string, String, String);
    typed_accessor!(choice, Enum, String);
    typed_accessor!(frames, Frames, FrameSelection);
    typed_accessor!(range, Range, RangeValue);
    typed_accessor!(trajectory, Trajectory, TrajectoryInput);
    typed_accessor!(atom_selection, AtomSelection, Selection);
    typed_accessor!(q_vectors, QVectors, QVectorsValue);
    typed_accessor!(resolution, InstrumentResolution, ResolutionValue);
    typed_accessor!(instrument, Instrument, Instrument);
    typed_accessor!(output_files, OutputFiles, OutputFiles);
    typed_accessor!(running_mode, RunningMode, RunningMode);
    typed_accessor!(weights, Weights, WeightsValue);
    typed_accessor!(
        /// A path that was checked to exist when the job was configured.
        input_file,
        InputFile,
        std::path::PathBuf
    );

    pub fn input_path(&self, name: &str) -> Result<&Path, EngineError> {
        self.input_file(name).map(|p| p.as_path())
    }

    /// `name = value` lines for output headers. Output locations and the
    /// running mode are left out so that outputs do not depend on them.
    pub fn describe(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, value)| {
                !matches!(
                    value,
                    ConfiguredValue::OutputFiles(_) | ConfiguredValue::RunningMode(_)
                )
            })
            .map(|(name, value)| match value {
                ConfiguredValue::Trajectory(input) => {
                    let file = input
                        .path
                        .file_name()
                        .map(|f| f.to_string_lossy().to_string())
                        .unwrap_or_default();
                    format!("{name} = {file} ({})", input.format)
                }
                other => format!("{name} = {other}"),
            })
            .collect()
    }
}

fn check_declarations(slots: &[ConfiguratorSlot]) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    for slot in slots {
        for dependency in &slot.dependencies {
            if !seen.contains(dependency) {
                let cause = if slots.iter().any(|s| s.name == *dependency) {
                    format!("depends on '{dependency}', which is declared later")
                } else {
                    format!("depends on undeclared slot '{dependency}'")
                };
                return Err(ConfigurationError::new(slot.name, slot.kind.name(), "", cause));
            }
        }
        if !seen.insert(slot.name) {
            return Err(ConfigurationError::new(
                slot.name,
                slot.kind.name(),
                "",
                "declared twice",
            ));
        }
    }
    Ok(())
}

/// Resolves `parameters` against `slots`.
///
/// Slots are resolved in declaration order so each one can read the values
/// of its dependencies. Keys that name no slot are rejected, and a missing
/// key falls back to the slot default.
#[instrument(skip_all, name = "configure")]
pub fn configure(
    slots: &[ConfiguratorSlot],
    parameters: &Table,
    registry: &Registry,
) -> Result<Configuration, EngineError> {
    check_declarations(slots)?;
    if let Some((key, value)) = parameters
        .iter()
        .find(|(key, _)| !slots.iter().any(|slot| slot.name == key.as_str()))
    {
        return Err(ConfigurationError::new(
            key.as_str(),
            "unknown",
            value.to_string(),
            "not a parameter of this job",
        )
        .into());
    }

    let mut configuration = Configuration::default();
    for slot in slots {
        let raw = parameters
            .get(slot.name)
            .or(slot.default.as_ref())
            .ok_or_else(|| {
                ConfigurationError::new(slot.name, slot.kind.name(), "", "no value and no default")
            })?;
        let value = resolve(slot, raw, &configuration, registry)?;
        debug!(slot = slot.name, value = %value, "Resolved parameter");
        configuration.insert(slot.name, value);
    }
    Ok(configuration)
}
