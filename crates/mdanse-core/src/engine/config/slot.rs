use std::fmt;
use toml::Value;

/// What a slot accepts and how its raw value is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotKind {
    Integer { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    Boolean,
    String,
    Enum { choices: Vec<String> },
    /// `[first, last, step]` over the frames of a trajectory dependency.
    Frames,
    /// `[start, stop, step]` floats; `min` bounds `start` from below.
    Range { min: Option<f64> },
    /// Path to a trajectory file, opened through the converter registered
    /// for its extension.
    Trajectory,
    AtomSelection,
    QVectors,
    InstrumentResolution,
    Instrument,
    OutputFiles,
    RunningMode,
    /// Name of the element property used for weighting.
    Weights,
    InputFile,
}

impl SlotKind {
    pub fn name(&self) -> &'static str {
        match self {
            SlotKind::Integer { .. } => "integer",
            SlotKind::Float { .. } => "float",
            SlotKind::Boolean => "boolean",
            SlotKind::String => "string",
            SlotKind::Enum { .. } => "enum",
            SlotKind::Frames => "frames",
            SlotKind::Range { .. } => "range",
            SlotKind::Trajectory => "trajectory",
            SlotKind::AtomSelection => "atom_selection",
            SlotKind::QVectors => "q_vectors",
            SlotKind::InstrumentResolution => "instrument_resolution",
            SlotKind::Instrument => "instrument",
            SlotKind::OutputFiles => "output_files",
            SlotKind::RunningMode => "running_mode",
            SlotKind::Weights => "weights",
            SlotKind::InputFile => "input_file",
        }
    }

    /// Kinds whose value carries a file path, possibly nested, that is
    /// relative to the parameters document.
    pub fn carries_path(&self) -> bool {
        matches!(
            self,
            SlotKind::Trajectory
                | SlotKind::InputFile
                | SlotKind::OutputFiles
                | SlotKind::AtomSelection
                | SlotKind::Instrument
        )
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed parameter declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguratorSlot {
    pub name: &'static str,
    pub kind: SlotKind,
    pub default: Option<Value>,
    /// Slots this one reads while resolving; they must be declared earlier.
    pub dependencies: Vec<&'static str>,
    pub label: &'static str,
}

impl ConfiguratorSlot {
    pub fn new(name: &'static str, kind: SlotKind) -> Self {
        Self {
            name,
            kind,
            default: None,
            dependencies: Vec::new(),
            label: "",
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn depends_on(mut self, dependencies: &[&'static str]) -> Self {
        self.dependencies = dependencies.to_vec();
        self
    }

    pub fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }
}
