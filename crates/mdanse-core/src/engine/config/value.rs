use crate::core::instrument::Instrument;
use crate::core::io::OutputFormat;
use crate::core::math::qvectors::QVectorGenerator;
use crate::core::math::resolution::{ResolutionKernel, SampledKernel};
use crate::core::selection::Selection;
use crate::core::trajectory::TrajectoryReader;
use crate::engine::runner::RunningMode;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Frames selected from a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSelection {
    pub first: usize,
    /// Exclusive, clipped to the trajectory length.
    pub last: usize,
    pub step: usize,
    pub indices: Vec<usize>,
    /// Times of the selected frames relative to the first one (ps).
    pub times: Vec<f64>,
    /// Time between two selected frames (ps).
    pub time_step: f64,
}

impl FrameSelection {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeValue {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct TrajectoryInput {
    pub path: PathBuf,
    pub format: &'static str,
    pub reader: TrajectoryReader,
}

#[derive(Debug, Clone)]
pub struct QVectorsValue {
    pub generator: String,
    pub shells: Arc<dyn QVectorGenerator>,
}

/// A resolution kernel sampled on the omega axis of the frame selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionValue {
    pub kernel: ResolutionKernel,
    pub omega: Vec<f64>,
    pub sampled: SampledKernel,
}

#[derive(Clone)]
pub struct OutputFiles {
    pub basename: PathBuf,
    pub formats: Vec<Arc<dyn OutputFormat>>,
}

impl fmt::Debug for OutputFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.formats.iter().map(|format| format.name()).collect();
        f.debug_struct("OutputFiles")
            .field("basename", &self.basename)
            .field("formats", &names)
            .finish()
    }
}

/// Per-element property values and counts over the bound selection.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightsValue {
    pub property: String,
    pub values: BTreeMap<String, f64>,
    pub counts: BTreeMap<String, usize>,
}

/// A slot value after resolution.
#[derive(Debug, Clone)]
pub enum ConfiguredValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Enum(String),
    Frames(FrameSelection),
    Range(RangeValue),
    Trajectory(TrajectoryInput),
    AtomSelection(Selection),
    QVectors(QVectorsValue),
    InstrumentResolution(ResolutionValue),
    Instrument(Instrument),
    OutputFiles(OutputFiles),
    RunningMode(RunningMode),
    Weights(WeightsValue),
    InputFile(PathBuf),
}

impl fmt::Display for ConfiguredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfiguredValue::Integer(v) => write!(f, "{v}"),
            ConfiguredValue::Float(v) => write!(f, "{v}"),
            ConfiguredValue::Boolean(v) => write!(f, "{v}"),
            ConfiguredValue::String(v) | ConfiguredValue::Enum(v) => write!(f, "{v}"),
            ConfiguredValue::Frames(frames) => write!(
                f,
                "[{}, {}, {}] ({} frames, dt = {} ps)",
                frames.first,
                frames.last,
                frames.step,
                frames.len(),
                frames.time_step
            ),
            ConfiguredValue::Range(range) => {
                write!(f, "[{}, {}, {}]", range.start, range.stop, range.step)
            }
            ConfiguredValue::Trajectory(input) => {
                write!(f, "{} ({})", input.path.display(), input.format)
            }
            ConfiguredValue::AtomSelection(selection) => write!(f, "{selection}"),
            ConfiguredValue::QVectors(q) => {
                write!(f, "{} ({} shells)", q.generator, q.shells.shell_count())
            }
            ConfiguredValue::InstrumentResolution(r) => write!(f, "{:?}", r.kernel),
            ConfiguredValue::Instrument(instrument) => write!(f, "{}", instrument.describe()),
            ConfiguredValue::OutputFiles(files) => {
                let names: Vec<_> = files.formats.iter().map(|format| format.name()).collect();
                write!(f, "{} [{}]", files.basename.display(), names.join(", "))
            }
            ConfiguredValue::RunningMode(mode) => write!(f, "{mode}"),
            ConfiguredValue::Weights(w) => write!(f, "{}", w.property),
            ConfiguredValue::InputFile(path) => write!(f, "{}", path.display()),
        }
    }
}
