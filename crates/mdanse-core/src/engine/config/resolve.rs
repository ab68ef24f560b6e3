use super::configuration::Configuration;
use super::slot::{ConfiguratorSlot, SlotKind};
use super::value::{
    ConfiguredValue, FrameSelection, OutputFiles, QVectorsValue, RangeValue, ResolutionValue,
    TrajectoryInput, WeightsValue,
};
use crate::core::elements::{self, ElementProperty};
use crate::core::instrument::Instrument;
use crate::core::io::OutputFormat;
use crate::core::math::spectrum::omega_axis;
use crate::core::math::{arange, value_as_f64};
use crate::core::selection::{self, Selection, SelectionTerm, WILDCARD};
use crate::core::trajectory::TrajectoryReader;
use crate::engine::error::{ConfigurationError, EngineError};
use crate::engine::registry::{Category, Registry};
use crate::engine::runner::RunningMode;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use toml::{Table, Value};

type Resolved = Result<ConfiguredValue, EngineError>;

fn reject(slot: &ConfiguratorSlot, raw: &Value, cause: impl Into<String>) -> EngineError {
    EngineError::Configuration(ConfigurationError::new(
        slot.name,
        slot.kind.name(),
        raw.to_string(),
        cause,
    ))
}

/// Resolves `raw` for `slot`, reading already resolved dependencies from
/// `resolved`.
pub(crate) fn resolve(
    slot: &ConfiguratorSlot,
    raw: &Value,
    resolved: &Configuration,
    registry: &Registry,
) -> Resolved {
    match &slot.kind {
        SlotKind::Integer { min, max } => resolve_integer(slot, raw, *min, *max),
        SlotKind::Float { min, max } => resolve_float(slot, raw, *min, *max),
        SlotKind::Boolean => resolve_boolean(slot, raw),
        SlotKind::String => match raw {
            Value::String(s) => Ok(ConfiguredValue::String(s.clone())),
            _ => Err(reject(slot, raw, "expected a string")),
        },
        SlotKind::Enum { choices } => match raw {
            Value::String(s) if choices.iter().any(|c| c == s) => Ok(ConfiguredValue::Enum(s.clone())),
            _ => Err(reject(slot, raw, format!("expected one of: {}", choices.join(", ")))),
        },
        SlotKind::Frames => resolve_frames(slot, raw, resolved),
        SlotKind::Range { min } => resolve_range(slot, raw, *min),
        SlotKind::Trajectory => resolve_trajectory(slot, raw, registry),
        SlotKind::AtomSelection => resolve_atom_selection(slot, raw, resolved, registry),
        SlotKind::QVectors => resolve_q_vectors(slot, raw, resolved, registry),
        SlotKind::InstrumentResolution => resolve_resolution(slot, raw, resolved, registry),
        SlotKind::Instrument => resolve_instrument(slot, raw, registry),
        SlotKind::OutputFiles => resolve_output_files(slot, raw, registry),
        SlotKind::RunningMode => resolve_running_mode(slot, raw),
        SlotKind::Weights => resolve_weights(slot, raw, resolved),
        SlotKind::InputFile => match raw {
            Value::String(s) if PathBuf::from(s).is_file() => {
                Ok(ConfiguredValue::InputFile(PathBuf::from(s)))
            }
            Value::String(_) => Err(reject(slot, raw, "file not found")),
            _ => Err(reject(slot, raw, "expected a path")),
        },
    }
}

fn as_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Integer(i) => Some(*i),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Some(*f as i64)
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn resolve_integer(slot: &ConfiguratorSlot, raw: &Value, min: Option<i64>, max: Option<i64>) -> Resolved {
    let value = as_integer(raw).ok_or_else(|| reject(slot, raw, "expected an integer"))?;
    if let Some(min) = min.filter(|&m| value < m) {
        return Err(reject(slot, raw, format!("must be at least {min}")));
    }
    if let Some(max) = max.filter(|&m| value > m) {
        return Err(reject(slot, raw, format!("must be at most {max}")));
    }
    Ok(ConfiguredValue::Integer(value))
}

fn resolve_float(slot: &ConfiguratorSlot, raw: &Value, min: Option<f64>, max: Option<f64>) -> Resolved {
    let value = value_as_f64(raw)
        .filter(|v| v.is_finite())
        .ok_or_else(|| reject(slot, raw, "expected a finite number"))?;
    if let Some(min) = min.filter(|&m| value < m) {
        return Err(reject(slot, raw, format!("must be at least {min}")));
    }
    if let Some(max) = max.filter(|&m| value > m) {
        return Err(reject(slot, raw, format!("must be at most {max}")));
    }
    Ok(ConfiguredValue::Float(value))
}

fn resolve_boolean(slot: &ConfiguratorSlot, raw: &Value) -> Resolved {
    match raw {
        Value::Boolean(b) => Ok(ConfiguredValue::Boolean(*b)),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(ConfiguredValue::Boolean(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(ConfiguredValue::Boolean(false)),
        _ => Err(reject(slot, raw, "expected true or false")),
    }
}

fn dependency_trajectory<'a>(
    slot: &ConfiguratorSlot,
    raw: &Value,
    resolved: &'a Configuration,
) -> Result<&'a TrajectoryInput, EngineError> {
    slot.dependencies
        .iter()
        .filter_map(|name| resolved.get(name))
        .find_map(|value| match value {
            ConfiguredValue::Trajectory(input) => Some(input),
            _ => None,
        })
        .ok_or_else(|| reject(slot, raw, "needs a trajectory dependency"))
}

fn dependency_frames<'a>(
    slot: &ConfiguratorSlot,
    raw: &Value,
    resolved: &'a Configuration,
) -> Result<&'a FrameSelection, EngineError> {
    slot.dependencies
        .iter()
        .filter_map(|name| resolved.get(name))
        .find_map(|value| match value {
            ConfiguredValue::Frames(frames) => Some(frames),
            _ => None,
        })
        .ok_or_else(|| reject(slot, raw, "needs a frames dependency"))
}

fn dependency_selection<'a>(
    slot: &ConfiguratorSlot,
    resolved: &'a Configuration,
) -> Option<&'a Selection> {
    slot.dependencies
        .iter()
        .filter_map(|name| resolved.get(name))
        .find_map(|value| match value {
            ConfiguredValue::AtomSelection(selection) => Some(selection),
            _ => None,
        })
}

fn resolve_frames(slot: &ConfiguratorSlot, raw: &Value, resolved: &Configuration) -> Resolved {
    let reader = &dependency_trajectory(slot, raw, resolved)?.reader;
    let length = reader.length();

    let (first, last, step) = match raw {
        Value::String(s) if s.eq_ignore_ascii_case("all") => (0, length as i64, 1),
        Value::Array(items) if items.len() == 3 => {
            let numbers: Option<Vec<i64>> = items.iter().map(as_integer).collect();
            match numbers.as_deref() {
                Some(&[first, last, step]) => (first, last, step),
                _ => return Err(reject(slot, raw, "expected three integers")),
            }
        }
        _ => return Err(reject(slot, raw, "expected [first, last, step] or \"all\"")),
    };
    if first < 0 || step <= 0 {
        return Err(reject(slot, raw, "first must be non-negative and step positive"));
    }
    if first >= last {
        return Err(reject(slot, raw, "first must be smaller than last"));
    }
    let (first, step) = (first as usize, step as usize);
    let last = (last as usize).min(length);
    if first >= last {
        return Err(reject(
            slot,
            raw,
            format!("first frame beyond the trajectory ({length} frames)"),
        ));
    }

    let indices: Vec<usize> = (first..last).step_by(step).collect();
    let origin = reader.time(first)?;
    let times = indices
        .iter()
        .map(|&i| reader.time(i).map(|t| t - origin))
        .collect::<Result<Vec<_>, _>>()?;
    let time_step = match times.as_slice() {
        [t0, t1, ..] => t1 - t0,
        _ if length >= 2 => (reader.time(1)? - reader.time(0)?) * step as f64,
        _ => 1.0,
    };
    if !(time_step > 0.0) {
        return Err(reject(slot, raw, "frame times must be increasing"));
    }

    Ok(ConfiguredValue::Frames(FrameSelection {
        first,
        last,
        step,
        indices,
        times,
        time_step,
    }))
}

fn resolve_range(slot: &ConfiguratorSlot, raw: &Value, min: Option<f64>) -> Resolved {
    let Value::Array(items) = raw else {
        return Err(reject(slot, raw, "expected [start, stop, step]"));
    };
    let numbers: Option<Vec<f64>> = items.iter().map(value_as_f64).collect();
    let Some(&[start, stop, step]) = numbers.as_deref() else {
        return Err(reject(slot, raw, "expected three numbers"));
    };
    if !(start < stop) || !(step > 0.0) {
        return Err(reject(slot, raw, "expected start < stop and step > 0"));
    }
    if let Some(min) = min.filter(|&m| start < m) {
        return Err(reject(slot, raw, format!("start must be at least {min}")));
    }
    Ok(ConfiguredValue::Range(RangeValue {
        start,
        stop,
        step,
        values: arange(start, stop, step),
    }))
}

fn resolve_trajectory(slot: &ConfiguratorSlot, raw: &Value, registry: &Registry) -> Resolved {
    let Value::String(path) = raw else {
        return Err(reject(slot, raw, "expected a path"));
    };
    let path = PathBuf::from(path);
    if !path.is_file() {
        return Err(reject(slot, raw, "file not found"));
    }
    let converter = registry
        .converter_for(&path)
        .map_err(|_| reject(slot, raw, "no converter handles this file extension"))?;
    let trajectory = (converter.open)(&path)?;
    Ok(ConfiguredValue::Trajectory(TrajectoryInput {
        path,
        format: converter.name,
        reader: TrajectoryReader::new(trajectory),
    }))
}

fn value_strings(slot: &ConfiguratorSlot, raw: &Value, values: &Value) -> Result<Vec<String>, EngineError> {
    let scalar = |value: &Value| match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        _ => Err(reject(slot, raw, "selector values must be strings or integers")),
    };
    match values {
        Value::Array(items) => items.iter().map(scalar).collect(),
        other => Ok(vec![scalar(other)?]),
    }
}

fn selection_terms(
    slot: &ConfiguratorSlot,
    raw: &Value,
    registry: &Registry,
) -> Result<Vec<SelectionTerm>, EngineError> {
    let pairs: Vec<(String, Vec<String>)> = match raw {
        Value::String(name) => vec![(name.clone(), vec![WILDCARD.to_string()])],
        Value::Table(table) => table
            .iter()
            .map(|(name, values)| Ok((name.clone(), value_strings(slot, raw, values)?)))
            .collect::<Result<_, EngineError>>()?,
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(pair) if pair.len() == 2 => match &pair[0] {
                    Value::String(name) => Ok((name.clone(), value_strings(slot, raw, &pair[1])?)),
                    _ => Err(reject(slot, raw, "selector names must be strings")),
                },
                _ => Err(reject(slot, raw, "expected [selector, values] pairs")),
            })
            .collect::<Result<_, EngineError>>()?,
        _ => return Err(reject(slot, raw, "expected a selection expression")),
    };
    if pairs.is_empty() {
        return Err(reject(slot, raw, "the selection expression is empty"));
    }
    pairs
        .into_iter()
        .map(|(name, values)| {
            let selector = registry
                .selector(&name)
                .map_err(|_| reject(slot, raw, format!("unknown selector '{name}'")))?;
            Ok(SelectionTerm { selector, values })
        })
        .collect()
}

fn resolve_atom_selection(
    slot: &ConfiguratorSlot,
    raw: &Value,
    resolved: &Configuration,
    registry: &Registry,
) -> Resolved {
    let reader = &dependency_trajectory(slot, raw, resolved)?.reader;
    let terms = selection_terms(slot, raw, registry)?;
    let selection = selection::compose(reader.chemical_system(), &terms)?;
    Ok(ConfiguredValue::AtomSelection(selection))
}

/// Splits `"name"` or `["name", {params}]` into its parts.
fn named_parameters(slot: &ConfiguratorSlot, raw: &Value, value: &Value) -> Result<(String, Table), EngineError> {
    match value {
        Value::String(name) => Ok((name.clone(), Table::new())),
        Value::Array(items) => match items.as_slice() {
            [Value::String(name)] => Ok((name.clone(), Table::new())),
            [Value::String(name), Value::Table(params)] => Ok((name.clone(), params.clone())),
            _ => Err(reject(slot, raw, "expected [name, {parameters}]")),
        },
        _ => Err(reject(slot, raw, "expected a name or [name, {parameters}]")),
    }
}

fn resolve_q_vectors(
    slot: &ConfiguratorSlot,
    raw: &Value,
    resolved: &Configuration,
    registry: &Registry,
) -> Resolved {
    let (name, params) = named_parameters(slot, raw, raw)?;
    let factory = registry
        .q_vectors(&name)
        .map_err(|_| reject(slot, raw, format!("unknown Q-vector generator '{name}'")))?;
    let reader = &dependency_trajectory(slot, raw, resolved)?.reader;
    let reference = slot
        .dependencies
        .iter()
        .filter_map(|d| resolved.get(d))
        .find_map(|value| match value {
            ConfiguredValue::Frames(frames) => Some(frames.first),
            _ => None,
        })
        .unwrap_or(0);
    let cell = reader.unit_cell(reference)?;
    let generator = factory(&params, cell.as_ref()).map_err(|e| reject(slot, raw, e.to_string()))?;
    if generator.shell_count() == 0 {
        return Err(reject(slot, raw, "the generator produced no shells"));
    }
    Ok(ConfiguredValue::QVectors(QVectorsValue {
        generator: name,
        shells: Arc::from(generator),
    }))
}

fn resolve_resolution(
    slot: &ConfiguratorSlot,
    raw: &Value,
    resolved: &Configuration,
    registry: &Registry,
) -> Resolved {
    let (name, params) = named_parameters(slot, raw, raw)?;
    let factory = registry
        .resolution(&name)
        .map_err(|_| reject(slot, raw, format!("unknown resolution kernel '{name}'")))?;
    let frames = dependency_frames(slot, raw, resolved)?;
    let kernel = factory(&params).map_err(|e| reject(slot, raw, e.to_string()))?;
    let omega = omega_axis(frames.len(), frames.time_step);
    let sampled = kernel.sample(&omega).map_err(|e| reject(slot, raw, e.to_string()))?;
    Ok(ConfiguredValue::InstrumentResolution(ResolutionValue {
        kernel,
        omega,
        sampled,
    }))
}

fn resolve_instrument(slot: &ConfiguratorSlot, raw: &Value, registry: &Registry) -> Resolved {
    let Value::Table(table) = raw else {
        return Err(reject(slot, raw, "expected a table of spectrum, coverage and method"));
    };
    if let Some(key) = table
        .keys()
        .find(|k| !matches!(k.as_str(), "spectrum" | "coverage" | "method"))
    {
        return Err(reject(slot, raw, format!("unknown instrument component '{key}'")));
    }

    let mut instrument = Instrument::default();
    if let Some(value) = table.get("spectrum") {
        let (name, params) = named_parameters(slot, raw, value)?;
        let factory = registry
            .spectrum(&name)
            .map_err(|_| reject(slot, raw, format!("unknown spectrum '{name}'")))?;
        instrument.spectrum = factory(&params).map_err(|e| reject(slot, raw, e.to_string()))?;
    }
    if let Some(value) = table.get("coverage") {
        let (name, params) = named_parameters(slot, raw, value)?;
        let factory = registry
            .coverage(&name)
            .map_err(|_| reject(slot, raw, format!("unknown coverage '{name}'")))?;
        instrument.coverage = factory(&params).map_err(|e| reject(slot, raw, e.to_string()))?;
    }
    if let Some(value) = table.get("method") {
        let (name, params) = named_parameters(slot, raw, value)?;
        let factory = registry
            .scattering_method(&name)
            .map_err(|_| reject(slot, raw, format!("unknown scattering method '{name}'")))?;
        instrument.method = factory(&params).map_err(|e| reject(slot, raw, e.to_string()))?;
    }
    Ok(ConfiguredValue::Instrument(instrument))
}

fn resolve_output_files(slot: &ConfiguratorSlot, raw: &Value, registry: &Registry) -> Resolved {
    let Value::Array(items) = raw else {
        return Err(reject(slot, raw, "expected [basename, [formats]]"));
    };
    let [Value::String(basename), Value::Array(names)] = items.as_slice() else {
        return Err(reject(slot, raw, "expected [basename, [formats]]"));
    };
    if basename.trim().is_empty() {
        return Err(reject(slot, raw, "the basename is empty"));
    }
    if names.is_empty() {
        return Err(reject(slot, raw, "at least one output format is required"));
    }

    let mut formats = Vec::with_capacity(names.len());
    for name in names {
        let Value::String(name) = name else {
            return Err(reject(slot, raw, "format names must be strings"));
        };
        let format = registry
            .format(name)
            .map_err(|_| reject(slot, raw, format!("unknown output format '{name}'")))?;
        if formats.iter().any(|f: &Arc<dyn OutputFormat>| f.name() == format.name()) {
            return Err(reject(slot, raw, format!("format '{name}' listed twice")));
        }
        formats.push(format);
    }
    Ok(ConfiguredValue::OutputFiles(OutputFiles {
        basename: PathBuf::from(basename),
        formats,
    }))
}

fn resolve_running_mode(slot: &ConfiguratorSlot, raw: &Value) -> Resolved {
    let (name, workers) = match raw {
        Value::String(name) => (name.as_str(), None),
        Value::Array(items) => match items.as_slice() {
            [Value::String(name)] => (name.as_str(), None),
            [Value::String(name), workers] => (
                name.as_str(),
                Some(as_integer(workers).ok_or_else(|| reject(slot, raw, "expected a worker count"))?),
            ),
            _ => return Err(reject(slot, raw, "expected [mode, workers]")),
        },
        _ => return Err(reject(slot, raw, "expected [mode, workers]")),
    };
    match (name, workers) {
        ("monoprocessor", None | Some(1)) => Ok(ConfiguredValue::RunningMode(RunningMode::Monoprocessor)),
        ("monoprocessor", Some(_)) => Err(reject(slot, raw, "monoprocessor runs use one worker")),
        ("multiprocessor", None) => Err(reject(slot, raw, "multiprocessor runs need a worker count")),
        ("multiprocessor", Some(n)) if n >= 1 => {
            Ok(ConfiguredValue::RunningMode(RunningMode::Multiprocessor(n as usize)))
        }
        ("multiprocessor", Some(_)) => Err(reject(slot, raw, "the worker count must be at least 1")),
        _ => Err(reject(slot, raw, "expected \"monoprocessor\" or \"multiprocessor\"")),
    }
}

fn resolve_weights(slot: &ConfiguratorSlot, raw: &Value, resolved: &Configuration) -> Resolved {
    let Value::String(name) = raw else {
        return Err(reject(slot, raw, "expected an element property name"));
    };
    let property: ElementProperty = name.parse().map_err(|_| {
        reject(
            slot,
            raw,
            format!("expected one of: {}", ElementProperty::NAMES.join(", ")),
        )
    })?;
    let system = dependency_trajectory(slot, raw, resolved)?.reader.chemical_system();
    let counts = match dependency_selection(slot, resolved) {
        Some(selection) => system.element_counts(selection.indices()),
        None => system.element_counts(&(0..system.atom_count()).collect::<Vec<_>>()),
    };
    let values = counts
        .keys()
        .map(|element| {
            elements::lookup(element)
                .map(|data| (element.clone(), data.property(property)))
                .ok_or_else(|| reject(slot, raw, format!("no data for element '{element}'")))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(ConfiguredValue::Weights(WeightsValue {
        property: property.as_str().to_string(),
        values,
        counts,
    }))
}

/// Legal values for `slot` given what is already resolved. Pure: it neither
/// opens files nor changes `resolved`.
pub fn enumerate_choices(
    slot: &ConfiguratorSlot,
    resolved: &Configuration,
    registry: &Registry,
) -> Vec<String> {
    let owned = |names: Vec<&str>| names.into_iter().map(str::to_string).collect::<Vec<_>>();
    match &slot.kind {
        SlotKind::Boolean => owned(vec!["false", "true"]),
        SlotKind::Enum { choices } => choices.clone(),
        SlotKind::Trajectory => owned(registry.names(Category::Converter)),
        SlotKind::AtomSelection => {
            let system = slot
                .dependencies
                .iter()
                .filter_map(|d| resolved.get(d))
                .find_map(|value| match value {
                    ConfiguredValue::Trajectory(input) => Some(input.reader.chemical_system()),
                    _ => None,
                });
            registry
                .selectors()
                .iter()
                .flat_map(|selector| match system {
                    Some(system) => selector
                        .choices(system)
                        .into_iter()
                        .map(|choice| format!("{}:{choice}", selector.name()))
                        .collect(),
                    None => vec![selector.name().to_string()],
                })
                .collect()
        }
        SlotKind::QVectors => owned(registry.names(Category::QVectors)),
        SlotKind::InstrumentResolution => owned(registry.names(Category::Resolution)),
        SlotKind::Instrument => {
            let mut choices = Vec::new();
            for (key, category) in [
                ("spectrum", Category::Spectrum),
                ("coverage", Category::Instrument),
                ("method", Category::ScatteringMethod),
            ] {
                choices.extend(
                    registry
                        .names(category)
                        .into_iter()
                        .map(|name| format!("{key}:{name}")),
                );
            }
            choices
        }
        SlotKind::OutputFiles => owned(registry.names(Category::Format)),
        SlotKind::RunningMode => owned(vec!["monoprocessor", "multiprocessor"]),
        SlotKind::Weights => owned(ElementProperty::NAMES.to_vec()),
        _ => Vec::new(),
    }
}
