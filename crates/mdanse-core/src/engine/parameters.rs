use super::config::{ConfiguratorSlot, SlotKind};
use crate::core::selection::WILDCARD;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use toml::{Table, Value};

const SCRIPT_SELECTOR: &str = "python_script";

#[derive(Debug, Error)]
pub enum ParametersError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Cannot serialize parameters: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A saved job: its category, its registered name and the raw parameter
/// table.
///
/// ```toml
/// mdanse_category = "Dynamics"
/// mdanse_type = "mean_square_displacement"
///
/// [parameters]
/// trajectory = "water.json"
/// frames = [0, 100, 1]
/// output_files = ["results/msd", ["ascii"]]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParametersFile {
    pub mdanse_category: String,
    pub mdanse_type: String,
    #[serde(default)]
    pub parameters: Table,
    /// Directory of the document this was loaded from.
    #[serde(skip)]
    source_dir: Option<PathBuf>,
}

impl ParametersFile {
    pub fn new(category: impl Into<String>, job: impl Into<String>, parameters: Table) -> Self {
        Self {
            mdanse_category: category.into(),
            mdanse_type: job.into(),
            parameters,
            source_dir: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ParametersError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParametersError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut document: Self = toml::from_str(&content).map_err(|e| ParametersError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        let absolute = std::path::absolute(path).map_err(|e| ParametersError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        document.source_dir = absolute.parent().map(Path::to_path_buf);
        Ok(document)
    }

    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    /// Makes the relative paths held by path-carrying slots absolute against
    /// the directory of the loaded document. Documents built in memory are
    /// left untouched.
    pub fn resolve_paths(&mut self, slots: &[ConfiguratorSlot]) {
        let Some(base) = self.source_dir.clone() else {
            return;
        };
        rewrite_paths(&mut self.parameters, slots, |path| {
            if path.is_relative() {
                normalize(&base.join(path))
            } else {
                path.to_path_buf()
            }
        });
    }

    /// Writes the document with paths relative to the directory of `path`.
    pub fn save_to_file(&self, path: &Path, slots: &[ConfiguratorSlot]) -> Result<(), ParametersError> {
        let io_error = |e: std::io::Error| ParametersError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let target = std::path::absolute(path).map_err(io_error)?;
        let target_dir = target.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut document = self.clone();
        rewrite_paths(&mut document.parameters, slots, |value| {
            if value.is_absolute() {
                relative_to(&normalize(value), &target_dir)
            } else {
                value.to_path_buf()
            }
        });
        let text = toml::to_string_pretty(&document)?;
        std::fs::write(path, text).map_err(io_error)
    }
}

fn rewrite_paths(parameters: &mut Table, slots: &[ConfiguratorSlot], rewrite: impl Fn(&Path) -> PathBuf) {
    let convert = |value: &mut Value| {
        if let Value::String(s) = value {
            *s = rewrite(Path::new(s.as_str())).to_string_lossy().into_owned();
        }
    };
    for slot in slots.iter().filter(|slot| slot.kind.carries_path()) {
        let Some(value) = parameters.get_mut(slot.name) else {
            continue;
        };
        match (&slot.kind, value) {
            (SlotKind::OutputFiles, Value::Array(items)) => {
                if let Some(basename) = items.first_mut() {
                    convert(basename);
                }
            }
            (SlotKind::AtomSelection, value) => {
                for scripts in script_values(value) {
                    match scripts {
                        Value::Array(items) => items
                            .iter_mut()
                            .filter(|item| item.as_str() != Some(WILDCARD))
                            .for_each(&convert),
                        scripts if scripts.as_str() != Some(WILDCARD) => convert(scripts),
                        _ => {}
                    }
                }
            }
            (SlotKind::Instrument, Value::Table(components)) => {
                if let Some(Value::Array(spectrum)) = components.get_mut("spectrum") {
                    if let Some(Value::Table(params)) = spectrum.get_mut(1) {
                        if let Some(file) = params.get_mut("file") {
                            convert(file);
                        }
                    }
                }
            }
            (SlotKind::Instrument, _) => {}
            (_, value) => convert(value),
        }
    }
}

/// Values given to the `python_script` selector, in either the table or
/// the `[selector, values]` pair form of a selection expression.
fn script_values(selection: &mut Value) -> Vec<&mut Value> {
    match selection {
        Value::Table(table) => table.get_mut(SCRIPT_SELECTOR).into_iter().collect(),
        Value::Array(pairs) => pairs
            .iter_mut()
            .filter_map(|pair| match pair {
                Value::Array(pair) if pair.len() == 2 && pair[0].as_str() == Some(SCRIPT_SELECTOR) => {
                    pair.get_mut(1)
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Drops `.` components and folds `..` into their parent.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// `path` expressed relative to the directory `base`. Both must be absolute;
/// paths on different roots are returned unchanged.
fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_parts: Vec<_> = path.components().collect();
    let base = normalize(base);
    let base_parts: Vec<_> = base.components().collect();
    if path_parts.first() != base_parts.first() {
        return path.to_path_buf();
    }
    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &path_parts[common..] {
        relative.push(part);
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn slots() -> Vec<ConfiguratorSlot> {
        vec![
            ConfiguratorSlot::new("trajectory", SlotKind::Trajectory),
            ConfiguratorSlot::new("frames", SlotKind::Frames),
            ConfiguratorSlot::new("atom_selection", SlotKind::AtomSelection),
            ConfiguratorSlot::new("instrument", SlotKind::Instrument),
            ConfiguratorSlot::new("output_files", SlotKind::OutputFiles),
        ]
    }

    const DOCUMENT: &str = r#"
mdanse_category = "Dynamics"
mdanse_type = "mean_square_displacement"

[parameters]
trajectory = "data/water.json"
frames = [0, 10, 1]
output_files = ["results/msd", ["ascii"]]
"#;

    #[test]
    fn relative_paths_resolve_against_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        fs::write(&path, DOCUMENT).unwrap();

        let mut document = ParametersFile::load(&path).unwrap();
        assert_eq!(document.mdanse_type, "mean_square_displacement");
        document.resolve_paths(&slots());

        let base = std::path::absolute(dir.path()).unwrap();
        assert_eq!(
            document.parameters["trajectory"].as_str().unwrap(),
            base.join("data/water.json").to_string_lossy()
        );
        let outputs = document.parameters["output_files"].as_array().unwrap();
        assert_eq!(
            outputs[0].as_str().unwrap(),
            base.join("results/msd").to_string_lossy()
        );
        assert_eq!(outputs[1].as_array().unwrap().len(), 1);
        assert_eq!(document.parameters["frames"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn unknown_top_level_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        fs::write(&path, format!("colour = \"red\"\n{DOCUMENT}")).unwrap();
        assert!(matches!(
            ParametersFile::load(&path),
            Err(ParametersError::Parse { .. })
        ));
    }

    #[test]
    fn missing_files_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ParametersFile::load(&dir.path().join("missing.toml")),
            Err(ParametersError::Io { .. })
        ));
    }

    #[test]
    fn saved_paths_are_relative_to_the_new_location() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("job.toml");
        fs::write(&source, DOCUMENT).unwrap();
        let mut document = ParametersFile::load(&source).unwrap();
        document.resolve_paths(&slots());

        fs::create_dir(dir.path().join("saved")).unwrap();
        let target = dir.path().join("saved").join("copy.toml");
        document.save_to_file(&target, &slots()).unwrap();

        let mut reloaded = ParametersFile::load(&target).unwrap();
        assert_eq!(
            reloaded.parameters["trajectory"].as_str().unwrap(),
            Path::new("..").join("data").join("water.json").to_string_lossy()
        );
        reloaded.resolve_paths(&slots());
        assert_eq!(reloaded.parameters, document.parameters);
    }

    const NESTED: &str = r#"
mdanse_category = "Scattering"
mdanse_type = "dynamic_incoherent_structure_factor"

[parameters]
trajectory = "traj.json"
atom_selection = { python_script = ["scripts/sel.py", "*"], element = ["H"] }
instrument = { spectrum = ["tabulated", { file = "flux.csv" }], coverage = "ideal" }
"#;

    #[test]
    fn nested_script_and_spectrum_paths_follow_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("job.toml");
        fs::write(&source, NESTED).unwrap();
        let mut document = ParametersFile::load(&source).unwrap();
        document.resolve_paths(&slots());

        let base = std::path::absolute(dir.path()).unwrap();
        let selection = document.parameters["atom_selection"].as_table().unwrap();
        let scripts = selection["python_script"].as_array().unwrap();
        assert_eq!(scripts[0].as_str().unwrap(), base.join("scripts/sel.py").to_string_lossy());
        assert_eq!(scripts[1].as_str(), Some("*"));
        assert_eq!(selection["element"].as_array().unwrap()[0].as_str(), Some("H"));
        let spectrum = document.parameters["instrument"]["spectrum"].as_array().unwrap();
        assert_eq!(
            spectrum[1]["file"].as_str().unwrap(),
            base.join("flux.csv").to_string_lossy()
        );
        assert_eq!(document.parameters["instrument"]["coverage"].as_str(), Some("ideal"));

        fs::create_dir(dir.path().join("saved")).unwrap();
        let target = dir.path().join("saved").join("copy.toml");
        document.save_to_file(&target, &slots()).unwrap();
        let mut reloaded = ParametersFile::load(&target).unwrap();
        let saved_script = reloaded.parameters["atom_selection"]["python_script"][0].clone();
        assert_eq!(
            saved_script.as_str().unwrap(),
            Path::new("..").join("scripts").join("sel.py").to_string_lossy()
        );
        let saved_flux = reloaded.parameters["instrument"]["spectrum"][1]["file"].clone();
        assert_eq!(
            saved_flux.as_str().unwrap(),
            Path::new("..").join("flux.csv").to_string_lossy()
        );
        reloaded.resolve_paths(&slots());
        assert_eq!(reloaded.parameters, document.parameters);
    }

    #[test]
    fn selection_pairs_rewrite_only_script_values() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("job.toml");
        fs::write(
            &source,
            "mdanse_category = \"Dynamics\"\nmdanse_type = \"x\"\n[parameters]\n\
             atom_selection = [[\"name\", [\"OW\"]], [\"python_script\", \"sel.py\"]]\n",
        )
        .unwrap();
        let mut document = ParametersFile::load(&source).unwrap();
        document.resolve_paths(&slots());

        let pairs = document.parameters["atom_selection"].as_array().unwrap();
        assert_eq!(pairs[0][1].as_array().unwrap()[0].as_str(), Some("OW"));
        let base = std::path::absolute(dir.path()).unwrap();
        assert_eq!(pairs[1][1].as_str().unwrap(), base.join("sel.py").to_string_lossy());
    }

    #[test]
    fn relative_to_walks_up_and_down() {
        assert_eq!(
            relative_to(Path::new("/a/b/c.txt"), Path::new("/a/d/e")),
            PathBuf::from("../../b/c.txt")
        );
        assert_eq!(relative_to(Path::new("/a/b"), Path::new("/a/b")), PathBuf::from("."));
    }
}
