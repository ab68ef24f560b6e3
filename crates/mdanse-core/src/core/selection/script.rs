use super::{SelectionError, Selector};
use crate::core::models::system::ChemicalSystem;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ExportedSelection {
    selection: Vec<i64>,
}

/// Atoms listed by selection scripts.
///
/// Scripts are read, not run: no Python interpreter is involved, and code
/// that computes a selection has no effect. Each file is scanned for a
/// top-level `selection = [...]` assignment of integer literals, which is
/// read as a declarative document; everything else in the file is ignored.
/// A script without such an assignment contributes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptSelector;

impl ScriptSelector {
    fn read_script(&self, path: &Path) -> Result<Vec<i64>, SelectionError> {
        let source = fs::read_to_string(path).map_err(|e| {
            SelectionError::new(self.name(), format!("cannot read '{}': {e}", path.display()))
        })?;
        let Some(fragment) = exported_assignment(&source) else {
            debug!(script = %path.display(), "Selection script exports no selection.");
            return Ok(Vec::new());
        };
        let exported: ExportedSelection = toml::from_str(&fragment).map_err(|e| {
            SelectionError::new(
                self.name(),
                format!("malformed selection in '{}': {e}", path.display()),
            )
        })?;
        Ok(exported.selection)
    }
}

/// Extracts the text of the last top-level `selection = [...]` assignment,
/// following the brackets across lines.
fn exported_assignment(source: &str) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let mut found = None;
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let is_assignment = line
            .strip_prefix("selection")
            .map(|rest| rest.trim_start().starts_with('=') && !rest.trim_start().starts_with("=="))
            .unwrap_or(false);
        if !is_assignment {
            i += 1;
            continue;
        }
        let mut fragment = String::new();
        let mut depth: i64 = 0;
        let mut j = i;
        while j < lines.len() {
            let code = lines[j].split('#').next().unwrap_or_default();
            depth += code.matches('[').count() as i64 - code.matches(']').count() as i64;
            fragment.push_str(code);
            fragment.push('\n');
            j += 1;
            if depth <= 0 {
                break;
            }
        }
        found = Some(fragment);
        i = j;
    }
    found
}

impl Selector for ScriptSelector {
    fn name(&self) -> &'static str {
        "python_script"
    }

    fn section(&self) -> &'static str {
        "miscellaneous"
    }

    fn choices(&self, _system: &ChemicalSystem) -> Vec<String> {
        Vec::new()
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        let mut selected = BTreeSet::new();
        for value in values.iter().map(|v| v.trim()).filter(|v| *v != super::WILDCARD) {
            for index in self.read_script(Path::new(value))? {
                if let Ok(index) = usize::try_from(index) {
                    if index < system.atom_count() {
                        selected.insert(index);
                    }
                }
            }
        }
        Ok(selected)
    }
}
