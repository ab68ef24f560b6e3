//! # Atom Selection Language
//!
//! A selector is a named predicate over a [`ChemicalSystem`] that maps a list
//! of string values to a set of atom indices. Every selector honours the same
//! contract:
//!
//! - the sentinel `"*"` selects everything the selector can produce;
//! - element names are matched case-insensitively, with synonyms aliased;
//! - unknown values contribute nothing, they are not an error.
//!
//! Selections compose by union through [`compose`], which keeps a textual
//! description of the expression that produced them.
//!
//! - [`basic`] - `all`, `atom_element`, `atom_index`, `atom_name`
//! - [`biomolecule`] - `backbone`, `peptide`, `nucleotide_sugar`, `nucleotide_base`
//! - [`groups`] - `hydroxyl`, `phosphate`, `oxy_hydrogen`, `sulphur_hydrogen`, `water`
//! - [`script`] - `python_script`, read as a declarative document

pub mod basic;
pub mod biomolecule;
pub mod groups;
pub mod script;

use crate::core::models::system::ChemicalSystem;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The value meaning "every choice".
pub const WILDCARD: &str = "*";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Selector '{selector}' failed: {reason}")]
pub struct SelectionError {
    pub selector: String,
    pub reason: String,
}

impl SelectionError {
    pub fn new(selector: &str, reason: impl Into<String>) -> Self {
        Self {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

pub trait Selector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Grouping tag used when listing selectors.
    fn section(&self) -> &'static str;

    /// Legal values for this selector on `system`, `"*"` first.
    fn choices(&self, system: &ChemicalSystem) -> Vec<String>;

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError>;
}

pub(crate) fn has_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v.trim() == WILDCARD)
}

/// An immutable set of atom indices and the expression that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    indices: Vec<usize>,
    description: String,
}

impl Selection {
    pub fn new(indices: BTreeSet<usize>, description: impl Into<String>) -> Self {
        Self {
            indices: indices.into_iter().collect(),
            description: description.into(),
        }
    }

    pub fn all(system: &ChemicalSystem) -> Self {
        Self::new((0..system.atom_count()).collect(), "all(*)")
    }

    /// Sorted, unique atom indices.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} atoms)", self.description, self.indices.len())
    }
}

/// One term of a selection expression: a selector and the values given to it.
#[derive(Clone)]
pub struct SelectionTerm {
    pub selector: Arc<dyn Selector>,
    pub values: Vec<String>,
}

impl fmt::Debug for SelectionTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.selector.name(), self.values.join(","))
    }
}

/// Unions the atoms selected by every term.
///
/// Indices outside the system are dropped so the result is always a subset
/// of the system's atoms.
pub fn compose(system: &ChemicalSystem, terms: &[SelectionTerm]) -> Result<Selection, SelectionError> {
    let mut indices = BTreeSet::new();
    for term in terms {
        indices.extend(
            term.selector
                .select(system, &term.values)?
                .into_iter()
                .filter(|&i| i < system.atom_count()),
        );
    }
    let description = terms
        .iter()
        .map(|term| format!("{term:?}"))
        .collect::<Vec<_>>()
        .join(" | ");
    Ok(Selection::new(indices, description))
}

/// Every selector shipped with the engine.
pub fn builtin() -> Vec<Arc<dyn Selector>> {
    vec![
        Arc::new(basic::AllSelector),
        Arc::new(basic::AtomElementSelector),
        Arc::new(basic::AtomIndexSelector),
        Arc::new(basic::AtomNameSelector),
        Arc::new(biomolecule::BackboneSelector),
        Arc::new(biomolecule::PeptideSelector),
        Arc::new(biomolecule::NucleotideSugarSelector),
        Arc::new(biomolecule::NucleotideBaseSelector),
        Arc::new(groups::HydroxylSelector),
        Arc::new(groups::PhosphateSelector),
        Arc::new(groups::BondedHydrogenSelector::oxygen()),
        Arc::new(groups::BondedHydrogenSelector::sulphur()),
        Arc::new(groups::WaterSelector),
        Arc::new(script::ScriptSelector),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::system::tests::two_waters;

    fn term(selector: Arc<dyn Selector>, values: &[&str]) -> SelectionTerm {
        SelectionTerm {
            selector,
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn compose_unions_terms_and_records_the_expression() {
        let system = two_waters();
        let selection = compose(
            &system,
            &[
                term(Arc::new(basic::AtomIndexSelector), &["0"]),
                term(Arc::new(basic::AtomElementSelector), &["hydrogen"]),
            ],
        )
        .unwrap();
        assert_eq!(selection.indices(), &[0, 1, 2, 4, 5]);
        assert_eq!(
            selection.description(),
            "atom_index(0) | atom_element(hydrogen)"
        );
        assert!(selection.contains(4));
        assert!(!selection.contains(3));
    }

    #[test]
    fn empty_composition_is_allowed() {
        let system = two_waters();
        let selection = compose(
            &system,
            &[term(Arc::new(basic::AtomElementSelector), &["carbon"])],
        )
        .unwrap();
        assert!(selection.is_empty());
        assert!(compose(&system, &[]).unwrap().is_empty());
    }

    #[test]
    fn every_builtin_selection_is_a_subset_of_the_system() {
        let system = two_waters();
        for selector in builtin() {
            let values = vec![WILDCARD.to_string()];
            if let Ok(indices) = selector.select(&system, &values) {
                assert!(indices.iter().all(|&i| i < system.atom_count()));
            }
        }
    }

    #[test]
    fn builtin_names_are_unique() {
        let names: BTreeSet<_> = builtin().iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), builtin().len());
    }
}
