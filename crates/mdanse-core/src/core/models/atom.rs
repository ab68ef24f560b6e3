use super::ids::EntityId;
use crate::core::elements;

/// Represents an atom of a chemical system.
///
/// Atoms are owned by their `ChemicalSystem` and identified by a dense,
/// stable index in `[0, N)`. Bonds are stored as indices of the bonded atoms
/// and are kept symmetric by the system builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Dense index of the atom within its system.
    pub index: usize,
    /// Element symbol, canonicalized when the element is known (e.g. "Cl").
    pub element: String,
    /// Short atom name (e.g. "CA", "OW").
    pub name: String,
    /// Fully qualified name, built from the parent entities (e.g. "A.ALA1.CA").
    pub full_name: String,
    /// Indices of the atoms bonded to this one.
    pub bonds: Vec<usize>,
    /// Leaf entity owning this atom.
    pub entity: EntityId,
}

impl Atom {
    pub(crate) fn new(index: usize, element: &str, name: &str) -> Self {
        Self {
            index,
            element: normalize_element(element),
            name: name.to_string(),
            full_name: name.to_string(),
            bonds: Vec::new(),
            entity: EntityId::default(),
        }
    }

    /// Whether this atom's element matches `element` (symbol or name, any case).
    pub fn is_element(&self, element: &str) -> bool {
        match elements::canonical_symbol(element) {
            Some(symbol) => self.element == symbol,
            None => self.element.eq_ignore_ascii_case(element.trim()),
        }
    }

    pub fn is_bonded_to(&self, other: usize) -> bool {
        self.bonds.contains(&other)
    }
}

fn normalize_element(element: &str) -> String {
    elements::canonical_symbol(element)
        .map(str::to_string)
        .unwrap_or_else(|| element.trim().to_string())
}
