use super::{SelectionError, Selector, WILDCARD, has_wildcard};
use crate::core::models::system::ChemicalSystem;
use std::collections::BTreeSet;

/// Every atom of the system, whatever the values.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllSelector;

impl Selector for AllSelector {
    fn name(&self) -> &'static str {
        "all"
    }

    fn section(&self) -> &'static str {
        "miscellaneous"
    }

    fn choices(&self, _system: &ChemicalSystem) -> Vec<String> {
        vec![WILDCARD.to_string()]
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        _values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        Ok((0..system.atom_count()).collect())
    }
}

/// Atoms by element symbol or name.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomElementSelector;

impl Selector for AtomElementSelector {
    fn name(&self) -> &'static str {
        "atom_element"
    }

    fn section(&self) -> &'static str {
        "atoms"
    }

    fn choices(&self, system: &ChemicalSystem) -> Vec<String> {
        std::iter::once(WILDCARD.to_string())
            .chain(system.elements())
            .collect()
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        if has_wildcard(values) {
            return Ok((0..system.atom_count()).collect());
        }
        Ok(system
            .atoms()
            .iter()
            .filter(|atom| values.iter().any(|v| atom.is_element(v)))
            .map(|atom| atom.index)
            .collect())
    }
}

/// Atoms by index.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomIndexSelector;

impl Selector for AtomIndexSelector {
    fn name(&self) -> &'static str {
        "atom_index"
    }

    fn section(&self) -> &'static str {
        "atoms"
    }

    fn choices(&self, system: &ChemicalSystem) -> Vec<String> {
        std::iter::once(WILDCARD.to_string())
            .chain((0..system.atom_count()).map(|i| i.to_string()))
            .collect()
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        if has_wildcard(values) {
            return Ok((0..system.atom_count()).collect());
        }
        Ok(values
            .iter()
            .filter_map(|v| v.trim().parse::<usize>().ok())
            .filter(|&i| i < system.atom_count())
            .collect())
    }
}

/// Atoms by short name (e.g. `CA`, `OW`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomNameSelector;

impl Selector for AtomNameSelector {
    fn name(&self) -> &'static str {
        "atom_name"
    }

    fn section(&self) -> &'static str {
        "atoms"
    }

    fn choices(&self, system: &ChemicalSystem) -> Vec<String> {
        let names: BTreeSet<&str> = system.atoms().iter().map(|a| a.name.as_str()).collect();
        std::iter::once(WILDCARD.to_string())
            .chain(names.into_iter().map(str::to_string))
            .collect()
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        if has_wildcard(values) {
            return Ok((0..system.atom_count()).collect());
        }
        Ok(system
            .atoms()
            .iter()
            .filter(|atom| values.iter().any(|v| v.trim() == atom.name))
            .map(|atom| atom.index)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::system::tests::two_waters;

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn element_selection_by_name_and_wildcard() {
        let system = two_waters();
        let selector = AtomElementSelector;
        assert_eq!(
            selector.select(&system, &values(&["hydrogen"])).unwrap(),
            set(&[1, 2, 4, 5])
        );
        assert_eq!(
            selector.select(&system, &values(&["*"])).unwrap(),
            set(&[0, 1, 2, 3, 4, 5])
        );
        assert_eq!(
            selector.select(&system, &values(&["o"])).unwrap(),
            set(&[0, 3])
        );
    }

    #[test]
    fn unknown_values_contribute_nothing() {
        let system = two_waters();
        assert!(
            AtomElementSelector
                .select(&system, &values(&["unobtainium"]))
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            AtomIndexSelector
                .select(&system, &values(&["1", "99", "x", "3"]))
                .unwrap(),
            set(&[1, 3])
        );
        assert!(
            AtomNameSelector
                .select(&system, &values(&["CA"]))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn choices_start_with_the_wildcard() {
        let system = two_waters();
        assert_eq!(
            AtomElementSelector.choices(&system),
            values(&["*", "H", "O"])
        );
        assert_eq!(
            AtomNameSelector.choices(&system),
            values(&["*", "HW1", "HW2", "OW"])
        );
        assert_eq!(AtomIndexSelector.choices(&system).len(), 7);
    }

    #[test]
    fn all_selects_every_atom_for_any_value() {
        let system = two_waters();
        for given in [values(&["*"]), values(&["OW"]), Vec::new()] {
            assert_eq!(AllSelector.select(&system, &given).unwrap(), set(&[0, 1, 2, 3, 4, 5]));
        }
    }

    #[test]
    fn atom_name_matches_exactly() {
        let system = two_waters();
        assert_eq!(
            AtomNameSelector
                .select(&system, &values(&["OW"]))
                .unwrap(),
            set(&[0, 3])
        );
    }
}
