use super::{SelectionError, Selector, WILDCARD, has_wildcard};
use crate::core::models::substructure::SubstructurePattern;
use crate::core::models::system::ChemicalSystem;
use std::collections::BTreeSet;

fn hydrogens_bonded_to(system: &ChemicalSystem, index: usize) -> impl Iterator<Item = usize> + '_ {
    system
        .neighbours(index)
        .iter()
        .copied()
        .filter(|&n| system.atom(n).is_some_and(|a| a.is_element("H")))
}

fn wildcard_only() -> Vec<String> {
    vec![WILDCARD.to_string()]
}

/// Every oxygen carrying at least one hydrogen, plus those hydrogens.
#[derive(Debug, Default, Clone, Copy)]
pub struct HydroxylSelector;

impl Selector for HydroxylSelector {
    fn name(&self) -> &'static str {
        "hydroxyl"
    }

    fn section(&self) -> &'static str {
        "chemical groups"
    }

    fn choices(&self, _system: &ChemicalSystem) -> Vec<String> {
        wildcard_only()
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        let mut selected = BTreeSet::new();
        if !has_wildcard(values) {
            return Ok(selected);
        }
        for atom in system.atoms().iter().filter(|a| a.is_element("O")) {
            let hydrogens: Vec<usize> = hydrogens_bonded_to(system, atom.index).collect();
            if !hydrogens.is_empty() {
                selected.insert(atom.index);
                selected.extend(hydrogens);
            }
        }
        Ok(selected)
    }
}

/// Every phosphorus bonded to exactly four oxygens, plus those oxygens.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhosphateSelector;

impl Selector for PhosphateSelector {
    fn name(&self) -> &'static str {
        "phosphate"
    }

    fn section(&self) -> &'static str {
        "chemical groups"
    }

    fn choices(&self, _system: &ChemicalSystem) -> Vec<String> {
        wildcard_only()
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        let mut selected = BTreeSet::new();
        if !has_wildcard(values) {
            return Ok(selected);
        }
        for atom in system.atoms().iter().filter(|a| a.is_element("P")) {
            let oxygens: Vec<usize> = system
                .neighbours(atom.index)
                .iter()
                .copied()
                .filter(|&n| system.atom(n).is_some_and(|a| a.is_element("O")))
                .collect();
            if oxygens.len() == 4 {
                selected.insert(atom.index);
                selected.extend(oxygens);
            }
        }
        Ok(selected)
    }
}

/// Hydrogens bonded to a given heavy element.
#[derive(Debug, Clone, Copy)]
pub struct BondedHydrogenSelector {
    name: &'static str,
    element: &'static str,
}

impl BondedHydrogenSelector {
    pub fn oxygen() -> Self {
        Self {
            name: "oxy_hydrogen",
            element: "O",
        }
    }

    pub fn sulphur() -> Self {
        Self {
            name: "sulphur_hydrogen",
            element: "S",
        }
    }
}

impl Selector for BondedHydrogenSelector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn section(&self) -> &'static str {
        "hydrogens"
    }

    fn choices(&self, _system: &ChemicalSystem) -> Vec<String> {
        wildcard_only()
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        if !has_wildcard(values) {
            return Ok(BTreeSet::new());
        }
        Ok(system
            .atoms()
            .iter()
            .filter(|a| a.is_element(self.element))
            .flat_map(|a| hydrogens_bonded_to(system, a.index))
            .collect())
    }
}

/// Water molecules, found by substructure matching.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaterSelector;

impl Selector for WaterSelector {
    fn name(&self) -> &'static str {
        "water"
    }

    fn section(&self) -> &'static str {
        "molecules"
    }

    fn choices(&self, _system: &ChemicalSystem) -> Vec<String> {
        wildcard_only()
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        if !has_wildcard(values) {
            return Ok(BTreeSet::new());
        }
        Ok(system
            .find_substructures(&SubstructurePattern::water())
            .into_iter()
            .flatten()
            .collect())
    }
}
