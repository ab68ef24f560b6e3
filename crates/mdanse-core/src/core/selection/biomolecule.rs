use super::{SelectionError, Selector, WILDCARD, has_wildcard};
use crate::core::models::entity::{EntityKind, ResidueClass};
use crate::core::models::system::ChemicalSystem;
use phf::{Set, phf_set};
use std::collections::BTreeSet;

static BACKBONE_ATOMS: Set<&'static str> = phf_set! {
    "N", "CA", "C", "O", "OXT", "H", "HN", "HA", "H1", "H2", "H3",
};

static SUGAR_ATOMS: Set<&'static str> = phf_set! {
    "C1'", "C2'", "C3'", "C4'", "C5'", "O2'", "O3'", "O4'", "O5'",
};

static PHOSPHATE_ATOMS: Set<&'static str> = phf_set! {
    "P", "OP1", "OP2", "OP3", "O1P", "O2P", "O3P",
};

/// Residues of `class` that belong to a chain of `chain_kind`, in hierarchy order.
fn chain_residues<'a>(
    system: &'a ChemicalSystem,
    chain_kind: EntityKind,
    class: ResidueClass,
) -> impl Iterator<Item = (&'a str, &'a [usize])> + 'a {
    system
        .entities_of_kind(move |kind| kind == EntityKind::Residue(class))
        .into_iter()
        .filter(move |(id, _)| {
            system
                .ancestor_of_kind(*id, |kind| kind == chain_kind)
                .is_some()
        })
        .map(|(_, entity)| (entity.name.as_str(), entity.atoms()))
}

fn require_chain(
    system: &ChemicalSystem,
    selector: &str,
    chain_kind: EntityKind,
) -> Result<(), SelectionError> {
    if system.has_entity_kind(|kind| kind == chain_kind) {
        Ok(())
    } else {
        Err(SelectionError::new(
            selector,
            format!("the chemical system contains no {chain_kind}"),
        ))
    }
}

/// Backbone atoms of every peptide chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackboneSelector;

impl Selector for BackboneSelector {
    fn name(&self) -> &'static str {
        "backbone"
    }

    fn section(&self) -> &'static str {
        "biomolecules"
    }

    fn choices(&self, _system: &ChemicalSystem) -> Vec<String> {
        vec![WILDCARD.to_string()]
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        require_chain(system, self.name(), EntityKind::PeptideChain)?;
        if !has_wildcard(values) {
            return Ok(BTreeSet::new());
        }
        Ok(
            chain_residues(system, EntityKind::PeptideChain, ResidueClass::AminoAcid)
                .flat_map(|(_, atoms)| atoms.iter().copied())
                .filter(|&i| {
                    system
                        .atom(i)
                        .is_some_and(|atom| BACKBONE_ATOMS.contains(atom.name.as_str()))
                })
                .collect(),
        )
    }
}

/// Whole residues of peptide chains, by residue name.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeptideSelector;

impl Selector for PeptideSelector {
    fn name(&self) -> &'static str {
        "peptide"
    }

    fn section(&self) -> &'static str {
        "biomolecules"
    }

    fn choices(&self, system: &ChemicalSystem) -> Vec<String> {
        let names: BTreeSet<&str> =
            chain_residues(system, EntityKind::PeptideChain, ResidueClass::AminoAcid)
                .map(|(name, _)| name)
                .collect();
        std::iter::once(WILDCARD.to_string())
            .chain(names.into_iter().map(str::to_string))
            .collect()
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        require_chain(system, self.name(), EntityKind::PeptideChain)?;
        let all = has_wildcard(values);
        Ok(
            chain_residues(system, EntityKind::PeptideChain, ResidueClass::AminoAcid)
                .filter(|(name, _)| all || values.iter().any(|v| v.trim().eq_ignore_ascii_case(name)))
                .flat_map(|(_, atoms)| atoms.iter().copied())
                .collect(),
        )
    }
}

/// Splits the atoms of a nucleotide residue into sugar and base atoms.
///
/// Hydrogens follow the heavy atom they are bonded to; phosphate atoms are
/// in neither part.
fn split_nucleotide(system: &ChemicalSystem, atoms: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let name_of = |i: usize| system.atom(i).map(|a| a.name.as_str()).unwrap_or_default();
    let is_hydrogen = |i: usize| system.atom(i).is_some_and(|a| a.is_element("H"));

    let mut sugar = Vec::new();
    let mut base = Vec::new();
    for &i in atoms {
        let name = name_of(i);
        let class_of = if is_hydrogen(i) {
            system
                .neighbours(i)
                .iter()
                .find(|&&n| atoms.contains(&n) && !is_hydrogen(n))
                .map(|&n| name_of(n))
                .unwrap_or(name)
        } else {
            name
        };
        if SUGAR_ATOMS.contains(class_of) {
            sugar.push(i);
        } else if !PHOSPHATE_ATOMS.contains(class_of) {
            base.push(i);
        }
    }
    (sugar, base)
}

/// Ribose or deoxyribose atoms of nucleotide chains.
#[derive(Debug, Default, Clone, Copy)]
pub struct NucleotideSugarSelector;

impl Selector for NucleotideSugarSelector {
    fn name(&self) -> &'static str {
        "nucleotide_sugar"
    }

    fn section(&self) -> &'static str {
        "biomolecules"
    }

    fn choices(&self, _system: &ChemicalSystem) -> Vec<String> {
        vec![WILDCARD.to_string()]
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        require_chain(system, self.name(), EntityKind::NucleotideChain)?;
        if !has_wildcard(values) {
            return Ok(BTreeSet::new());
        }
        Ok(
            chain_residues(system, EntityKind::NucleotideChain, ResidueClass::Nucleotide)
                .flat_map(|(_, atoms)| split_nucleotide(system, atoms).0)
                .collect(),
        )
    }
}

/// Base atoms of nucleotide chains.
#[derive(Debug, Default, Clone, Copy)]
pub struct NucleotideBaseSelector;

impl Selector for NucleotideBaseSelector {
    fn name(&self) -> &'static str {
        "nucleotide_base"
    }

    fn section(&self) -> &'static str {
        "biomolecules"
    }

    fn choices(&self, _system: &ChemicalSystem) -> Vec<String> {
        vec![WILDCARD.to_string()]
    }

    fn select(
        &self,
        system: &ChemicalSystem,
        values: &[String],
    ) -> Result<BTreeSet<usize>, SelectionError> {
        require_chain(system, self.name(), EntityKind::NucleotideChain)?;
        if !has_wildcard(values) {
            return Ok(BTreeSet::new());
        }
        Ok(
            chain_residues(system, EntityKind::NucleotideChain, ResidueClass::Nucleotide)
                .flat_map(|(_, atoms)| split_nucleotide(system, atoms).1)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::system::ChemicalSystemBuilder;
    use crate::core::models::system::tests::{small_protein, two_waters};

    fn star() -> Vec<String> {
        vec!["*".to_string()]
    }

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    /// A truncated nucleotide: phosphate, part of the sugar and one base atom.
    fn nucleotide() -> ChemicalSystem {
        let mut builder = ChemicalSystemBuilder::new("dna");
        let p = builder.add_atom("P", "P");
        let op1 = builder.add_atom("O", "OP1");
        let o5 = builder.add_atom("O", "O5'");
        let c5 = builder.add_atom("C", "C5'");
        let h5 = builder.add_atom("H", "H5'");
        let c1 = builder.add_atom("C", "C1'");
        let n9 = builder.add_atom("N", "N9");
        let h8 = builder.add_atom("H", "H8");
        for (a, b) in [(p, op1), (p, o5), (o5, c5), (c5, h5), (c5, c1), (c1, n9), (n9, h8)] {
            builder.add_bond(a, b);
        }
        let chain = builder.add_nucleotide_chain("B");
        builder
            .add_residue(
                chain,
                "DA1",
                ResidueClass::Nucleotide,
                &[p, op1, o5, c5, h5, c1, n9, h8],
            )
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn backbone_selects_peptide_backbone_atoms() {
        let system = small_protein();
        assert_eq!(
            BackboneSelector.select(&system, &star()).unwrap(),
            set(&[0, 1, 2, 4, 5])
        );
    }

    #[test]
    fn backbone_without_peptide_chains_fails() {
        let err = BackboneSelector.select(&two_waters(), &star()).unwrap_err();
        assert_eq!(err.selector, "backbone");
        assert!(PeptideSelector.select(&two_waters(), &star()).is_err());
    }

    #[test]
    fn peptide_selects_residues_by_name() {
        let system = small_protein();
        assert_eq!(
            PeptideSelector
                .select(&system, &["ser1".to_string()])
                .unwrap(),
            (0..8).collect()
        );
        assert!(
            PeptideSelector
                .select(&system, &["GLY9".to_string()])
                .unwrap()
                .is_empty()
        );
        assert_eq!(PeptideSelector.choices(&system), vec!["*", "SER1"]);
    }

    #[test]
    fn nucleotide_sugar_and_base_partition_the_nucleoside() {
        let system = nucleotide();
        assert_eq!(
            NucleotideSugarSelector.select(&system, &star()).unwrap(),
            set(&[2, 3, 4, 5])
        );
        assert_eq!(
            NucleotideBaseSelector.select(&system, &star()).unwrap(),
            set(&[6, 7])
        );
    }

    #[test]
    fn nucleotide_selectors_need_nucleotide_chains() {
        assert!(
            NucleotideSugarSelector
                .select(&small_protein(), &star())
                .is_err()
        );
        assert!(NucleotideBaseSelector.select(&two_waters(), &star()).is_err());
    }
}
