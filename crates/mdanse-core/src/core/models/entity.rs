use super::ids::EntityId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chemical class of a residue, deciding which biomolecular selectors apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidueClass {
    AminoAcid,
    Nucleotide,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A free molecule (e.g. a solvent molecule).
    Molecule,
    /// A group of atoms without further chemical identity.
    AtomCluster,
    /// A residue of a chain.
    Residue(ResidueClass),
    PeptideChain,
    NucleotideChain,
    /// A protein, made of one or more peptide chains.
    Protein,
}

impl EntityKind {
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            EntityKind::Molecule | EntityKind::AtomCluster | EntityKind::Residue(_)
        )
    }
}

#[derive(Debug, Error)]
#[error("Invalid chemical entity kind: '{0}'")]
pub struct ParseEntityKindError(pub String);

impl FromStr for EntityKind {
    type Err = ParseEntityKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "molecule" => Ok(EntityKind::Molecule),
            "atom_cluster" | "cluster" => Ok(EntityKind::AtomCluster),
            "residue" => Ok(EntityKind::Residue(ResidueClass::Other)),
            "amino_acid" => Ok(EntityKind::Residue(ResidueClass::AminoAcid)),
            "nucleotide" => Ok(EntityKind::Residue(ResidueClass::Nucleotide)),
            "peptide_chain" => Ok(EntityKind::PeptideChain),
            "nucleotide_chain" => Ok(EntityKind::NucleotideChain),
            "protein" => Ok(EntityKind::Protein),
            _ => Err(ParseEntityKindError(s.to_string())),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                EntityKind::Molecule => "molecule",
                EntityKind::AtomCluster => "atom_cluster",
                EntityKind::Residue(ResidueClass::AminoAcid) => "amino_acid",
                EntityKind::Residue(ResidueClass::Nucleotide) => "nucleotide",
                EntityKind::Residue(ResidueClass::Other) => "residue",
                EntityKind::PeptideChain => "peptide_chain",
                EntityKind::NucleotideChain => "nucleotide_chain",
                EntityKind::Protein => "protein",
            }
        )
    }
}

/// A node of the chemical hierarchy.
///
/// Leaf entities (molecules, clusters, residues) own atom indices; inner
/// entities (chains, proteins) own child entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChemicalEntity {
    pub kind: EntityKind,
    pub name: String,
    pub parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    pub(crate) atoms: Vec<usize>,
}

impl ChemicalEntity {
    pub(crate) fn new(kind: EntityKind, name: &str, parent: Option<EntityId>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            parent,
            children: Vec::new(),
            atoms: Vec::new(),
        }
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Atom indices owned directly by this entity (empty for inner nodes).
    pub fn atoms(&self) -> &[usize] {
        &self.atoms
    }
}
