use super::atom::Atom;
use super::entity::{ChemicalEntity, EntityKind, ResidueClass};
use super::ids::EntityId;
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ModelError {
    #[error("Atom index {index} is out of range for a system of {count} atoms")]
    AtomOutOfRange { index: usize, count: usize },
    #[error("Atom {index} cannot be bonded to itself")]
    SelfBond { index: usize },
    #[error("Atom {index} is assigned to more than one leaf entity ('{first}' and '{second}')")]
    AtomReassigned {
        index: usize,
        first: String,
        second: String,
    },
    #[error("Entity '{name}' cannot hold atoms directly")]
    NotALeaf { name: String },
}

/// A chemical system: a dense arena of atoms plus a hierarchy of chemical
/// entities.
///
/// Invariants, established by [`ChemicalSystemBuilder::build`]:
/// - atom indices are dense in `[0, N)` and never change;
/// - bonds are symmetric;
/// - every atom belongs to exactly one leaf entity, so the union of the
///   entities' atoms is the full atom list.
#[derive(Debug, Clone, Default)]
pub struct ChemicalSystem {
    name: String,
    atoms: Vec<Atom>,
    entities: SlotMap<EntityId, ChemicalEntity>,
    roots: Vec<EntityId>,
}

impl ChemicalSystem {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    /// Indices of the atoms bonded to `index`; empty for unknown indices.
    pub fn neighbours(&self, index: usize) -> &[usize] {
        self.atoms
            .get(index)
            .map(|atom| atom.bonds.as_slice())
            .unwrap_or(&[])
    }

    pub fn entity(&self, id: EntityId) -> Option<&ChemicalEntity> {
        self.entities.get(id)
    }

    /// Top-level entities in insertion order.
    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// Every entity in depth-first hierarchy order.
    pub fn entities_iter(&self) -> impl Iterator<Item = (EntityId, &ChemicalEntity)> + '_ {
        let mut ordered = Vec::with_capacity(self.entities.len());
        let mut stack: Vec<EntityId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(entity) = self.entities.get(id) {
                ordered.push((id, entity));
                stack.extend(entity.children.iter().rev().copied());
            }
        }
        ordered.into_iter()
    }

    /// Entities of a given kind, in hierarchy order.
    pub fn entities_of_kind(
        &self,
        predicate: impl Fn(EntityKind) -> bool,
    ) -> Vec<(EntityId, &ChemicalEntity)> {
        self.entities_iter()
            .filter(|(_, entity)| predicate(entity.kind))
            .collect()
    }

    pub fn has_entity_kind(&self, predicate: impl Fn(EntityKind) -> bool) -> bool {
        self.entities.values().any(|entity| predicate(entity.kind))
    }

    /// All atoms under an entity, recursively, in hierarchy order.
    pub fn entity_atoms(&self, id: EntityId) -> Vec<usize> {
        let mut atoms = Vec::new();
        self.collect_atoms(id, &mut atoms);
        atoms
    }

    fn collect_atoms(&self, id: EntityId, out: &mut Vec<usize>) {
        if let Some(entity) = self.entities.get(id) {
            out.extend_from_slice(&entity.atoms);
            for &child in &entity.children {
                self.collect_atoms(child, out);
            }
        }
    }

    /// Walks up from an entity until an ancestor of the requested kind is found.
    pub fn ancestor_of_kind(
        &self,
        id: EntityId,
        predicate: impl Fn(EntityKind) -> bool,
    ) -> Option<EntityId> {
        let mut current = self.entities.get(id)?.parent;
        while let Some(parent_id) = current {
            let parent = self.entities.get(parent_id)?;
            if predicate(parent.kind) {
                return Some(parent_id);
            }
            current = parent.parent;
        }
        None
    }

    /// Sorted, de-duplicated element symbols present in the system.
    pub fn elements(&self) -> Vec<String> {
        self.atoms
            .iter()
            .map(|atom| atom.element.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of atoms per element among `indices`.
    pub fn element_counts(&self, indices: &[usize]) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for atom in indices.iter().filter_map(|&i| self.atoms.get(i)) {
            *counts.entry(atom.element.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Incremental construction of a [`ChemicalSystem`].
///
/// Structural problems (bad indices, atoms placed in two entities) are
/// collected and reported by [`build`](Self::build).
#[derive(Debug, Default)]
pub struct ChemicalSystemBuilder {
    name: String,
    atoms: Vec<Atom>,
    entities: SlotMap<EntityId, ChemicalEntity>,
    roots: Vec<EntityId>,
    bonds: Vec<(usize, usize)>,
}

impl ChemicalSystemBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Appends an atom and returns its index.
    pub fn add_atom(&mut self, element: &str, name: &str) -> usize {
        let index = self.atoms.len();
        self.atoms.push(Atom::new(index, element, name));
        index
    }

    pub fn add_bond(&mut self, a: usize, b: usize) {
        self.bonds.push((a, b));
    }

    pub fn add_molecule(&mut self, name: &str, atoms: &[usize]) -> EntityId {
        self.add_root_leaf(EntityKind::Molecule, name, atoms)
    }

    pub fn add_cluster(&mut self, name: &str, atoms: &[usize]) -> EntityId {
        self.add_root_leaf(EntityKind::AtomCluster, name, atoms)
    }

    pub fn add_protein(&mut self, name: &str) -> EntityId {
        let id = self
            .entities
            .insert(ChemicalEntity::new(EntityKind::Protein, name, None));
        self.roots.push(id);
        id
    }

    /// Adds a peptide chain, either free-standing or as part of a protein.
    ///
    /// Returns `None` if `protein` does not name a protein of this builder.
    pub fn add_peptide_chain(&mut self, protein: Option<EntityId>, name: &str) -> Option<EntityId> {
        self.add_chain(EntityKind::PeptideChain, protein, name)
    }

    pub fn add_nucleotide_chain(&mut self, name: &str) -> EntityId {
        let id = self
            .entities
            .insert(ChemicalEntity::new(EntityKind::NucleotideChain, name, None));
        self.roots.push(id);
        id
    }

    /// Adds a residue with its atoms to an existing chain.
    ///
    /// Returns `None` if `chain` is not a chain of this builder.
    pub fn add_residue(
        &mut self,
        chain: EntityId,
        name: &str,
        class: ResidueClass,
        atoms: &[usize],
    ) -> Option<EntityId> {
        let chain_kind = self.entities.get(chain)?.kind;
        if !matches!(
            chain_kind,
            EntityKind::PeptideChain | EntityKind::NucleotideChain
        ) {
            return None;
        }
        let mut residue = ChemicalEntity::new(EntityKind::Residue(class), name, Some(chain));
        residue.atoms = atoms.to_vec();
        let id = self.entities.insert(residue);
        self.entities[chain].children.push(id);
        Some(id)
    }

    fn add_chain(
        &mut self,
        kind: EntityKind,
        protein: Option<EntityId>,
        name: &str,
    ) -> Option<EntityId> {
        match protein {
            Some(protein_id) => {
                if self.entities.get(protein_id)?.kind != EntityKind::Protein {
                    return None;
                }
                let id = self
                    .entities
                    .insert(ChemicalEntity::new(kind, name, Some(protein_id)));
                self.entities[protein_id].children.push(id);
                Some(id)
            }
            None => {
                let id = self.entities.insert(ChemicalEntity::new(kind, name, None));
                self.roots.push(id);
                Some(id)
            }
        }
    }

    fn add_root_leaf(&mut self, kind: EntityKind, name: &str, atoms: &[usize]) -> EntityId {
        let mut entity = ChemicalEntity::new(kind, name, None);
        entity.atoms = atoms.to_vec();
        let id = self.entities.insert(entity);
        self.roots.push(id);
        id
    }

    /// Validates the structure and produces the immutable system.
    pub fn build(mut self) -> Result<ChemicalSystem, ModelError> {
        let count = self.atoms.len();

        for &(a, b) in &self.bonds {
            for index in [a, b] {
                if index >= count {
                    return Err(ModelError::AtomOutOfRange { index, count });
                }
            }
            if a == b {
                return Err(ModelError::SelfBond { index: a });
            }
            if !self.atoms[a].bonds.contains(&b) {
                self.atoms[a].bonds.push(b);
                self.atoms[b].bonds.push(a);
            }
        }
        for atom in &mut self.atoms {
            atom.bonds.sort_unstable();
        }

        let mut owner: Vec<Option<EntityId>> = vec![None; count];
        for (id, entity) in &self.entities {
            if !entity.kind.is_leaf() && !entity.atoms.is_empty() {
                return Err(ModelError::NotALeaf {
                    name: entity.name.clone(),
                });
            }
            for &index in &entity.atoms {
                if index >= count {
                    return Err(ModelError::AtomOutOfRange { index, count });
                }
                if let Some(previous) = owner[index] {
                    return Err(ModelError::AtomReassigned {
                        index,
                        first: self.entities[previous].name.clone(),
                        second: entity.name.clone(),
                    });
                }
                owner[index] = Some(id);
            }
        }

        for index in 0..count {
            if owner[index].is_none() {
                let name = self.atoms[index].name.clone();
                owner[index] = Some(self.add_cluster(&name, &[index]));
            }
        }

        for (index, entity_id) in owner.into_iter().enumerate() {
            let Some(entity_id) = entity_id else { continue };
            let mut path = vec![self.atoms[index].name.clone()];
            let mut current = Some(entity_id);
            while let Some(id) = current {
                let entity = &self.entities[id];
                // Single-atom clusters carry the atom name already.
                if !(entity.kind == EntityKind::AtomCluster && entity.atoms.len() == 1) {
                    path.push(entity.name.clone());
                }
                current = entity.parent;
            }
            path.reverse();
            let atom = &mut self.atoms[index];
            atom.entity = entity_id;
            atom.full_name = path.join(".");
        }

        Ok(ChemicalSystem {
            name: self.name,
            atoms: self.atoms,
            entities: self.entities,
            roots: self.roots,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two water molecules, atoms `[(0,O),(1,H),(2,H),(3,O),(4,H),(5,H)]`.
    pub(crate) fn two_waters() -> ChemicalSystem {
        let mut builder = ChemicalSystemBuilder::new("water");
        for w in 0..2 {
            let o = builder.add_atom("O", "OW");
            let h1 = builder.add_atom("H", "HW1");
            let h2 = builder.add_atom("H", "HW2");
            builder.add_bond(o, h1);
            builder.add_bond(o, h2);
            builder.add_molecule(&format!("WAT{}", w + 1), &[o, h1, h2]);
        }
        builder.build().unwrap()
    }

    /// A one-residue peptide chain inside a protein, followed by a water.
    pub(crate) fn small_protein() -> ChemicalSystem {
        let mut builder = ChemicalSystemBuilder::new("protein");
        let n = builder.add_atom("N", "N");
        let h = builder.add_atom("H", "H");
        let ca = builder.add_atom("C", "CA");
        let cb = builder.add_atom("C", "CB");
        let c = builder.add_atom("C", "C");
        let o = builder.add_atom("O", "O");
        let og = builder.add_atom("O", "OG");
        let hg = builder.add_atom("H", "HG");
        for (a, b) in [(n, h), (n, ca), (ca, cb), (ca, c), (c, o), (cb, og), (og, hg)] {
            builder.add_bond(a, b);
        }
        let protein = builder.add_protein("PROT");
        let chain = builder.add_peptide_chain(Some(protein), "A").unwrap();
        builder
            .add_residue(
                chain,
                "SER1",
                ResidueClass::AminoAcid,
                &[n, h, ca, cb, c, o, og, hg],
            )
            .unwrap();
        let ow = builder.add_atom("O", "OW");
        let hw1 = builder.add_atom("H", "HW1");
        let hw2 = builder.add_atom("H", "HW2");
        builder.add_bond(ow, hw1);
        builder.add_bond(ow, hw2);
        builder.add_molecule("WAT", &[ow, hw1, hw2]);
        builder.build().unwrap()
    }

    #[test]
    fn indices_are_dense_and_bonds_symmetric() {
        let system = two_waters();
        assert_eq!(system.atom_count(), 6);
        for (i, atom) in system.atoms().iter().enumerate() {
            assert_eq!(atom.index, i);
            for &other in &atom.bonds {
                assert!(system.atom(other).unwrap().is_bonded_to(i));
            }
        }
        assert_eq!(system.neighbours(0), &[1, 2]);
    }

    #[test]
    fn every_atom_belongs_to_exactly_one_leaf() {
        let system = small_protein();
        let mut seen = vec![0usize; system.atom_count()];
        for (_, entity) in system.entities_iter() {
            assert!(entity.kind.is_leaf() || entity.atoms().is_empty());
            for &i in entity.atoms() {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn unassigned_atoms_are_wrapped_into_clusters() {
        let mut builder = ChemicalSystemBuilder::new("argon");
        builder.add_atom("Ar", "AR1");
        builder.add_atom("Ar", "AR2");
        let system = builder.build().unwrap();
        assert_eq!(system.roots().len(), 2);
        let entity = system.entity(system.atom(1).unwrap().entity).unwrap();
        assert_eq!(entity.kind, EntityKind::AtomCluster);
        assert_eq!(entity.atoms(), &[1]);
        assert_eq!(system.atom(1).unwrap().full_name, "AR2");
    }

    #[test]
    fn full_names_follow_the_hierarchy() {
        let system = small_protein();
        assert_eq!(system.atom(2).unwrap().full_name, "PROT.A.SER1.CA");
        assert_eq!(system.atom(8).unwrap().full_name, "WAT.OW");
    }

    #[test]
    fn entity_atoms_are_collected_recursively() {
        let system = small_protein();
        let proteins = system.entities_of_kind(|k| k == EntityKind::Protein);
        assert_eq!(proteins.len(), 1);
        assert_eq!(system.entity_atoms(proteins[0].0), (0..8).collect::<Vec<_>>());
        let residue = system.atom(0).unwrap().entity;
        let chain = system
            .ancestor_of_kind(residue, |k| k == EntityKind::PeptideChain)
            .unwrap();
        assert_eq!(system.entity(chain).unwrap().name, "A");
    }

    #[test]
    fn element_counts_and_elements() {
        let system = two_waters();
        let counts = system.element_counts(&[0, 1, 2, 4]);
        assert_eq!(counts.get("O"), Some(&1));
        assert_eq!(counts.get("H"), Some(&3));
        assert_eq!(system.elements(), vec!["H".to_string(), "O".to_string()]);
    }

    #[test]
    fn build_rejects_bad_bonds_and_double_assignment() {
        let mut builder = ChemicalSystemBuilder::new("bad");
        let a = builder.add_atom("C", "C1");
        builder.add_bond(a, 5);
        assert_eq!(
            builder.build().unwrap_err(),
            ModelError::AtomOutOfRange { index: 5, count: 1 }
        );

        let mut builder = ChemicalSystemBuilder::new("bad");
        let a = builder.add_atom("C", "C1");
        builder.add_bond(a, a);
        assert_eq!(builder.build().unwrap_err(), ModelError::SelfBond { index: 0 });

        let mut builder = ChemicalSystemBuilder::new("bad");
        let a = builder.add_atom("C", "C1");
        builder.add_molecule("M1", &[a]);
        builder.add_molecule("M2", &[a]);
        assert!(matches!(
            builder.build().unwrap_err(),
            ModelError::AtomReassigned { index: 0, .. }
        ));
    }

    #[test]
    fn duplicate_bonds_are_idempotent() {
        let mut builder = ChemicalSystemBuilder::new("h2");
        let a = builder.add_atom("H", "H1");
        let b = builder.add_atom("H", "H2");
        builder.add_bond(a, b);
        builder.add_bond(b, a);
        let system = builder.build().unwrap();
        assert_eq!(system.neighbours(0), &[1]);
        assert_eq!(system.neighbours(1), &[0]);
    }

    #[test]
    fn residues_require_a_chain() {
        let mut builder = ChemicalSystemBuilder::new("x");
        let a = builder.add_atom("C", "C1");
        let molecule = builder.add_molecule("M", &[]);
        assert!(
            builder
                .add_residue(molecule, "ALA", ResidueClass::AminoAcid, &[a])
                .is_none()
        );
        assert!(builder.add_peptide_chain(Some(molecule), "A").is_none());
    }
}
