//! Native JSON trajectory document.
//!
//! ```json
//! {
//!   "name": "water",
//!   "atoms": [{ "element": "O", "name": "OW" }, { "element": "H", "name": "HW1" }],
//!   "bonds": [[0, 1]],
//!   "entities": [
//!     { "kind": "molecule", "name": "WAT", "atoms": [0, 1] },
//!     { "kind": "protein", "name": "P", "chains": [
//!         { "kind": "peptide_chain", "name": "A", "residues": [
//!             { "name": "ALA1", "atoms": [2, 3, 4] } ] } ] }
//!   ],
//!   "time": [0.0, 0.5],
//!   "frames": [
//!     { "coordinates": [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]],
//!       "velocities": null,
//!       "cell": [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]] }
//!   ]
//! }
//! ```
//!
//! Lengths are in nanometres and times in picoseconds. Atoms not listed in
//! any entity become single-atom clusters.

use super::memory::InMemoryTrajectory;
use super::{Configuration, Trajectory, TrajectoryError};
use crate::core::cell::UnitCell;
use crate::core::models::entity::{EntityKind, ResidueClass};
use crate::core::models::ids::EntityId;
use crate::core::models::system::{ChemicalSystem, ChemicalSystemBuilder};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AtomDocument {
    pub element: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResidueDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub atoms: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainDocument {
    PeptideChain {
        name: String,
        residues: Vec<ResidueDocument>,
    },
    NucleotideChain {
        name: String,
        residues: Vec<ResidueDocument>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityDocument {
    Molecule {
        name: String,
        atoms: Vec<usize>,
    },
    AtomCluster {
        name: String,
        atoms: Vec<usize>,
    },
    Protein {
        name: String,
        chains: Vec<ChainDocument>,
    },
    PeptideChain {
        name: String,
        residues: Vec<ResidueDocument>,
    },
    NucleotideChain {
        name: String,
        residues: Vec<ResidueDocument>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FrameDocument {
    pub coordinates: Vec<[f64; 3]>,
    #[serde(default)]
    pub velocities: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    pub cell: Option<[[f64; 3]; 3]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TrajectoryDocument {
    #[serde(default)]
    pub name: String,
    pub atoms: Vec<AtomDocument>,
    #[serde(default)]
    pub bonds: Vec<[usize; 2]>,
    #[serde(default)]
    pub entities: Vec<EntityDocument>,
    pub time: Vec<f64>,
    pub frames: Vec<FrameDocument>,
}

/// Reads a native JSON trajectory.
pub fn read_trajectory(path: &Path) -> Result<InMemoryTrajectory, TrajectoryError> {
    let text = fs::read_to_string(path).map_err(|e| TrajectoryError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let document: TrajectoryDocument = serde_json::from_str(&text)
        .map_err(|e| TrajectoryError::Corrupt(format!("{}: {}", path.display(), e)))?;
    debug!(
        path = %path.display(),
        atoms = document.atoms.len(),
        frames = document.frames.len(),
        "Parsed JSON trajectory document."
    );
    document.into_trajectory()
}

/// Writes any trajectory as a native JSON document.
pub fn write_trajectory(path: &Path, trajectory: &dyn Trajectory) -> Result<(), TrajectoryError> {
    let document = TrajectoryDocument::from_trajectory(trajectory)?;
    let text = serde_json::to_string_pretty(&document)
        .map_err(|e| TrajectoryError::Corrupt(e.to_string()))?;
    fs::write(path, text).map_err(|e| TrajectoryError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_class(class: Option<&str>, default: ResidueClass) -> Result<ResidueClass, TrajectoryError> {
    match class {
        None => Ok(default),
        Some(name) => match name.parse::<EntityKind>() {
            Ok(EntityKind::Residue(class)) => Ok(class),
            _ => Err(TrajectoryError::Corrupt(format!(
                "invalid residue class '{name}'"
            ))),
        },
    }
}

fn class_name(class: ResidueClass) -> String {
    EntityKind::Residue(class).to_string()
}

impl TrajectoryDocument {
    pub fn into_trajectory(self) -> Result<InMemoryTrajectory, TrajectoryError> {
        let system = self.build_system()?;
        let frames = self
            .frames
            .into_iter()
            .map(|frame| {
                let mut configuration =
                    Configuration::new(frame.coordinates.into_iter().map(Vector3::from).collect());
                if let Some(velocities) = frame.velocities {
                    configuration = configuration
                        .with_velocities(velocities.into_iter().map(Vector3::from).collect());
                }
                if let Some(rows) = frame.cell {
                    configuration = configuration.with_cell(UnitCell::from_rows(rows)?);
                }
                Ok(configuration)
            })
            .collect::<Result<Vec<_>, TrajectoryError>>()?;
        InMemoryTrajectory::new(system, self.time, frames)
    }

    fn build_system(&self) -> Result<ChemicalSystem, TrajectoryError> {
        let mut builder = ChemicalSystemBuilder::new(&self.name);
        for atom in &self.atoms {
            builder.add_atom(&atom.element, &atom.name);
        }
        for [a, b] in &self.bonds {
            builder.add_bond(*a, *b);
        }

        let add_residues = |builder: &mut ChemicalSystemBuilder,
                            chain: EntityId,
                            residues: &[ResidueDocument],
                            default: ResidueClass|
         -> Result<(), TrajectoryError> {
            for residue in residues {
                let class = parse_class(residue.class.as_deref(), default)?;
                builder
                    .add_residue(chain, &residue.name, class, &residue.atoms)
                    .ok_or_else(|| {
                        TrajectoryError::Corrupt(format!(
                            "residue '{}' has no valid chain",
                            residue.name
                        ))
                    })?;
            }
            Ok(())
        };

        for entity in &self.entities {
            match entity {
                EntityDocument::Molecule { name, atoms } => {
                    builder.add_molecule(name, atoms);
                }
                EntityDocument::AtomCluster { name, atoms } => {
                    builder.add_cluster(name, atoms);
                }
                EntityDocument::Protein { name, chains } => {
                    let protein = builder.add_protein(name);
                    for chain in chains {
                        match chain {
                            ChainDocument::PeptideChain { name, residues } => {
                                let id = builder.add_peptide_chain(Some(protein), name).ok_or_else(
                                    || TrajectoryError::Corrupt(format!("invalid chain '{name}'")),
                                )?;
                                add_residues(&mut builder, id, residues, ResidueClass::AminoAcid)?;
                            }
                            ChainDocument::NucleotideChain { name, .. } => {
                                return Err(TrajectoryError::Corrupt(format!(
                                    "nucleotide chain '{name}' cannot belong to a protein"
                                )));
                            }
                        }
                    }
                }
                EntityDocument::PeptideChain { name, residues } => {
                    let id = builder.add_peptide_chain(None, name).ok_or_else(|| {
                        TrajectoryError::Corrupt(format!("invalid chain '{name}'"))
                    })?;
                    add_residues(&mut builder, id, residues, ResidueClass::AminoAcid)?;
                }
                EntityDocument::NucleotideChain { name, residues } => {
                    let id = builder.add_nucleotide_chain(name);
                    add_residues(&mut builder, id, residues, ResidueClass::Nucleotide)?;
                }
            }
        }

        builder
            .build()
            .map_err(|e| TrajectoryError::Corrupt(e.to_string()))
    }

    pub fn from_trajectory(trajectory: &dyn Trajectory) -> Result<Self, TrajectoryError> {
        let system = trajectory.chemical_system();
        let atoms = system
            .atoms()
            .iter()
            .map(|atom| AtomDocument {
                element: atom.element.clone(),
                name: atom.name.clone(),
            })
            .collect();
        let bonds = system
            .atoms()
            .iter()
            .flat_map(|atom| {
                atom.bonds
                    .iter()
                    .filter(move |&&other| other > atom.index)
                    .map(move |&other| [atom.index, other])
            })
            .collect();
        let entities = system
            .roots()
            .iter()
            .filter_map(|&id| entity_document(system, id))
            .collect();

        let mut time = Vec::with_capacity(trajectory.length());
        let mut frames = Vec::with_capacity(trajectory.length());
        for frame in 0..trajectory.length() {
            time.push(trajectory.time(frame)?);
            let configuration = trajectory.configuration(frame)?;
            frames.push(FrameDocument {
                coordinates: configuration.coordinates.iter().map(|r| [r.x, r.y, r.z]).collect(),
                velocities: configuration
                    .velocities
                    .map(|v| v.iter().map(|r| [r.x, r.y, r.z]).collect()),
                cell: configuration.unit_cell.map(|cell| cell.rows()),
            });
        }

        Ok(Self {
            name: system.name().to_string(),
            atoms,
            bonds,
            entities,
            time,
            frames,
        })
    }
}

fn residue_documents(system: &ChemicalSystem, chain: EntityId) -> Vec<ResidueDocument> {
    let Some(entity) = system.entity(chain) else {
        return Vec::new();
    };
    entity
        .children()
        .iter()
        .filter_map(|&id| system.entity(id))
        .map(|residue| ResidueDocument {
            name: residue.name.clone(),
            class: match residue.kind {
                EntityKind::Residue(class) => Some(class_name(class)),
                _ => None,
            },
            atoms: residue.atoms().to_vec(),
        })
        .collect()
}

fn entity_document(system: &ChemicalSystem, id: EntityId) -> Option<EntityDocument> {
    let entity = system.entity(id)?;
    let name = entity.name.clone();
    Some(match entity.kind {
        EntityKind::Molecule => EntityDocument::Molecule {
            name,
            atoms: entity.atoms().to_vec(),
        },
        EntityKind::AtomCluster | EntityKind::Residue(_) => EntityDocument::AtomCluster {
            name,
            atoms: entity.atoms().to_vec(),
        },
        EntityKind::Protein => EntityDocument::Protein {
            name,
            chains: entity
                .children()
                .iter()
                .filter_map(|&chain| {
                    let chain_entity = system.entity(chain)?;
                    Some(ChainDocument::PeptideChain {
                        name: chain_entity.name.clone(),
                        residues: residue_documents(system, chain),
                    })
                })
                .collect(),
        },
        EntityKind::PeptideChain => EntityDocument::PeptideChain {
            name,
            residues: residue_documents(system, id),
        },
        EntityKind::NucleotideChain => EntityDocument::NucleotideChain {
            name,
            residues: residue_documents(system, id),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::system::tests::small_protein;
    use tempfile::tempdir;

    const WATER: &str = r#"{
        "name": "water",
        "atoms": [
            {"element": "O", "name": "OW"},
            {"element": "H", "name": "HW1"},
            {"element": "H", "name": "HW2"}
        ],
        "bonds": [[0, 1], [0, 2]],
        "entities": [{"kind": "molecule", "name": "WAT", "atoms": [0, 1, 2]}],
        "time": [0.0, 0.5],
        "frames": [
            {"coordinates": [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0], [0.0, 0.1, 0.0]],
             "cell": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]},
            {"coordinates": [[0.0, 0.0, 0.1], [0.1, 0.0, 0.1], [0.0, 0.1, 0.1]],
             "cell": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]}
        ]
    }"#;

    #[test]
    fn reads_a_water_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("water.json");
        fs::write(&path, WATER).unwrap();
        let trajectory = read_trajectory(&path).unwrap();
        assert_eq!(trajectory.length(), 2);
        assert_eq!(trajectory.chemical_system().atom_count(), 3);
        assert_eq!(trajectory.chemical_system().neighbours(0), &[1, 2]);
        assert_eq!(
            trajectory.atom_position(2, 1).unwrap(),
            Vector3::new(0.0, 0.1, 0.1)
        );
        assert!((trajectory.unit_cell(0).unwrap().unwrap().volume() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn loading_twice_gives_identical_indices() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("water.json");
        fs::write(&path, WATER).unwrap();
        let first = read_trajectory(&path).unwrap();
        let second = read_trajectory(&path).unwrap();
        assert_eq!(
            first.chemical_system().atoms(),
            second.chemical_system().atoms()
        );
    }

    #[test]
    fn protein_hierarchy_survives_write_and_read() {
        let system = small_protein();
        let frames = vec![Configuration::new(vec![Vector3::zeros(); system.atom_count()])];
        let trajectory = InMemoryTrajectory::new(system, vec![0.0], frames).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("protein.json");
        write_trajectory(&path, &trajectory).unwrap();

        let reread = read_trajectory(&path).unwrap();
        let system = reread.chemical_system();
        assert_eq!(system.atom(2).unwrap().full_name, "PROT.A.SER1.CA");
        assert_eq!(system.atom(8).unwrap().full_name, "WAT.OW");
        assert_eq!(
            system.entities_of_kind(|k| k == EntityKind::PeptideChain).len(),
            1
        );
    }

    #[test]
    fn malformed_documents_are_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"atoms": [], "time": [0.0], "frames": [], "extra": 1}"#).unwrap();
        assert!(matches!(
            read_trajectory(&path),
            Err(TrajectoryError::Corrupt(_))
        ));
        assert!(matches!(
            read_trajectory(&dir.path().join("missing.json")),
            Err(TrajectoryError::Unreadable { .. })
        ));
    }

    #[test]
    fn bad_cells_are_rejected() {
        let document = WATER.replace(
            "[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]",
            "[0.0, 0.0, 0.0], [0.0, 0.0, 1.0]]",
        );
        let parsed: TrajectoryDocument = serde_json::from_str(&document).unwrap();
        assert!(matches!(
            parsed.into_trajectory(),
            Err(TrajectoryError::InconsistentCell(_))
        ));
    }
}
