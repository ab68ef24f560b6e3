//! # Chemical Models
//!
//! Arena representation of a chemical system. Atoms are stored densely and
//! referenced by index; the hierarchy of chemical entities (molecules,
//! residues, chains, proteins) references atoms by index as well, so no
//! structure owns another.
//!
//! - [`atom`] - A single atom with its element, names and bonds
//! - [`entity`] - Chemical entities and their kinds
//! - [`system`] - The `ChemicalSystem` arena and its builder
//! - [`substructure`] - Small bonded-pattern matching over the system
//! - [`ids`] - Entity keys
//!
//! ```ignore
//! use mdanse::core::models::system::ChemicalSystemBuilder;
//!
//! let mut builder = ChemicalSystemBuilder::new("water");
//! let o = builder.add_atom("O", "OW");
//! let h1 = builder.add_atom("H", "HW1");
//! let h2 = builder.add_atom("H", "HW2");
//! builder.add_bond(o, h1);
//! builder.add_bond(o, h2);
//! builder.add_molecule("WAT", &[o, h1, h2]);
//! let system = builder.build()?;
//! ```

pub mod atom;
pub mod entity;
pub mod ids;
pub mod substructure;
pub mod system;
