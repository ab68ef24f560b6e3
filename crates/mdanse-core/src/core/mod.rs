//! # Core Module
//!
//! Foundation layer of the engine: everything here is free of job state.
//!
//! - **Chemical Representation** ([`models`]) - Atoms, bonds and the hierarchy of chemical entities
//! - **Element Data** ([`elements`]) - Periodic table with masses and neutron scattering lengths
//! - **Periodicity** ([`cell`]) - Unit cells, fractional coordinates and minimum images
//! - **Trajectories** ([`trajectory`]) - The consumed trajectory interface and an in-memory implementation
//! - **Atom Selection** ([`selection`]) - Named, composable selectors
//! - **Numerical Kernels** ([`math`]) - Correlations, Q-vectors, van Hove binning, weights, resolution
//! - **Instrument Model** ([`instrument`]) - Spectrum, coverage and scattering method
//! - **Output** ([`io`]) - Output variables and the ASCII, SVG and HDF5 writers

pub mod cell;
pub mod elements;
pub mod instrument;
pub mod io;
pub mod math;
pub mod models;
pub mod selection;
pub mod trajectory;
