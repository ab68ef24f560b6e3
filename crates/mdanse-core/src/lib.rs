//! # MDANSE Engine
//!
//! The analytical core of MDANSE (Molecular Dynamics Analysis for Neutron
//! Scattering Experiments): it turns simulated atomic trajectories into
//! scattering observables that can be compared with neutron experiments.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict layered architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`ChemicalSystem`,
//!   `UnitCell`, the `Trajectory` interface), the selection language, the
//!   numerical kernels (correlations, Q-vectors, van Hove binning, weights,
//!   resolution), the instrument model and the output writers.
//!
//! - **[`engine`]: The Job Engine.** The component registry, the
//!   configurator framework, the job lifecycle and the runner that executes
//!   work units in one or several workers with deterministic aggregation.
//!
//! - **[`jobs`]: The Analyses.** Concrete scattering and dynamics analyses
//!   expressed against the engine's `Analysis` interface.
//!
//! - **[`workflows`]: The Public API.** The coordinator entry point: run a
//!   job given a parameter set or a parameters file.

pub mod core;
pub mod engine;
pub mod jobs;
pub mod workflows;
