//! # Workflows Module
//!
//! Top-level entry points of the engine. A workflow takes a job name and its
//! raw parameters (or a saved parameters file), resolves every parameter
//! against the registry before any worker exists, then hands the resolved
//! configuration to the job and reports how the run went.
//!
//! - **Run Workflow** ([`run`]) - Configure and execute one registered job.

pub mod run;
