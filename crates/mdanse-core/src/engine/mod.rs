//! # Engine Module
//!
//! The job engine: everything between a raw parameter set and a committed
//! set of output files.
//!
//! ## Architecture
//!
//! - **Registry** ([`registry`]) - Named components by category, frozen after
//!   startup
//! - **Configuration** ([`config`]) - Typed parameter slots and their
//!   resolution against a parameter table
//! - **Parameters Files** ([`parameters`]) - The TOML documents a job can be
//!   saved to and replayed from
//! - **Jobs** ([`job`]) - The `Analysis` contract and the lifecycle that
//!   drives it
//! - **Runner** ([`runner`]) - Mono- and multi-worker execution of work units
//!   with in-order aggregation
//! - **Context** ([`context`]) - Process settings shared by every job
//! - **Progress Monitoring** ([`progress`]) - Phase and task events
//! - **Error Handling** ([`error`]) - Engine error types

pub mod config;
pub mod context;
pub mod error;
pub mod job;
pub mod parameters;
pub mod progress;
pub mod registry;
pub mod runner;
