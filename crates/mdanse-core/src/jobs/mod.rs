//! Concrete analyses.
//!
//! Each analysis implements [`Analysis`](crate::engine::job::Analysis) and is
//! registered under its name as an [`AnalysisJob`].

pub(crate) mod common;
pub mod disf;
pub mod msd;
pub mod pdf;
pub mod vacf;

use crate::engine::error::ConfigurationError;
use crate::engine::job::{Analysis, AnalysisJob};
use crate::engine::registry::{Component, Registry};
use std::sync::Arc;

fn register_analysis<A: Analysis>(registry: &mut Registry) -> Result<(), ConfigurationError> {
    registry.register(A::NAME, Component::Job(Arc::new(AnalysisJob::<A>::new())))
}

/// Adds every built-in analysis to `registry`.
pub fn register(registry: &mut Registry) -> Result<(), ConfigurationError> {
    register_analysis::<disf::DynamicIncoherentStructureFactor>(registry)?;
    register_analysis::<msd::MeanSquareDisplacement>(registry)?;
    register_analysis::<pdf::PairDistributionFunction>(registry)?;
    register_analysis::<vacf::VelocityAutocorrelation>(registry)?;
    Ok(())
}
