//! Typed job parameters.
//!
//! A job declares its parameters as [`ConfiguratorSlot`]s. [`configure`]
//! resolves a raw TOML table against those declarations, slot by slot in
//! declaration order, producing a [`Configuration`] of typed values.

pub mod configuration;
pub(crate) mod resolve;
pub mod slot;
pub mod value;

pub use configuration::{Configuration, configure};
pub use resolve::enumerate_choices;
pub use slot::{ConfiguratorSlot, SlotKind};
pub use value::{
    ConfiguredValue, FrameSelection, OutputFiles, QVectorsValue, RangeValue, ResolutionValue,
    TrajectoryInput, WeightsValue,
};
