//! # Trajectory Interface
//!
//! The engine consumes trajectories through the [`Trajectory`] trait only;
//! file-format parsers for specific simulation codes live outside the engine.
//! Two implementations ship with the crate:
//!
//! - [`memory::InMemoryTrajectory`] - validated frames held in memory
//! - [`json`] - the native JSON trajectory document, registered as the `json` converter
//!
//! Workers never touch a trajectory directly: they receive a
//! [`TrajectoryReader`], which serializes reads for implementations that are
//! not `parallel_safe`.

pub mod json;
pub mod memory;

use crate::core::cell::UnitCell;
use crate::core::models::system::ChemicalSystem;
use nalgebra::Vector3;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrajectoryError {
    #[error("Frame {frame} is out of range for a trajectory of {length} frames")]
    FrameOutOfRange { frame: usize, length: usize },

    #[error("Corrupt trajectory data: {0}")]
    Corrupt(String),

    #[error("Inconsistent unit cell: {0}")]
    InconsistentCell(String),

    #[error("Frame {frame} holds {found} atoms but the chemical system has {expected}")]
    AtomCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },

    #[error("Time axis is not strictly increasing at frame {frame}")]
    NonMonotonicTime { frame: usize },

    #[error("Trajectory does not contain velocities")]
    MissingVelocities,

    #[error("Cannot read trajectory '{path}': {message}")]
    Unreadable { path: PathBuf, message: String },
}

/// One frame of a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub coordinates: Vec<Vector3<f64>>,
    pub velocities: Option<Vec<Vector3<f64>>>,
    /// `None` for non-periodic frames.
    pub unit_cell: Option<UnitCell>,
}

impl Configuration {
    pub fn new(coordinates: Vec<Vector3<f64>>) -> Self {
        Self {
            coordinates,
            velocities: None,
            unit_cell: None,
        }
    }

    pub fn with_velocities(mut self, velocities: Vec<Vector3<f64>>) -> Self {
        self.velocities = Some(velocities);
        self
    }

    pub fn with_cell(mut self, cell: UnitCell) -> Self {
        self.unit_cell = Some(cell);
        self
    }
}

/// Random access over the frames of a simulation.
///
/// Frames are indexed in `[0, length)`; every accessor fails with
/// [`TrajectoryError::FrameOutOfRange`] outside that range.
pub trait Trajectory: Send + Sync {
    fn length(&self) -> usize;

    fn time(&self, frame: usize) -> Result<f64, TrajectoryError>;

    fn coordinates(&self, frame: usize) -> Result<Vec<Vector3<f64>>, TrajectoryError>;

    fn velocities(&self, frame: usize) -> Result<Option<Vec<Vector3<f64>>>, TrajectoryError>;

    fn unit_cell(&self, frame: usize) -> Result<Option<UnitCell>, TrajectoryError>;

    fn chemical_system(&self) -> &ChemicalSystem;

    /// Whether independent readers may access frames concurrently.
    fn parallel_safe(&self) -> bool {
        true
    }

    fn has_velocities(&self) -> bool {
        self.length() > 0 && matches!(self.velocities(0), Ok(Some(_)))
    }

    fn configuration(&self, frame: usize) -> Result<Configuration, TrajectoryError> {
        Ok(Configuration {
            coordinates: self.coordinates(frame)?,
            velocities: self.velocities(frame)?,
            unit_cell: self.unit_cell(frame)?,
        })
    }

    fn atom_position(&self, atom: usize, frame: usize) -> Result<Vector3<f64>, TrajectoryError> {
        let coordinates = self.coordinates(frame)?;
        coordinates
            .get(atom)
            .copied()
            .ok_or(TrajectoryError::AtomCountMismatch {
                frame,
                expected: atom + 1,
                found: coordinates.len(),
            })
    }

    /// Positions of one atom over a list of frames.
    fn atom_series(
        &self,
        atom: usize,
        frames: &[usize],
    ) -> Result<Vec<Vector3<f64>>, TrajectoryError> {
        frames
            .iter()
            .map(|&frame| self.atom_position(atom, frame))
            .collect()
    }

    /// Velocities of one atom over a list of frames.
    fn atom_velocity_series(
        &self,
        atom: usize,
        frames: &[usize],
    ) -> Result<Vec<Vector3<f64>>, TrajectoryError> {
        frames
            .iter()
            .map(|&frame| {
                let velocities = self
                    .velocities(frame)?
                    .ok_or(TrajectoryError::MissingVelocities)?;
                velocities
                    .get(atom)
                    .copied()
                    .ok_or(TrajectoryError::AtomCountMismatch {
                        frame,
                        expected: atom + 1,
                        found: velocities.len(),
                    })
            })
            .collect()
    }
}

/// Shared read handle handed to workers.
///
/// Clones share the underlying trajectory. When the trajectory is not
/// `parallel_safe`, all clones share one lock and reads are serialized.
#[derive(Clone)]
pub struct TrajectoryReader {
    inner: Arc<dyn Trajectory>,
    lock: Option<Arc<Mutex<()>>>,
}

impl std::fmt::Debug for TrajectoryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrajectoryReader")
            .field("length", &self.inner.length())
            .field("serialized", &self.lock.is_some())
            .finish()
    }
}

impl TrajectoryReader {
    pub fn new(trajectory: Arc<dyn Trajectory>) -> Self {
        let lock = (!trajectory.parallel_safe()).then(|| Arc::new(Mutex::new(())));
        Self {
            inner: trajectory,
            lock,
        }
    }

    pub fn is_serialized(&self) -> bool {
        self.lock.is_some()
    }

    pub fn trajectory(&self) -> &Arc<dyn Trajectory> {
        &self.inner
    }

    fn guarded<T>(&self, read: impl FnOnce(&dyn Trajectory) -> T) -> T {
        let _guard = self
            .lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));
        read(self.inner.as_ref())
    }

    pub fn length(&self) -> usize {
        self.inner.length()
    }

    pub fn chemical_system(&self) -> &ChemicalSystem {
        self.inner.chemical_system()
    }

    pub fn has_velocities(&self) -> bool {
        self.guarded(|t| t.has_velocities())
    }

    pub fn time(&self, frame: usize) -> Result<f64, TrajectoryError> {
        self.guarded(|t| t.time(frame))
    }

    pub fn coordinates(&self, frame: usize) -> Result<Vec<Vector3<f64>>, TrajectoryError> {
        self.guarded(|t| t.coordinates(frame))
    }

    pub fn velocities(&self, frame: usize) -> Result<Option<Vec<Vector3<f64>>>, TrajectoryError> {
        self.guarded(|t| t.velocities(frame))
    }

    pub fn unit_cell(&self, frame: usize) -> Result<Option<UnitCell>, TrajectoryError> {
        self.guarded(|t| t.unit_cell(frame))
    }

    pub fn configuration(&self, frame: usize) -> Result<Configuration, TrajectoryError> {
        self.guarded(|t| t.configuration(frame))
    }

    pub fn atom_position(&self, atom: usize, frame: usize) -> Result<Vector3<f64>, TrajectoryError> {
        self.guarded(|t| t.atom_position(atom, frame))
    }

    pub fn atom_series(
        &self,
        atom: usize,
        frames: &[usize],
    ) -> Result<Vec<Vector3<f64>>, TrajectoryError> {
        self.guarded(|t| t.atom_series(atom, frames))
    }

    pub fn atom_velocity_series(
        &self,
        atom: usize,
        frames: &[usize],
    ) -> Result<Vec<Vector3<f64>>, TrajectoryError> {
        self.guarded(|t| t.atom_velocity_series(atom, frames))
    }

    /// Unit cells for a list of frames; `None` entries mark non-periodic frames.
    pub fn unit_cells(&self, frames: &[usize]) -> Result<Vec<Option<UnitCell>>, TrajectoryError> {
        self.guarded(|t| frames.iter().map(|&f| t.unit_cell(f)).collect())
    }
}
