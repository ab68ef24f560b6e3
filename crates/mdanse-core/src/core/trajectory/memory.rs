use super::{Configuration, Trajectory, TrajectoryError};
use crate::core::cell::UnitCell;
use crate::core::models::system::ChemicalSystem;
use nalgebra::Vector3;

/// A fully validated trajectory held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryTrajectory {
    system: ChemicalSystem,
    times: Vec<f64>,
    frames: Vec<Configuration>,
    parallel_safe: bool,
}

impl InMemoryTrajectory {
    /// Validates and wraps a set of frames.
    ///
    /// The time axis must be finite and strictly increasing, every frame
    /// must hold one position (and, if present, one velocity) per atom, and
    /// frames must be either all periodic or all non-periodic. Velocities
    /// must be present in every frame or in none.
    pub fn new(
        system: ChemicalSystem,
        times: Vec<f64>,
        frames: Vec<Configuration>,
    ) -> Result<Self, TrajectoryError> {
        if times.len() != frames.len() {
            return Err(TrajectoryError::Corrupt(format!(
                "{} time values for {} frames",
                times.len(),
                frames.len()
            )));
        }
        for (frame, window) in times.windows(2).enumerate() {
            if !(window[1] > window[0]) {
                return Err(TrajectoryError::NonMonotonicTime { frame: frame + 1 });
            }
        }
        if let Some(frame) = times.iter().position(|t| !t.is_finite()) {
            return Err(TrajectoryError::Corrupt(format!(
                "non-finite time at frame {frame}"
            )));
        }

        let expected = system.atom_count();
        for (frame, configuration) in frames.iter().enumerate() {
            let found = configuration.coordinates.len();
            if found != expected {
                return Err(TrajectoryError::AtomCountMismatch {
                    frame,
                    expected,
                    found,
                });
            }
            if let Some(velocities) = &configuration.velocities {
                if velocities.len() != expected {
                    return Err(TrajectoryError::AtomCountMismatch {
                        frame,
                        expected,
                        found: velocities.len(),
                    });
                }
            }
            if configuration
                .coordinates
                .iter()
                .any(|r| r.iter().any(|x| !x.is_finite()))
            {
                return Err(TrajectoryError::Corrupt(format!(
                    "non-finite coordinates at frame {frame}"
                )));
            }
        }

        if let Some(first) = frames.first() {
            let periodic = first.unit_cell.is_some();
            let with_velocities = first.velocities.is_some();
            for (frame, configuration) in frames.iter().enumerate() {
                if configuration.unit_cell.is_some() != periodic {
                    return Err(TrajectoryError::InconsistentCell(format!(
                        "frame {frame} does not match the periodicity of frame 0"
                    )));
                }
                if configuration.velocities.is_some() != with_velocities {
                    return Err(TrajectoryError::Corrupt(format!(
                        "velocities present in some frames only (frame {frame})"
                    )));
                }
            }
        }

        Ok(Self {
            system,
            times,
            frames,
            parallel_safe: true,
        })
    }

    /// Marks the trajectory as requiring serialized access.
    pub fn with_serial_access(mut self) -> Self {
        self.parallel_safe = false;
        self
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn frames(&self) -> &[Configuration] {
        &self.frames
    }

    fn frame(&self, frame: usize) -> Result<&Configuration, TrajectoryError> {
        self.frames
            .get(frame)
            .ok_or(TrajectoryError::FrameOutOfRange {
                frame,
                length: self.frames.len(),
            })
    }
}

impl Trajectory for InMemoryTrajectory {
    fn length(&self) -> usize {
        self.frames.len()
    }

    fn time(&self, frame: usize) -> Result<f64, TrajectoryError> {
        self.frame(frame)?;
        Ok(self.times[frame])
    }

    fn coordinates(&self, frame: usize) -> Result<Vec<Vector3<f64>>, TrajectoryError> {
        Ok(self.frame(frame)?.coordinates.clone())
    }

    fn velocities(&self, frame: usize) -> Result<Option<Vec<Vector3<f64>>>, TrajectoryError> {
        Ok(self.frame(frame)?.velocities.clone())
    }

    fn unit_cell(&self, frame: usize) -> Result<Option<UnitCell>, TrajectoryError> {
        Ok(self.frame(frame)?.unit_cell)
    }

    fn chemical_system(&self) -> &ChemicalSystem {
        &self.system
    }

    fn parallel_safe(&self) -> bool {
        self.parallel_safe
    }

    fn has_velocities(&self) -> bool {
        self.frames.first().is_some_and(|f| f.velocities.is_some())
    }

    fn configuration(&self, frame: usize) -> Result<Configuration, TrajectoryError> {
        self.frame(frame).cloned()
    }

    fn atom_position(&self, atom: usize, frame: usize) -> Result<Vector3<f64>, TrajectoryError> {
        let configuration = self.frame(frame)?;
        configuration
            .coordinates
            .get(atom)
            .copied()
            .ok_or(TrajectoryError::AtomCountMismatch {
                frame,
                expected: atom + 1,
                found: configuration.coordinates.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::system::ChemicalSystemBuilder;

    fn single_atom() -> ChemicalSystem {
        let mut builder = ChemicalSystemBuilder::new("ar");
        builder.add_atom("Ar", "AR");
        builder.build().unwrap()
    }

    fn frame(x: f64) -> Configuration {
        Configuration::new(vec![Vector3::new(x, 0.0, 0.0)])
    }

    #[test]
    fn accepts_valid_frames() {
        let cell = UnitCell::orthorhombic(10.0, 10.0, 10.0).unwrap();
        let trajectory = InMemoryTrajectory::new(
            single_atom(),
            vec![0.0, 1.0],
            vec![frame(1.0).with_cell(cell), frame(2.0).with_cell(cell)],
        )
        .unwrap();
        assert_eq!(trajectory.length(), 2);
        assert_eq!(trajectory.time(1).unwrap(), 1.0);
        assert_eq!(trajectory.unit_cell(0).unwrap(), Some(cell));
        assert!(!trajectory.has_velocities());
        assert!(trajectory.parallel_safe());
    }

    #[test]
    fn rejects_non_increasing_time() {
        let err = InMemoryTrajectory::new(
            single_atom(),
            vec![0.0, 1.0, 1.0],
            vec![frame(0.0), frame(0.0), frame(0.0)],
        )
        .unwrap_err();
        assert_eq!(err, TrajectoryError::NonMonotonicTime { frame: 2 });
    }

    #[test]
    fn rejects_atom_count_mismatch() {
        let bad = Configuration::new(vec![Vector3::zeros(), Vector3::zeros()]);
        let err = InMemoryTrajectory::new(single_atom(), vec![0.0], vec![bad]).unwrap_err();
        assert_eq!(
            err,
            TrajectoryError::AtomCountMismatch {
                frame: 0,
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn rejects_mixed_periodicity() {
        let cell = UnitCell::orthorhombic(10.0, 10.0, 10.0).unwrap();
        let err = InMemoryTrajectory::new(
            single_atom(),
            vec![0.0, 1.0],
            vec![frame(0.0).with_cell(cell), frame(0.0)],
        )
        .unwrap_err();
        assert!(matches!(err, TrajectoryError::InconsistentCell(_)));
    }

    #[test]
    fn frame_out_of_range_is_reported() {
        let trajectory = InMemoryTrajectory::new(single_atom(), vec![0.0], vec![frame(0.0)]).unwrap();
        assert_eq!(
            trajectory.coordinates(3).unwrap_err(),
            TrajectoryError::FrameOutOfRange {
                frame: 3,
                length: 1
            }
        );
    }
}
