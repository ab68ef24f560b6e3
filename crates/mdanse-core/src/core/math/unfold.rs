use crate::core::cell::UnitCell;
use nalgebra::Vector3;

/// Reconstructs a continuous path from wrapped positions of one atom.
///
/// Between consecutive frames the raw displacement is expressed in the
/// fractional coordinates of the current cell; whenever it exceeds half a
/// cell edge, the corresponding lattice vector is added or subtracted from
/// all following frames. Frames without a cell never shift.
///
/// The result equals `positions` exactly when no jump is detected, so
/// unfolding an unfolded path is the identity.
pub fn unfold(positions: &[Vector3<f64>], cells: &[Option<UnitCell>]) -> Vec<Vector3<f64>> {
    let mut images = Vector3::<f64>::zeros();
    let mut unfolded = Vec::with_capacity(positions.len());
    for (frame, position) in positions.iter().enumerate() {
        let cell = cells.get(frame).copied().flatten();
        if frame > 0 {
            if let Some(cell) = &cell {
                let jump = cell
                    .to_fractional(&(position - positions[frame - 1]))
                    .map(f64::round);
                images -= jump;
            }
        }
        match cell {
            Some(cell) if images != Vector3::zeros() => {
                unfolded.push(position + cell.to_cartesian(&images));
            }
            _ => unfolded.push(*position),
        }
    }
    unfolded
}
