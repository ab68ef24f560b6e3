use crate::core::trajectory::TrajectoryError;
use nalgebra::{Matrix3, Vector3};
use std::f64::consts::PI;

/// A periodic simulation cell.
///
/// The rows of the matrix are the lattice vectors `a`, `b`, `c`, so a point
/// with fractional coordinates `f` sits at `r = Mᵀ f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCell {
    matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl UnitCell {
    pub fn new(matrix: Matrix3<f64>) -> Result<Self, TrajectoryError> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(TrajectoryError::InconsistentCell(
                "cell matrix contains non-finite entries".to_string(),
            ));
        }
        let volume = matrix.determinant().abs();
        if volume <= f64::EPSILON {
            return Err(TrajectoryError::InconsistentCell(format!(
                "cell volume must be positive (got {volume})"
            )));
        }
        let inverse = matrix.try_inverse().ok_or_else(|| {
            TrajectoryError::InconsistentCell("cell matrix is singular".to_string())
        })?;
        Ok(Self { matrix, inverse })
    }

    /// Builds a cell from its three lattice vectors.
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Result<Self, TrajectoryError> {
        Self::new(Matrix3::new(
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ))
    }

    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<Self, TrajectoryError> {
        Self::new(Matrix3::from_diagonal(&Vector3::new(a, b, c)))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    pub fn rows(&self) -> [[f64; 3]; 3] {
        let m = &self.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    pub fn volume(&self) -> f64 {
        self.matrix.determinant().abs()
    }

    pub fn lattice_vector(&self, i: usize) -> Vector3<f64> {
        self.matrix.row(i).transpose()
    }

    pub fn to_fractional(&self, r: &Vector3<f64>) -> Vector3<f64> {
        self.inverse.transpose() * r
    }

    pub fn to_cartesian(&self, f: &Vector3<f64>) -> Vector3<f64> {
        self.matrix.transpose() * f
    }

    /// Shortest periodic image of a displacement vector.
    pub fn minimum_image(&self, d: &Vector3<f64>) -> Vector3<f64> {
        let f = self.to_fractional(d);
        self.to_cartesian(&f.map(|x| x - x.round()))
    }

    /// Reciprocal basis scaled by 2π; its rows `b_i` satisfy `a_i · b_j = 2π δ_ij`.
    pub fn reciprocal(&self) -> Matrix3<f64> {
        self.inverse.transpose() * (2.0 * PI)
    }
}
