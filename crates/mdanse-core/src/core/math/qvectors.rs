//! Reciprocal-space shell generators.
//!
//! A generator describes a finite list of shells. Shells are computed on
//! demand from the generator's parameters alone, so iterating twice gives the
//! same vectors; random sampling uses a `StdRng` seeded per shell. Every
//! vector `Q` of a shell centred on `q` satisfies `||Q| - q| <= width / 2`.

use super::{MathError, arange, param_f64, param_f64_array, param_range, param_usize};
use crate::core::cell::UnitCell;
use nalgebra::{Matrix3, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::f64::consts::PI;
use std::fmt::Debug;
use toml::{Table, Value};

/// One shell of Q-vectors (nm⁻¹).
#[derive(Debug, Clone, PartialEq)]
pub struct QShell {
    pub q: f64,
    pub vectors: Vec<Vector3<f64>>,
    /// Miller indices of the vectors, when they are lattice vectors.
    pub hkls: Vec<[i64; 3]>,
}

pub trait QVectorGenerator: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn shell_count(&self) -> usize;

    /// Nominal |Q| of shell `index`.
    fn shell_value(&self, index: usize) -> f64;

    fn shell_width(&self) -> f64;

    fn shell(&self, index: usize) -> QShell;

    fn shell_values(&self) -> Vec<f64> {
        (0..self.shell_count()).map(|i| self.shell_value(i)).collect()
    }
}

/// Iterator over the shells of a generator, restartable by calling
/// [`shells`] again.
pub struct QShells<'a> {
    generator: &'a dyn QVectorGenerator,
    next: usize,
}

impl Iterator for QShells<'_> {
    type Item = QShell;

    fn next(&mut self) -> Option<QShell> {
        if self.next >= self.generator.shell_count() {
            return None;
        }
        let shell = self.generator.shell(self.next);
        self.next += 1;
        Some(shell)
    }
}

pub fn shells(generator: &dyn QVectorGenerator) -> QShells<'_> {
    QShells { generator, next: 0 }
}

pub type QVectorFactory =
    fn(&Table, Option<&UnitCell>) -> Result<Box<dyn QVectorGenerator>, MathError>;

pub fn builtin() -> Vec<(&'static str, QVectorFactory)> {
    vec![
        (
            "spherical_lattice",
            SphericalLattice::from_params as QVectorFactory,
        ),
        ("linear", LinearQVectors::from_params),
        ("grid", GridQVectors::from_params),
        ("miller_indices", MillerIndices::from_params),
    ]
}

fn require_cell<'a>(cell: Option<&'a UnitCell>, generator: &str) -> Result<&'a UnitCell, MathError> {
    cell.ok_or_else(|| {
        MathError::Degenerate(format!(
            "the '{generator}' generator needs a periodic trajectory"
        ))
    })
}

fn lattice_vector(reciprocal: &Matrix3<f64>, hkl: [i64; 3]) -> Vector3<f64> {
    reciprocal.transpose() * Vector3::new(hkl[0] as f64, hkl[1] as f64, hkl[2] as f64)
}

/// Lattice Q-vectors within spherical shells, randomly thinned to at most
/// `n_vectors` per shell.
#[derive(Debug, Clone)]
pub struct SphericalLattice {
    reciprocal: Matrix3<f64>,
    edges: [f64; 3],
    values: Vec<f64>,
    width: f64,
    n_vectors: usize,
    seed: u64,
}

impl SphericalLattice {
    pub fn new(
        cell: &UnitCell,
        values: Vec<f64>,
        width: f64,
        n_vectors: usize,
        seed: u64,
    ) -> Result<Self, MathError> {
        if !(width > 0.0) {
            return Err(MathError::invalid("width", "must be positive"));
        }
        if n_vectors == 0 {
            return Err(MathError::invalid("n_vectors", "must be at least 1"));
        }
        Ok(Self {
            reciprocal: cell.reciprocal(),
            edges: [0, 1, 2].map(|i| cell.lattice_vector(i).norm()),
            values,
            width,
            n_vectors,
            seed,
        })
    }

    fn from_params(
        params: &Table,
        cell: Option<&UnitCell>,
    ) -> Result<Box<dyn QVectorGenerator>, MathError> {
        let cell = require_cell(cell, "spherical_lattice")?;
        let (start, stop, step) = param_range(params, "shells")?;
        let width = param_f64(params, "width", Some(step))?;
        let n_vectors = param_usize(params, "n_vectors", Some(50))?;
        let seed = param_usize(params, "seed", Some(0))? as u64;
        Ok(Box::new(Self::new(
            cell,
            arange(start, stop, step),
            width,
            n_vectors,
            seed,
        )?))
    }
}

impl QVectorGenerator for SphericalLattice {
    fn name(&self) -> &'static str {
        "spherical_lattice"
    }

    fn shell_count(&self) -> usize {
        self.values.len()
    }

    fn shell_value(&self, index: usize) -> f64 {
        self.values[index]
    }

    fn shell_width(&self) -> f64 {
        self.width
    }

    fn shell(&self, index: usize) -> QShell {
        let q = self.values[index];
        let (lo, hi) = (q - self.width / 2.0, q + self.width / 2.0);
        let bounds = self.edges.map(|edge| (hi * edge / (2.0 * PI)).ceil() as i64);

        let mut hkls = Vec::new();
        let mut vectors = Vec::new();
        for h in -bounds[0]..=bounds[0] {
            for k in -bounds[1]..=bounds[1] {
                for l in -bounds[2]..=bounds[2] {
                    if h == 0 && k == 0 && l == 0 {
                        continue;
                    }
                    let vector = lattice_vector(&self.reciprocal, [h, k, l]);
                    let norm = vector.norm();
                    if norm >= lo && norm <= hi {
                        hkls.push([h, k, l]);
                        vectors.push(vector);
                    }
                }
            }
        }

        if vectors.len() > self.n_vectors {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(index as u64));
            let mut picked = rand::seq::index::sample(&mut rng, vectors.len(), self.n_vectors).into_vec();
            picked.sort_unstable();
            hkls = picked.iter().map(|&i| hkls[i]).collect();
            vectors = picked.iter().map(|&i| vectors[i]).collect();
        }
        QShell { q, vectors, hkls }
    }
}

/// One vector per shell along a fixed direction, `Q = q û`.
#[derive(Debug, Clone)]
pub struct LinearQVectors {
    direction: Vector3<f64>,
    values: Vec<f64>,
    width: f64,
}

impl LinearQVectors {
    pub fn new(direction: Vector3<f64>, values: Vec<f64>, width: f64) -> Result<Self, MathError> {
        let norm = direction.norm();
        if !(norm > 0.0) || !norm.is_finite() {
            return Err(MathError::invalid("direction", "must be a non-zero vector"));
        }
        Ok(Self {
            direction: direction / norm,
            values,
            width,
        })
    }

    fn from_params(
        params: &Table,
        _cell: Option<&UnitCell>,
    ) -> Result<Box<dyn QVectorGenerator>, MathError> {
        let (start, stop, step) = param_range(params, "shells")?;
        let width = param_f64(params, "width", Some(step))?;
        let direction = match params.get("direction") {
            Some(_) => {
                let values = param_f64_array(params, "direction")?;
                let [x, y, z] = values[..] else {
                    return Err(MathError::invalid("direction", "expected [x, y, z]"));
                };
                Vector3::new(x, y, z)
            }
            None => Vector3::x(),
        };
        Ok(Box::new(Self::new(direction, arange(start, stop, step), width)?))
    }
}

impl QVectorGenerator for LinearQVectors {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn shell_count(&self) -> usize {
        self.values.len()
    }

    fn shell_value(&self, index: usize) -> f64 {
        self.values[index]
    }

    fn shell_width(&self) -> f64 {
        self.width
    }

    fn shell(&self, index: usize) -> QShell {
        let q = self.values[index];
        QShell {
            q,
            vectors: vec![self.direction * q],
            hkls: Vec::new(),
        }
    }
}

/// Every lattice point of an `hkl` box, binned by |Q| into shells of width
/// `q_step`. Only non-empty shells are kept.
#[derive(Debug, Clone)]
pub struct GridQVectors {
    width: f64,
    shells: Vec<QShell>,
}

impl GridQVectors {
    pub fn new(
        cell: &UnitCell,
        ranges: [(i64, i64); 3],
        q_step: f64,
    ) -> Result<Self, MathError> {
        if !(q_step > 0.0) {
            return Err(MathError::invalid("q_step", "must be positive"));
        }
        let reciprocal = cell.reciprocal();
        let mut bins: std::collections::BTreeMap<u64, QShell> = Default::default();
        for h in ranges[0].0..=ranges[0].1 {
            for k in ranges[1].0..=ranges[1].1 {
                for l in ranges[2].0..=ranges[2].1 {
                    if h == 0 && k == 0 && l == 0 {
                        continue;
                    }
                    let vector = lattice_vector(&reciprocal, [h, k, l]);
                    let bin = (vector.norm() / q_step).floor() as u64;
                    let shell = bins.entry(bin).or_insert_with(|| QShell {
                        q: (bin as f64 + 0.5) * q_step,
                        vectors: Vec::new(),
                        hkls: Vec::new(),
                    });
                    shell.vectors.push(vector);
                    shell.hkls.push([h, k, l]);
                }
            }
        }
        Ok(Self {
            width: q_step,
            shells: bins.into_values().collect(),
        })
    }

    fn from_params(
        params: &Table,
        cell: Option<&UnitCell>,
    ) -> Result<Box<dyn QVectorGenerator>, MathError> {
        let cell = require_cell(cell, "grid")?;
        let mut ranges = [(0, 0); 3];
        for (slot, name) in ["h", "k", "l"].into_iter().enumerate() {
            ranges[slot] = integer_pair(params, name)?;
        }
        let q_step = param_f64(params, "q_step", Some(1.0))?;
        Ok(Box::new(Self::new(cell, ranges, q_step)?))
    }
}

fn integer_pair(params: &Table, name: &str) -> Result<(i64, i64), MathError> {
    let values = param_f64_array(params, name)?;
    match values[..] {
        [lo, hi] if lo.fract() == 0.0 && hi.fract() == 0.0 && lo <= hi => Ok((lo as i64, hi as i64)),
        _ => Err(MathError::invalid(name, "expected [min, max] integers with min <= max")),
    }
}

impl QVectorGenerator for GridQVectors {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn shell_count(&self) -> usize {
        self.shells.len()
    }

    fn shell_value(&self, index: usize) -> f64 {
        self.shells[index].q
    }

    fn shell_width(&self) -> f64 {
        self.width
    }

    fn shell(&self, index: usize) -> QShell {
        self.shells[index].clone()
    }
}

/// One shell per explicit Miller index.
#[derive(Debug, Clone)]
pub struct MillerIndices {
    reciprocal: Matrix3<f64>,
    hkls: Vec<[i64; 3]>,
}

impl MillerIndices {
    pub fn new(cell: &UnitCell, hkls: Vec<[i64; 3]>) -> Result<Self, MathError> {
        if hkls.iter().any(|hkl| *hkl == [0, 0, 0]) {
            return Err(MathError::invalid("indices", "(0, 0, 0) is not a valid reflection"));
        }
        Ok(Self {
            reciprocal: cell.reciprocal(),
            hkls,
        })
    }

    fn from_params(
        params: &Table,
        cell: Option<&UnitCell>,
    ) -> Result<Box<dyn QVectorGenerator>, MathError> {
        let cell = require_cell(cell, "miller_indices")?;
        let Some(Value::Array(items)) = params.get("indices") else {
            return Err(MathError::MissingParameter("indices".to_string()));
        };
        let hkls = items
            .iter()
            .map(|item| match item {
                Value::Array(triple) => match triple.as_slice() {
                    [Value::Integer(h), Value::Integer(k), Value::Integer(l)] => Ok([*h, *k, *l]),
                    _ => Err(MathError::invalid("indices", "expected [h, k, l] integers")),
                },
                _ => Err(MathError::invalid("indices", "expected [h, k, l] integers")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(Self::new(cell, hkls)?))
    }
}

impl QVectorGenerator for MillerIndices {
    fn name(&self) -> &'static str {
        "miller_indices"
    }

    fn shell_count(&self) -> usize {
        self.hkls.len()
    }

    fn shell_value(&self, index: usize) -> f64 {
        lattice_vector(&self.reciprocal, self.hkls[index]).norm()
    }

    fn shell_width(&self) -> f64 {
        0.0
    }

    fn shell(&self, index: usize) -> QShell {
        let vector = lattice_vector(&self.reciprocal, self.hkls[index]);
        QShell {
            q: vector.norm(),
            vectors: vec![vector],
            hkls: vec![self.hkls[index]],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> UnitCell {
        UnitCell::orthorhombic(2.0, 2.0, 2.0).unwrap()
    }

    fn table(source: &str) -> Table {
        source.parse().unwrap()
    }

    fn assert_within_shell(generator: &dyn QVectorGenerator) {
        for shell in shells(generator) {
            for vector in &shell.vectors {
                assert!(
                    (vector.norm() - shell.q).abs() <= generator.shell_width() / 2.0 + 1e-9,
                    "{} outside shell {}",
                    vector.norm(),
                    shell.q
                );
            }
        }
    }

    #[test]
    fn spherical_lattice_respects_shell_width_and_cap() {
        let params = table("shells = [5.0, 20.0, 5.0]\nwidth = 2.0\nn_vectors = 10\nseed = 7\n");
        let generator = SphericalLattice::from_params(&params, Some(&cell())).unwrap();
        assert_eq!(generator.shell_values(), vec![5.0, 10.0, 15.0]);
        assert_within_shell(generator.as_ref());
        for shell in shells(generator.as_ref()) {
            assert!(shell.vectors.len() <= 10);
            assert!(!shell.vectors.is_empty());
        }
    }

    #[test]
    fn generation_is_restartable_and_seeded() {
        let params = table("shells = [10.0, 30.0, 10.0]\nn_vectors = 5\nseed = 3\n");
        let generator = SphericalLattice::from_params(&params, Some(&cell())).unwrap();
        let first: Vec<_> = shells(generator.as_ref()).collect();
        let second: Vec<_> = shells(generator.as_ref()).collect();
        assert_eq!(first, second);
        let again = SphericalLattice::from_params(&params, Some(&cell())).unwrap();
        assert_eq!(first, shells(again.as_ref()).collect::<Vec<_>>());
    }

    #[test]
    fn linear_vectors_lie_on_the_direction() {
        let params = table("shells = [1.0, 4.0, 1.0]\ndirection = [0, 0, 2]\n");
        let generator = LinearQVectors::from_params(&params, None).unwrap();
        let all: Vec<_> = shells(generator.as_ref()).collect();
        assert_eq!(all.len(), 3);
        assert!((all[2].vectors[0] - Vector3::new(0.0, 0.0, 3.0)).norm() < 1e-12);
        assert_within_shell(generator.as_ref());
    }

    #[test]
    fn grid_bins_lattice_points_by_norm() {
        let params = table("h = [-1, 1]\nk = [-1, 1]\nl = [0, 0]\nq_step = 1.0\n");
        let generator = GridQVectors::from_params(&params, Some(&cell())).unwrap();
        let total: usize = shells(generator.as_ref()).map(|s| s.vectors.len()).sum();
        assert_eq!(total, 8);
        assert_within_shell(generator.as_ref());
    }

    #[test]
    fn miller_indices_give_one_vector_per_shell() {
        let params = table("indices = [[1, 0, 0], [1, 1, 0]]\n");
        let generator = MillerIndices::from_params(&params, Some(&cell())).unwrap();
        assert_eq!(generator.shell_count(), 2);
        assert!((generator.shell_value(0) - PI).abs() < 1e-12);
        assert!((generator.shell(1).q - PI * 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn lattice_generators_need_a_cell() {
        let params = table("shells = [1.0, 2.0, 1.0]\n");
        assert!(SphericalLattice::from_params(&params, None).is_err());
        assert!(MillerIndices::new(&cell(), vec![[0, 0, 0]]).is_err());
    }
}
