use super::MathError;
use crate::core::cell::UnitCell;
use nalgebra::Vector3;
use std::f64::consts::PI;

/// Equal-width radial bins `[r, r + dr)` starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialBins {
    pub start: f64,
    pub step: f64,
    pub count: usize,
}

impl RadialBins {
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self, MathError> {
        if !(start >= 0.0) || !(start < stop) || !(step > 0.0) {
            return Err(MathError::invalid(
                "r_values",
                format!("expected 0 <= start < stop and step > 0, got [{start}, {stop}, {step}]"),
            ));
        }
        Ok(Self {
            start,
            step,
            count: super::arange(start, stop, step).len(),
        })
    }

    pub fn bin(&self, r: f64) -> Option<usize> {
        if r < self.start {
            return None;
        }
        let index = ((r - self.start) / self.step).floor() as usize;
        (index < self.count).then_some(index)
    }

    pub fn centers(&self) -> Vec<f64> {
        (0..self.count)
            .map(|i| self.start + (i as f64 + 0.5) * self.step)
            .collect()
    }

    /// Volume of each spherical shell.
    pub fn shell_volumes(&self) -> Vec<f64> {
        (0..self.count)
            .map(|i| {
                let inner = self.start + i as f64 * self.step;
                let outer = inner + self.step;
                4.0 / 3.0 * PI * (outer.powi(3) - inner.powi(3))
            })
            .collect()
    }
}

fn separation(a: &Vector3<f64>, b: &Vector3<f64>, cell: Option<&UnitCell>) -> f64 {
    let d = b - a;
    match cell {
        Some(cell) => cell.minimum_image(&d).norm(),
        None => d.norm(),
    }
}

/// Histogram of distances between atoms of `a` and `b`, using the minimum
/// image convention when a cell is given.
///
/// With `same` set, `b` is ignored and each unordered pair of `a` is counted
/// once.
pub fn pair_histogram(
    a: &[Vector3<f64>],
    b: &[Vector3<f64>],
    same: bool,
    cell: Option<&UnitCell>,
    bins: &RadialBins,
) -> Vec<f64> {
    let mut histogram = vec![0.0; bins.count];
    if same {
        for (i, ri) in a.iter().enumerate() {
            for rj in &a[i + 1..] {
                if let Some(bin) = bins.bin(separation(ri, rj, cell)) {
                    histogram[bin] += 1.0;
                }
            }
        }
    } else {
        for ri in a {
            for rj in b {
                if let Some(bin) = bins.bin(separation(ri, rj, cell)) {
                    histogram[bin] += 1.0;
                }
            }
        }
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_are_half_open() {
        let bins = RadialBins::new(0.0, 1.0, 0.25).unwrap();
        assert_eq!(bins.count, 4);
        assert_eq!(bins.bin(0.0), Some(0));
        assert_eq!(bins.bin(0.25), Some(1));
        assert_eq!(bins.bin(0.99), Some(3));
        assert_eq!(bins.bin(1.0), None);
        assert_eq!(bins.centers()[0], 0.125);
    }

    #[test]
    fn histogram_uses_minimum_image() {
        let cell = UnitCell::orthorhombic(10.0, 10.0, 10.0).unwrap();
        let bins = RadialBins::new(0.0, 5.0, 1.0).unwrap();
        let a = [Vector3::new(0.5, 0.0, 0.0), Vector3::new(9.5, 0.0, 0.0)];
        let histogram = pair_histogram(&a, &[], true, Some(&cell), &bins);
        assert_eq!(histogram, vec![0.0, 1.0, 0.0, 0.0, 0.0]);
        let open = pair_histogram(&a, &[], true, None, &bins);
        assert_eq!(open.iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn distinct_sets_count_every_pair() {
        let bins = RadialBins::new(0.0, 3.0, 1.0).unwrap();
        let a = [Vector3::zeros()];
        let b = [Vector3::new(1.5, 0.0, 0.0), Vector3::new(0.0, 2.5, 0.0)];
        assert_eq!(
            pair_histogram(&a, &b, false, None, &bins),
            vec![0.0, 1.0, 1.0]
        );
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(RadialBins::new(1.0, 0.5, 0.1).is_err());
        assert!(RadialBins::new(0.0, 1.0, 0.0).is_err());
    }
}
