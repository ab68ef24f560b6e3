//! The instrument model applied to finished analyses.
//!
//! An [`Instrument`] combines a [`Spectrum`], a detector [`Coverage`] and a
//! [`ScatteringMethod`]. Analyses that opt in hand their outputs to
//! [`Instrument::apply`] after finalization; the resolution kernel itself is
//! applied by the analyses through [`crate::core::math::resolution`].

pub mod coverage;
pub mod method;
pub mod spectrum;

pub use coverage::Coverage;
pub use method::ScatteringMethod;
pub use spectrum::{Spectrum, TabulatedSpectrum};

use crate::core::io::OutputSet;
use crate::core::math::MathError;
use ndarray::Axis;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InstrumentError {
    #[error(transparent)]
    Parameter(#[from] MathError),

    #[error("Cannot read '{path}': {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Instrument {
    pub spectrum: Spectrum,
    pub coverage: Coverage,
    pub method: ScatteringMethod,
}

impl Instrument {
    pub fn new(spectrum: Spectrum, coverage: Coverage, method: ScatteringMethod) -> Self {
        Self {
            spectrum,
            coverage,
            method,
        }
    }

    /// True when applying the instrument leaves every output unchanged.
    pub fn is_ideal(&self) -> bool {
        matches!(self.spectrum, Spectrum::Flat)
            && matches!(self.coverage, Coverage::Ideal)
            && matches!(self.method, ScatteringMethod::Null)
    }

    /// Flux at the incident wavelength, taken from the coverage geometry or
    /// the scattering method. Unknown wavelengths see the full flux.
    pub fn relative_flux(&self) -> f64 {
        match self.coverage.wavelength().or(self.method.incident_wavelength()) {
            Some(wavelength) => self.spectrum.relative_flux(wavelength),
            None => 1.0,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "spectrum={} coverage={} method={}",
            self.spectrum.name(),
            self.coverage.name(),
            self.method.name()
        )
    }

    /// Zeroes entries along `q_axis` outside the coverage and along
    /// `omega_axis` outside the method's window, then scales every affected
    /// variable by the relative flux. Variables carrying neither axis are
    /// untouched.
    pub fn apply(&self, outputs: &mut OutputSet, q_axis: &str, omega_axis: &str) {
        if self.is_ideal() {
            return;
        }
        let mask = |axis: &str, keep: &dyn Fn(f64) -> bool| -> Option<Vec<bool>> {
            outputs
                .axis(axis)
                .map(|a| a.values.iter().map(|&v| keep(v)).collect())
        };
        let q_mask = mask(q_axis, &|q: f64| self.coverage.covers(q));
        let omega_mask = mask(omega_axis, &|w: f64| self.method.observes(w));
        let flux = self.relative_flux();

        for variable in outputs.variables.values_mut() {
            let mut affected = false;
            for dim in 0..variable.axes.len().min(variable.data.ndim()) {
                let axis_mask = if variable.axes[dim] == q_axis {
                    &q_mask
                } else if variable.axes[dim] == omega_axis {
                    &omega_mask
                } else {
                    continue;
                };
                affected = true;
                let Some(axis_mask) = axis_mask else { continue };
                let extent = variable.data.len_of(Axis(dim));
                for (index, _) in axis_mask.iter().enumerate().filter(|(_, keep)| !**keep) {
                    if index < extent {
                        variable.data.index_axis_mut(Axis(dim), index).fill(0.0);
                    }
                }
            }
            if affected && flux != 1.0 {
                variable.data.mapv_inplace(|v| v * flux);
            }
        }
        debug!(instrument = %self.describe(), flux, "Applied instrument");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::{OutputAxis, OutputVariable};
    use ndarray::{ArrayD, IxDyn};

    fn outputs() -> OutputSet {
        let mut outputs = OutputSet::new("");
        outputs.add_axis("q", OutputAxis::new(vec![1.0, 10.0, 100.0], "1/nm"));
        outputs.add_axis("omega", OutputAxis::new(vec![-20.0, 0.0, 20.0], "rad/ps"));
        outputs.add_axis("time", OutputAxis::new(vec![0.0, 1.0], "ps"));
        outputs.add_variable(OutputVariable::new(
            "s(q,f)",
            ArrayD::from_elem(IxDyn(&[3, 3]), 1.0),
            &["q", "omega"],
            "au",
        ));
        outputs.add_variable(OutputVariable::from_vec("msd", vec![0.0, 1.0], "time", "nm2"));
        outputs
    }

    #[test]
    fn ideal_instrument_changes_nothing() {
        let mut set = outputs();
        Instrument::default().apply(&mut set, "q", "omega");
        assert_eq!(set, outputs());
    }

    #[test]
    fn coverage_and_method_mask_their_axes() {
        let instrument = Instrument::new(
            Spectrum::Flat,
            Coverage::Angular {
                wavelength: 0.5,
                min_angle: 10.0,
                max_angle: 90.0,
            },
            ScatteringMethod::DirectTof { incident_energy: 5.0 },
        );
        let mut set = outputs();
        instrument.apply(&mut set, "q", "omega");
        let s = &set.variable("s(q,f)").unwrap().data;
        // Q window is roughly [2.19, 17.8] 1/nm; 20 rad/ps is 13.2 meV.
        assert_eq!(s[[0, 1]], 0.0);
        assert_eq!(s[[1, 0]], 1.0);
        assert_eq!(s[[1, 1]], 1.0);
        assert_eq!(s[[1, 2]], 0.0);
        assert_eq!(s[[2, 1]], 0.0);
        assert_eq!(set.variable("msd"), outputs().variable("msd"));
    }

    #[test]
    fn flux_scales_affected_variables() {
        let spectrum = TabulatedSpectrum::new(vec![0.4, 0.6], vec![1.0, 0.0]).unwrap();
        let instrument = Instrument::new(
            Spectrum::Tabulated(spectrum),
            Coverage::Angular {
                wavelength: 0.5,
                min_angle: 0.0,
                max_angle: 180.0,
            },
            ScatteringMethod::Null,
        );
        assert!((instrument.relative_flux() - 0.5).abs() < 1e-12);
        let mut set = outputs();
        instrument.apply(&mut set, "q", "omega");
        assert!((set.variable("s(q,f)").unwrap().data[[1, 1]] - 0.5).abs() < 1e-12);
        assert_eq!(set.variable("msd").unwrap().data[[1]], 1.0);
    }
}
