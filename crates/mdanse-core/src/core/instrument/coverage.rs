use super::InstrumentError;
use crate::core::math::param_f64;
use std::f64::consts::PI;
use toml::Table;

/// Accessible |Q| window of the detectors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Coverage {
    /// Every Q is observed.
    #[default]
    Ideal,
    /// Detectors spanning scattering angles `[min_angle, max_angle]`
    /// (degrees) for neutrons of `wavelength` (nm).
    Angular {
        wavelength: f64,
        min_angle: f64,
        max_angle: f64,
    },
}

/// Elastic momentum transfer `4π sin(θ/2) / λ`, in 1/nm.
pub fn momentum_transfer(wavelength: f64, angle_degrees: f64) -> f64 {
    4.0 * PI * (angle_degrees.to_radians() / 2.0).sin() / wavelength
}

impl Coverage {
    pub fn name(&self) -> &'static str {
        match self {
            Coverage::Ideal => "ideal",
            Coverage::Angular { .. } => "angular",
        }
    }

    pub fn q_range(&self) -> Option<(f64, f64)> {
        match *self {
            Coverage::Ideal => None,
            Coverage::Angular {
                wavelength,
                min_angle,
                max_angle,
            } => Some((
                momentum_transfer(wavelength, min_angle),
                momentum_transfer(wavelength, max_angle),
            )),
        }
    }

    pub fn covers(&self, q: f64) -> bool {
        self.q_range()
            .is_none_or(|(low, high)| q >= low && q <= high)
    }

    pub fn wavelength(&self) -> Option<f64> {
        match *self {
            Coverage::Ideal => None,
            Coverage::Angular { wavelength, .. } => Some(wavelength),
        }
    }
}

pub type CoverageFactory = fn(&Table) -> Result<Coverage, InstrumentError>;

fn ideal(_: &Table) -> Result<Coverage, InstrumentError> {
    Ok(Coverage::Ideal)
}

fn angular(params: &Table) -> Result<Coverage, InstrumentError> {
    let wavelength = param_f64(params, "wavelength", None)?;
    let min_angle = param_f64(params, "min_angle", Some(0.0))?;
    let max_angle = param_f64(params, "max_angle", Some(180.0))?;
    if !(wavelength > 0.0 && wavelength.is_finite()) {
        return Err(InstrumentError::Invalid("the wavelength must be positive".to_string()));
    }
    if !(0.0 <= min_angle && min_angle < max_angle && max_angle <= 180.0) {
        return Err(InstrumentError::Invalid(format!(
            "detector angles must satisfy 0 <= min < max <= 180, got [{min_angle}, {max_angle}]"
        )));
    }
    Ok(Coverage::Angular {
        wavelength,
        min_angle,
        max_angle,
    })
}

pub fn builtin() -> Vec<(&'static str, CoverageFactory)> {
    vec![
        ("ideal", ideal as CoverageFactory),
        ("angular", angular as CoverageFactory),
    ]
}
