use super::InstrumentError;
use crate::core::math::param_f64;
use toml::Table;

/// ħ in meV·ps: an angular frequency of 1 rad/ps is 0.6582 meV.
pub const HBAR_MEV_PS: f64 = 0.658_211_956_9;

/// Neutron energy (meV) to wavelength (nm): `λ = 0.9045 / sqrt(E)`.
pub fn wavelength_from_energy(energy: f64) -> f64 {
    0.904_5 / energy.sqrt()
}

/// Decides which energy transfers an instrument observes. Energy transfer
/// is positive when the sample gains energy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ScatteringMethod {
    /// No restriction.
    #[default]
    Null,
    /// Fixed incident energy (meV): transfers up to `incident_energy`.
    DirectTof { incident_energy: f64 },
    /// Fixed final energy (meV): transfers down to `-final_energy`.
    IndirectTof { final_energy: f64 },
    /// Only `|ħω| <= window` (meV).
    Elastic { window: f64 },
}

impl ScatteringMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ScatteringMethod::Null => "null",
            ScatteringMethod::DirectTof { .. } => "direct_tof",
            ScatteringMethod::IndirectTof { .. } => "indirect_tof",
            ScatteringMethod::Elastic { .. } => "elastic",
        }
    }

    /// Whether the transfer at angular frequency `omega` (rad/ps) is seen.
    pub fn observes(&self, omega: f64) -> bool {
        let energy = omega * HBAR_MEV_PS;
        match *self {
            ScatteringMethod::Null => true,
            ScatteringMethod::DirectTof { incident_energy } => energy <= incident_energy,
            ScatteringMethod::IndirectTof { final_energy } => energy >= -final_energy,
            ScatteringMethod::Elastic { window } => energy.abs() <= window,
        }
    }

    /// Wavelength of the neutrons hitting the sample, when fixed.
    pub fn incident_wavelength(&self) -> Option<f64> {
        match *self {
            ScatteringMethod::DirectTof { incident_energy } => {
                Some(wavelength_from_energy(incident_energy))
            }
            _ => None,
        }
    }
}

pub type MethodFactory = fn(&Table) -> Result<ScatteringMethod, InstrumentError>;

fn positive_energy(params: &Table, name: &str) -> Result<f64, InstrumentError> {
    let value = param_f64(params, name, None)?;
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(InstrumentError::Invalid(format!("'{name}' must be a positive energy in meV")))
    }
}

fn null(_: &Table) -> Result<ScatteringMethod, InstrumentError> {
    Ok(ScatteringMethod::Null)
}

fn direct_tof(params: &Table) -> Result<ScatteringMethod, InstrumentError> {
    Ok(ScatteringMethod::DirectTof {
        incident_energy: positive_energy(params, "incident_energy")?,
    })
}

fn indirect_tof(params: &Table) -> Result<ScatteringMethod, InstrumentError> {
    Ok(ScatteringMethod::IndirectTof {
        final_energy: positive_energy(params, "final_energy")?,
    })
}

fn elastic(params: &Table) -> Result<ScatteringMethod, InstrumentError> {
    Ok(ScatteringMethod::Elastic {
        window: positive_energy(params, "window")?,
    })
}

pub fn builtin() -> Vec<(&'static str, MethodFactory)> {
    vec![
        ("null", null as MethodFactory),
        ("direct_tof", direct_tof as MethodFactory),
        ("indirect_tof", indirect_tof as MethodFactory),
        ("elastic", elastic as MethodFactory),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_geometry_caps_energy_gain_by_the_sample() {
        let method = ScatteringMethod::DirectTof { incident_energy: 5.0 };
        assert!(method.observes(-100.0));
        assert!(method.observes(5.0 / HBAR_MEV_PS - 1e-9));
        assert!(!method.observes(5.0 / HBAR_MEV_PS + 1e-6));
    }

    #[test]
    fn indirect_geometry_caps_energy_loss_by_the_sample() {
        let method = ScatteringMethod::IndirectTof { final_energy: 2.0 };
        assert!(method.observes(100.0));
        assert!(!method.observes(-2.0 / HBAR_MEV_PS - 1e-6));
    }

    #[test]
    fn elastic_window_is_symmetric() {
        let method = ScatteringMethod::Elastic { window: 0.1 };
        assert!(method.observes(0.0));
        assert!(!method.observes(1.0));
        assert!(!method.observes(-1.0));
    }

    #[test]
    fn energies_must_be_positive() {
        let params: Table = "incident_energy = -1.0\n".parse().unwrap();
        assert!(direct_tof(&params).is_err());
        assert!(elastic(&Table::new()).is_err());
    }

    #[test]
    fn thermal_neutrons_are_near_two_angstrom() {
        assert!((wavelength_from_energy(20.45) - 0.2).abs() < 1e-3);
    }
}
