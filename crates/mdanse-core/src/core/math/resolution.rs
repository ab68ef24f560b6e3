//! Instrument resolution kernels in the angular frequency domain.
//!
//! A kernel is sampled on the symmetric omega axis of a spectrum and
//! renormalized so that its rectangle-rule integral is exactly one; it is
//! then applied by FFT convolution. Widths and centres are in rad/ps.

use super::{MathError, param_f64};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;
use toml::Table;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolutionKernel {
    /// Perfect resolution: convolution is the identity.
    Ideal,
    Gaussian { mu: f64, sigma: f64 },
    /// `sigma` is the half width at half maximum.
    Lorentzian { mu: f64, sigma: f64 },
    /// `sigma` is the half width of the base.
    Triangular { mu: f64, sigma: f64 },
    /// `sigma` is the half width.
    Square { mu: f64, sigma: f64 },
    PseudoVoigt {
        mu: f64,
        sigma_gaussian: f64,
        sigma_lorentzian: f64,
        eta: f64,
    },
}

pub type ResolutionFactory = fn(&Table) -> Result<ResolutionKernel, MathError>;

pub fn builtin() -> Vec<(&'static str, ResolutionFactory)> {
    vec![
        ("ideal", ideal as ResolutionFactory),
        ("gaussian", gaussian_kernel as ResolutionFactory),
        ("lorentzian", lorentzian_kernel as ResolutionFactory),
        ("triangular", triangular_kernel as ResolutionFactory),
        ("square", square_kernel as ResolutionFactory),
        ("pseudo_voigt", pseudo_voigt_kernel as ResolutionFactory),
    ]
}

fn ideal(_: &Table) -> Result<ResolutionKernel, MathError> {
    Ok(ResolutionKernel::Ideal)
}

fn gaussian_kernel(params: &Table) -> Result<ResolutionKernel, MathError> {
    let (mu, sigma) = centre_and_width(params)?;
    Ok(ResolutionKernel::Gaussian { mu, sigma })
}

fn lorentzian_kernel(params: &Table) -> Result<ResolutionKernel, MathError> {
    let (mu, sigma) = centre_and_width(params)?;
    Ok(ResolutionKernel::Lorentzian { mu, sigma })
}

fn triangular_kernel(params: &Table) -> Result<ResolutionKernel, MathError> {
    let (mu, sigma) = centre_and_width(params)?;
    Ok(ResolutionKernel::Triangular { mu, sigma })
}

fn square_kernel(params: &Table) -> Result<ResolutionKernel, MathError> {
    let (mu, sigma) = centre_and_width(params)?;
    Ok(ResolutionKernel::Square { mu, sigma })
}

fn pseudo_voigt_kernel(params: &Table) -> Result<ResolutionKernel, MathError> {
    let mu = param_f64(params, "mu", Some(0.0))?;
    let sigma_gaussian = positive(params, "sigma_gaussian")?;
    let sigma_lorentzian = positive(params, "sigma_lorentzian")?;
    let eta = param_f64(params, "eta", Some(0.5))?;
    if !(0.0..=1.0).contains(&eta) {
        return Err(MathError::invalid("eta", "must lie in [0, 1]"));
    }
    Ok(ResolutionKernel::PseudoVoigt {
        mu,
        sigma_gaussian,
        sigma_lorentzian,
        eta,
    })
}

fn positive(params: &Table, name: &str) -> Result<f64, MathError> {
    let value = param_f64(params, name, None)?;
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(MathError::invalid(name, "must be a positive number"))
    }
}

fn centre_and_width(params: &Table) -> Result<(f64, f64), MathError> {
    Ok((param_f64(params, "mu", Some(0.0))?, positive(params, "sigma")?))
}

fn gaussian(x: f64, sigma: f64) -> f64 {
    (-(x * x) / (2.0 * sigma * sigma)).exp() / (sigma * (2.0 * PI).sqrt())
}

fn lorentzian(x: f64, sigma: f64) -> f64 {
    sigma / (PI * (x * x + sigma * sigma))
}

impl ResolutionKernel {
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionKernel::Ideal => "ideal",
            ResolutionKernel::Gaussian { .. } => "gaussian",
            ResolutionKernel::Lorentzian { .. } => "lorentzian",
            ResolutionKernel::Triangular { .. } => "triangular",
            ResolutionKernel::Square { .. } => "square",
            ResolutionKernel::PseudoVoigt { .. } => "pseudo_voigt",
        }
    }

    /// Unnormalized kernel value at `omega`. Not meaningful for `Ideal`.
    pub fn evaluate(&self, omega: f64) -> f64 {
        match *self {
            ResolutionKernel::Ideal => 0.0,
            ResolutionKernel::Gaussian { mu, sigma } => gaussian(omega - mu, sigma),
            ResolutionKernel::Lorentzian { mu, sigma } => lorentzian(omega - mu, sigma),
            ResolutionKernel::Triangular { mu, sigma } => {
                (1.0 - (omega - mu).abs() / sigma).max(0.0) / sigma
            }
            ResolutionKernel::Square { mu, sigma } => {
                if (omega - mu).abs() <= sigma {
                    0.5 / sigma
                } else {
                    0.0
                }
            }
            ResolutionKernel::PseudoVoigt {
                mu,
                sigma_gaussian,
                sigma_lorentzian,
                eta,
            } => {
                eta * lorentzian(omega - mu, sigma_lorentzian)
                    + (1.0 - eta) * gaussian(omega - mu, sigma_gaussian)
            }
        }
    }

    /// Samples the kernel on a symmetric, evenly spaced omega axis.
    pub fn sample(&self, omega: &[f64]) -> Result<SampledKernel, MathError> {
        if omega.len() < 2 {
            return Err(MathError::Degenerate(
                "the omega axis needs at least two points".to_string(),
            ));
        }
        let d_omega = omega[1] - omega[0];
        if !(d_omega > 0.0) {
            return Err(MathError::Degenerate(
                "the omega axis must be increasing".to_string(),
            ));
        }
        let centre = omega.len() / 2;

        let mut values: Vec<f64> = match self {
            ResolutionKernel::Ideal => {
                let mut values = vec![0.0; omega.len()];
                values[centre] = 1.0;
                values
            }
            _ => omega.iter().map(|&w| self.evaluate(w)).collect(),
        };

        let integral: f64 = values.iter().sum::<f64>() * d_omega;
        if !integral.is_finite() {
            return Err(MathError::NonFinite(format!("the {} kernel", self.name())));
        }
        if integral <= 0.0 {
            return Err(MathError::Degenerate(format!(
                "the {} kernel vanishes on the omega axis; increase its width",
                self.name()
            )));
        }
        for value in &mut values {
            *value /= integral;
        }

        Ok(SampledKernel {
            identity: matches!(self, ResolutionKernel::Ideal),
            values,
            d_omega,
            centre,
        })
    }
}

/// A kernel sampled on a spectrum's omega axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledKernel {
    identity: bool,
    values: Vec<f64>,
    d_omega: f64,
    centre: usize,
}

impl SampledKernel {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn d_omega(&self) -> f64 {
        self.d_omega
    }

    /// Rectangle-rule integral, one up to rounding.
    pub fn integral(&self) -> f64 {
        self.values.iter().sum::<f64>() * self.d_omega
    }

    /// `(S ⊗ R)(ω_i) = Σ_j S(ω_j) R(ω_i - ω_j) dω`, through multiplication
    /// in Fourier space.
    pub fn convolve(&self, signal: &[f64]) -> Vec<f64> {
        if self.identity || signal.is_empty() {
            return signal.to_vec();
        }
        let m = signal.len().max(self.values.len());
        let size = (2 * m).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);

        let pad = |data: &[f64]| {
            let mut buffer = vec![Complex::new(0.0, 0.0); size];
            for (slot, &value) in buffer.iter_mut().zip(data) {
                slot.re = value;
            }
            buffer
        };
        let mut a = pad(signal);
        let mut k = pad(&self.values);
        fft.process(&mut a);
        fft.process(&mut k);
        for (x, y) in a.iter_mut().zip(&k) {
            *x *= *y;
        }
        ifft.process(&mut a);

        let scale = self.d_omega / size as f64;
        (0..signal.len())
            .map(|i| a[i + self.centre].re * scale)
            .collect()
    }
}
