use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// Times `0, dt, ..., (n-1) dt` in ps.
pub fn time_axis(n: usize, dt: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 * dt).collect()
}

/// Angular frequencies (rad/ps) matching [`spectrum`] for a correlation of
/// `n` points: `2n - 1` values, symmetric around the central zero.
pub fn omega_axis(n: usize, dt: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let size = 2 * n - 1;
    let d_omega = 2.0 * PI / (size as f64 * dt);
    let half = (n - 1) as i64;
    (-half..=half).map(|m| m as f64 * d_omega).collect()
}

/// Spacing of [`omega_axis`].
pub fn omega_step(n: usize, dt: f64) -> f64 {
    2.0 * PI / ((2 * n).saturating_sub(1).max(1) as f64 * dt)
}

/// Fourier transform of an even time correlation to the angular frequency
/// axis.
///
/// The correlation `c(t)` for `t >= 0` is mirrored to negative times and
/// transformed as `S(ω) = dt / 2π Σ_t c(|t|) exp(-iωt)`, so that the
/// rectangle-rule integral of `S` over [`omega_axis`] equals `c(0)`. The
/// output is ordered from negative to positive frequencies.
pub fn spectrum(correlation: &[f64], dt: f64) -> Vec<f64> {
    let n = correlation.len();
    if n == 0 {
        return Vec::new();
    }
    let size = 2 * n - 1;
    let mut buffer: Vec<Complex<f64>> = Vec::with_capacity(size);
    buffer.extend(correlation.iter().map(|&c| Complex::new(c, 0.0)));
    buffer.extend(correlation[1..].iter().rev().map(|&c| Complex::new(c, 0.0)));

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(size).process(&mut buffer);

    let scale = dt / (2.0 * PI);
    let values: Vec<f64> = buffer.iter().map(|v| v.re * scale).collect();
    // fftshift: put the zero frequency at index n - 1.
    let mut shifted = Vec::with_capacity(size);
    shifted.extend_from_slice(&values[n..]);
    shifted.extend_from_slice(&values[..n]);
    shifted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_is_symmetric_with_central_zero() {
        let omega = omega_axis(4, 0.5);
        assert_eq!(omega.len(), 7);
        assert_eq!(omega[3], 0.0);
        assert!((omega[0] + omega[6]).abs() < 1e-12);
        assert!((omega[4] - omega_step(4, 0.5)).abs() < 1e-12);
    }

    #[test]
    fn spectrum_integrates_to_the_zero_time_value() {
        let dt = 0.1;
        let correlation: Vec<f64> = (0..64).map(|i| (-(i as f64) * dt / 0.8).exp()).collect();
        let s = spectrum(&correlation, dt);
        let d_omega = omega_step(correlation.len(), dt);
        let integral: f64 = s.iter().sum::<f64>() * d_omega;
        assert!((integral - correlation[0]).abs() < 1e-9);
        let peak = s.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(s[correlation.len() - 1], peak);
    }

    #[test]
    fn spectrum_of_an_even_signal_is_symmetric() {
        let correlation = [1.0, 0.5, 0.25, 0.1];
        let s = spectrum(&correlation, 1.0);
        for i in 0..s.len() {
            assert!((s[i] - s[s.len() - 1 - i]).abs() < 1e-12);
        }
    }
}
