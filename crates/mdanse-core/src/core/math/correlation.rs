use nalgebra::Vector3;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Unnormalized lagged products `Σ_t conj(a[t]) b[t+k]` for `k` in `[0, N)`.
///
/// Both series are zero padded to a power of two of at least `2N`, so the
/// circular FFT product contains no wrap-around terms.
fn raw_correlation(a: &[Complex<f64>], b: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let n = a.len().min(b.len());
    if n == 0 {
        return Vec::new();
    }
    let size = (2 * n).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(size);
    let ifft = planner.plan_fft_inverse(size);

    let mut fa = vec![Complex::new(0.0, 0.0); size];
    fa[..n].copy_from_slice(&a[..n]);
    fft.process(&mut fa);

    let mut fb = vec![Complex::new(0.0, 0.0); size];
    fb[..n].copy_from_slice(&b[..n]);
    fft.process(&mut fb);

    for (x, y) in fa.iter_mut().zip(&fb) {
        *x = x.conj() * *y;
    }
    ifft.process(&mut fa);

    let scale = 1.0 / size as f64;
    fa.truncate(n);
    fa.iter().map(|v| *v * scale).collect()
}

fn to_complex(series: &[f64]) -> Vec<Complex<f64>> {
    series.iter().map(|&x| Complex::new(x, 0.0)).collect()
}

fn unbiased(raw: Vec<Complex<f64>>) -> Vec<Complex<f64>> {
    let n = raw.len();
    raw.into_iter()
        .enumerate()
        .map(|(k, v)| v / (n - k) as f64)
        .collect()
}

/// `c[k] = 1/(N-k) Σ_t a[t] a[t+k]`.
pub fn autocorrelation(series: &[f64]) -> Vec<f64> {
    let complex = to_complex(series);
    unbiased(raw_correlation(&complex, &complex))
        .into_iter()
        .map(|c| c.re)
        .collect()
}

/// `c[k] = 1/(N-k) Σ_t a[t] b[t+k]`, over the common length of both series.
pub fn cross_correlation(a: &[f64], b: &[f64]) -> Vec<f64> {
    unbiased(raw_correlation(&to_complex(a), &to_complex(b)))
        .into_iter()
        .map(|c| c.re)
        .collect()
}

/// `c[k] = 1/(N-k) Σ_t conj(a[t]) a[t+k]`.
pub fn autocorrelation_complex(series: &[Complex<f64>]) -> Vec<Complex<f64>> {
    unbiased(raw_correlation(series, series))
}

/// Sum of the per-component autocorrelations of a vector series.
pub fn autocorrelation_vectors(series: &[Vector3<f64>]) -> Vec<f64> {
    let mut total = vec![0.0; series.len()];
    for axis in 0..3 {
        let component: Vec<f64> = series.iter().map(|v| v[axis]).collect();
        for (t, c) in total.iter_mut().zip(autocorrelation(&component)) {
            *t += c;
        }
    }
    total
}

/// Mean square displacement `<|r(t+k) - r(t)|²>` over time origins, for
/// `k` in `[0, N)`.
///
/// Uses the FFT decomposition `|r(t+k) - r(t)|² = r(t+k)² + r(t)² - 2 r(t)·r(t+k)`
/// with prefix sums for the squared norms.
pub fn mean_square_displacement(series: &[Vector3<f64>]) -> Vec<f64> {
    let n = series.len();
    if n == 0 {
        return Vec::new();
    }
    let mut prefix = vec![0.0; n + 1];
    for (i, r) in series.iter().enumerate() {
        prefix[i + 1] = prefix[i] + r.norm_squared();
    }

    let mut cross = vec![0.0; n];
    for axis in 0..3 {
        let component = to_complex(&series.iter().map(|v| v[axis]).collect::<Vec<_>>());
        for (c, v) in cross.iter_mut().zip(raw_correlation(&component, &component)) {
            *c += v.re;
        }
    }

    (0..n)
        .map(|k| {
            let count = (n - k) as f64;
            let head = prefix[n - k];
            let tail = prefix[n] - prefix[k];
            ((head + tail - 2.0 * cross[k]) / count).max(0.0)
        })
        .collect()
}
