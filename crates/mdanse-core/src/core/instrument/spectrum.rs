use super::InstrumentError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

/// Incident flux as a function of wavelength, relative to its maximum.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Spectrum {
    #[default]
    Flat,
    Tabulated(TabulatedSpectrum),
}

impl Spectrum {
    pub fn name(&self) -> &'static str {
        match self {
            Spectrum::Flat => "flat",
            Spectrum::Tabulated(_) => "tabulated",
        }
    }

    /// Relative flux in `[0, 1]` at `wavelength` (nm).
    pub fn relative_flux(&self, wavelength: f64) -> f64 {
        match self {
            Spectrum::Flat => 1.0,
            Spectrum::Tabulated(table) => table.relative_flux(wavelength),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpectrumRow {
    wavelength: f64,
    flux: f64,
}

/// A measured spectrum, linearly interpolated between rows and zero
/// outside the tabulated range.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedSpectrum {
    wavelengths: Vec<f64>,
    flux: Vec<f64>,
}

impl TabulatedSpectrum {
    pub fn new(wavelengths: Vec<f64>, flux: Vec<f64>) -> Result<Self, InstrumentError> {
        if wavelengths.len() != flux.len() || wavelengths.is_empty() {
            return Err(InstrumentError::Invalid(
                "a spectrum needs as many flux values as wavelengths, and at least one".to_string(),
            ));
        }
        if wavelengths.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(InstrumentError::Invalid(
                "spectrum wavelengths must be strictly increasing".to_string(),
            ));
        }
        if flux.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(InstrumentError::Invalid(
                "spectrum flux must be finite and non-negative".to_string(),
            ));
        }
        let peak = flux.iter().copied().fold(0.0, f64::max);
        if peak <= 0.0 {
            return Err(InstrumentError::Invalid("spectrum flux is zero everywhere".to_string()));
        }
        Ok(Self {
            wavelengths,
            flux: flux.into_iter().map(|f| f / peak).collect(),
        })
    }

    /// Reads a CSV file with `wavelength` (nm) and `flux` columns.
    pub fn from_csv(path: &Path) -> Result<Self, InstrumentError> {
        let csv_error = |e: csv::Error| InstrumentError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let mut reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_error)?;

        let mut wavelengths = Vec::new();
        let mut flux = Vec::new();
        for row in reader.deserialize::<SpectrumRow>() {
            let row = row.map_err(csv_error)?;
            wavelengths.push(row.wavelength);
            flux.push(row.flux);
        }
        Self::new(wavelengths, flux)
    }

    pub fn relative_flux(&self, wavelength: f64) -> f64 {
        let n = self.wavelengths.len();
        if n == 1 {
            return if wavelength == self.wavelengths[0] { self.flux[0] } else { 0.0 };
        }
        if wavelength < self.wavelengths[0] || wavelength > self.wavelengths[n - 1] {
            return 0.0;
        }
        let upper = self.wavelengths.partition_point(|w| *w < wavelength);
        if upper == 0 {
            return self.flux[0];
        }
        let (x0, x1) = (self.wavelengths[upper - 1], self.wavelengths[upper]);
        let (y0, y1) = (self.flux[upper - 1], self.flux[upper]);
        y0 + (y1 - y0) * (wavelength - x0) / (x1 - x0)
    }
}

pub type SpectrumFactory = fn(&Table) -> Result<Spectrum, InstrumentError>;

fn flat(_: &Table) -> Result<Spectrum, InstrumentError> {
    Ok(Spectrum::Flat)
}

fn tabulated(params: &Table) -> Result<Spectrum, InstrumentError> {
    let Some(Value::String(file)) = params.get("file") else {
        return Err(InstrumentError::Invalid(
            "the tabulated spectrum needs a 'file' path".to_string(),
        ));
    };
    TabulatedSpectrum::from_csv(&PathBuf::from(file)).map(Spectrum::Tabulated)
}

pub fn builtin() -> Vec<(&'static str, SpectrumFactory)> {
    vec![
        ("flat", flat as SpectrumFactory),
        ("tabulated", tabulated as SpectrumFactory),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn flat_spectrum_is_one_everywhere() {
        assert_eq!(Spectrum::Flat.relative_flux(0.1), 1.0);
        assert_eq!(Spectrum::Flat.relative_flux(50.0), 1.0);
    }

    #[test]
    fn tabulated_spectrum_interpolates_relative_to_the_peak() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flux.csv");
        fs::write(&path, "# reactor\nwavelength,flux\n0.2, 2.0\n0.4, 4.0\n0.6, 1.0\n").unwrap();
        let spectrum = TabulatedSpectrum::from_csv(&path).unwrap();
        assert_eq!(spectrum.relative_flux(0.4), 1.0);
        assert!((spectrum.relative_flux(0.3) - 0.75).abs() < 1e-12);
        assert_eq!(spectrum.relative_flux(0.2), 0.5);
        assert_eq!(spectrum.relative_flux(0.7), 0.0);
    }

    #[test]
    fn malformed_files_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flux.csv");
        fs::write(&path, "wavelength,flux\n0.4,1.0\n0.2,1.0\n").unwrap();
        assert!(matches!(TabulatedSpectrum::from_csv(&path), Err(InstrumentError::Invalid(_))));
        fs::write(&path, "wavelength,flux\nfast,1.0\n").unwrap();
        assert!(matches!(
            TabulatedSpectrum::from_csv(&path),
            Err(InstrumentError::Unreadable { .. })
        ));
        assert!(TabulatedSpectrum::from_csv(&dir.path().join("missing.csv")).is_err());
    }
}
