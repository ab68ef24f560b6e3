//! # Numerical Kernels
//!
//! Pure functions and small strategy types used by the analyses. Nothing in
//! this module knows about jobs or configuration; parameter tables are read
//! through the helpers below so each generator or kernel factory validates
//! its own inputs.
//!
//! - [`correlation`] - FFT auto- and cross-correlations, mean square displacement
//! - [`unfold`] - continuous atomic paths from wrapped coordinates
//! - [`spectrum`] - symmetric Fourier transform to the angular frequency axis
//! - [`qvectors`] - reciprocal-space shell generators
//! - [`van_hove`] - minimum-image pair distance histograms
//! - [`weights`] - normalized element-tuple weights
//! - [`resolution`] - instrument resolution kernels and their convolution

pub mod correlation;
pub mod qvectors;
pub mod resolution;
pub mod spectrum;
pub mod unfold;
pub mod van_hove;
pub mod weights;

use thiserror::Error;
use toml::{Table, Value};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MathError {
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("Non-finite value produced by {0}")]
    NonFinite(String),

    #[error("{0}")]
    Degenerate(String),
}

impl MathError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Reads a number from a parameter table, accepting integers for floats.
pub(crate) fn param_f64(
    params: &Table,
    name: &str,
    default: Option<f64>,
) -> Result<f64, MathError> {
    match params.get(name) {
        Some(value) => value_as_f64(value).ok_or_else(|| MathError::invalid(name, "expected a number")),
        None => default.ok_or_else(|| MathError::MissingParameter(name.to_string())),
    }
}

pub(crate) fn param_usize(
    params: &Table,
    name: &str,
    default: Option<usize>,
) -> Result<usize, MathError> {
    match params.get(name) {
        Some(Value::Integer(i)) if *i >= 0 => Ok(*i as usize),
        Some(_) => Err(MathError::invalid(name, "expected a non-negative integer")),
        None => default.ok_or_else(|| MathError::MissingParameter(name.to_string())),
    }
}

/// Reads `[start, stop, step]` as floats with `start < stop` and `step > 0`.
pub(crate) fn param_range(params: &Table, name: &str) -> Result<(f64, f64, f64), MathError> {
    let values = param_f64_array(params, name)?;
    let [start, stop, step] = values[..] else {
        return Err(MathError::invalid(name, "expected [start, stop, step]"));
    };
    if !(start < stop) || !(step > 0.0) {
        return Err(MathError::invalid(
            name,
            format!("expected start < stop and step > 0, got [{start}, {stop}, {step}]"),
        ));
    }
    Ok((start, stop, step))
}

pub(crate) fn param_f64_array(params: &Table, name: &str) -> Result<Vec<f64>, MathError> {
    let value = params
        .get(name)
        .ok_or_else(|| MathError::MissingParameter(name.to_string()))?;
    let Value::Array(items) = value else {
        return Err(MathError::invalid(name, "expected an array"));
    };
    items
        .iter()
        .map(|item| value_as_f64(item).ok_or_else(|| MathError::invalid(name, "expected numbers")))
        .collect()
}

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) => Some(*f),
        Value::Integer(i) => Some(*i as f64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Values `start, start + step, ...` strictly below `stop`.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !(start < stop) {
        return Vec::new();
    }
    let count = ((stop - start) / step - 1e-9).ceil().max(0.0) as usize;
    (0..count).map(|i| start + i as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(source: &str) -> Table {
        source.parse().unwrap()
    }

    #[test]
    fn arange_excludes_the_stop_value() {
        assert_eq!(arange(0.0, 1.0, 0.25), vec![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(arange(0.0, 1.1, 0.5), vec![0.0, 0.5, 1.0]);
        assert!(arange(1.0, 0.0, 0.1).is_empty());
    }

    #[test]
    fn parameters_coerce_integers_and_strings() {
        let params = table("a = 2\nb = \"3.5\"\nc = [0, 10, 0.5]\n");
        assert_eq!(param_f64(&params, "a", None).unwrap(), 2.0);
        assert_eq!(param_f64(&params, "b", None).unwrap(), 3.5);
        assert_eq!(param_f64(&params, "missing", Some(1.0)).unwrap(), 1.0);
        assert_eq!(param_range(&params, "c").unwrap(), (0.0, 10.0, 0.5));
        assert!(matches!(
            param_f64(&params, "missing", None),
            Err(MathError::MissingParameter(_))
        ));
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let params = table("c = [10, 0, 1]\n");
        assert!(param_range(&params, "c").is_err());
    }
}
