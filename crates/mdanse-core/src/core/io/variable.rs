use super::OutputError;
use ndarray::{ArrayD, IxDyn};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DType {
    #[default]
    Float64,
    /// Integral counts stored as exact `f64` values.
    Int64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Float64 => write!(f, "float64"),
            DType::Int64 => write!(f, "int64"),
        }
    }
}

/// A named, n-dimensional result with one axis reference per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputVariable {
    pub name: String,
    pub dtype: DType,
    pub data: ArrayD<f64>,
    pub axes: Vec<String>,
    pub units: String,
    pub description: String,
}

impl OutputVariable {
    pub fn new(name: impl Into<String>, data: ArrayD<f64>, axes: &[&str], units: &str) -> Self {
        Self {
            name: name.into(),
            dtype: DType::Float64,
            data,
            axes: axes.iter().map(|a| a.to_string()).collect(),
            units: units.to_string(),
            description: String::new(),
        }
    }

    pub fn from_vec(name: impl Into<String>, values: Vec<f64>, axis: &str, units: &str) -> Self {
        let len = values.len();
        let data = ArrayD::from_shape_vec(IxDyn(&[len]), values)
            .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0])));
        Self::new(name, data, &[axis], units)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

/// A 1-D coordinate axis referenced by output variables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputAxis {
    pub values: Vec<f64>,
    pub units: String,
}

impl OutputAxis {
    pub fn new(values: Vec<f64>, units: &str) -> Self {
        Self {
            values,
            units: units.to_string(),
        }
    }
}

/// Everything a job hands to the writers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputSet {
    pub header: String,
    pub axes: BTreeMap<String, OutputAxis>,
    pub variables: BTreeMap<String, OutputVariable>,
}

impl OutputSet {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    pub fn add_axis(&mut self, name: &str, axis: OutputAxis) {
        self.axes.insert(name.to_string(), axis);
    }

    pub fn add_variable(&mut self, variable: OutputVariable) {
        self.variables.insert(variable.name.clone(), variable);
    }

    pub fn variable(&self, name: &str) -> Option<&OutputVariable> {
        self.variables.get(name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut OutputVariable> {
        self.variables.get_mut(name)
    }

    pub fn axis(&self, name: &str) -> Option<&OutputAxis> {
        self.axes.get(name)
    }

    /// Checks that every variable references one existing axis per
    /// dimension and that axis lengths match the data shape.
    pub fn validate(&self) -> Result<(), OutputError> {
        for variable in self.variables.values() {
            if variable.axes.len() != variable.ndim() {
                return Err(OutputError::Schema(format!(
                    "variable '{}' has {} dimensions but {} axis references",
                    variable.name,
                    variable.ndim(),
                    variable.axes.len()
                )));
            }
            for (dim, axis_name) in variable.axes.iter().enumerate() {
                let axis = self.axes.get(axis_name).ok_or_else(|| {
                    OutputError::Schema(format!(
                        "variable '{}' references unknown axis '{axis_name}'",
                        variable.name
                    ))
                })?;
                if axis.values.len() != variable.shape()[dim] {
                    return Err(OutputError::Schema(format!(
                        "axis '{axis_name}' has {} values but dimension {dim} of '{}' has {}",
                        axis.values.len(),
                        variable.name,
                        variable.shape()[dim]
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OutputSet {
        let mut outputs = OutputSet::new("test");
        outputs.add_axis("time", OutputAxis::new(vec![0.0, 1.0, 2.0], "ps"));
        outputs.add_variable(OutputVariable::from_vec("msd", vec![0.0, 0.1, 0.4], "time", "nm2"));
        outputs
    }

    #[test]
    fn consistent_sets_validate() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn unknown_axis_is_a_schema_error() {
        let mut outputs = sample();
        outputs.add_variable(OutputVariable::from_vec("vacf", vec![1.0; 3], "tau", "nm2/ps2"));
        assert!(matches!(outputs.validate(), Err(OutputError::Schema(_))));
    }

    #[test]
    fn axis_length_must_match_the_shape() {
        let mut outputs = sample();
        outputs.add_variable(OutputVariable::from_vec("short", vec![1.0; 2], "time", ""));
        assert!(matches!(outputs.validate(), Err(OutputError::Schema(_))));
    }

    #[test]
    fn variables_are_kept_in_name_order() {
        let mut outputs = sample();
        outputs.add_variable(OutputVariable::from_vec("a", vec![1.0; 3], "time", ""));
        let names: Vec<_> = outputs.variables.keys().cloned().collect();
        assert_eq!(names, vec!["a".to_string(), "msd".to_string()]);
    }
}
