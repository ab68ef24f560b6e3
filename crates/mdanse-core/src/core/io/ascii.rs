use super::traits::{OutputFormat, TextFormat};
use super::variable::{DType, OutputSet, OutputVariable};
use super::OutputError;
use ndarray::Axis;
use std::io::Write;
use std::path::Path;

/// Plain text tables, one section per variable.
///
/// 1-D variables are written as two columns (axis, value). 2-D variables are
/// written as a matrix whose first row holds the second axis and whose first
/// column holds the first axis. Higher dimensions are written as a sequence
/// of such matrices, each preceded by its leading indices.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsciiFormat;

fn number(value: f64, dtype: DType) -> String {
    match dtype {
        DType::Int64 if value.is_finite() => format!("{}", value as i64),
        _ => format!("{value:.12e}"),
    }
}

fn axis_values<'a>(outputs: &'a OutputSet, name: &str) -> Option<&'a [f64]> {
    outputs.axis(name).map(|axis| axis.values.as_slice())
}

fn axis_label(outputs: &OutputSet, name: &str) -> String {
    match outputs.axis(name) {
        Some(axis) if !axis.units.is_empty() => format!("{name} ({})", axis.units),
        _ => name.to_string(),
    }
}

impl AsciiFormat {
    fn write_variable(
        &self,
        outputs: &OutputSet,
        variable: &OutputVariable,
        writer: &mut dyn Write,
    ) -> Result<(), OutputError> {
        writeln!(writer, "# variable: {}", variable.name)?;
        writeln!(writer, "# dtype: {}", variable.dtype)?;
        writeln!(writer, "# units: {}", variable.units)?;
        writeln!(writer, "# axes: {}", variable.axes.join(", "))?;
        let shape: Vec<String> = variable.shape().iter().map(|d| d.to_string()).collect();
        writeln!(writer, "# shape: {}", shape.join(" x "))?;
        if !variable.description.is_empty() {
            writeln!(writer, "# description: {}", variable.description)?;
        }

        match variable.ndim() {
            0 => {
                let value = variable.data.iter().next().copied().unwrap_or(f64::NAN);
                writeln!(writer, "{}", number(value, variable.dtype))?;
            }
            1 => {
                let axis = axis_values(outputs, &variable.axes[0]);
                writeln!(
                    writer,
                    "# {}  {} ({})",
                    axis_label(outputs, &variable.axes[0]),
                    variable.name,
                    variable.units
                )?;
                for (i, value) in variable.data.iter().enumerate() {
                    let x = axis.and_then(|a| a.get(i)).copied().unwrap_or(i as f64);
                    writeln!(writer, "{}  {}", number(x, DType::Float64), number(*value, variable.dtype))?;
                }
            }
            ndim => {
                let rows_axis = &variable.axes[ndim - 2];
                let columns_axis = &variable.axes[ndim - 1];
                let rows = axis_values(outputs, rows_axis);
                let columns = axis_values(outputs, columns_axis);
                let leading: usize = variable.shape()[..ndim - 2].iter().product();
                let planes = variable
                    .data
                    .to_shape((
                        leading,
                        variable.shape()[ndim - 2],
                        variable.shape()[ndim - 1],
                    ))
                    .map_err(|e| OutputError::Schema(format!("{}: {e}", variable.name)))?;

                for (p, plane) in planes.axis_iter(Axis(0)).enumerate() {
                    if ndim > 2 {
                        let mut index = Vec::with_capacity(ndim - 2);
                        let mut rest = p;
                        for &extent in variable.shape()[..ndim - 2].iter().rev() {
                            index.push(rest % extent);
                            rest /= extent;
                        }
                        index.reverse();
                        let index: Vec<String> = index.iter().map(|i| i.to_string()).collect();
                        writeln!(writer, "# index: [{}]", index.join(", "))?;
                    }
                    writeln!(
                        writer,
                        "# rows: {}  columns: {}",
                        axis_label(outputs, rows_axis),
                        axis_label(outputs, columns_axis)
                    )?;
                    let header: Vec<String> = (0..plane.ncols())
                        .map(|j| {
                            let x = columns.and_then(|c| c.get(j)).copied().unwrap_or(j as f64);
                            number(x, DType::Float64)
                        })
                        .collect();
                    writeln!(writer, "{:>19}  {}", "#", header.join("  "))?;
                    for (i, row) in plane.axis_iter(Axis(0)).enumerate() {
                        let y = rows.and_then(|r| r.get(i)).copied().unwrap_or(i as f64);
                        let values: Vec<String> =
                            row.iter().map(|v| number(*v, variable.dtype)).collect();
                        writeln!(writer, "{}  {}", number(y, DType::Float64), values.join("  "))?;
                    }
                }
            }
        }
        writeln!(writer)?;
        Ok(())
    }
}

impl TextFormat for AsciiFormat {
    fn write_to(&self, outputs: &OutputSet, writer: &mut dyn Write) -> Result<(), OutputError> {
        for line in outputs.header.lines() {
            writeln!(writer, "# {line}")?;
        }
        writeln!(writer, "#")?;
        for variable in outputs.variables.values() {
            self.write_variable(outputs, variable, writer)?;
        }
        Ok(())
    }
}

impl OutputFormat for AsciiFormat {
    fn name(&self) -> &'static str {
        "ascii"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["dat", "txt"]
    }

    fn write(&self, path: &Path, outputs: &OutputSet) -> Result<(), OutputError> {
        self.write_to_path(path, outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::variable::{OutputAxis, OutputVariable};
    use ndarray::{ArrayD, IxDyn};

    fn render(outputs: &OutputSet) -> String {
        let mut buffer = Vec::new();
        AsciiFormat.write_to(outputs, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    fn sample() -> OutputSet {
        let mut outputs = OutputSet::new("job: test\nframes: 3");
        outputs.add_axis("time", OutputAxis::new(vec![0.0, 0.5], "ps"));
        outputs.add_axis("q", OutputAxis::new(vec![1.0, 2.0, 3.0], "1/nm"));
        outputs.add_variable(OutputVariable::from_vec("msd", vec![0.0, 0.25], "time", "nm2"));
        let data = ArrayD::from_shape_vec(IxDyn(&[3, 2]), vec![1.0, 0.5, 1.0, 0.4, 1.0, 0.3]).unwrap();
        outputs.add_variable(OutputVariable::new("f(q,t)", data, &["q", "time"], "au"));
        outputs
    }

    #[test]
    fn header_lines_are_commented() {
        let text = render(&sample());
        assert!(text.starts_with("# job: test\n# frames: 3\n#\n"));
    }

    #[test]
    fn one_dimensional_variables_are_two_columns() {
        let text = render(&sample());
        assert!(text.contains("# variable: msd\n"));
        assert!(text.contains("# units: nm2\n"));
        assert!(text.contains("5.000000000000e-1  2.500000000000e-1\n"));
    }

    #[test]
    fn two_dimensional_variables_are_matrices() {
        let text = render(&sample());
        assert!(text.contains("# axes: q, time\n"));
        assert!(text.contains("# shape: 3 x 2\n"));
        assert!(text.contains("3.000000000000e0  1.000000000000e0  3.000000000000e-1\n"));
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(render(&sample()), render(&sample()));
    }
}
