use super::traits::{OutputFormat, TextFormat};
use super::variable::{OutputSet, OutputVariable};
use super::OutputError;
use std::io::Write;
use std::path::Path;

const PLOT_WIDTH: f64 = 640.0;
const PLOT_HEIGHT: f64 = 360.0;
const MARGIN: f64 = 56.0;

/// Line plots of every 1-D variable, stacked vertically in one document.
/// Variables of other dimensionality are listed in the document description
/// and not drawn.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgFormat;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return None;
    }
    if lo == hi {
        return Some((lo - 0.5, hi + 0.5));
    }
    Some((lo, hi))
}

impl SvgFormat {
    fn plot(
        &self,
        outputs: &OutputSet,
        variable: &OutputVariable,
        offset: f64,
        writer: &mut dyn Write,
    ) -> Result<(), OutputError> {
        let axis_name = &variable.axes[0];
        let axis = outputs.axis(axis_name);
        let points: Vec<(f64, f64)> = variable
            .data
            .iter()
            .enumerate()
            .map(|(i, &y)| {
                let x = axis.and_then(|a| a.values.get(i)).copied().unwrap_or(i as f64);
                (x, y)
            })
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();

        let x_units = axis.map(|a| a.units.as_str()).unwrap_or("");
        writeln!(writer, "<g transform=\"translate(0,{offset:.0})\">")?;
        writeln!(
            writer,
            "<text x=\"{:.0}\" y=\"24\" text-anchor=\"middle\" font-size=\"16\">{} ({})</text>",
            PLOT_WIDTH / 2.0,
            escape(&variable.name),
            escape(&variable.units)
        )?;
        writeln!(
            writer,
            "<rect x=\"{MARGIN:.0}\" y=\"{MARGIN:.0}\" width=\"{:.0}\" height=\"{:.0}\" fill=\"none\" stroke=\"black\"/>",
            PLOT_WIDTH - 2.0 * MARGIN,
            PLOT_HEIGHT - 2.0 * MARGIN
        )?;
        writeln!(
            writer,
            "<text x=\"{:.0}\" y=\"{:.0}\" text-anchor=\"middle\" font-size=\"12\">{} ({})</text>",
            PLOT_WIDTH / 2.0,
            PLOT_HEIGHT - 16.0,
            escape(axis_name),
            escape(x_units)
        )?;

        if let (Some((x0, x1)), Some((y0, y1))) = (
            bounds(points.iter().map(|p| p.0)),
            bounds(points.iter().map(|p| p.1)),
        ) {
            let sx = (PLOT_WIDTH - 2.0 * MARGIN) / (x1 - x0);
            let sy = (PLOT_HEIGHT - 2.0 * MARGIN) / (y1 - y0);
            let coordinates: Vec<String> = points
                .iter()
                .map(|(x, y)| {
                    format!(
                        "{:.3},{:.3}",
                        MARGIN + (x - x0) * sx,
                        PLOT_HEIGHT - MARGIN - (y - y0) * sy
                    )
                })
                .collect();
            writeln!(
                writer,
                "<polyline fill=\"none\" stroke=\"steelblue\" stroke-width=\"1.5\" points=\"{}\"/>",
                coordinates.join(" ")
            )?;
            for (label, value, anchor_y) in [("min", y0, PLOT_HEIGHT - MARGIN), ("max", y1, MARGIN)] {
                writeln!(
                    writer,
                    "<text x=\"{:.0}\" y=\"{anchor_y:.0}\" text-anchor=\"end\" font-size=\"10\" class=\"{label}\">{value:.4e}</text>",
                    MARGIN - 4.0
                )?;
            }
        }
        writeln!(writer, "</g>")?;
        Ok(())
    }
}

impl TextFormat for SvgFormat {
    fn write_to(&self, outputs: &OutputSet, writer: &mut dyn Write) -> Result<(), OutputError> {
        let plotted: Vec<&OutputVariable> =
            outputs.variables.values().filter(|v| v.ndim() == 1).collect();
        let skipped: Vec<&str> = outputs
            .variables
            .values()
            .filter(|v| v.ndim() != 1)
            .map(|v| v.name.as_str())
            .collect();
        let height = PLOT_HEIGHT * plotted.len().max(1) as f64;

        writeln!(
            writer,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{PLOT_WIDTH:.0}\" height=\"{height:.0}\" viewBox=\"0 0 {PLOT_WIDTH:.0} {height:.0}\">"
        )?;
        writeln!(writer, "<title>{}</title>", escape(outputs.header.lines().next().unwrap_or("")))?;
        if !skipped.is_empty() {
            writeln!(writer, "<desc>not plotted: {}</desc>", escape(&skipped.join(", ")))?;
        }
        for (i, variable) in plotted.iter().enumerate() {
            self.plot(outputs, variable, i as f64 * PLOT_HEIGHT, writer)?;
        }
        writeln!(writer, "</svg>")?;
        Ok(())
    }
}

impl OutputFormat for SvgFormat {
    fn name(&self) -> &'static str {
        "svg"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["svg"]
    }

    fn write(&self, path: &Path, outputs: &OutputSet) -> Result<(), OutputError> {
        self.write_to_path(path, outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::variable::OutputAxis;
    use ndarray::{ArrayD, IxDyn};

    fn render(outputs: &OutputSet) -> String {
        let mut buffer = Vec::new();
        SvgFormat.write_to(outputs, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn one_dimensional_variables_become_polylines() {
        let mut outputs = OutputSet::new("msd <test>");
        outputs.add_axis("time", OutputAxis::new(vec![0.0, 1.0, 2.0], "ps"));
        outputs.add_variable(OutputVariable::from_vec("msd", vec![0.0, 1.0, 4.0], "time", "nm2"));
        outputs.add_variable(OutputVariable::new(
            "map",
            ArrayD::zeros(IxDyn(&[3, 3])),
            &["time", "time"],
            "",
        ));
        let text = render(&outputs);
        assert!(text.starts_with("<svg "));
        assert!(text.trim_end().ends_with("</svg>"));
        assert_eq!(text.matches("<polyline").count(), 1);
        assert!(text.contains("<title>msd &lt;test&gt;</title>"));
        assert!(text.contains("<desc>not plotted: map</desc>"));
        assert!(text.contains("points=\"56.000,304.000 "));
    }

    #[test]
    fn non_finite_points_are_skipped() {
        let mut outputs = OutputSet::new("");
        outputs.add_axis("x", OutputAxis::new(vec![0.0, 1.0, 2.0], ""));
        outputs.add_variable(OutputVariable::from_vec("y", vec![0.0, f64::NAN, 1.0], "x", ""));
        let text = render(&outputs);
        let points = text.split("points=\"").nth(1).unwrap();
        let points = &points[..points.find('"').unwrap()];
        assert_eq!(points.split(' ').count(), 2);
    }
}
