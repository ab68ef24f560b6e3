use crate::cli::DescribeArgs;
use crate::error::Result;
use mdanse::engine::job::JobDefinition;
use mdanse::engine::registry::Registry;
use std::fmt::Write;

fn render(job: &dyn JobDefinition) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({}, {})", job.label(), job.name(), job.category());
    for slot in job.settings() {
        let _ = write!(out, "  {:<24} {:<22}", slot.name, slot.kind.name());
        match &slot.default {
            Some(default) => {
                let _ = write!(out, " default = {default}");
            }
            None => out.push_str(" required"),
        }
        if !slot.dependencies.is_empty() {
            let _ = write!(out, " (after {})", slot.dependencies.join(", "));
        }
        if !slot.label.is_empty() {
            let _ = write!(out, "  # {}", slot.label);
        }
        out.push('\n');
    }
    out
}

pub fn run(args: DescribeArgs, registry: &Registry) -> Result<()> {
    let job = registry.job(&args.job)?;
    print!("{}", render(job.as_ref()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_listed_with_defaults() {
        let registry = Registry::with_defaults().unwrap();
        let job = registry.job("mean_square_displacement").unwrap();
        let text = render(job.as_ref());
        assert!(text.starts_with("Mean Square Displacement (mean_square_displacement, Dynamics)"));
        let trajectory = text.lines().find(|l| l.trim_start().starts_with("trajectory")).unwrap();
        assert!(trajectory.contains("required"));
        let frames = text.lines().find(|l| l.trim_start().starts_with("frames")).unwrap();
        assert!(frames.contains("default = \"all\""));
        assert!(frames.contains("(after trajectory)"));
        assert!(text.contains("output_files"));
    }
}
