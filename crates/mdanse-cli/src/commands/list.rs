use crate::cli::ListArgs;
use crate::error::{CliError, Result};
use mdanse::engine::registry::{Category, Registry};
use std::fmt::Write;

fn render(registry: &Registry, category: Option<Category>) -> String {
    let categories: Vec<Category> = match category {
        Some(category) => vec![category],
        None => Category::ALL.to_vec(),
    };
    let mut out = String::new();
    for category in categories {
        let _ = writeln!(out, "{category}:");
        for name in registry.names(category) {
            let _ = writeln!(out, "  {name}");
        }
    }
    let warnings: Vec<_> = registry
        .warnings()
        .iter()
        .filter(|w| category.is_none_or(|c| c == w.category))
        .collect();
    if !warnings.is_empty() {
        let _ = writeln!(out, "warnings:");
        for warning in warnings {
            let _ = writeln!(out, "  {warning}");
        }
    }
    out
}

pub fn run(args: ListArgs, registry: &Registry) -> Result<()> {
    let category = args
        .category
        .as_deref()
        .map(str::parse::<Category>)
        .transpose()
        .map_err(CliError::Argument)?;
    print!("{}", render(registry, category));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_are_listed_in_name_order() {
        let registry = Registry::with_defaults().unwrap();
        let text = render(&registry, Some(Category::Job));
        assert!(text.starts_with("job:\n"));
        let msd = text.find("mean_square_displacement").unwrap();
        let vacf = text.find("velocity_autocorrelation_function").unwrap();
        assert!(msd < vacf);
        assert!(!text.contains("selector:"));
    }

    #[test]
    fn unknown_categories_are_argument_errors() {
        let registry = Registry::with_defaults().unwrap();
        let args = ListArgs {
            category: Some("widgets".into()),
        };
        assert!(matches!(run(args, &registry), Err(CliError::Argument(_))));
    }
}
