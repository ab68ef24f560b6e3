use super::traits::OutputFormat;
use super::variable::OutputSet;
use super::OutputError;
use hdf5::types::VarLenUnicode;
use hdf5::{File, Group, Location};
use std::path::Path;

/// Hierarchical output: a `header` attribute on the root group, an `axes`
/// group with one dataset per axis and one dataset per variable at the path
/// given by its name (`/` separates groups).
///
/// Datasets are written without creation and modification times, so equal
/// outputs give equal files.
#[derive(Debug, Default, Clone, Copy)]
pub struct Hdf5Format;

fn failure(error: hdf5::Error) -> OutputError {
    OutputError::Format {
        format: "hdf5".to_string(),
        message: error.to_string(),
    }
}

fn unicode(text: &str) -> Result<VarLenUnicode, OutputError> {
    text.parse::<VarLenUnicode>().map_err(|e| OutputError::Format {
        format: "hdf5".to_string(),
        message: format!("cannot store '{text}': {e}"),
    })
}

fn string_attr(location: &Location, name: &str, value: &str) -> Result<(), OutputError> {
    let value = unicode(value)?;
    location
        .new_attr::<VarLenUnicode>()
        .create(name)
        .and_then(|attr| attr.write_scalar(&value))
        .map_err(failure)
}

fn group_for<'a>(root: &Group, path: &'a str) -> Result<(Group, &'a str), OutputError> {
    let mut group = root.clone();
    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let leaf = parts.pop().unwrap_or(path);
    for part in parts {
        group = match group.group(part) {
            Ok(existing) => existing,
            Err(_) => group.create_group(part).map_err(failure)?,
        };
    }
    Ok((group, leaf))
}

impl OutputFormat for Hdf5Format {
    fn name(&self) -> &'static str {
        "hdf5"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["h5", "hdf5"]
    }

    fn write(&self, path: &Path, outputs: &OutputSet) -> Result<(), OutputError> {
        let file = File::create(path).map_err(failure)?;
        string_attr(&file, "header", &outputs.header)?;

        let axes = file.create_group("axes").map_err(failure)?;
        for (name, axis) in &outputs.axes {
            let dataset = axes
                .new_dataset_builder()
                .obj_track_times(false)
                .with_data(axis.values.as_slice())
                .create(name.as_str())
                .map_err(failure)?;
            string_attr(&dataset, "units", &axis.units)?;
        }

        for variable in outputs.variables.values() {
            let (group, leaf) = group_for(&file, &variable.name)?;
            let dataset = group
                .new_dataset_builder()
                .obj_track_times(false)
                .with_data(&variable.data)
                .create(leaf)
                .map_err(failure)?;
            string_attr(&dataset, "units", &variable.units)?;
            string_attr(&dataset, "description", &variable.description)?;
            string_attr(&dataset, "dtype", &variable.dtype.to_string())?;
            let axis_names = variable
                .axes
                .iter()
                .map(|a| unicode(a))
                .collect::<Result<Vec<_>, _>>()?;
            dataset
                .new_attr::<VarLenUnicode>()
                .shape(axis_names.len())
                .create("axis")
                .and_then(|attr| attr.write_raw(&axis_names))
                .map_err(failure)?;
        }
        file.flush().map_err(failure)?;
        Ok(())
    }
}
