use super::traits::OutputFormat;
use super::{OutputError, OutputSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

/// Final path of `basename` written by `format`: the format's default
/// extension is appended unless the basename already carries one of its
/// extensions.
pub fn target_path(basename: &Path, format: &dyn OutputFormat) -> PathBuf {
    let has_extension = basename
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| format.extensions().contains(&e));
    if has_extension {
        basename.to_path_buf()
    } else {
        let mut name = basename.as_os_str().to_owned();
        name.push(".");
        name.push(format.default_extension());
        PathBuf::from(name)
    }
}

fn staging_file(dir: &Path, extension: &str) -> Result<NamedTempFile, OutputError> {
    Builder::new()
        .prefix(".mdanse-")
        .suffix(&format!(".{extension}"))
        .tempfile_in(dir)
        .map_err(|e| OutputError::io(dir, e))
}

/// Moves a staged file to `target`. A rename across file systems falls back
/// to copying into a second staging file next to the target.
fn persist(staged: NamedTempFile, target: &Path) -> Result<(), OutputError> {
    match staged.persist(target) {
        Ok(_) => Ok(()),
        Err(error) => {
            debug!(target = %target.display(), cause = %error.error, "Rename failed, copying instead");
            let staged = error.file;
            let dir = target.parent().unwrap_or(Path::new("."));
            let mut local = staging_file(dir, "part")?;
            let mut source = fs::File::open(staged.path()).map_err(|e| OutputError::io(staged.path(), e))?;
            io::copy(&mut source, local.as_file_mut()).map_err(|e| OutputError::io(local.path(), e))?;
            local
                .persist(target)
                .map(|_| ())
                .map_err(|e| OutputError::io(target, e.error))
        }
    }
}

/// Writes `outputs` in every format, all or nothing.
///
/// Every format first writes to a temporary file in `temp_dir` (or next to
/// the target). Only when all of them succeeded are the files renamed to
/// their final names. If any step fails, staged files are deleted and
/// targets committed so far are removed, so no final output name is left
/// behind.
pub fn commit_outputs(
    basename: &Path,
    formats: &[Arc<dyn OutputFormat>],
    outputs: &OutputSet,
    temp_dir: Option<&Path>,
) -> Result<Vec<PathBuf>, OutputError> {
    outputs.validate()?;

    let target_dir = match basename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&target_dir).map_err(|e| OutputError::io(&target_dir, e))?;
    let staging_dir = temp_dir.unwrap_or(&target_dir);

    let mut staged = Vec::with_capacity(formats.len());
    for format in formats {
        let file = staging_file(staging_dir, format.default_extension())?;
        debug!(format = format.name(), staged = %file.path().display(), "Writing output");
        format.write(file.path(), outputs)?;
        staged.push((file, target_path(basename, format.as_ref())));
    }

    let mut committed: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (file, target) in staged {
        if let Err(error) = persist(file, &target) {
            for path in &committed {
                if let Err(cleanup) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %cleanup, "Could not remove partial output");
                }
            }
            return Err(error);
        }
        committed.push(target);
    }
    Ok(committed)
}
