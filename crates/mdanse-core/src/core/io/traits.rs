use super::{OutputError, OutputSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A registered output format.
///
/// Implementations must be deterministic: identical output sets produce
/// identical bytes. The path handed to [`write`](OutputFormat::write) is a
/// temporary file; callers move it into place once every format succeeded.
pub trait OutputFormat: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extensions, without the dot. The first one is used for new files.
    fn extensions(&self) -> &'static [&'static str];

    fn write(&self, path: &Path, outputs: &OutputSet) -> Result<(), OutputError>;

    fn default_extension(&self) -> &'static str {
        self.extensions().first().copied().unwrap_or("out")
    }
}

/// Formats that serialize to a byte stream.
pub trait TextFormat {
    fn write_to(&self, outputs: &OutputSet, writer: &mut dyn Write) -> Result<(), OutputError>;

    fn write_to_path(&self, path: &Path, outputs: &OutputSet) -> Result<(), OutputError> {
        let file = File::create(path).map_err(|e| OutputError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(outputs, &mut writer)?;
        writer.flush().map_err(|e| OutputError::io(path, e))
    }
}
