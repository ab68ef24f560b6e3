//! Output variables and the writers that persist them.
//!
//! Jobs produce an [`OutputSet`]; [`atomic::commit_outputs`] hands it to
//! every requested [`OutputFormat`] and moves the results into place only
//! when all of them succeeded.

pub mod ascii;
pub mod atomic;
#[cfg(feature = "hdf5")]
pub mod h5;
pub mod svg;
pub mod traits;
pub mod variable;

pub use traits::OutputFormat;
pub use variable::{DType, OutputAxis, OutputSet, OutputVariable};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Stream(#[from] io::Error),

    #[error("Invalid output schema: {0}")]
    Schema(String),

    #[error("The '{format}' writer failed: {message}")]
    Format { format: String, message: String },
}

impl OutputError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Formats compiled into this build.
pub fn builtin() -> Vec<Arc<dyn OutputFormat>> {
    vec![
        Arc::new(ascii::AsciiFormat),
        Arc::new(svg::SvgFormat),
        #[cfg(feature = "hdf5")]
        Arc::new(h5::Hdf5Format),
    ]
}

/// Formats known by name but unavailable in this build, with the reason.
pub fn unavailable() -> Vec<(&'static str, &'static str)> {
    let mut missing = Vec::new();
    if cfg!(not(feature = "hdf5")) {
        missing.push(("hdf5", "built without the `hdf5` feature"));
    }
    missing
}
