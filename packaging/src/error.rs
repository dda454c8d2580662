use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PackagingError>;

/// Packaging failures. Each one aborts the deploy; nothing is retried.
#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("Function source directory not found: {0}")]
    MissingSource(PathBuf),

    #[error("Requirements manifest not found: {0}")]
    MissingManifest(PathBuf),

    #[error("Bundle directory {output} lies inside the function source {source_dir}")]
    NestedOutput { output: PathBuf, source_dir: PathBuf },

    #[error("Bundle directory {output} contains the function source {source_dir}")]
    OutputContainsSource { output: PathBuf, source_dir: PathBuf },

    #[error("Failed to start installer '{program}': {error}")]
    Spawn {
        program: String,
        #[source]
        error: std::io::Error,
    },

    #[error("Installer exited with {status}: {stderr}")]
    InstallerFailed { status: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
