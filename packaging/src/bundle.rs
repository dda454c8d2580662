//! Builds the deployable directory of a compute function.

use crate::error::{PackagingError, Result};
use crate::installer::Installer;
use resources::FunctionDefinition;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A finished bundle on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub function: String,
    pub directory: PathBuf,
    /// SHA-256 over sorted relative paths and file contents, hex encoded.
    pub digest: String,
    pub files: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Bundler {
    installer: Option<Installer>,
}

impl Bundler {
    /// Bundles with `python -m pip install`, as configured per function.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundles with a different installer program.
    pub fn with_installer(installer: Installer) -> Self {
        Self {
            installer: Some(installer),
        }
    }

    /// Installs the function's dependencies into `out_dir` and copies its
    /// source alongside. `out_dir` is emptied first, so running this twice
    /// gives the same result.
    pub fn bundle(&self, function: &FunctionDefinition, out_dir: &Path) -> Result<Bundle> {
        let source = &function.source;
        if !source.is_dir() {
            return Err(PackagingError::MissingSource(source.clone()));
        }
        let manifest = function.requirements_path();
        if function.runtime.is_python() && !manifest.is_file() {
            return Err(PackagingError::MissingManifest(manifest));
        }
        // The output directory is wiped below, so it must not overlap the source.
        let (output, source_dir) = (resolve(out_dir), resolve(source));
        if output.starts_with(&source_dir) {
            return Err(PackagingError::NestedOutput {
                output: out_dir.to_path_buf(),
                source_dir: source.clone(),
            });
        }
        if source_dir.starts_with(&output) {
            return Err(PackagingError::OutputContainsSource {
                output: out_dir.to_path_buf(),
                source_dir: source.clone(),
            });
        }

        if out_dir.exists() {
            debug!("Clearing previous bundle at {:?}", out_dir);
            fs::remove_dir_all(out_dir)?;
        }
        fs::create_dir_all(out_dir)?;

        if function.runtime.is_python() {
            let installer = self
                .installer
                .clone()
                .unwrap_or_else(|| Installer::pip(&function.bundling));
            installer.install(&manifest, out_dir, &function.bundling)?;
        } else {
            debug!(
                "Runtime {} has no dependency installer; copying sources only",
                function.runtime
            );
        }

        copy_dir(source, out_dir)?;
        let (digest, files) = digest_dir(out_dir)?;

        info!(
            "Bundled function '{}' into {:?} ({} files, {})",
            function.name, out_dir, files, digest
        );
        Ok(Bundle {
            function: function.name.clone(),
            directory: out_dir.to_path_buf(),
            digest,
            files,
        })
    }
}

/// Canonical form of a path that may not exist yet.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => resolve(parent).join(name),
        _ => path.to_path_buf(),
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&target)?;
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<(String, PathBuf)>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, files)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((relative, path));
        }
    }
    Ok(())
}

/// Digest of a directory tree. Independent of traversal order and of the
/// directory's own location.
pub fn digest_dir(dir: &Path) -> Result<(String, usize)> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (relative, path) in &files {
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(fs::read(path)?);
        hasher.update([0u8]);
    }
    Ok((hex::encode(hasher.finalize()), files.len()))
}
