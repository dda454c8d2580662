//! The external dependency installer.

use crate::error::{PackagingError, Result};
use resources::BundlingOptions;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// A package installer invoked as `<program> <base_args...> -r <manifest>
/// -t <out> --platform <platform> [--only-binary=:all:]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installer {
    program: String,
    base_args: Vec<String>,
}

impl Installer {
    /// `python -m pip install`, using the interpreter named in `bundling`.
    pub fn pip(bundling: &BundlingOptions) -> Self {
        Self {
            program: bundling.python.clone(),
            base_args: vec!["-m".into(), "pip".into(), "install".into()],
        }
    }

    pub fn custom<I, S>(program: impl Into<String>, base_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            base_args: base_args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self, manifest: &Path, out_dir: &Path, bundling: &BundlingOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.base_args.iter().map(OsString::from).collect();
        args.push("-r".into());
        args.push(manifest.as_os_str().to_owned());
        args.push("-t".into());
        args.push(out_dir.as_os_str().to_owned());
        args.push("--platform".into());
        args.push(bundling.platform.clone().into());
        if bundling.only_binary {
            args.push("--only-binary=:all:".into());
        }
        args
    }

    /// Runs the installer to completion. Blocks; there is no timeout.
    pub fn install(&self, manifest: &Path, out_dir: &Path, bundling: &BundlingOptions) -> Result<()> {
        let args = self.args(manifest, out_dir, bundling);
        debug!("Running {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|error| PackagingError::Spawn {
                program: self.program.clone(),
                error,
            })?;

        if !output.status.success() {
            return Err(PackagingError::InstallerFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        info!("Installed dependencies from {:?} into {:?}", manifest, out_dir);
        Ok(())
    }
}
