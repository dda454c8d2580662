//! Packaging of compute functions.
//!
//! A bundle is one directory holding the function's installed dependencies
//! plus a copy of its source. Dependencies are installed by an external
//! process (`python -m pip install` by default); any failure there aborts the
//! deploy.

pub mod bundle;
pub mod error;
pub mod installer;

pub use bundle::{digest_dir, Bundle, Bundler};
pub use error::{PackagingError, Result};
pub use installer::Installer;
