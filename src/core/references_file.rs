//! Per-project `paket.references` files.

use std::fmt;
use std::path::{Path, PathBuf};

/// File name of a project's reference file.
pub const REFERENCES_FILE_NAME: &str = "paket.references";

/// The packages one project uses, one name per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencesFile {
    path: PathBuf,
    packages: Vec<String>,
}

impl ReferencesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ReferencesFile {
            path: path.into(),
            packages: Vec::new(),
        }
    }

    /// The reference file that belongs in `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(REFERENCES_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Add a package reference, ignoring duplicates (case-insensitive).
    pub fn add_reference(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.packages.iter().any(|p| p.eq_ignore_ascii_case(&name)) {
            self.packages.push(name);
        }
    }
}

impl fmt::Display for ReferencesFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for package in &self.packages {
            writeln!(f, "{}", package)?;
        }
        Ok(())
    }
}
