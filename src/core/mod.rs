//! Core data structures for nuconvert.
//!
//! This module contains the files a conversion reads and writes:
//! - Legacy `packages.config` manifests
//! - The consolidated `paket.dependencies` and per-project `paket.references`
//! - Solution and project files
//! - Conversion errors

pub mod dependencies_file;
pub mod errors;
pub mod legacy_manifest;
pub mod project;
pub mod references_file;
pub mod solution;

pub use dependencies_file::{DependenciesFile, DEPENDENCIES_FILE_NAME};
pub use errors::{ConvertError, ConvertFailure};
pub use legacy_manifest::{LegacyManifest, LegacyPackage, ManifestScope};
pub use project::ProjectFile;
pub use references_file::{ReferencesFile, REFERENCES_FILE_NAME};
pub use solution::SolutionFile;
