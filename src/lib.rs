//! nuconvert - Migrate NuGet `packages.config` repositories to Paket
//!
//! This crate provides the conversion pipeline: reading the legacy
//! manifests and `NuGet.Config` hierarchy, resolving one version per
//! package, and producing `paket.dependencies`, `paket.references` and
//! rewritten solution and project files.

pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Test utilities and mocks for nuconvert unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides scripted prompts, decryptors, credential
/// stores and repository fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{ConvertError, ConvertFailure, DependenciesFile, LegacyManifest};
pub use ops::{apply, convert, ConversionState, ConvertOptions};
