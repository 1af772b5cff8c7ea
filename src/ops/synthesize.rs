//! Building the target manifest and reference files in memory.

use std::path::{Path, PathBuf};

use crate::core::dependencies_file::{DependenciesFile, ManifestSource, PackageRequirement};
use crate::core::errors::ConvertError;
use crate::core::legacy_manifest::LegacyManifest;
use crate::core::references_file::ReferencesFile;
use crate::resolver::{resolve_packages, Resolution};
use crate::sources::credentials::{migrate_credentials, CredentialsMigrationMode, Prompt};
use crate::sources::nuget_config::SourceConfig;
use crate::util::diagnostic::Diagnostic;

/// Package added when the solution carried its own `NuGet.exe`.
pub const BOOTSTRAP_PACKAGE: &str = "NuGet.CommandLine";

/// Result of synthesizing the target manifest.
#[derive(Debug, Clone)]
pub struct ManifestSynthesis {
    pub file: DependenciesFile,
    /// Whether `file` was loaded from disk rather than created.
    pub existed: bool,
    pub resolution: Resolution,
}

impl ManifestSynthesis {
    /// Warnings for conflicts and skipped packages.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = self
            .resolution
            .conflicts
            .iter()
            .map(|c| c.to_diagnostic())
            .collect();

        for name in &self.resolution.already_declared {
            diagnostics.push(
                Diagnostic::warning(format!(
                    "package `{}` is already declared in {}",
                    name,
                    self.file.path().display()
                ))
                .with_context("the existing declaration was kept"),
            );
        }

        diagnostics
    }
}

/// Turn the merged source configuration into manifest sources.
///
/// Credentials are routed through `mode`; `prompt` is only consulted in
/// selective mode.
pub fn migrate_sources(
    config: &SourceConfig,
    mode: CredentialsMigrationMode,
    manifest_path: &Path,
    prompt: &dyn Prompt,
) -> Result<Vec<ManifestSource>, ConvertError> {
    config
        .sources
        .iter()
        .map(|source| {
            let auth = source
                .auth
                .as_ref()
                .map(|auth| migrate_credentials(mode, &source.url, auth, manifest_path, prompt))
                .transpose()?;
            Ok(ManifestSource::new(source.url.clone(), auth))
        })
        .collect()
}

/// Build the target manifest at `dest`.
///
/// An existing manifest is extended in place; its own sources are left
/// alone. Otherwise a new one is created from the migrated sources.
pub fn synthesize_manifest(
    dest: &Path,
    manifests: &[LegacyManifest],
    config: &SourceConfig,
    mode: CredentialsMigrationMode,
    has_nuget_exe: bool,
    prompt: &dyn Prompt,
) -> Result<ManifestSynthesis, ConvertError> {
    let existing = if dest.is_file() {
        tracing::debug!("extending existing {}", dest.display());
        Some(DependenciesFile::load(dest)?)
    } else {
        None
    };

    let resolution = match &existing {
        Some(file) => resolve_packages(manifests, |name| file.has_package(name)),
        None => resolve_packages(manifests, |_| false),
    };

    let requirements = resolution
        .packages
        .iter()
        .map(|p| PackageRequirement::exact(p.name.clone(), p.version.clone(), dest));

    let existed = existing.is_some();
    let mut file = match existing {
        Some(mut file) => {
            for requirement in requirements {
                file.add_requirement(requirement);
            }
            file
        }
        None => {
            let sources = migrate_sources(config, mode, dest, prompt)?;
            DependenciesFile::new(dest, sources, requirements.collect())
        }
    };

    if has_nuget_exe && file.add_requirement(PackageRequirement::any(BOOTSTRAP_PACKAGE, dest)) {
        tracing::debug!("added {}", BOOTSTRAP_PACKAGE);
    }

    Ok(ManifestSynthesis {
        file,
        existed,
        resolution,
    })
}

/// One reference file per project-level manifest, in manifest order.
pub fn synthesize_references(manifests: &[LegacyManifest]) -> Vec<ReferencesFile> {
    manifests
        .iter()
        .filter(|m| !m.is_solution_level())
        .map(|manifest| {
            let mut references = ReferencesFile::in_dir(manifest.dir());
            for package in manifest.packages() {
                references.add_reference(package.id.clone());
            }
            references
        })
        .collect()
}

/// Paths of the reference files `manifests` would produce.
pub fn reference_paths(manifests: &[LegacyManifest]) -> Vec<PathBuf> {
    synthesize_references(manifests)
        .into_iter()
        .map(|r| r.path().to_path_buf())
        .collect()
}
