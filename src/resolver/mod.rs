//! Conflict and version resolution across legacy manifests.
//!
//! Every project may pin its own version of a package. The consolidated
//! manifest can only hold one, so references are grouped by package name
//! (case-insensitively) and the highest version wins. Disagreements are
//! reported, never fatal.

pub mod version;

use std::collections::{BTreeMap, BTreeSet};

use crate::core::legacy_manifest::LegacyManifest;
use crate::util::diagnostic::Diagnostic;

pub use version::PackageVersion;

/// A package with the version chosen for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: PackageVersion,
}

/// Several manifests disagree on a package's version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    pub name: String,
    /// Distinct versions, ascending.
    pub versions: Vec<PackageVersion>,
}

impl VersionConflict {
    /// The version the resolver picked.
    pub fn chosen(&self) -> &PackageVersion {
        // Conflicts always carry at least two versions.
        &self.versions[self.versions.len() - 1]
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let versions = self
            .versions
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Diagnostic::warning(format!(
            "package `{}` is referenced with different versions",
            self.name
        ))
        .with_context(format!("versions found: {}", versions))
        .with_context(format!("using {}", self.chosen()))
    }
}

/// Outcome of resolving all legacy manifests.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// One entry per package to add, sorted case-insensitively by name.
    pub packages: Vec<ResolvedPackage>,
    /// Packages referenced with more than one version.
    pub conflicts: Vec<VersionConflict>,
    /// Packages skipped because the target manifest already declares them.
    pub already_declared: Vec<String>,
}

struct Group {
    name: String,
    versions: BTreeSet<PackageVersion>,
}

/// Resolve one version per package across `manifests`.
///
/// `is_declared` tells whether a pre-existing target manifest already
/// declares a package; such packages are listed in
/// [`Resolution::already_declared`] and not added.
pub fn resolve_packages<F>(manifests: &[LegacyManifest], is_declared: F) -> Resolution
where
    F: Fn(&str) -> bool,
{
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();

    for manifest in manifests {
        for package in manifest.packages() {
            groups
                .entry(package.id.to_lowercase())
                .or_insert_with(|| Group {
                    name: package.id.clone(),
                    versions: BTreeSet::new(),
                })
                .versions
                .insert(package.version.clone());
        }
    }

    let mut resolution = Resolution::default();

    for group in groups.into_values() {
        let versions: Vec<PackageVersion> = group.versions.into_iter().collect();
        let Some(chosen) = versions.last().cloned() else {
            continue;
        };

        if versions.len() > 1 {
            let conflict = VersionConflict {
                name: group.name.clone(),
                versions,
            };
            tracing::warn!(
                "`{}` has conflicting versions, using {}",
                conflict.name,
                conflict.chosen()
            );
            resolution.conflicts.push(conflict);
        }

        if is_declared(&group.name) {
            resolution.already_declared.push(group.name);
        } else {
            resolution.packages.push(ResolvedPackage {
                name: group.name,
                version: chosen,
            });
        }
    }

    resolution
}
