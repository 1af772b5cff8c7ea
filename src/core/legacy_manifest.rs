//! `packages.config` reading and discovery.
//!
//! A legacy manifest lists the packages a single project (or, when it lives
//! in the `.nuget` folder, the whole solution) consumes:
//!
//! ```xml
//! <packages>
//!   <package id="Newtonsoft.Json" version="6.0.8" targetFramework="net45" />
//! </packages>
//! ```

use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use rayon::prelude::*;

use crate::core::errors::ConvertError;
use crate::resolver::version::PackageVersion;
use crate::util::{fs, xml};

/// File name of a legacy manifest.
pub const LEGACY_MANIFEST_NAME: &str = "packages.config";

/// Directory that marks solution-level NuGet files.
pub const SOLUTION_MARKER_DIR: &str = ".nuget";

/// Whether a legacy manifest belongs to one project or to the solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestScope {
    ProjectLevel,
    SolutionLevel,
}

/// A package reference read from a legacy manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPackage {
    pub id: String,
    pub version: PackageVersion,
}

/// A parsed `packages.config`.
#[derive(Debug, Clone)]
pub struct LegacyManifest {
    path: PathBuf,
    scope: ManifestScope,
    packages: Vec<LegacyPackage>,
}

impl LegacyManifest {
    /// Read and parse a legacy manifest file.
    pub fn read(path: &Path) -> Result<Self, ConvertError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        Self::parse(path, &content)
    }

    /// Parse legacy manifest content. `path` determines the scope.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConvertError> {
        let packages = parse_packages(content)
            .ok_or_else(|| ConvertError::ManifestParseError(path.to_path_buf()))?;

        Ok(LegacyManifest {
            path: path.to_path_buf(),
            scope: scope_of(path),
            packages,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scope(&self) -> ManifestScope {
        self.scope
    }

    pub fn packages(&self) -> &[LegacyPackage] {
        &self.packages
    }

    /// The directory containing this manifest.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    pub fn is_solution_level(&self) -> bool {
        self.scope == ManifestScope::SolutionLevel
    }
}

fn scope_of(path: &Path) -> ManifestScope {
    let in_marker_dir = path
        .parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().eq_ignore_ascii_case(SOLUTION_MARKER_DIR))
        .unwrap_or(false);

    if in_marker_dir {
        ManifestScope::SolutionLevel
    } else {
        ManifestScope::ProjectLevel
    }
}

/// Parse the `<package>` entries. Any structural problem yields `None`.
fn parse_packages(content: &str) -> Option<Vec<LegacyPackage>> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut packages = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => {
                if depth == 0 {
                    if seen_root || e.local_name().as_ref() != b"packages" {
                        return None;
                    }
                    seen_root = true;
                } else if depth == 1 && e.local_name().as_ref() == b"package" {
                    packages.push(read_package(&e)?);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    // `<packages/>` is a valid, empty manifest.
                    if seen_root || e.local_name().as_ref() != b"packages" {
                        return None;
                    }
                    seen_root = true;
                } else if depth == 1 && e.local_name().as_ref() == b"package" {
                    packages.push(read_package(&e)?);
                }
            }
            Event::End(_) => {
                depth = depth.checked_sub(1)?;
            }
            Event::Text(t) => {
                if depth == 0 && !t.unescape().ok()?.trim().is_empty() {
                    return None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 || !seen_root {
        return None;
    }
    Some(packages)
}

fn read_package(e: &quick_xml::events::BytesStart<'_>) -> Option<LegacyPackage> {
    let id = xml::attr(e, "id").ok()??;
    let version = xml::attr(e, "version").ok()??;
    if id.trim().is_empty() {
        return None;
    }
    Some(LegacyPackage {
        id: id.trim().to_string(),
        version: version.parse().ok()?,
    })
}

/// Find and parse every legacy manifest under `root`.
///
/// Files are parsed in parallel and returned sorted by path. Finding no
/// manifests is not an error.
pub fn find_legacy_manifests(
    root: &Path,
    excluded: &[String],
) -> Result<Vec<LegacyManifest>, ConvertError> {
    let paths = fs::find_files(root, excluded, |name| {
        name.eq_ignore_ascii_case(LEGACY_MANIFEST_NAME)
    })
    .map_err(|e| ConvertError::scan(root, e))?;

    let mut manifests = paths
        .par_iter()
        .map(|path| LegacyManifest::read(path))
        .collect::<Result<Vec<_>, _>>()?;

    manifests.sort_by(|a, b| a.path.cmp(&b.path));
    for manifest in &manifests {
        tracing::debug!(
            "found {} ({} packages, {:?})",
            manifest.path.display(),
            manifest.packages.len(),
            manifest.scope
        );
    }
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<packages>
  <package id="Newtonsoft.Json" version="6.0.8" targetFramework="net45" />
  <package id="log4net" version="2.0.3" targetFramework="net45" />
</packages>
"#;

    #[test]
    fn test_parse_project_manifest() {
        let manifest =
            LegacyManifest::parse(Path::new("src/App/packages.config"), SAMPLE).unwrap();

        assert_eq!(manifest.scope(), ManifestScope::ProjectLevel);
        let ids: Vec<_> = manifest.packages().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["Newtonsoft.Json", "log4net"]);
        assert_eq!(manifest.packages()[0].version.to_string(), "6.0.8");
    }

    #[test]
    fn test_marker_dir_is_solution_level() {
        let manifest = LegacyManifest::parse(Path::new("repo/.NuGet/packages.config"), SAMPLE)
            .unwrap();
        assert_eq!(manifest.scope(), ManifestScope::SolutionLevel);
    }

    #[test]
    fn test_empty_manifest() {
        let manifest =
            LegacyManifest::parse(Path::new("packages.config"), "<packages />").unwrap();
        assert!(manifest.packages().is_empty());
    }

    #[test]
    fn test_missing_version_rejects_file() {
        let content = r#"<packages>
  <package id="A" version="1.0.0" />
  <package id="B" />
</packages>"#;
        let err = LegacyManifest::parse(Path::new("x/packages.config"), content).unwrap_err();
        assert!(matches!(err, ConvertError::ManifestParseError(p) if p == Path::new("x/packages.config")));
    }

    #[test]
    fn test_bad_version_rejects_file() {
        let content = r#"<packages><package id="A" version="one" /></packages>"#;
        assert!(LegacyManifest::parse(Path::new("packages.config"), content).is_err());
    }

    #[test]
    fn test_malformed_xml_rejects_file() {
        let content = r#"<packages><package id="A" version="1.0.0"></packages>"#;
        assert!(LegacyManifest::parse(Path::new("packages.config"), content).is_err());

        let unclosed = r#"<packages><package id="A" version="1.0.0" />"#;
        assert!(LegacyManifest::parse(Path::new("packages.config"), unclosed).is_err());
    }

    #[test]
    fn test_find_legacy_manifests() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".nuget")).unwrap();
        std::fs::create_dir_all(tmp.path().join("src/B")).unwrap();
        std::fs::create_dir_all(tmp.path().join("src/A")).unwrap();
        std::fs::write(tmp.path().join(".nuget/packages.config"), SAMPLE).unwrap();
        std::fs::write(tmp.path().join("src/B/packages.config"), SAMPLE).unwrap();
        std::fs::write(tmp.path().join("src/A/packages.config"), SAMPLE).unwrap();

        let manifests = find_legacy_manifests(tmp.path(), &[]).unwrap();
        let scopes: Vec<_> = manifests.iter().map(|m| m.scope()).collect();
        assert_eq!(
            scopes,
            vec![
                ManifestScope::SolutionLevel,
                ManifestScope::ProjectLevel,
                ManifestScope::ProjectLevel
            ]
        );
        assert!(manifests[1].path().ends_with("src/A/packages.config"));
    }

    #[test]
    fn test_find_legacy_manifests_none() {
        let tmp = TempDir::new().unwrap();
        assert!(find_legacy_manifests(tmp.path(), &[]).unwrap().is_empty());
    }
}
