//! Rewriting solutions and projects that reference NuGet.

use std::path::Path;

use rayon::prelude::*;

use crate::core::errors::ConvertError;
use crate::core::project::{is_project_file, ProjectFile};
use crate::core::solution::SolutionFile;
use crate::util::fs;

/// Load every `.sln` under `root`, rewritten to list `dependencies_file`
/// instead of the `.nuget` solution items.
pub fn rewrite_solutions(
    root: &Path,
    excluded: &[String],
    dependencies_file: &Path,
) -> Result<Vec<SolutionFile>, ConvertError> {
    let paths = fs::find_files(root, excluded, |name| {
        Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sln"))
    })
    .map_err(|e| ConvertError::scan(root, e))?;

    let mut solutions = paths
        .par_iter()
        .map(|path| SolutionFile::load(path))
        .collect::<Result<Vec<_>, _>>()?;

    for solution in &mut solutions {
        let relative = fs::to_windows_separators(&fs::relative_path(
            solution.dir(),
            dependencies_file,
        ));
        let removed = solution.remove_legacy_entries();
        let added = solution.add_dependencies_item(&relative);
        tracing::debug!(
            "{}: legacy entries removed: {}, manifest item added: {}",
            solution.path().display(),
            removed,
            added
        );
    }

    Ok(solutions)
}

/// Load every project under `root` with its NuGet references rewritten.
pub fn rewrite_projects(
    root: &Path,
    excluded: &[String],
) -> Result<Vec<ProjectFile>, ConvertError> {
    let paths = fs::find_files(root, excluded, is_project_file)
        .map_err(|e| ConvertError::scan(root, e))?;

    paths
        .par_iter()
        .map(|path| {
            let mut project = ProjectFile::load(path)?;
            let replaced = project.replace_nuget_packages_file()?;
            let removed = project.remove_nuget_targets_entries()?;
            tracing::debug!(
                "{}: references replaced: {}, targets removed: {}",
                path.display(),
                replaced,
                removed
            );
            Ok(project)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_rewrite_solutions_relative_path() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("build")).unwrap();
        std::fs::write(root.join("build/App.sln"), fixtures::LEGACY_SOLUTION).unwrap();

        let solutions =
            rewrite_solutions(root, &[], &root.join("paket.dependencies")).unwrap();

        assert_eq!(solutions.len(), 1);
        let content = solutions[0].to_string();
        assert!(solutions[0].is_modified());
        assert!(content.contains(r"..\paket.dependencies = ..\paket.dependencies"));
        assert!(!content.contains("NuGet.targets"));
    }

    #[test]
    fn test_rewrite_projects_skips_build_output() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("src/App/obj")).unwrap();
        std::fs::write(root.join("src/App/App.csproj"), fixtures::LEGACY_PROJECT).unwrap();
        std::fs::write(root.join("src/App/obj/Copy.csproj"), fixtures::LEGACY_PROJECT).unwrap();

        let projects = rewrite_projects(root, &[]).unwrap();

        assert_eq!(projects.len(), 1);
        assert!(projects[0].is_modified());
        assert!(projects[0].content().contains("paket.references"));
    }

    #[test]
    fn test_rewrite_projects_reports_malformed_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("Bad.fsproj"), "<Project><ItemGroup></Project>").unwrap();

        let err = rewrite_projects(tmp.path(), &[]).unwrap_err();
        assert!(matches!(err, ConvertError::ProjectParseError(_)));
    }
}
