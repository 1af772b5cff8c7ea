//! Implementation of `nuconvert convert`.
//!
//! The conversion is a chain of stages over a [`ConversionState`]:
//!
//! ```text
//! init -> read-legacy-manifests -> collect-source-configs
//!      -> guard-not-already-converted -> synthesize-target-manifest
//!      -> synthesize-reference-files -> rewrite-solutions -> rewrite-projects
//! ```
//!
//! Each stage either hands the state on or fails, and the first failure
//! ends the chain. Nothing here writes to disk; [`crate::ops::apply`]
//! persists a finished state.

use std::path::{Path, PathBuf};

use crate::core::dependencies_file::{DependenciesFile, DEPENDENCIES_FILE_NAME};
use crate::core::errors::{ConvertError, ConvertFailure};
use crate::core::legacy_manifest::{find_legacy_manifests, LegacyManifest};
use crate::core::project::ProjectFile;
use crate::core::references_file::ReferencesFile;
use crate::core::solution::SolutionFile;
use crate::ops::{rewrite, synthesize};
use crate::sources::credentials::{CredentialDecryptor, CredentialsMigrationMode, Prompt};
use crate::sources::nuget_config::{read_source_config, SourceConfig};
use crate::util::diagnostic::Diagnostic;
use crate::util::fs;

/// Legacy helper executable shipped next to solution-level manifests.
pub const NUGET_EXE_NAME: &str = "NuGet.exe";

/// Legacy MSBuild restore targets.
pub const NUGET_TARGETS_NAME: &str = "NuGet.targets";

/// Options for a conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Repository root to convert.
    pub root: PathBuf,
    /// Target manifest, relative to `root` unless absolute.
    pub dependencies_file: PathBuf,
    /// Convert even if target files already exist.
    pub force: bool,
    pub credentials: CredentialsMigrationMode,
    /// User-level `NuGet.Config` to include, if any.
    pub user_config: Option<PathBuf>,
    /// Extra directory names to skip while scanning.
    pub excluded: Vec<String>,
}

impl ConvertOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ConvertOptions {
            root: root.into(),
            dependencies_file: PathBuf::from(DEPENDENCIES_FILE_NAME),
            force: false,
            credentials: CredentialsMigrationMode::default(),
            user_config: None,
            excluded: Vec::new(),
        }
    }

    /// Absolute location of the target manifest.
    pub fn dependencies_path(&self) -> PathBuf {
        self.root.join(&self.dependencies_file)
    }
}

/// What was found of the legacy package manager.
#[derive(Debug, Clone, Default)]
pub struct LegacyEnvironment {
    pub manifests: Vec<LegacyManifest>,
    /// Configuration files that were merged, innermost first.
    pub config_files: Vec<PathBuf>,
    pub source_config: SourceConfig,
    pub nuget_exe: Vec<PathBuf>,
    pub nuget_targets: Vec<PathBuf>,
}

/// The value threaded through the conversion stages.
#[derive(Debug, Clone)]
pub struct ConversionState {
    pub options: ConvertOptions,
    pub legacy: LegacyEnvironment,
    /// Set by the manifest stage.
    pub dependencies_file: Option<DependenciesFile>,
    /// Whether the target manifest existed before the conversion.
    pub dependencies_file_existed: bool,
    pub references_files: Vec<ReferencesFile>,
    pub solutions: Vec<SolutionFile>,
    pub projects: Vec<ProjectFile>,
    /// Packages left alone because the target manifest declared them.
    pub already_declared: Vec<String>,
    /// Whether NuGet's automatic restore was on.
    pub auto_restore: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ConversionState {
    pub fn new(options: ConvertOptions) -> Self {
        ConversionState {
            options,
            legacy: LegacyEnvironment::default(),
            dependencies_file: None,
            dependencies_file_existed: false,
            references_files: Vec::new(),
            solutions: Vec::new(),
            projects: Vec::new(),
            already_declared: Vec::new(),
            auto_restore: false,
            diagnostics: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.options.root
    }
}

type StageResult = Result<ConversionState, ConvertFailure>;

/// Run the whole conversion and return the state to persist.
pub fn convert(
    options: &ConvertOptions,
    decryptor: &dyn CredentialDecryptor,
    prompt: &dyn Prompt,
) -> StageResult {
    tracing::info!("converting {}", options.root.display());

    init(options)
        .and_then(read_legacy_manifests)
        .and_then(|state| collect_source_configs(state, decryptor))
        .and_then(guard_not_already_converted)
        .and_then(|state| synthesize_target_manifest(state, prompt))
        .and_then(synthesize_reference_files)
        .and_then(rewrite_solutions)
        .and_then(rewrite_projects)
}

fn init(options: &ConvertOptions) -> StageResult {
    if !options.root.is_dir() {
        return Err(ConvertError::Scan {
            path: options.root.clone(),
            message: "not a directory".to_string(),
        }
        .into());
    }
    Ok(ConversionState::new(options.clone()))
}

fn read_legacy_manifests(mut state: ConversionState) -> StageResult {
    let root = state.options.root.clone();
    let excluded = state.options.excluded.clone();

    state.legacy.manifests = find_legacy_manifests(&root, &excluded)?;

    let helpers = fs::find_files(&root, &excluded, |name| {
        name.eq_ignore_ascii_case(NUGET_EXE_NAME) || name.eq_ignore_ascii_case(NUGET_TARGETS_NAME)
    })
    .map_err(|e| ConvertError::scan(&root, e))?;
    let (exe, targets): (Vec<PathBuf>, Vec<PathBuf>) = helpers.into_iter().partition(|p| {
        p.file_name()
            .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(NUGET_EXE_NAME))
    });
    state.legacy.nuget_exe = exe;
    state.legacy.nuget_targets = targets;

    tracing::info!(
        "found {} legacy manifest(s)",
        state.legacy.manifests.len()
    );
    Ok(state)
}

fn collect_source_configs(
    mut state: ConversionState,
    decryptor: &dyn CredentialDecryptor,
) -> StageResult {
    let (config, files) = read_source_config(
        &state.options.root,
        state.options.user_config.as_deref(),
        decryptor,
    )?;

    tracing::info!(
        "{} package source(s) from {} configuration file(s)",
        config.sources.len(),
        files.len()
    );
    state.auto_restore = config.auto_restore();
    state.legacy.source_config = config;
    state.legacy.config_files = files;
    Ok(state)
}

/// Refuse to overwrite target files unless forced. Every existing file is
/// reported, not only the first.
fn guard_not_already_converted(state: ConversionState) -> StageResult {
    if state.options.force {
        return Ok(state);
    }

    let mut errors = Vec::new();

    let dependencies_path = state.options.dependencies_path();
    if dependencies_path.exists() {
        errors.push(ConvertError::DependenciesFileAlreadyExists(dependencies_path));
    }
    for path in synthesize::reference_paths(&state.legacy.manifests) {
        if path.exists() {
            errors.push(ConvertError::ReferencesFileAlreadyExists(path));
        }
    }

    if errors.is_empty() {
        Ok(state)
    } else {
        Err(ConvertFailure(errors))
    }
}

fn synthesize_target_manifest(mut state: ConversionState, prompt: &dyn Prompt) -> StageResult {
    let synthesis = synthesize::synthesize_manifest(
        &state.options.dependencies_path(),
        &state.legacy.manifests,
        &state.legacy.source_config,
        state.options.credentials,
        !state.legacy.nuget_exe.is_empty(),
        prompt,
    )?;

    state.diagnostics.extend(synthesis.diagnostics());
    if state.auto_restore {
        state.diagnostics.push(
            Diagnostic::warning("NuGet automatic package restore was enabled")
                .with_suggestion("Run `paket restore` before building"),
        );
    }

    state.already_declared = synthesis.resolution.already_declared;
    state.dependencies_file_existed = synthesis.existed;
    state.dependencies_file = Some(synthesis.file);
    Ok(state)
}

fn synthesize_reference_files(mut state: ConversionState) -> StageResult {
    state.references_files = synthesize::synthesize_references(&state.legacy.manifests);
    tracing::debug!("{} reference file(s)", state.references_files.len());
    Ok(state)
}

fn rewrite_solutions(mut state: ConversionState) -> StageResult {
    state.solutions = rewrite::rewrite_solutions(
        &state.options.root,
        &state.options.excluded,
        &state.options.dependencies_path(),
    )?;
    Ok(state)
}

fn rewrite_projects(mut state: ConversionState) -> StageResult {
    state.projects = rewrite::rewrite_projects(&state.options.root, &state.options.excluded)?;
    tracing::info!(
        "{} of {} project(s) rewritten",
        state.projects.iter().filter(|p| p.is_modified()).count(),
        state.projects.len()
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::credentials::UnsupportedDecryptor;
    use crate::sources::nuget_config::DEFAULT_NUGET_SOURCE;
    use crate::test_support::{
        legacy_repo, nuget_config, packages_config, FailingPrompt, ReversingDecryptor,
        RepoFixture,
    };

    fn run(options: &ConvertOptions) -> StageResult {
        convert(options, &UnsupportedDecryptor, &FailingPrompt)
    }

    #[test]
    fn test_convert_legacy_repo() {
        let repo = legacy_repo();
        let state = run(&ConvertOptions::new(repo.root())).unwrap();

        assert_eq!(state.legacy.manifests.len(), 3);
        assert_eq!(state.legacy.nuget_exe, vec![repo.path(".nuget/NuGet.exe")]);
        assert_eq!(
            state.legacy.nuget_targets,
            vec![repo.path(".nuget/NuGet.targets")]
        );

        let manifest = state.dependencies_file.as_ref().unwrap().to_string();
        assert_eq!(
            manifest,
            format!(
                "source {}\n\n\
                 nuget Autofac = 3.5.2 strategy: max\n\
                 nuget Newtonsoft.Json = 7.0.1 strategy: max\n\
                 nuget NUnit.Runners = 2.6.4 strategy: max\n\
                 nuget NuGet.CommandLine\n",
                DEFAULT_NUGET_SOURCE
            )
        );

        // One conflict warning for Newtonsoft.Json.
        assert_eq!(state.diagnostics.len(), 1);
        assert!(state.diagnostics[0].message.contains("Newtonsoft.Json"));

        assert_eq!(state.references_files.len(), 2);
        assert_eq!(state.solutions.len(), 1);
        assert!(state.solutions[0].is_modified());
        assert_eq!(state.projects.len(), 2);
        assert!(state.projects.iter().all(|p| p.is_modified()));
    }

    #[test]
    fn test_empty_repository() {
        let repo = RepoFixture::new();
        let state = run(&ConvertOptions::new(repo.root())).unwrap();

        let manifest = state.dependencies_file.unwrap();
        assert_eq!(manifest.sources().len(), 1);
        assert_eq!(manifest.sources()[0].url, DEFAULT_NUGET_SOURCE);
        assert!(manifest.packages().is_empty());
        assert!(state.references_files.is_empty());
        assert!(state.diagnostics.is_empty());
    }

    #[test]
    fn test_guard_reports_every_existing_file() {
        let repo = legacy_repo()
            .with_file("paket.dependencies", "source https://www.nuget.org/api/v2\n")
            .with_file("src/App/paket.references", "Autofac\n")
            .with_file("src/Lib/paket.references", "Newtonsoft.Json\n");

        let failure = run(&ConvertOptions::new(repo.root())).unwrap_err();

        assert_eq!(failure.errors().len(), 3);
        assert!(matches!(
            failure.errors()[0],
            ConvertError::DependenciesFileAlreadyExists(_)
        ));
        assert!(failure.errors()[1..]
            .iter()
            .all(|e| matches!(e, ConvertError::ReferencesFileAlreadyExists(_))));
    }

    #[test]
    fn test_force_extends_existing_manifest() {
        let repo = legacy_repo().with_file(
            "paket.dependencies",
            "source https://www.nuget.org/api/v2\n\nnuget Autofac = 3.0.0\n",
        );
        let options = ConvertOptions {
            force: true,
            ..ConvertOptions::new(repo.root())
        };

        let state = run(&options).unwrap();

        assert!(state.dependencies_file_existed);
        assert_eq!(state.already_declared, vec!["Autofac"]);
        let manifest = state.dependencies_file.unwrap().to_string();
        assert!(manifest.contains("nuget Autofac = 3.0.0\n"));
        assert!(!manifest.contains("Autofac = 3.5.2"));
    }

    #[test]
    fn test_malformed_manifest_stops_conversion() {
        let repo = RepoFixture::new()
            .with_file("src/App/packages.config", "<packages><package id=\"A\"/></packages>");

        let failure = run(&ConvertOptions::new(repo.root())).unwrap_err();
        assert!(matches!(
            failure.errors(),
            [ConvertError::ManifestParseError(_)]
        ));
    }

    #[test]
    fn test_inner_config_clear_drops_outer_sources() {
        let repo = RepoFixture::new()
            .with_file("user/NuGet.Config", nuget_config(&[("A", "https://a.example.com/nuget")]))
            .with_file(
                "repo/NuGet.Config",
                r#"<configuration>
  <packageSources>
    <clear />
    <add key="B" value="https://b.example.com/nuget" />
  </packageSources>
</configuration>"#,
            )
            .with_file(
                "repo/src/App/packages.config",
                packages_config(&[("Autofac", "3.5.2")]),
            );

        let options = ConvertOptions {
            user_config: Some(repo.path("user/NuGet.Config")),
            ..ConvertOptions::new(repo.path("repo"))
        };
        let state = convert(&options, &ReversingDecryptor, &FailingPrompt).unwrap();

        let urls: Vec<&str> = state
            .dependencies_file
            .as_ref()
            .unwrap()
            .sources()
            .iter()
            .map(|s| s.url.as_str())
            .collect();
        assert_eq!(urls, vec!["https://b.example.com/nuget"]);
    }

    #[test]
    fn test_auto_restore_is_surfaced() {
        let repo = RepoFixture::new().with_file(
            ".nuget/NuGet.Config",
            r#"<configuration>
  <packageRestore>
    <add key="enabled" value="True" />
    <add key="automatic" value="True" />
  </packageRestore>
</configuration>"#,
        );

        let state = run(&ConvertOptions::new(repo.root())).unwrap();

        assert!(state.auto_restore);
        assert!(state
            .diagnostics
            .iter()
            .any(|d| d.message.contains("automatic package restore")));
    }
}
