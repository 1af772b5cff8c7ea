//! Persisting a finished conversion.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::legacy_manifest::SOLUTION_MARKER_DIR;
use crate::ops::convert::ConversionState;
use crate::sources::credentials::CredentialStore;
use crate::util::fs;

/// Options for applying a conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Report what would change without touching the disk.
    pub dry_run: bool,
    /// Leave `packages.config`, `NuGet.exe` and `NuGet.targets` in place.
    pub keep_legacy_files: bool,
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Created,
    Updated,
    Removed,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileAction::Created => write!(f, "created"),
            FileAction::Updated => write!(f, "updated"),
            FileAction::Removed => write!(f, "removed"),
        }
    }
}

/// Summary of an applied conversion.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub files: Vec<(FileAction, PathBuf)>,
    /// Sources whose credentials went to the credential store.
    pub stored_credentials: Vec<String>,
    pub dry_run: bool,
}

impl ApplyReport {
    pub fn count(&self, action: FileAction) -> usize {
        self.files.iter().filter(|(a, _)| *a == action).count()
    }
}

/// Write `state` to disk.
pub fn apply(
    state: &ConversionState,
    store: &mut dyn CredentialStore,
    options: &ApplyOptions,
) -> Result<ApplyReport> {
    let mut report = ApplyReport {
        dry_run: options.dry_run,
        ..ApplyReport::default()
    };

    if let Some(manifest) = &state.dependencies_file {
        let action = if state.dependencies_file_existed {
            FileAction::Updated
        } else {
            FileAction::Created
        };
        write(&mut report, options, action, manifest.path(), &manifest.to_string())?;

        for (source, auth) in manifest.config_credentials() {
            if !options.dry_run {
                store
                    .store(&source, &auth)
                    .with_context(|| format!("failed to store credentials for {}", source))?;
            }
            report.stored_credentials.push(source);
        }
    }

    for references in &state.references_files {
        let action = if references.path().exists() {
            FileAction::Updated
        } else {
            FileAction::Created
        };
        write(&mut report, options, action, references.path(), &references.to_string())?;
    }

    for solution in state.solutions.iter().filter(|s| s.is_modified()) {
        write(&mut report, options, FileAction::Updated, solution.path(), &solution.to_string())?;
    }

    for project in state.projects.iter().filter(|p| p.is_modified()) {
        write(&mut report, options, FileAction::Updated, project.path(), project.content())?;
    }

    if !options.keep_legacy_files {
        remove_legacy_files(state, options, &mut report)?;
    }

    Ok(report)
}

fn write(
    report: &mut ApplyReport,
    options: &ApplyOptions,
    action: FileAction,
    path: &Path,
    contents: &str,
) -> Result<()> {
    if !options.dry_run {
        fs::write_string(path, contents)?;
    }
    tracing::debug!("{} {}", action, path.display());
    report.files.push((action, path.to_path_buf()));
    Ok(())
}

fn remove_legacy_files(
    state: &ConversionState,
    options: &ApplyOptions,
    report: &mut ApplyReport,
) -> Result<()> {
    let legacy = state
        .legacy
        .manifests
        .iter()
        .map(|m| m.path().to_path_buf())
        .chain(state.legacy.nuget_exe.iter().cloned())
        .chain(state.legacy.nuget_targets.iter().cloned());

    let mut marker_dirs: Vec<PathBuf> = Vec::new();
    for path in legacy {
        let removed = if options.dry_run {
            path.exists()
        } else {
            fs::remove_file_if_exists(&path)?
        };
        if removed {
            report.files.push((FileAction::Removed, path.clone()));
        }

        if let Some(parent) = path.parent() {
            let is_marker = parent
                .file_name()
                .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(SOLUTION_MARKER_DIR));
            if is_marker && !marker_dirs.iter().any(|d| d == parent) {
                marker_dirs.push(parent.to_path_buf());
            }
        }
    }

    if options.dry_run {
        return Ok(());
    }

    for dir in marker_dirs {
        if dir.is_dir() && fs::remove_dir_if_empty(&dir)? {
            report.files.push((FileAction::Removed, dir));
        }
    }

    Ok(())
}
