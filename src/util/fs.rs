//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into while scanning a repository.
pub const DEFAULT_SKIPPED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".vs",
    "bin",
    "obj",
    "node_modules",
    "packages",
    "paket-files",
];

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Remove a file if it exists. Returns whether something was removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    if path.is_file() {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove file: {}", path.display()))?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Remove a directory if it exists and is empty. Returns whether it was removed.
pub fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(path)
        .with_context(|| format!("failed to read directory: {}", path.display()))?;
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(path)
        .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    Ok(true)
}

/// Recursively find files under `root` whose name satisfies `matches`.
///
/// Directories in [`DEFAULT_SKIPPED_DIRS`] and in `excluded` are pruned
/// (compared case-insensitively). The result is sorted.
pub fn find_files<F>(root: &Path, excluded: &[String], matches: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&str) -> bool,
{
    let keep = |entry: &DirEntry| -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !DEFAULT_SKIPPED_DIRS
            .iter()
            .any(|skip| name.eq_ignore_ascii_case(skip))
            && !excluded.iter().any(|skip| name.eq_ignore_ascii_case(skip))
    };

    let mut results = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).into_iter().filter_entry(keep) {
        let entry =
            entry.with_context(|| format!("failed to scan directory: {}", root.display()))?;
        if entry.file_type().is_file() && matches(&entry.file_name().to_string_lossy()) {
            results.push(entry.into_path());
        }
    }

    results.sort();
    Ok(results)
}

/// Find a file in `dir` by name, ignoring case.
pub fn find_file_ignore_case(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map(|e| e.path())
        .collect();
    found.sort();
    found.into_iter().next()
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Render a relative path with Windows separators, as MSBuild files expect.
pub fn to_windows_separators(path: &Path) -> String {
    path.to_string_lossy().replace('/', "\\")
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
/// Returns the path as-is if canonicalization fails.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
