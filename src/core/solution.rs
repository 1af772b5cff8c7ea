//! Visual Studio solution (`.sln`) rewriting.
//!
//! Solutions list NuGet's helper files under a `.nuget` solution folder.
//! After conversion those files are gone, and the consolidated manifest is
//! listed under a `.paket` solution folder instead.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::ConvertError;

/// Project type GUID of solution folders.
pub const SOLUTION_FOLDER_TYPE: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";

/// Solution folder holding the legacy NuGet files.
const LEGACY_FOLDER: &str = ".nuget";

/// Solution folder holding the consolidated manifest.
const PAKET_FOLDER: &str = ".paket";

/// Solution items that disappear with the legacy package manager.
const LEGACY_ITEMS: &[&str] = &["NuGet.exe", "NuGet.targets", "packages.config"];

static PROJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*Project\("\{([0-9A-Fa-f-]+)\}"\)\s*=\s*"([^"]*)"\s*,\s*"([^"]*)"\s*,\s*"\{([0-9A-Fa-f-]+)\}""#,
    )
    .expect("valid regex")
});

/// A `Project(...) ... EndProject` block.
#[derive(Debug, Clone)]
struct ProjectBlock {
    type_guid: String,
    name: String,
    guid: String,
    /// Index of the `Project(` line.
    start: usize,
    /// Index of the `EndProject` line.
    end: usize,
}

impl ProjectBlock {
    fn is_folder(&self, name: &str) -> bool {
        self.type_guid.eq_ignore_ascii_case(SOLUTION_FOLDER_TYPE) && self.name.eq_ignore_ascii_case(name)
    }
}

/// An in-memory solution file.
#[derive(Debug, Clone)]
pub struct SolutionFile {
    path: PathBuf,
    lines: Vec<String>,
    newline: &'static str,
    trailing_newline: bool,
    modified: bool,
}

impl SolutionFile {
    /// Read a solution file.
    pub fn load(path: &Path) -> Result<Self, ConvertError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => ConvertError::SolutionParseError(path.to_path_buf()),
            _ => ConvertError::io(path, e),
        })?;
        Ok(Self::parse(path, &content))
    }

    pub fn parse(path: &Path, content: &str) -> Self {
        SolutionFile {
            path: path.to_path_buf(),
            lines: content.lines().map(str::to_string).collect(),
            newline: if content.contains("\r\n") { "\r\n" } else { "\n" },
            trailing_newline: content.ends_with('\n'),
            modified: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory containing the solution.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Whether any rewrite changed the solution.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn blocks(&self) -> Vec<ProjectBlock> {
        let mut blocks = Vec::new();
        let mut i = 0;
        while i < self.lines.len() {
            if let Some(caps) = PROJECT_RE.captures(&self.lines[i]) {
                let end = (i + 1..self.lines.len())
                    .find(|&j| self.lines[j].trim() == "EndProject")
                    .unwrap_or(self.lines.len() - 1);
                blocks.push(ProjectBlock {
                    type_guid: caps[1].to_string(),
                    name: caps[2].to_string(),
                    guid: caps[4].to_string(),
                    start: i,
                    end,
                });
                i = end + 1;
            } else {
                i += 1;
            }
        }
        blocks
    }

    /// Remove legacy NuGet items from the `.nuget` solution folder, and the
    /// folder itself once it is empty. Returns whether anything changed.
    pub fn remove_legacy_entries(&mut self) -> bool {
        let mut changed = false;

        // Walk backwards so removals don't shift blocks still to visit.
        let folders: Vec<ProjectBlock> = self
            .blocks()
            .into_iter()
            .filter(|b| b.is_folder(LEGACY_FOLDER))
            .rev()
            .collect();

        for folder in folders {
            let mut end = folder.end;
            let mut j = folder.start + 1;
            while j < end {
                if is_legacy_item(&self.lines[j]) {
                    self.lines.remove(j);
                    end -= 1;
                    changed = true;
                } else {
                    j += 1;
                }
            }

            let has_items = self.lines[folder.start + 1..end]
                .iter()
                .any(|l| solution_item(l).is_some());
            if !has_items {
                self.lines.drain(folder.start..=end);
                self.remove_nesting(&folder.guid);
                changed = true;
            }
        }

        self.modified |= changed;
        changed
    }

    fn remove_nesting(&mut self, guid: &str) {
        let needle = format!("{{{}}}", guid.to_ascii_uppercase());
        let mut in_nested = false;
        self.lines.retain(|line| {
            let trimmed = line.trim();
            if trimmed.starts_with("GlobalSection(NestedProjects)") {
                in_nested = true;
            } else if trimmed == "EndGlobalSection" {
                in_nested = false;
            } else if in_nested && trimmed.to_ascii_uppercase().contains(&needle) {
                return false;
            }
            true
        });
    }

    /// List `relative_path` as an item of the `.paket` solution folder,
    /// creating the folder if needed. Returns whether anything changed.
    pub fn add_dependencies_item(&mut self, relative_path: &str) -> bool {
        let item = format!("\t\t{0} = {0}", relative_path);

        let folder = self.blocks().into_iter().find(|b| b.is_folder(PAKET_FOLDER));
        let changed = match folder {
            Some(folder) => {
                let body = folder.start + 1..folder.end;
                let present = self.lines[body.clone()].iter().any(|l| {
                    solution_item(l).is_some_and(|i| i.eq_ignore_ascii_case(relative_path))
                });
                if present {
                    false
                } else if let Some(section_end) = body
                    .clone()
                    .find(|&j| self.lines[j].trim() == "EndProjectSection")
                {
                    self.lines.insert(section_end, item);
                    true
                } else {
                    let section = [
                        "\tProjectSection(SolutionItems) = preProject".to_string(),
                        item,
                        "\tEndProjectSection".to_string(),
                    ];
                    self.lines.splice(folder.end..folder.end, section);
                    true
                }
            }
            None => {
                let guid = uuid::Uuid::new_v4().to_string().to_ascii_uppercase();
                let block = [
                    format!(
                        "Project(\"{{{}}}\") = \"{1}\", \"{1}\", \"{{{2}}}\"",
                        SOLUTION_FOLDER_TYPE, PAKET_FOLDER, guid
                    ),
                    "\tProjectSection(SolutionItems) = preProject".to_string(),
                    item,
                    "\tEndProjectSection".to_string(),
                    "EndProject".to_string(),
                ];
                let at = self
                    .lines
                    .iter()
                    .position(|l| l.trim() == "Global")
                    .unwrap_or(self.lines.len());
                self.lines.splice(at..at, block);
                true
            }
        };

        self.modified |= changed;
        changed
    }
}

/// The item path of a `path = path` solution item line.
fn solution_item(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.starts_with("ProjectSection") || trimmed.starts_with("EndProjectSection") {
        return None;
    }
    let (left, right) = trimmed.split_once(" = ")?;
    (left.trim() == right.trim()).then(|| left.trim())
}

fn is_legacy_item(line: &str) -> bool {
    solution_item(line)
        .map(|item| {
            let file_name = item.rsplit(['\\', '/']).next().unwrap_or(item);
            LEGACY_ITEMS.iter().any(|l| l.eq_ignore_ascii_case(file_name))
        })
        .unwrap_or(false)
}

impl fmt::Display for SolutionFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.lines.join(self.newline);
        f.write_str(&body)?;
        if self.trailing_newline {
            f.write_str(self.newline)?;
        }
        Ok(())
    }
}
