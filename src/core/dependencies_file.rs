//! The consolidated `paket.dependencies` manifest.
//!
//! Only the parts the converter touches are modelled: `source` lines and
//! `nuget` requirements. Every other line of a pre-existing file is kept
//! verbatim, so loading and saving an untouched file is lossless.
//!
//! ```text
//! source https://www.nuget.org/api/v2
//! source https://my.feed/nuget username: "builder" password: "s3cret"
//!
//! nuget Newtonsoft.Json = 6.0.8 strategy: max
//! nuget NuGet.CommandLine
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::ConvertError;
use crate::resolver::version::PackageVersion;
use crate::sources::credentials::{AuthStorage, SourceAuth};

/// Default file name of the consolidated manifest.
pub const DEPENDENCIES_FILE_NAME: &str = "paket.dependencies";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"username:\s*"([^"]*)""#).expect("valid regex"));
static PASSWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"password:\s*"([^"]*)""#).expect("valid regex"));

/// Version constraint of a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequirement {
    /// Any version.
    Any,
    /// Exactly this version.
    Exact(PackageVersion),
}

/// Which version the resolver should prefer within a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverStrategy {
    Max,
}

impl fmt::Display for ResolverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverStrategy::Max => write!(f, "max"),
        }
    }
}

/// A `nuget` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequirement {
    pub name: String,
    pub requirement: VersionRequirement,
    pub allow_prerelease: bool,
    pub strategy: Option<ResolverStrategy>,
    /// The file that declares the requirement.
    pub parent: PathBuf,
}

impl PackageRequirement {
    /// A requirement pinned to one version, preferring the highest match.
    pub fn exact(name: impl Into<String>, version: PackageVersion, parent: &Path) -> Self {
        PackageRequirement {
            name: name.into(),
            requirement: VersionRequirement::Exact(version),
            allow_prerelease: false,
            strategy: Some(ResolverStrategy::Max),
            parent: parent.to_path_buf(),
        }
    }

    /// A requirement accepting any version.
    pub fn any(name: impl Into<String>, parent: &Path) -> Self {
        PackageRequirement {
            name: name.into(),
            requirement: VersionRequirement::Any,
            allow_prerelease: false,
            strategy: None,
            parent: parent.to_path_buf(),
        }
    }

    fn to_line(&self) -> String {
        let mut line = format!("nuget {}", self.name);
        if let VersionRequirement::Exact(version) = &self.requirement {
            line.push_str(&format!(" = {}", version));
        }
        if let Some(strategy) = self.strategy {
            line.push_str(&format!(" strategy: {}", strategy));
        }
        line
    }
}

/// A `source` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSource {
    pub url: String,
    pub auth: Option<AuthStorage>,
}

impl ManifestSource {
    pub fn new(url: impl Into<String>, auth: Option<AuthStorage>) -> Self {
        ManifestSource {
            url: url.into(),
            auth,
        }
    }

    fn to_line(&self) -> String {
        match &self.auth {
            Some(AuthStorage::Plaintext(auth)) => format!(
                "source {} username: \"{}\" password: \"{}\"",
                self.url, auth.username, auth.password
            ),
            _ => format!("source {}", self.url),
        }
    }
}

/// An in-memory `paket.dependencies`.
#[derive(Debug, Clone)]
pub struct DependenciesFile {
    path: PathBuf,
    sources: Vec<ManifestSource>,
    packages: Vec<PackageRequirement>,
    lines: Vec<String>,
}

impl DependenciesFile {
    /// Create a manifest from scratch.
    pub fn new(
        path: impl Into<PathBuf>,
        sources: Vec<ManifestSource>,
        packages: Vec<PackageRequirement>,
    ) -> Self {
        let mut lines: Vec<String> = sources.iter().map(ManifestSource::to_line).collect();
        if !packages.is_empty() {
            lines.push(String::new());
            lines.extend(packages.iter().map(PackageRequirement::to_line));
        }

        DependenciesFile {
            path: path.into(),
            sources,
            packages,
            lines,
        }
    }

    /// Load an existing manifest.
    pub fn load(path: &Path) -> Result<Self, ConvertError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        Ok(Self::parse(path, &content))
    }

    /// Parse manifest text. Unknown lines are preserved, never rejected.
    pub fn parse(path: &Path, content: &str) -> Self {
        let mut sources = Vec::new();
        let mut packages = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();
            let mut tokens = trimmed.split_whitespace();
            match tokens.next() {
                Some("source") => {
                    if let Some(url) = tokens.next() {
                        sources.push(ManifestSource::new(url, parse_inline_auth(trimmed)));
                    }
                }
                Some("nuget") => {
                    if let Some(name) = tokens.next() {
                        packages.push(parse_requirement(name, tokens.collect(), path));
                    }
                }
                _ => {}
            }
        }

        DependenciesFile {
            path: path.to_path_buf(),
            sources,
            packages,
            lines: content.lines().map(str::to_string).collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sources(&self) -> &[ManifestSource] {
        &self.sources
    }

    pub fn packages(&self) -> &[PackageRequirement] {
        &self.packages
    }

    /// Whether a package is declared, ignoring case.
    pub fn has_package(&self, name: &str) -> bool {
        self.packages
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Add a requirement. Returns `false` if the package was already declared.
    ///
    /// The new line goes after the last requirement of the main group, so it
    /// never lands inside a named `group` section.
    pub fn add_requirement(&mut self, requirement: PackageRequirement) -> bool {
        if self.has_package(&requirement.name) {
            return false;
        }

        let group_start = self
            .lines
            .iter()
            .position(|l| is_keyword_line(l, "group"))
            .unwrap_or(self.lines.len());
        let last_nuget = self.lines[..group_start]
            .iter()
            .rposition(|l| is_keyword_line(l, "nuget"));

        let line = requirement.to_line();
        match last_nuget {
            Some(index) => self.lines.insert(index + 1, line),
            None => {
                let has_group = group_start < self.lines.len();
                let mut at = group_start;
                if at > 0 && !self.lines[at - 1].trim().is_empty() {
                    self.lines.insert(at, String::new());
                    at += 1;
                }
                self.lines.insert(at, line);
                if has_group {
                    self.lines.insert(at + 1, String::new());
                }
            }
        }

        self.packages.push(requirement);
        true
    }

    /// Credentials that belong in the user credential store, by source URL.
    pub fn config_credentials(&self) -> Vec<(String, SourceAuth)> {
        self.sources
            .iter()
            .filter_map(|s| match &s.auth {
                Some(AuthStorage::Config(auth)) => Some((s.url.clone(), auth.clone())),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for DependenciesFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

fn is_keyword_line(line: &str, keyword: &str) -> bool {
    line.split_whitespace().next() == Some(keyword)
}

fn parse_inline_auth(line: &str) -> Option<AuthStorage> {
    let username = USERNAME_RE.captures(line)?.get(1)?.as_str().to_string();
    let password = PASSWORD_RE.captures(line)?.get(1)?.as_str().to_string();
    Some(AuthStorage::Plaintext(SourceAuth { username, password }))
}

fn parse_requirement(name: &str, rest: Vec<&str>, parent: &Path) -> PackageRequirement {
    let requirement = match rest.as_slice() {
        ["=", version, ..] => version
            .parse()
            .map(VersionRequirement::Exact)
            .unwrap_or(VersionRequirement::Any),
        _ => VersionRequirement::Any,
    };
    let strategy = rest
        .windows(2)
        .find(|w| w[0] == "strategy:")
        .and_then(|w| match w[1] {
            "max" => Some(ResolverStrategy::Max),
            _ => None,
        });

    PackageRequirement {
        name: name.to_string(),
        requirement,
        allow_prerelease: rest.iter().any(|t| t.eq_ignore_ascii_case("prerelease")),
        strategy,
        parent: parent.to_path_buf(),
    }
}
