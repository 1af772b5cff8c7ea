//! `NuGet.Config` discovery and merging.
//!
//! NuGet reads a chain of configuration files: the solution's `.nuget`
//! folder, the repository root and each parent directory up to the
//! filesystem root, and finally the user-level file. Files closer to the
//! repository win. A `<clear/>` in `packageSources` drops everything
//! inherited from outer files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::bail;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::errors::ConvertError;
use crate::core::legacy_manifest::SOLUTION_MARKER_DIR;
use crate::sources::credentials::{CredentialDecryptor, SourceAuth};
use crate::util::{fs, xml};

/// File name of a NuGet configuration file (matched case-insensitively).
pub const NUGET_CONFIG_NAME: &str = "NuGet.Config";

/// Source used when no configuration declares any.
pub const DEFAULT_NUGET_SOURCE: &str = "https://www.nuget.org/api/v2";

/// A configured package source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    /// The source's key (its display name in NuGet).
    pub name: String,
    pub url: String,
    pub auth: Option<SourceAuth>,
}

/// The merged result of every configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceConfig {
    pub sources: Vec<PackageSource>,
    pub restore_enabled: bool,
    pub restore_automatic: bool,
}

/// Credentials block of one source, as written in a file.
#[derive(Debug, Clone, Default)]
struct RawCredentials {
    username: Option<String>,
    password: Option<String>,
    clear_text_password: Option<String>,
}

/// One parsed `NuGet.Config` file.
#[derive(Debug, Clone, Default)]
pub struct NugetConfigFile {
    path: PathBuf,
    clear_sources: bool,
    sources: Vec<(String, String)>,
    disabled: Vec<String>,
    credentials: HashMap<String, RawCredentials>,
    restore_enabled: Option<bool>,
    restore_automatic: Option<bool>,
}

impl NugetConfigFile {
    /// Read and parse a configuration file.
    pub fn read(path: &Path) -> Result<Self, ConvertError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        Self::parse(path, &content)
    }

    /// Parse configuration content.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConvertError> {
        let mut file = NugetConfigFile {
            path: path.to_path_buf(),
            ..Default::default()
        };
        file.parse_content(content)
            .map_err(|_| ConvertError::ConfigParseError(path.to_path_buf()))?;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_content(&mut self, content: &str) -> anyhow::Result<()> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut stack: Vec<String> = Vec::new();
        let mut seen_root = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    self.visit(&stack, &e, &mut seen_root)?;
                    stack.push(xml::local_name(&e));
                }
                Event::Empty(e) => {
                    self.visit(&stack, &e, &mut seen_root)?;
                }
                Event::End(_) => {
                    if stack.pop().is_none() {
                        bail!("unbalanced end tag");
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() || !seen_root {
            bail!("missing or unclosed <configuration>");
        }
        Ok(())
    }

    fn visit(
        &mut self,
        parents: &[String],
        e: &BytesStart<'_>,
        seen_root: &mut bool,
    ) -> anyhow::Result<()> {
        let name = xml::local_name(e);

        match parents {
            [] => {
                if *seen_root || !is(&name, "configuration") {
                    bail!("root element must be <configuration>");
                }
                *seen_root = true;
            }
            [_] if is(&name, "packageRestore") => {
                if let Some(v) = xml::attr_ignore_case(e, "enabled")? {
                    self.restore_enabled = xml::parse_bool(&v).or(self.restore_enabled);
                }
                if let Some(v) = xml::attr_ignore_case(e, "automatic")? {
                    self.restore_automatic = xml::parse_bool(&v).or(self.restore_automatic);
                }
            }
            [_, section] if is(section, "packageSources") => {
                if is(&name, "clear") {
                    self.clear_sources = true;
                    self.sources.clear();
                } else if is(&name, "add") {
                    if let (Some(key), Some(value)) = key_value(e)? {
                        self.sources.push((key, value));
                    }
                }
            }
            [_, section] if is(section, "disabledPackageSources") && is(&name, "add") => {
                if let (Some(key), Some(value)) = key_value(e)? {
                    if xml::parse_bool(&value).unwrap_or(false) {
                        self.disabled.push(key);
                    }
                }
            }
            [_, section] if is(section, "packageRestore") && is(&name, "add") => {
                if let (Some(key), Some(value)) = key_value(e)? {
                    let flag = xml::parse_bool(&value);
                    if is(&key, "enabled") {
                        self.restore_enabled = flag.or(self.restore_enabled);
                    } else if is(&key, "automatic") {
                        self.restore_automatic = flag.or(self.restore_automatic);
                    }
                }
            }
            [_, section, source] if is(section, "packageSourceCredentials") && is(&name, "add") => {
                if let (Some(key), Some(value)) = key_value(e)? {
                    let entry = self.credentials.entry(source.clone()).or_default();
                    if is(&key, "Username") {
                        entry.username = Some(value);
                    } else if is(&key, "Password") {
                        entry.password = Some(value);
                    } else if is(&key, "ClearTextPassword") {
                        entry.clear_text_password = Some(value);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Credentials declared in this file for the source named `key`.
    fn resolve_auth(&self, key: &str, decryptor: &dyn CredentialDecryptor) -> Option<SourceAuth> {
        let encoded = xml::encode_local_name(key);
        let raw = self
            .credentials
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&encoded))
            .map(|(_, raw)| raw)?;
        let username = raw.username.clone()?;

        if let Some(encrypted) = &raw.password {
            match decryptor.decrypt(encrypted) {
                Ok(password) => return Some(SourceAuth { username, password }),
                Err(e) => tracing::warn!(
                    "could not decrypt the password for source `{}` in {}: {:#}",
                    key,
                    self.path.display(),
                    e
                ),
            }
        }

        raw.clear_text_password
            .clone()
            .map(|password| SourceAuth { username, password })
    }
}

fn key_value(e: &BytesStart<'_>) -> Result<(Option<String>, Option<String>), quick_xml::Error> {
    Ok((xml::attr(e, "key")?, xml::attr(e, "value")?))
}

fn is(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

impl SourceConfig {
    /// Fold one configuration file over the accumulated configuration.
    pub fn apply(mut self, file: &NugetConfigFile, decryptor: &dyn CredentialDecryptor) -> Self {
        if file.clear_sources {
            self.sources.clear();
        }

        for (key, url) in &file.sources {
            let source = PackageSource {
                name: key.clone(),
                url: url.clone(),
                auth: file.resolve_auth(key, decryptor),
            };
            match self
                .sources
                .iter_mut()
                .find(|s| s.name.eq_ignore_ascii_case(key))
            {
                Some(existing) => *existing = source,
                None => self.sources.push(source),
            }
        }

        if !file.disabled.is_empty() {
            self.sources.retain(|s| {
                !file
                    .disabled
                    .iter()
                    .any(|d| d.eq_ignore_ascii_case(&s.name))
            });
        }

        if let Some(enabled) = file.restore_enabled {
            self.restore_enabled = enabled;
        }
        if let Some(automatic) = file.restore_automatic {
            self.restore_automatic = automatic;
        }

        self
    }

    /// Inject the default public source if nothing declared one.
    pub fn with_default_source(mut self) -> Self {
        if self.sources.is_empty() {
            self.sources.push(PackageSource {
                name: "nuget.org".to_string(),
                url: DEFAULT_NUGET_SOURCE.to_string(),
                auth: None,
            });
        }
        self
    }

    /// Whether NuGet's automatic package restore was switched on.
    pub fn auto_restore(&self) -> bool {
        self.restore_enabled && self.restore_automatic
    }
}

/// The user-level `NuGet.Config` location for this platform.
pub fn default_user_config_path() -> Option<PathBuf> {
    let base = directories::BaseDirs::new()?;
    if cfg!(windows) {
        Some(base.config_dir().join("NuGet").join(NUGET_CONFIG_NAME))
    } else {
        Some(
            base.home_dir()
                .join(".nuget")
                .join("NuGet")
                .join(NUGET_CONFIG_NAME),
        )
    }
}

/// Existing configuration files, innermost first.
///
/// Walks from `<root>/.nuget` up to the filesystem root, then appends
/// `user_config` if it exists.
pub fn find_config_files(root: &Path, user_config: Option<&Path>) -> Vec<PathBuf> {
    let root = fs::normalize_path(root);
    let mut files = Vec::new();

    let marker_dir = root.join(SOLUTION_MARKER_DIR);
    for dir in std::iter::once(marker_dir.as_path()).chain(root.ancestors()) {
        if let Some(file) = fs::find_file_ignore_case(dir, NUGET_CONFIG_NAME) {
            files.push(file);
        }
    }

    if let Some(user) = user_config {
        if user.is_file() && !files.iter().any(|f| f == user) {
            files.push(user.to_path_buf());
        }
    }

    files
}

/// Read and merge the configuration chain for `root`.
///
/// Returns the merged configuration (never without a source) and the files
/// that contributed to it, innermost first.
pub fn read_source_config(
    root: &Path,
    user_config: Option<&Path>,
    decryptor: &dyn CredentialDecryptor,
) -> Result<(SourceConfig, Vec<PathBuf>), ConvertError> {
    let paths = find_config_files(root, user_config);
    let files = paths
        .iter()
        .map(|path| NugetConfigFile::read(path))
        .collect::<Result<Vec<_>, _>>()?;

    let config = files
        .iter()
        .rev()
        .fold(SourceConfig::default(), |acc, file| {
            tracing::debug!("applying {}", file.path().display());
            acc.apply(file, decryptor)
        })
        .with_default_source();

    Ok((config, paths))
}
