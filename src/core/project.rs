//! MSBuild project file rewriting.
//!
//! Project files reference NuGet in three ways: the `packages.config` item,
//! an `<Import>` of `NuGet.targets` (with its `RestorePackages` switch) and
//! the `EnsureNuGetPackageBuildImports` target. The rewrite streams the XML
//! through `quick-xml` and only touches those elements, so the rest of the
//! file keeps its exact formatting.

use std::path::{Path, PathBuf};

use anyhow::bail;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::core::errors::ConvertError;
use crate::core::legacy_manifest::LEGACY_MANIFEST_NAME;
use crate::core::references_file::REFERENCES_FILE_NAME;
use crate::util::xml;

/// Project file extensions that can reference NuGet packages.
pub const PROJECT_EXTENSIONS: &[&str] = &[
    "csproj", "fsproj", "vbproj", "vcxproj", "wixproj", "nuproj", "ccproj", "pyproj", "sqlproj",
];

/// Whether a file name is a project descriptor.
pub fn is_project_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            PROJECT_EXTENSIONS.iter().any(|p| ext.eq_ignore_ascii_case(p))
        })
        .unwrap_or(false)
}

const UTF8_BOM: &str = "\u{feff}";

/// What to do with an element during a rewrite.
enum Edit {
    Keep,
    Drop,
    Replace(BytesStart<'static>),
}

/// An in-memory project file.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    path: PathBuf,
    original: String,
    content: String,
}

impl ProjectFile {
    /// Read a project file.
    pub fn load(path: &Path) -> Result<Self, ConvertError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        Ok(Self::parse(path, &content))
    }

    pub fn parse(path: &Path, content: &str) -> Self {
        ProjectFile {
            path: path.to_path_buf(),
            original: content.to_string(),
            content: content.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether any rewrite changed the project.
    pub fn is_modified(&self) -> bool {
        self.content != self.original
    }

    /// Point `packages.config` items at `paket.references` instead.
    pub fn replace_nuget_packages_file(&mut self) -> Result<bool, ConvertError> {
        self.rewrite(|e| {
            let mut found = false;
            let mut replaced = BytesStart::new(xml::qualified_name(e));

            for attribute in e.attributes() {
                let attribute = attribute?;
                let is_legacy_include = attribute.key.as_ref() == b"Include"
                    && attribute
                        .unescape_value()?
                        .trim()
                        .eq_ignore_ascii_case(LEGACY_MANIFEST_NAME);
                if is_legacy_include {
                    found = true;
                    replaced.push_attribute(("Include", REFERENCES_FILE_NAME));
                } else {
                    replaced.push_attribute(Attribute {
                        key: attribute.key,
                        value: attribute.value,
                    });
                }
            }

            Ok(if found { Edit::Replace(replaced) } else { Edit::Keep })
        })
    }

    /// Remove the `NuGet.targets` import, the `RestorePackages` switch and
    /// the `EnsureNuGetPackageBuildImports` target.
    pub fn remove_nuget_targets_entries(&mut self) -> Result<bool, ConvertError> {
        self.rewrite(|e| {
            let drop = match e.local_name().as_ref() {
                b"Import" => xml::attr(e, "Project")?
                    .map(|p| p.trim().to_ascii_lowercase().ends_with("nuget.targets"))
                    .unwrap_or(false),
                b"RestorePackages" => true,
                b"Target" => xml::attr(e, "Name")?
                    .map(|n| n.trim().eq_ignore_ascii_case("EnsureNuGetPackageBuildImports"))
                    .unwrap_or(false),
                _ => false,
            };
            Ok(if drop { Edit::Drop } else { Edit::Keep })
        })
    }

    /// Stream the document, applying `edit` to every element.
    fn rewrite<F>(&mut self, mut edit: F) -> Result<bool, ConvertError>
    where
        F: FnMut(&BytesStart<'_>) -> Result<Edit, quick_xml::Error>,
    {
        // The reader swallows a byte order mark, so carry it across.
        let (bom, body) = match self.content.strip_prefix(UTF8_BOM) {
            Some(body) => (UTF8_BOM, body),
            None => ("", self.content.as_str()),
        };
        let rewritten = rewrite_xml(body, &mut edit)
            .map(|body| format!("{}{}", bom, body))
            .map_err(|e| {
                tracing::debug!("{}: {:#}", self.path.display(), e);
                ConvertError::ProjectParseError(self.path.clone())
            })?;
        let changed = rewritten != self.content;
        self.content = rewritten;
        Ok(changed)
    }
}

fn rewrite_xml<F>(content: &str, edit: &mut F) -> anyhow::Result<String>
where
    F: FnMut(&BytesStart<'_>) -> Result<Edit, quick_xml::Error>,
{
    let mut reader = Reader::from_str(content);
    let mut writer = Writer::new(Vec::new());

    // Indentation before an element is held back so it can go with it.
    let mut pending_whitespace: Option<Event<'_>> = None;
    let mut skip_depth = 0usize;

    loop {
        let event = reader.read_event()?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Text(ref t) if t.iter().all(|b| b.is_ascii_whitespace()) => {
                if let Some(previous) = pending_whitespace.replace(event) {
                    writer.write_event(previous)?;
                }
                continue;
            }
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                match edit(e)? {
                    Edit::Keep => {
                        flush(&mut writer, &mut pending_whitespace)?;
                        writer.write_event(event)?;
                    }
                    Edit::Drop => {
                        pending_whitespace = None;
                        if is_start {
                            skip_depth = 1;
                        }
                    }
                    Edit::Replace(replacement) => {
                        flush(&mut writer, &mut pending_whitespace)?;
                        if is_start {
                            writer.write_event(Event::Start(replacement))?;
                        } else {
                            writer.write_event(Event::Empty(replacement))?;
                        }
                    }
                }
            }
            Event::Eof => {
                flush(&mut writer, &mut pending_whitespace)?;
                break;
            }
            other => {
                flush(&mut writer, &mut pending_whitespace)?;
                writer.write_event(other)?;
            }
        }
    }

    if skip_depth > 0 {
        bail!("unexpected end of document inside a removed element");
    }

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn flush(
    writer: &mut Writer<Vec<u8>>,
    pending: &mut Option<Event<'_>>,
) -> Result<(), quick_xml::Error> {
    if let Some(event) = pending.take() {
        writer.write_event(event)?;
    }
    Ok(())
}
