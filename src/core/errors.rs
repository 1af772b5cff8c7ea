//! Conversion error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// A single failure raised by a conversion stage.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ConvertError {
    #[error("unknown credentials migration mode `{0}`")]
    #[diagnostic(
        code(nuconvert::convert::unknown_credentials_mode),
        help("Valid modes are `encrypt`, `plaintext` and `selective`")
    )]
    UnknownCredentialsMigrationMode(String),

    #[error("could not parse {}", .0.display())]
    #[diagnostic(
        code(nuconvert::convert::manifest_parse),
        help("Every <package> element needs an `id` and a valid `version` attribute")
    )]
    ManifestParseError(PathBuf),

    #[error("could not parse NuGet configuration {}", .0.display())]
    #[diagnostic(code(nuconvert::convert::config_parse))]
    ConfigParseError(PathBuf),

    #[error("could not parse project file {}", .0.display())]
    #[diagnostic(code(nuconvert::convert::project_parse))]
    ProjectParseError(PathBuf),

    #[error("could not read solution file {}", .0.display())]
    #[diagnostic(code(nuconvert::convert::solution_parse))]
    SolutionParseError(PathBuf),

    #[error("{} already exists", .0.display())]
    #[diagnostic(
        code(nuconvert::convert::already_converted),
        help("Use --force to overwrite")
    )]
    DependenciesFileAlreadyExists(PathBuf),

    #[error("{} already exists", .0.display())]
    #[diagnostic(
        code(nuconvert::convert::already_converted),
        help("Use --force to overwrite")
    )]
    ReferencesFileAlreadyExists(PathBuf),

    #[error("cannot ask about credentials for source `{0}` without an interactive terminal")]
    #[diagnostic(
        code(nuconvert::convert::prompt_unavailable),
        help("Pass --credentials encrypt or --credentials plaintext")
    )]
    PromptUnavailable(String),

    #[error("credentials for source `{0}` contain a double quote or line break")]
    #[diagnostic(
        code(nuconvert::convert::unquotable_credential),
        help("Pass --credentials encrypt to keep them out of the manifest")
    )]
    UnquotableCredential(String),

    #[error("failed to scan {}: {message}", path.display())]
    #[diagnostic(code(nuconvert::scan))]
    Scan { path: PathBuf, message: String },

    #[error("I/O error on {}", path.display())]
    #[diagnostic(code(nuconvert::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a directory scan failure.
    pub fn scan(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        ConvertError::Scan {
            path: path.into(),
            message: format!("{:#}", err),
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.to_string());
        match self {
            ConvertError::ManifestParseError(path)
            | ConvertError::ConfigParseError(path)
            | ConvertError::ProjectParseError(path)
            | ConvertError::SolutionParseError(path) => {
                diag = diag.with_location(path.clone());
            }
            ConvertError::DependenciesFileAlreadyExists(path)
            | ConvertError::ReferencesFileAlreadyExists(path) => {
                diag = diag
                    .with_location(path.clone())
                    .with_suggestion("Re-run with --force to overwrite existing files");
            }
            ConvertError::UnknownCredentialsMigrationMode(_) => {
                diag = diag.with_suggestion("Use one of: encrypt, plaintext, selective");
            }
            ConvertError::PromptUnavailable(_) => {
                diag = diag.with_suggestion(
                    "Choose a non-interactive mode with --credentials encrypt|plaintext",
                );
            }
            ConvertError::UnquotableCredential(_) => {
                diag = diag.with_suggestion(
                    "Store them in the user credential store with --credentials encrypt",
                );
            }
            ConvertError::Scan { .. } => {}
            ConvertError::Io { source, .. } => {
                diag = diag.with_context(source.to_string());
            }
        }
        diag
    }
}

/// The failure outcome of a conversion pipeline.
///
/// Holds every error a failing stage reported, in the order it found them.
#[derive(Debug)]
pub struct ConvertFailure(pub Vec<ConvertError>);

impl ConvertFailure {
    pub fn errors(&self) -> &[ConvertError] {
        &self.0
    }
}

impl From<ConvertError> for ConvertFailure {
    fn from(err: ConvertError) -> Self {
        ConvertFailure(vec![err])
    }
}

impl fmt::Display for ConvertFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{}", single),
            errors => {
                write!(f, "conversion failed with {} errors", errors.len())?;
                for err in errors {
                    write!(f, "\n  - {}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConvertFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_lists_every_error() {
        let failure = ConvertFailure(vec![
            ConvertError::DependenciesFileAlreadyExists(PathBuf::from("paket.dependencies")),
            ConvertError::ReferencesFileAlreadyExists(PathBuf::from("app/paket.references")),
        ]);

        let message = failure.to_string();
        assert!(message.contains("2 errors"));
        assert!(message.contains("paket.dependencies already exists"));
        assert!(message.contains("app/paket.references already exists"));
    }

    #[test]
    fn test_single_failure_displays_inner_error() {
        let failure: ConvertFailure =
            ConvertError::UnknownCredentialsMigrationMode("sometimes".into()).into();
        assert_eq!(
            failure.to_string(),
            "unknown credentials migration mode `sometimes`"
        );
    }

    #[test]
    fn test_to_diagnostic_has_location() {
        let diag = ConvertError::ManifestParseError(PathBuf::from("a/packages.config"))
            .to_diagnostic();
        assert_eq!(diag.location, Some(PathBuf::from("a/packages.config")));
    }
}
