//! Package source credentials: decryption, migration policy and storage.
//!
//! NuGet keeps feed credentials either as a platform-encrypted `Password`
//! or as a `ClearTextPassword`. When converting, each credential is either
//! moved to the user-level credential store or written in plain text into
//! `paket.dependencies`, depending on the [`CredentialsMigrationMode`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::errors::ConvertError;
use crate::util::fs;

/// Username and password for a package source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAuth {
    pub username: String,
    pub password: String,
}

/// Platform facility that decrypts NuGet's encrypted passwords.
pub trait CredentialDecryptor: Send + Sync {
    fn decrypt(&self, encrypted: &str) -> Result<String>;
}

/// Decryptor for platforms without NuGet's password encryption.
///
/// NuGet encrypts passwords with the Windows data protection API, which is
/// not available here, so every decryption fails and the source is
/// converted without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedDecryptor;

impl CredentialDecryptor for UnsupportedDecryptor {
    fn decrypt(&self, _encrypted: &str) -> Result<String> {
        bail!("encrypted NuGet passwords cannot be decrypted on this platform")
    }
}

/// A yes/no question asked to the operator.
pub trait Prompt {
    /// Ask `question`. Fails if nobody can answer.
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// How discovered credentials are carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMigrationMode {
    /// Move credentials to the user credential store.
    #[default]
    Encrypt,
    /// Write credentials into the manifest.
    Plaintext,
    /// Ask for every source.
    Selective,
}

impl FromStr for CredentialsMigrationMode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "encrypt" => Ok(CredentialsMigrationMode::Encrypt),
            "plaintext" => Ok(CredentialsMigrationMode::Plaintext),
            "selective" => Ok(CredentialsMigrationMode::Selective),
            _ => Err(ConvertError::UnknownCredentialsMigrationMode(s.to_string())),
        }
    }
}

impl fmt::Display for CredentialsMigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsMigrationMode::Encrypt => write!(f, "encrypt"),
            CredentialsMigrationMode::Plaintext => write!(f, "plaintext"),
            CredentialsMigrationMode::Selective => write!(f, "selective"),
        }
    }
}

/// Where a migrated credential ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStorage {
    /// Kept out of the manifest, saved in the user credential store.
    Config(SourceAuth),
    /// Written into the manifest next to the source.
    Plaintext(SourceAuth),
}

/// Decide how the credentials of `source` are migrated.
///
/// Only [`CredentialsMigrationMode::Selective`] talks to `prompt`.
pub fn migrate_credentials(
    mode: CredentialsMigrationMode,
    source: &str,
    auth: &SourceAuth,
    manifest_path: &Path,
    prompt: &dyn Prompt,
) -> Result<AuthStorage, ConvertError> {
    let store_in_config = match mode {
        CredentialsMigrationMode::Encrypt => true,
        CredentialsMigrationMode::Plaintext => false,
        CredentialsMigrationMode::Selective => {
            let question = format!(
                "Credentials for source '{}' will be stored in '{}'. \
                 Store them in the user credential store instead?",
                source,
                manifest_path.display()
            );
            prompt.confirm(&question).map_err(|e| {
                tracing::debug!("prompt failed: {:#}", e);
                ConvertError::PromptUnavailable(source.to_string())
            })?
        }
    };

    if store_in_config {
        return Ok(AuthStorage::Config(auth.clone()));
    }

    // Manifest values are double-quoted with no escape syntax.
    let quotable = |value: &str| !value.contains(['"', '\n', '\r']);
    if !quotable(&auth.username) || !quotable(&auth.password) {
        return Err(ConvertError::UnquotableCredential(source.to_string()));
    }
    Ok(AuthStorage::Plaintext(auth.clone()))
}

/// Persistent storage for credentials kept out of the manifest.
pub trait CredentialStore {
    fn store(&mut self, source: &str, auth: &SourceAuth) -> Result<()>;
}

/// On-disk layout of the credential store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default, rename = "credential")]
    credentials: Vec<StoredCredential>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredential {
    source: String,
    username: String,
    password: String,
}

/// Credential store backed by a TOML file, by default
/// `~/.nuconvert/credentials.toml`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCredentialStore { path: path.into() }
    }

    /// Store in the default user location, if a home directory is known.
    pub fn user_default() -> Option<Self> {
        crate::util::config::global_config_dir()
            .map(|dir| FileCredentialStore::new(dir.join("credentials.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<CredentialFile> {
        if !self.path.exists() {
            return Ok(CredentialFile::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse credential store: {}", self.path.display()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn store(&mut self, source: &str, auth: &SourceAuth) -> Result<()> {
        let mut file = self.load()?;
        file.credentials
            .retain(|c| !c.source.eq_ignore_ascii_case(source));
        file.credentials.push(StoredCredential {
            source: source.to_string(),
            username: auth.username.clone(),
            password: auth.password.clone(),
        });

        let contents = toml::to_string_pretty(&file)
            .with_context(|| "failed to serialize credential store")?;
        fs::write_string(&self.path, &contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("failed to restrict {}", self.path.display()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingPrompt, ScriptedPrompt};
    use tempfile::TempDir;

    fn auth() -> SourceAuth {
        SourceAuth {
            username: "builder".into(),
            password: "s3cret".into(),
        }
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(
            "Encrypt".parse::<CredentialsMigrationMode>().unwrap(),
            CredentialsMigrationMode::Encrypt
        );
        assert_eq!(
            "plaintext".parse::<CredentialsMigrationMode>().unwrap(),
            CredentialsMigrationMode::Plaintext
        );
        assert_eq!(
            "selective".parse::<CredentialsMigrationMode>().unwrap(),
            CredentialsMigrationMode::Selective
        );
    }

    #[test]
    fn test_unknown_mode() {
        let err = "sometimes".parse::<CredentialsMigrationMode>().unwrap_err();
        assert!(matches!(err, ConvertError::UnknownCredentialsMigrationMode(s) if s == "sometimes"));
    }

    #[test]
    fn test_fixed_modes_never_prompt() {
        let prompt = FailingPrompt;
        let path = Path::new("paket.dependencies");

        let stored = migrate_credentials(
            CredentialsMigrationMode::Encrypt,
            "https://feed",
            &auth(),
            path,
            &prompt,
        )
        .unwrap();
        assert_eq!(stored, AuthStorage::Config(auth()));

        let stored = migrate_credentials(
            CredentialsMigrationMode::Plaintext,
            "https://feed",
            &auth(),
            path,
            &prompt,
        )
        .unwrap();
        assert_eq!(stored, AuthStorage::Plaintext(auth()));
    }

    #[test]
    fn test_selective_follows_answers() {
        let prompt = ScriptedPrompt::new(vec![true, false]);
        let path = Path::new("paket.dependencies");

        let first = migrate_credentials(
            CredentialsMigrationMode::Selective,
            "https://a",
            &auth(),
            path,
            &prompt,
        )
        .unwrap();
        let second = migrate_credentials(
            CredentialsMigrationMode::Selective,
            "https://b",
            &auth(),
            path,
            &prompt,
        )
        .unwrap();

        assert!(matches!(first, AuthStorage::Config(_)));
        assert!(matches!(second, AuthStorage::Plaintext(_)));

        let questions = prompt.questions();
        assert!(questions[0].contains("https://a"));
        assert!(questions[0].contains("paket.dependencies"));
    }

    #[test]
    fn test_plaintext_rejects_quote_in_password() {
        let quoted = SourceAuth {
            username: "builder".into(),
            password: "pa\"ss".into(),
        };
        let path = Path::new("paket.dependencies");

        let err = migrate_credentials(
            CredentialsMigrationMode::Plaintext,
            "https://feed",
            &quoted,
            path,
            &FailingPrompt,
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::UnquotableCredential(s) if s == "https://feed"));

        // The store has no such restriction.
        let stored = migrate_credentials(
            CredentialsMigrationMode::Encrypt,
            "https://feed",
            &quoted,
            path,
            &FailingPrompt,
        )
        .unwrap();
        assert_eq!(stored, AuthStorage::Config(quoted));
    }

    #[test]
    fn test_selective_without_terminal_fails() {
        let err = migrate_credentials(
            CredentialsMigrationMode::Selective,
            "https://feed",
            &auth(),
            Path::new("paket.dependencies"),
            &FailingPrompt,
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::PromptUnavailable(s) if s == "https://feed"));
    }

    #[test]
    fn test_file_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut store = FileCredentialStore::new(tmp.path().join("creds/credentials.toml"));

        store.store("https://feed", &auth()).unwrap();
        store
            .store(
                "https://FEED",
                &SourceAuth {
                    username: "other".into(),
                    password: "pw".into(),
                },
            )
            .unwrap();

        let saved = store.load().unwrap().credentials;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].source, "https://FEED");
        assert_eq!(saved[0].username, "other");
    }
}
