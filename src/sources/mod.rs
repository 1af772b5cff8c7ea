//! Package sources.
//!
//! Sources come from the hierarchy of `NuGet.Config` files; their
//! credentials are migrated according to a [`CredentialsMigrationMode`].

pub mod credentials;
pub mod nuget_config;

pub use credentials::{
    AuthStorage, CredentialDecryptor, CredentialStore, CredentialsMigrationMode,
    FileCredentialStore, Prompt, SourceAuth, UnsupportedDecryptor,
};
pub use nuget_config::{PackageSource, SourceConfig};
