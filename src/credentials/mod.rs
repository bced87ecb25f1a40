// src/credentials/mod.rs

pub mod env;
pub mod profile;

use std::{fmt, path::PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::PipelineConfig;

pub use env::EnvCredentials;
pub use profile::ProfileCredentials;

/// Role used when neither source names one.
pub const DEFAULT_ROLE: &str = "ACCOUNTADMIN";

/// Everything needed to open a warehouse session. Built once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub account: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    pub role: String,
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("profiles.yml not found; searched {searched:?}")]
    ProfileFileNotFound { searched: Vec<PathBuf> },

    #[error("reading {path}: {source}")]
    ProfileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    ProfileParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("profile '{name}' does not exist in {path}")]
    MissingProfile { name: String, path: PathBuf },

    #[error("profile '{profile}' in {path} has no 'outputs' mapping")]
    MissingOutputs { profile: String, path: PathBuf },

    #[error("target '{target}' does not exist under profile '{profile}' in {path}")]
    MissingTarget {
        profile: String,
        target: String,
        path: PathBuf,
    },

    #[error("field '{field}' missing from {origin}")]
    MissingField { field: &'static str, origin: String },

    #[error("environment variable {name} is not set")]
    MissingEnvVar { name: &'static str },

    #[error("no credential source applies")]
    NoSource,
}

/// One way of producing a [`ConnectionDescriptor`].
pub trait CredentialSource {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the source does not apply to this run, letting the
    /// next source in the chain try. A source that applies but fails returns
    /// `Err` and ends resolution.
    fn resolve(&self) -> Result<Option<ConnectionDescriptor>, CredentialError>;
}

/// Walk `chain` in order; the first source that applies wins.
pub fn resolve(chain: &[&dyn CredentialSource]) -> Result<ConnectionDescriptor, CredentialError> {
    for source in chain {
        if let Some(descriptor) = source.resolve()? {
            info!(source = source.name(), account = %descriptor.account, "resolved credentials");
            return Ok(descriptor);
        }
    }
    Err(CredentialError::NoSource)
}

/// Process environment first, then the `profiles.yml` search list from `config`.
pub fn resolve_default(config: &PipelineConfig) -> Result<ConnectionDescriptor, CredentialError> {
    let env = EnvCredentials::from_process();
    let profile = ProfileCredentials::new(
        config.profile_paths.clone(),
        &config.profile_name,
        &config.target_name,
    );
    resolve(&[&env, &profile])
}
