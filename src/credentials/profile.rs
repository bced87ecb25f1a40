use serde::{de::Error as _, Deserialize, Deserializer};
use serde_yaml::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use super::{ConnectionDescriptor, CredentialError, CredentialSource, DEFAULT_ROLE};

/// Credentials from a dbt-style `profiles.yml` (local path):
///
/// ```yaml
/// nyc_taxi_analysis:
///   outputs:
///     dev:
///       account: xy12345
///       user: loader
///       ...
/// ```
///
/// Always applies; the first existing file in `paths` is used.
pub struct ProfileCredentials {
    paths: Vec<PathBuf>,
    profile: String,
    target: String,
}

/// One entry under `outputs`. Extra keys (`type`, `threads`, ...) are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileTarget {
    #[serde(deserialize_with = "scalar")]
    account: Option<String>,
    #[serde(deserialize_with = "scalar")]
    user: Option<String>,
    #[serde(deserialize_with = "scalar")]
    password: Option<String>,
    #[serde(deserialize_with = "scalar")]
    database: Option<String>,
    #[serde(deserialize_with = "scalar")]
    schema: Option<String>,
    #[serde(deserialize_with = "scalar")]
    warehouse: Option<String>,
    #[serde(deserialize_with = "scalar")]
    role: Option<String>,
}

/// Accept any YAML scalar as text, so an unquoted `password: 123456` or
/// numeric account survives. `null` counts as absent.
fn scalar<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(de)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar value, found {other:?}"
        ))),
    }
}

impl ProfileTarget {
    fn into_descriptor(self, origin: &str) -> Result<ConnectionDescriptor, CredentialError> {
        let need = |value: Option<String>, field: &'static str| {
            value.ok_or_else(|| CredentialError::MissingField {
                field,
                origin: origin.to_string(),
            })
        };
        Ok(ConnectionDescriptor {
            account: need(self.account, "account")?,
            user: need(self.user, "user")?,
            password: need(self.password, "password")?,
            database: need(self.database, "database")?,
            schema: need(self.schema, "schema")?,
            warehouse: need(self.warehouse, "warehouse")?,
            role: self.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        })
    }
}

impl ProfileCredentials {
    pub fn new(paths: Vec<PathBuf>, profile: &str, target: &str) -> Self {
        Self {
            paths,
            profile: profile.to_string(),
            target: target.to_string(),
        }
    }

    /// First candidate that exists as a file.
    pub fn locate(&self) -> Result<&Path, CredentialError> {
        self.paths
            .iter()
            .map(PathBuf::as_path)
            .find(|p| p.is_file())
            .ok_or_else(|| CredentialError::ProfileFileNotFound {
                searched: self.paths.clone(),
            })
    }

    fn parse(&self, path: &Path, text: &str) -> Result<ConnectionDescriptor, CredentialError> {
        let doc: Value = serde_yaml::from_str(text).map_err(|source| CredentialError::ProfileParse {
            path: path.to_path_buf(),
            source,
        })?;

        let profile = doc
            .get(self.profile.as_str())
            .ok_or_else(|| CredentialError::MissingProfile {
                name: self.profile.clone(),
                path: path.to_path_buf(),
            })?;
        let outputs = profile
            .get("outputs")
            .ok_or_else(|| CredentialError::MissingOutputs {
                profile: self.profile.clone(),
                path: path.to_path_buf(),
            })?;
        let target = outputs
            .get(self.target.as_str())
            .ok_or_else(|| CredentialError::MissingTarget {
                profile: self.profile.clone(),
                target: self.target.clone(),
                path: path.to_path_buf(),
            })?;

        let target: ProfileTarget =
            serde_yaml::from_value(target.clone()).map_err(|source| {
                CredentialError::ProfileParse {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        let origin = format!(
            "{}:{}.outputs.{}",
            path.display(),
            self.profile,
            self.target
        );
        target.into_descriptor(&origin)
    }
}

impl CredentialSource for ProfileCredentials {
    fn name(&self) -> &'static str {
        "profiles.yml"
    }

    fn resolve(&self) -> Result<Option<ConnectionDescriptor>, CredentialError> {
        let path = self.locate()?;
        debug!(path = %path.display(), "reading profile");
        let text = fs::read_to_string(path).map_err(|source| CredentialError::ProfileRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(path, &text).map(Some)
    }
}
