use super::{ConnectionDescriptor, CredentialError, CredentialSource, DEFAULT_ROLE};

pub const ACCOUNT_VAR: &str = "SNOWFLAKE_ACCOUNT";
pub const USER_VAR: &str = "SNOWFLAKE_USER";
pub const PASSWORD_VAR: &str = "SNOWFLAKE_PASSWORD";
pub const DATABASE_VAR: &str = "SNOWFLAKE_DATABASE";
pub const SCHEMA_VAR: &str = "SNOWFLAKE_SCHEMA";
pub const WAREHOUSE_VAR: &str = "SNOWFLAKE_WAREHOUSE";
pub const ROLE_VAR: &str = "SNOWFLAKE_ROLE";

/// Credentials from `SNOWFLAKE_*` variables (CI path). Applies only when
/// `SNOWFLAKE_ACCOUNT` is set and non-empty; never touches the filesystem.
pub struct EnvCredentials<F> {
    lookup: F,
}

fn process_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl EnvCredentials<fn(&str) -> Option<String>> {
    pub fn from_process() -> Self {
        Self {
            lookup: process_var,
        }
    }
}

impl<F> EnvCredentials<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Read variables through `lookup` instead of the process environment.
    pub fn with_lookup(lookup: F) -> Self {
        Self { lookup }
    }

    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn require(&self, name: &'static str) -> Result<String, CredentialError> {
        self.get(name)
            .ok_or(CredentialError::MissingEnvVar { name })
    }
}

impl<F> CredentialSource for EnvCredentials<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn name(&self) -> &'static str {
        "environment"
    }

    fn resolve(&self) -> Result<Option<ConnectionDescriptor>, CredentialError> {
        let Some(account) = self.get(ACCOUNT_VAR) else {
            return Ok(None);
        };

        Ok(Some(ConnectionDescriptor {
            account,
            user: self.require(USER_VAR)?,
            password: self.require(PASSWORD_VAR)?,
            database: self.require(DATABASE_VAR)?,
            schema: self.require(SCHEMA_VAR)?,
            warehouse: self.require(WAREHOUSE_VAR)?,
            role: self.get(ROLE_VAR).unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        }))
    }
}
