use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::constants::{
    ENV_AUTO_MIGRATE, ENV_CIPHER_SUITES, ENV_DDL_KEYSPACE_FILE, ENV_ENDPOINTS, ENV_KEYSPACE,
    ENV_KEYSTORE_PASSWORD, ENV_KEYSTORE_PATH, ENV_LOCAL_DC, ENV_MIGRATION_FILE,
    ENV_MIGRATION_PATH, ENV_PASSWORD, ENV_TRUSTSTORE_PASSWORD, ENV_TRUSTSTORE_PATH, ENV_USER,
    MAX_KEYSPACE_NAME_LEN,
};
use crate::error::BootstrapError;
use crate::migrations::MigrationParameters;
use crate::tls::{CipherSuite, KeystoreDescriptor, TlsMaterial};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated cluster configuration. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub keyspace: String,
    pub endpoints: Vec<String>,
    pub credentials: Option<Credentials>,
    pub tls: Option<TlsMaterial>,
    pub cipher_suites: Vec<CipherSuite>,
    pub local_datacenter: Option<String>,
    pub auto_migrate: bool,
    pub migration_file: Option<PathBuf>,
    pub migration_path: Option<PathBuf>,
    pub ddl_keyspace_file: Option<PathBuf>,
}

impl ClusterConfig {
    pub fn new(keyspace: impl Into<String>, endpoints: Vec<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            endpoints,
            credentials: None,
            tls: None,
            cipher_suites: CipherSuite::defaults(),
            local_datacenter: None,
            auto_migrate: false,
            migration_file: None,
            migration_path: None,
            ddl_keyspace_file: None,
        }
    }

    /// `None` unless auto-migration is on. Auto-migration without a changelog is
    /// rejected here too, since `ClusterConfig` can be built without `validate`.
    pub fn migration_parameters(&self) -> Result<Option<MigrationParameters>, BootstrapError> {
        if !self.auto_migrate {
            return Ok(None);
        }

        let changelog = self.migration_file.clone().ok_or_else(|| {
            BootstrapError::config("autoMigrate is enabled but migrationFile is not set")
        })?;
        Ok(Some(MigrationParameters {
            keyspace: self.keyspace.clone(),
            changelog,
            scripts_dir: self.migration_path.clone(),
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawKeystore {
    pub path: Option<String>,
    pub password: Option<String>,
}

/// Configuration as read from the environment or a file: every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClusterConfig {
    pub keyspace: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub truststore: Option<RawKeystore>,
    pub keystore: Option<RawKeystore>,
    pub auto_migrate: Option<bool>,
    pub migration_file: Option<String>,
    pub migration_path: Option<String>,
    pub ddl_keyspace_file: Option<String>,
    pub local_datacenter: Option<String>,
    pub cipher_suites: Option<Vec<String>>,
}

impl RawClusterConfig {
    pub fn from_env() -> Result<Self, BootstrapError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, BootstrapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let keystore_from = |path_key: &str, password_key: &str| {
            let path = get(path_key);
            let password = get(password_key);
            (path.is_some() || password.is_some()).then_some(RawKeystore { path, password })
        };

        let auto_migrate = get(ENV_AUTO_MIGRATE)
            .map(|value| parse_bool(ENV_AUTO_MIGRATE, &value))
            .transpose()?;

        Ok(Self {
            keyspace: get(ENV_KEYSPACE),
            endpoints: get(ENV_ENDPOINTS).map(|v| split_list(&v)).unwrap_or_default(),
            user: get(ENV_USER),
            password: get(ENV_PASSWORD),
            truststore: keystore_from(ENV_TRUSTSTORE_PATH, ENV_TRUSTSTORE_PASSWORD),
            keystore: keystore_from(ENV_KEYSTORE_PATH, ENV_KEYSTORE_PASSWORD),
            auto_migrate,
            migration_file: get(ENV_MIGRATION_FILE),
            migration_path: get(ENV_MIGRATION_PATH),
            ddl_keyspace_file: get(ENV_DDL_KEYSPACE_FILE),
            local_datacenter: get(ENV_LOCAL_DC),
            cipher_suites: get(ENV_CIPHER_SUITES).map(|v| split_list(&v)),
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            BootstrapError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            BootstrapError::config(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    pub fn validate(self) -> Result<ClusterConfig, BootstrapError> {
        let keyspace = self
            .keyspace
            .ok_or_else(|| BootstrapError::config("keyspace is not set"))?;
        validate_keyspace_name(&keyspace)?;

        if self.endpoints.is_empty() {
            return Err(BootstrapError::config("no endpoints configured"));
        }

        let credentials = match (self.user, self.password) {
            (Some(user), Some(password)) => Some(Credentials { user, password }),
            (None, None) => None,
            _ => {
                warn!("Only one of user/password is set, connecting without credentials");
                None
            }
        };

        let truststore = self
            .truststore
            .map(|raw| keystore_descriptor("truststore", raw))
            .transpose()?;
        let keystore = self
            .keystore
            .map(|raw| keystore_descriptor("keystore", raw))
            .transpose()?;
        let tls = match (truststore, keystore) {
            (Some(truststore), Some(keystore)) => Some(TlsMaterial {
                truststore,
                keystore,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(BootstrapError::config(
                    "truststore is set without a keystore; TLS needs both",
                ));
            }
            (None, Some(_)) => {
                return Err(BootstrapError::config(
                    "keystore is set without a truststore; TLS needs both",
                ));
            }
        };

        let cipher_suites = match self.cipher_suites {
            Some(names) => names
                .iter()
                .map(|name| name.parse())
                .collect::<Result<Vec<CipherSuite>, _>>()?,
            None => CipherSuite::defaults(),
        };
        if cipher_suites.is_empty() {
            return Err(BootstrapError::config("cipher suite allow-list is empty"));
        }

        let auto_migrate = self.auto_migrate.unwrap_or(false);
        let migration_file = self.migration_file.map(PathBuf::from);
        if auto_migrate && migration_file.is_none() {
            return Err(BootstrapError::config(
                "autoMigrate is enabled but migrationFile is not set",
            ));
        }

        Ok(ClusterConfig {
            keyspace,
            endpoints: self.endpoints,
            credentials,
            tls,
            cipher_suites,
            local_datacenter: self.local_datacenter,
            auto_migrate,
            migration_file,
            migration_path: self.migration_path.map(PathBuf::from),
            ddl_keyspace_file: self.ddl_keyspace_file.map(PathBuf::from),
        })
    }
}

fn keystore_descriptor(name: &str, raw: RawKeystore) -> Result<KeystoreDescriptor, BootstrapError> {
    match (raw.path, raw.password) {
        (Some(path), Some(password)) => Ok(KeystoreDescriptor::new(path, password)),
        (Some(_), None) => Err(BootstrapError::config(format!("{}.password is not set", name))),
        (None, _) => Err(BootstrapError::config(format!("{}.path is not set", name))),
    }
}

/// Keyspace names are spliced into CQL, so only plain identifiers pass.
pub fn validate_keyspace_name(keyspace: &str) -> Result<(), BootstrapError> {
    let valid = !keyspace.is_empty()
        && keyspace.len() <= MAX_KEYSPACE_NAME_LEN
        && keyspace.starts_with(|c: char| c.is_ascii_alphabetic())
        && keyspace.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(BootstrapError::config(format!(
            "'{}' is not a valid keyspace name",
            keyspace
        )))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, BootstrapError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(BootstrapError::config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}
