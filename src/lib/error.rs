use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use openssl::error::ErrorStack;
use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid cluster configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    #[error("failed to build TLS context: {0}")]
    Tls(#[from] ErrorStack),

    #[error("failed to connect to cluster: {0}")]
    Connection(#[source] BoxError),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl BootstrapError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn connection(cause: impl Into<BoxError>) -> Self {
        Self::Connection(cause.into())
    }
}

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("cannot read keystore {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Bad passphrase and malformed containers both land here; OpenSSL does not
    /// distinguish them reliably.
    #[error("cannot open keystore {path} (bad passphrase or not a PKCS#12 container): {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ErrorStack,
    },

    #[error("keystore {path} holds no private key and certificate")]
    MissingIdentity { path: PathBuf },

    #[error("private key in keystore {path} does not match its certificate: {source}")]
    KeyMismatch {
        path: PathBuf,
        #[source]
        source: ErrorStack,
    },

    #[error("truststore {path} holds no certificates")]
    NoTrustedCertificates { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("cannot read migration changelog {path}: {source}")]
    Changelog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read migration script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("migration {name} was applied with checksum {recorded}, script now hashes to {actual}")]
    ChecksumMismatch {
        name: String,
        recorded: String,
        actual: String,
    },

    #[error("migration statement failed: {0}")]
    Execution(#[source] BoxError),
}

impl MigrationError {
    pub fn execution(cause: impl Into<BoxError>) -> Self {
        Self::Execution(cause.into())
    }
}
