pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod endpoint;
pub mod error;
pub mod health;
pub mod migrations;
pub mod routing;
pub mod tls;

pub use bootstrap::{ConnectionBootstrapper, Connector, ScyllaConnector, SessionPlan, build_session};
pub use config::{ClusterConfig, Credentials, RawClusterConfig};
pub use error::{BootstrapError, KeystoreError, MigrationError};
pub use health::health_check;
pub use migrations::{CqlMigrationRunner, MigrationParameters, Migrator};
pub use tls::{CipherSuite, KeystoreDescriptor, TlsContext, TlsMaterial, build_tls_context};
