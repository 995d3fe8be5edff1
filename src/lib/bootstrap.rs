use std::future::Future;
use std::path::PathBuf;

use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use tracing::{error, info, warn};

use crate::config::{ClusterConfig, Credentials};
use crate::endpoint::{ContactPoint, parse_endpoints};
use crate::error::BootstrapError;
use crate::migrations::{CqlMigrationRunner, Migrator, run_cql_file};
use crate::routing::RoutingPolicy;
use crate::tls::{TlsContext, build_tls_context};

/// Everything needed to open a session, resolved before any network I/O.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub keyspace: String,
    pub contact_points: Vec<ContactPoint>,
    pub routing: RoutingPolicy,
    pub tls: Option<TlsContext>,
    pub credentials: Option<Credentials>,
    /// Keyspace DDL to run before switching to the keyspace.
    pub keyspace_ddl: Option<PathBuf>,
}

impl SessionPlan {
    pub fn from_config(config: &ClusterConfig) -> Result<Self, BootstrapError> {
        let contact_points = parse_endpoints(&config.endpoints)?;
        for contact_point in &contact_points {
            info!("Registering contact point {}", contact_point);
        }

        if config.local_datacenter.is_none() {
            warn!("No local datacenter configured, routing will not prefer any datacenter");
        }
        let routing = RoutingPolicy::token_aware_dc_local(config.local_datacenter.clone());

        let tls = match &config.tls {
            Some(material) => {
                info!("TLS enabled");
                Some(build_tls_context(
                    &material.truststore,
                    &material.keystore,
                    &config.cipher_suites,
                )?)
            }
            None => {
                warn!("TLS disabled, connecting in plaintext");
                None
            }
        };

        if config.credentials.is_some() {
            info!("Using credential authentication");
        }

        let keyspace_ddl = if config.auto_migrate {
            config.ddl_keyspace_file.clone()
        } else {
            None
        };

        Ok(Self {
            keyspace: config.keyspace.clone(),
            contact_points,
            routing,
            tls,
            credentials: config.credentials.clone(),
            keyspace_ddl,
        })
    }

    /// Driver builder for this plan. Binds the keyspace unless DDL has to run first.
    pub fn session_builder(&self) -> SessionBuilder {
        let mut builder = SessionBuilder::new()
            .default_execution_profile_handle(self.routing.execution_profile_handle());

        for contact_point in &self.contact_points {
            builder = builder.known_node(contact_point.known_node());
        }

        if let Some(tls) = &self.tls {
            builder = builder.tls_context(Some(tls.ssl_context().clone()));
        }

        if let Some(credentials) = &self.credentials {
            builder = builder.user(credentials.user.clone(), credentials.password.clone());
        }

        if self.keyspace_ddl.is_none() {
            builder = builder.use_keyspace(self.keyspace.clone(), false);
        }

        builder
    }
}

/// Opens a session from a plan. Implementations make exactly one attempt.
pub trait Connector: Send + Sync {
    type Session: Send + Sync;

    fn connect(
        &self,
        plan: SessionPlan,
    ) -> impl Future<Output = Result<Self::Session, BootstrapError>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScyllaConnector;

impl Connector for ScyllaConnector {
    type Session = Session;

    async fn connect(&self, plan: SessionPlan) -> Result<Session, BootstrapError> {
        let session = plan
            .session_builder()
            .build()
            .await
            .map_err(BootstrapError::connection)?;

        if let Some(ddl) = &plan.keyspace_ddl {
            info!("Applying keyspace DDL from {}", ddl.display());
            run_cql_file(&session, ddl).await?;
            session
                .use_keyspace(plan.keyspace.as_str(), false)
                .await
                .map_err(BootstrapError::connection)?;
        }

        Ok(session)
    }
}

/// Turns a [`ClusterConfig`] into a ready session, migrating it first when asked.
pub struct ConnectionBootstrapper<C, M> {
    connector: C,
    migrator: M,
}

impl ConnectionBootstrapper<ScyllaConnector, CqlMigrationRunner> {
    pub fn scylla() -> Self {
        Self::new(ScyllaConnector, CqlMigrationRunner::new())
    }
}

impl<C, M> ConnectionBootstrapper<C, M>
where
    C: Connector,
    M: Migrator<C::Session>,
{
    pub fn new(connector: C, migrator: M) -> Self {
        Self {
            connector,
            migrator,
        }
    }

    /// On migration failure the session is dropped, closing its connections,
    /// and only the error is returned.
    pub async fn bootstrap(&self, config: &ClusterConfig) -> Result<C::Session, BootstrapError> {
        let plan = SessionPlan::from_config(config)?;
        let migration = config.migration_parameters()?;

        info!(
            "Connecting to keyspace {} via {} contact points",
            plan.keyspace,
            plan.contact_points.len()
        );
        let session = self.connector.connect(plan).await?;
        info!("Connected to keyspace {}", config.keyspace);

        if let Some(parameters) = migration {
            if let Err(e) = self.migrator.run(&session, parameters).await {
                error!("Migration failed, closing session: {}", e);
                drop(session);
                return Err(e.into());
            }
            info!("Migrations completed");
        }

        Ok(session)
    }
}

/// Bootstraps a driver session with the CQL migration runner.
pub async fn build_session(config: &ClusterConfig) -> Result<Session, BootstrapError> {
    ConnectionBootstrapper::scylla().bootstrap(config).await
}
