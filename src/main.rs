use anyhow::{Context, Result};
use cassandra_bootstrap::constants::ENV_CONFIG_FILE;
use cassandra_bootstrap::{ClusterConfig, RawClusterConfig, build_session, health_check};
use dotenv::dotenv;
use std::env;
use tracing::{error, info};

fn load_config() -> Result<ClusterConfig> {
    let raw = match env::var(ENV_CONFIG_FILE) {
        Ok(path) => {
            info!("Loading cluster configuration from {}", path);
            RawClusterConfig::from_json_file(&path)?
        }
        Err(_) => RawClusterConfig::from_env()?,
    };

    raw.validate().context("cluster configuration rejected")
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Connecting to cluster...");
    let session = match build_session(&config).await {
        Ok(session) => {
            info!("Session ready on keyspace {}", config.keyspace);
            session
        }
        Err(e) => {
            error!("Failed to bootstrap session: {}", e);
            std::process::exit(1);
        }
    };

    match health_check(&session).await {
        Ok(version) => info!("Cluster reachable, release version {}", version),
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}
