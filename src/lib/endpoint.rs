use std::fmt;

use crate::constants::DEFAULT_CQL_PORT;
use crate::error::BootstrapError;

/// An address the driver uses to discover the rest of the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactPoint {
    Host(String),
    HostPort(String, u16),
}

impl ContactPoint {
    /// Splits on the first colon. Anything after it must be a port number.
    pub fn parse(endpoint: &str) -> Result<Self, BootstrapError> {
        let endpoint = endpoint.trim();

        let contact_point = match endpoint.split_once(':') {
            Some((host, port)) => {
                let port = port.trim().parse::<u16>().map_err(|e| {
                    BootstrapError::config(format!(
                        "endpoint '{}' has an invalid port '{}': {}",
                        endpoint, port, e
                    ))
                })?;
                ContactPoint::HostPort(host.trim().to_string(), port)
            }
            None => ContactPoint::Host(endpoint.to_string()),
        };

        if contact_point.host().is_empty() {
            return Err(BootstrapError::config(format!(
                "endpoint '{}' has no host",
                endpoint
            )));
        }

        Ok(contact_point)
    }

    pub fn host(&self) -> &str {
        match self {
            ContactPoint::Host(host) | ContactPoint::HostPort(host, _) => host,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            ContactPoint::Host(_) => DEFAULT_CQL_PORT,
            ContactPoint::HostPort(_, port) => *port,
        }
    }

    /// Bare hosts are handed over without a port so the driver applies its own default.
    pub fn known_node(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContactPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactPoint::Host(host) => write!(f, "{}", host),
            ContactPoint::HostPort(host, port) => write!(f, "{}:{}", host, port),
        }
    }
}

pub fn parse_endpoints<S: AsRef<str>>(endpoints: &[S]) -> Result<Vec<ContactPoint>, BootstrapError> {
    if endpoints.is_empty() {
        return Err(BootstrapError::config("endpoint list is empty"));
    }

    endpoints
        .iter()
        .map(|endpoint| ContactPoint::parse(endpoint.as_ref()))
        .collect()
}
