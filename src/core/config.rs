use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::network::dht::BUCKET_SIZE;
use crate::utils::{DhtError, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the server listens on and advertises in its contact
    pub address: String,
    /// Take the reserved all-zero id and skip joining
    pub bootstrap: bool,
    /// Where the bootstrap node listens (required for peers)
    pub bootstrap_address: Option<String>,
    /// Bucket capacity
    pub k: usize,
    /// Lookup fan-out
    pub alpha: usize,
    /// Contacts returned by an iterative lookup
    pub lookup_width: usize,
    /// Acknowledgements needed for a network STORE to succeed
    pub min_replicas: usize,
    pub ping_timeout_ms: u64,
    pub rpc_timeout_ms: u64,
    /// Per-call bound inside an iterative lookup round
    pub lookup_call_timeout_ms: u64,
    pub bootstrap_retries: usize,
    /// Upper bound of the random pause between bootstrap pings
    pub bootstrap_backoff_ms: u64,
    /// Upper bound of the random pause before joining
    pub join_jitter_ms: u64,
    pub server_workers: usize,
    pub incoming_queue: usize,
    pub outgoing_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9000".to_string(),
            bootstrap: false,
            bootstrap_address: None,
            k: BUCKET_SIZE,
            alpha: 3,
            lookup_width: 3,
            min_replicas: 3,
            ping_timeout_ms: 2000,
            rpc_timeout_ms: 2000,
            lookup_call_timeout_ms: 3000,
            bootstrap_retries: 5,
            bootstrap_backoff_ms: 2000,
            join_jitter_ms: 3000,
            server_workers: 5,
            incoming_queue: 256,
            outgoing_queue: 1024,
        }
    }
}

impl Config {
    /// Read a JSON config file; missing fields keep their defaults.
    /// Not validated, since command line flags may still fill gaps.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DhtError::ConfigError(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| DhtError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(DhtError::ConfigError("address must be set".to_string()));
        }
        if !self.bootstrap && self.bootstrap_address.is_none() {
            return Err(DhtError::ConfigError(
                "a peer node needs a bootstrap address".to_string(),
            ));
        }
        for (name, value) in [
            ("k", self.k),
            ("alpha", self.alpha),
            ("lookup_width", self.lookup_width),
            ("min_replicas", self.min_replicas),
            ("server_workers", self.server_workers),
            ("incoming_queue", self.incoming_queue),
            ("outgoing_queue", self.outgoing_queue),
        ] {
            if value == 0 {
                return Err(DhtError::ConfigError(format!("{} must be positive", name)));
            }
        }
        if self.min_replicas > self.lookup_width {
            return Err(DhtError::ConfigError(format!(
                "min_replicas ({}) cannot exceed lookup_width ({})",
                self.min_replicas, self.lookup_width
            )));
        }
        if self.lookup_call_timeout_ms < self.rpc_timeout_ms {
            return Err(DhtError::ConfigError(format!(
                "lookup_call_timeout_ms ({}) cannot be shorter than rpc_timeout_ms ({})",
                self.lookup_call_timeout_ms, self.rpc_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn lookup_call_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_call_timeout_ms)
    }

    /// Timeouts scaled down for in-process networks
    pub fn for_testing(address: impl Into<String>, bootstrap_address: Option<String>) -> Self {
        Self {
            address: address.into(),
            bootstrap: bootstrap_address.is_none(),
            bootstrap_address,
            ping_timeout_ms: 300,
            rpc_timeout_ms: 300,
            lookup_call_timeout_ms: 500,
            bootstrap_retries: 3,
            bootstrap_backoff_ms: 50,
            join_jitter_ms: 0,
            ..Self::default()
        }
    }
}
