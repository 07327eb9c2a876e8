//! Environment-variable configuration loading.
//!
//! No config-file format is introduced — reads its variables straight
//! from `std::env` rather than a config crate.

use std::env;

use thiserror::Error;

/// Failure loading configuration from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// A `host:port` value failed validation.
    #[error("{name} must be in 'host:port' format, got '{value}'")]
    InvalidAddress { name: String, value: String },

    /// A `host:port` value's port was out of range or non-numeric.
    #[error("{name} has invalid port: '{value}'")]
    InvalidPort { name: String, value: String },

    /// `API_PORT` failed to parse as an integer.
    #[error("API_PORT must be a valid integer, got '{0}'")]
    InvalidApiPort(String),
}

/// Fully resolved process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// This replica's own `host:port` address.
    pub self_address: String,
    /// Every other replica's `host:port` address (empty → single node).
    pub partner_addresses: Vec<String>,
    /// Port the HTTP boundary listens on.
    pub api_port: u16,
}

impl Config {
    /// Load configuration from the process environment:
    /// `SELF_ADDRESS` (required), `PARTNER_ADDRESSES` (optional,
    /// comma-separated), `API_PORT` (default 5000).
    pub fn from_env() -> Result<Self, ConfigError> {
        let self_address = env::var("SELF_ADDRESS")
            .map_err(|_| ConfigError::Missing("SELF_ADDRESS"))?;
        validate_address(&self_address, "SELF_ADDRESS")?;

        let mut partner_addresses = Vec::new();
        if let Ok(raw) = env::var("PARTNER_ADDRESSES") {
            for addr in raw.split(',') {
                let addr = addr.trim();
                if addr.is_empty() {
                    continue;
                }
                validate_address(addr, "PARTNER_ADDRESSES")?;
                partner_addresses.push(addr.to_string());
            }
        }

        let api_port = match env::var("API_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidApiPort(raw))?,
            Err(_) => 5000,
        };

        Ok(Config {
            self_address,
            partner_addresses,
            api_port,
        })
    }

    /// Whether this process runs as a single-node cluster (no partners).
    pub fn is_single_node(&self) -> bool {
        self.partner_addresses.is_empty()
    }

    /// `self_address` plus every partner, in the input order the leader
    /// election bootstrap uses to derive node ids — see
    /// `lockd_raft::assign_node_ids`.
    pub fn all_addresses(&self) -> Vec<String> {
        let mut all = vec![self.self_address.clone()];
        all.extend(self.partner_addresses.iter().cloned());
        all
    }
}

fn validate_address(address: &str, name: &str) -> Result<(), ConfigError> {
    let Some((host, port)) = address.split_once(':') else {
        return Err(ConfigError::InvalidAddress {
            name: name.to_string(),
            value: address.to_string(),
        });
    };
    if host.is_empty() {
        return Err(ConfigError::InvalidAddress {
            name: name.to_string(),
            value: address.to_string(),
        });
    }
    match port.parse::<u32>() {
        Ok(p) if p >= 1 && p <= 65535 => Ok(()),
        _ => Err(ConfigError::InvalidPort {
            name: name.to_string(),
            value: address.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear() {
        for key in ["SELF_ADDRESS", "PARTNER_ADDRESSES", "API_PORT"] {
            env::remove_var(key);
        }
    }

    #[test]
    fn missing_self_address_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        assert_eq!(
            Config::from_env().unwrap_err(),
            ConfigError::Missing("SELF_ADDRESS")
        );
    }

    #[test]
    fn single_node_defaults_and_api_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("SELF_ADDRESS", "127.0.0.1:7000");
        let cfg = Config::from_env().unwrap();
        assert!(cfg.is_single_node());
        assert_eq!(cfg.api_port, 5000);
        clear();
    }

    #[test]
    fn partner_addresses_are_split_and_trimmed() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("SELF_ADDRESS", "127.0.0.1:7000");
        env::set_var("PARTNER_ADDRESSES", " 127.0.0.1:7001, 127.0.0.1:7002 ");
        env::set_var("API_PORT", "6000");
        let cfg = Config::from_env().unwrap();
        assert_eq!(
            cfg.partner_addresses,
            vec!["127.0.0.1:7001".to_string(), "127.0.0.1:7002".to_string()]
        );
        assert_eq!(cfg.api_port, 6000);
        clear();
    }

    #[test]
    fn invalid_port_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("SELF_ADDRESS", "127.0.0.1:70000");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::InvalidPort { .. }
        ));
        clear();
    }
}
