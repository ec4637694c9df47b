//! TOML configuration file for the proxy binary.

use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tether_core::BalancerConfig;

/// Certificate and key locations for TLS termination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TlsConfig {
    /// PEM certificate chain.
    pub cert_path: PathBuf,
    /// PEM PKCS#8 private key.
    pub key_path: PathBuf,
}

/// Full proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Address the redirect front listens on.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Serve HTTPS when present.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Where to write each health snapshot as JSON.
    #[serde(default)]
    pub status_file: Option<PathBuf>,
    /// Name of the session cookie carrying the client assignment.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Key signing the session cookie; a random per-process key when absent.
    #[serde(default)]
    pub cookie_secret: Option<String>,
    /// Backends and probe cadence.
    #[serde(flatten)]
    pub balancer: BalancerConfig,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_cookie_name() -> String {
    "tether_session".to_string()
}

impl AppConfig {
    /// Read and parse a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse config text.
    pub fn parse(raw: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(toml::from_str(raw)?)
    }
}
