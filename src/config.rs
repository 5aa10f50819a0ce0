//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Replaces the embedded language table when set
    pub languages_config: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            std::env::var("JUDGE_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into());
        Ok(Self {
            bind_addr: parse_bind_addr(&bind_addr)?,
            languages_config: std::env::var_os("LANGUAGES_CONFIG").map(PathBuf::from),
        })
    }
}

fn parse_bind_addr(value: &str) -> Result<SocketAddr> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid JUDGE_BIND_ADDR: {}", value))
}
