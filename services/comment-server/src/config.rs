use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// PostgreSQL URL. Without one the server keeps comments in memory.
    pub database_url: Option<String>,
    pub static_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_string("BIND_ADDR", "0.0.0.0:8989")
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a valid host:port")?;

        let database_url = std::env::var("DSN").ok().filter(|dsn| !dsn.is_empty());
        let static_dir = PathBuf::from(env_string("STATIC_DIR", "static"));

        Ok(Self {
            bind_addr,
            database_url,
            static_dir,
        })
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
