use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    /// `MISSIVE_REQUEST_TIMEOUT_SECS=0` disables the per-request deadline.
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("MISSIVE_DB_PATH").unwrap_or_else(|| "missive.db".into());
        let host = lookup("MISSIVE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("MISSIVE_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("MISSIVE_PORT must be a port number")?;
        let timeout_secs: u64 = lookup("MISSIVE_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "5".into())
            .parse()
            .context("MISSIVE_REQUEST_TIMEOUT_SECS must be a whole number of seconds")?;

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", host, port))?;

        Ok(Self {
            db_path: db_path.into(),
            addr,
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }
}
