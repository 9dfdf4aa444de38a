//! Server configuration
//!
//! Defines all configurable parameters for the server including the listen
//! address, the artifact root and the storage backend.

use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8112";
const DEFAULT_ARTIFACTS_DIR: &str = "./ciwi-artifacts";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: String,

    /// Root directory holding `<jobID>/<relPath>` artifact files
    pub artifacts_dir: PathBuf,

    /// PostgreSQL connection string; the in-memory store is used when unset
    pub database_url: Option<String>,

    /// Size of the database connection pool
    pub db_max_connections: u32,

    /// Largest request body accepted, which bounds artifact uploads
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Creates a new configuration with defaults
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            artifacts_dir: artifacts_dir.into(),
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - CIWI_BIND_ADDR (optional, default: 0.0.0.0:8112)
    /// - CIWI_ARTIFACTS_DIR (optional, default: ./ciwi-artifacts)
    /// - DATABASE_URL (optional, selects the PostgreSQL store)
    /// - CIWI_DB_MAX_CONNECTIONS (optional, default: 10)
    /// - CIWI_MAX_UPLOAD_BYTES (optional, default: 256 MiB)
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("CIWI_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let artifacts_dir = std::env::var("CIWI_ARTIFACTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTIFACTS_DIR));

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let db_max_connections = parse_env("CIWI_DB_MAX_CONNECTIONS")?
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

        let max_upload_bytes =
            parse_env("CIWI_MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Ok(Self {
            bind_addr,
            artifacts_dir,
            database_url,
            db_max_connections,
            max_upload_bytes,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.trim().is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.artifacts_dir.as_os_str().is_empty() {
            anyhow::bail!("artifacts_dir cannot be empty");
        }

        if self.db_max_connections == 0 {
            anyhow::bail!("db_max_connections must be greater than 0");
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than 0");
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a number, got {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACTS_DIR)
    }
}
