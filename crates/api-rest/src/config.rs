//! Server runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the router and the
//! listener. Handlers never read environment variables.

use std::path::{Path, PathBuf};

/// Default storage root, relative to the working directory.
pub const DEFAULT_STORAGE_ROOT: &str = "images";

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 4040;

/// Default upload limit: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Server configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    storage_root: PathBuf,
    host: String,
    port: u16,
    max_upload_bytes: usize,
}

impl ServerConfig {
    /// Create a new `ServerConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidInput` if the host is blank, the port is 0, or the upload
    /// limit is 0.
    pub fn new(
        storage_root: PathBuf,
        host: String,
        port: u16,
        max_upload_bytes: usize,
    ) -> Result<Self, ConfigError> {
        if host.trim().is_empty() {
            return Err(ConfigError::InvalidInput("host cannot be empty".into()));
        }

        if port == 0 {
            return Err(ConfigError::InvalidInput("port cannot be 0".into()));
        }

        if max_upload_bytes == 0 {
            return Err(ConfigError::InvalidInput(
                "max_upload_bytes must be greater than 0".into(),
            ));
        }

        Ok(Self {
            storage_root,
            host,
            port,
            max_upload_bytes,
        })
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Address suitable for `TcpListener::bind`, resolving host names.
    pub fn bind_target(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
