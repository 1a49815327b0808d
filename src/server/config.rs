//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::relay::RelayConfig;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Default directory uploaded sources are stored in
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads/";

/// Content type announced on every stream response
pub const STREAM_CONTENT_TYPE: &str = "audio/aac";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Base URL prefixed to playback references (e.g. "http://10.0.0.5:8080")
    pub public_url: String,

    /// Directory uploaded sources are written to
    pub upload_dir: PathBuf,

    /// Resume the newest stored upload on startup
    pub resume_latest: bool,

    /// Relay settings (pacing, size limit)
    pub relay: RelayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            public_url: String::new(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            resume_latest: true,
            relay: RelayConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the public base URL
    pub fn public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the upload directory
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Do not resume stored uploads on startup
    pub fn disable_resume(mut self) -> Self {
        self.resume_latest = false;
        self
    }

    /// Set relay settings
    pub fn relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Set chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.relay = self.relay.chunk_size(size);
        self
    }

    /// Set tick period
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.relay = self.relay.tick_period(period);
        self
    }

    /// Set maximum upload size in bytes
    pub fn max_source_size(mut self, size: u64) -> Self {
        self.relay = self.relay.max_source_size(size);
        self
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        self.relay.validate()
    }

    /// Playback reference for a stored upload
    pub fn playback_url(&self, name: &str) -> String {
        format!("{}/stream?path={}", self.public_url, name)
    }
}
