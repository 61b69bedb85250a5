use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShareError};

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
/// Largest chunk a transfer may buffer; each in-flight download holds up to
/// two of these.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_EXTENSIONS: [&str; 2] = ["cia", "3dsx"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShareConfig {
    /// Directory scanned (non-recursively) for eligible files.
    pub root: PathBuf,
    /// Extensions without the leading dot; matched case-insensitively.
    pub extensions: Vec<String>,
    pub port: u16,
    pub bind: IpAddr,
    /// Host placed in download URLs and QR codes.
    pub advertise_host: String,
    pub poll_interval_ms: u64,
    pub chunk_size: usize,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            advertise_host: Ipv4Addr::LOCALHOST.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ShareConfig {
    pub fn base_url(&self) -> String {
        let host = &self.advertise_host;
        if host.contains(':') && !host.starts_with('[') {
            format!("http://[{}]:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ShareError::Config("chunk size must be non-zero".into()));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ShareError::Config(format!(
                "chunk size {} exceeds the {MAX_CHUNK_SIZE} byte limit",
                self.chunk_size
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ShareError::Config("poll interval must be non-zero".into()));
        }
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(ShareError::Config(
                "at least one file extension is required".into(),
            ));
        }
        Ok(())
    }
}
