use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file <{0}> does not exist")]
    NotFound(String),

    #[error("transfer of {id} aborted after {sent} bytes: {source}")]
    TransferAborted {
        id: String,
        sent: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("could not generate share link for {id}: {reason}")]
    Generation { id: String, reason: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ShareError>;
