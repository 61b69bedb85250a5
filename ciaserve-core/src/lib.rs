#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod error;
pub mod registry;
pub mod stream;

pub mod util {
    pub mod pct;
}

pub mod catalog;
pub mod share;

// Re-exports: stable API surface
pub use catalog::{CatalogWatcher, ReconcileReport};
pub use config::ShareConfig;
pub use domain::{CatalogEntry, Shareable, TransferOutcome};
pub use error::{Result, ShareError};
pub use registry::ProgressRegistry;
pub use share::{QrSvgGenerator, ShareableGenerator};
pub use stream::{ChunkSink, ChunkStreamer, ProgressObserver, SinkClosed};
