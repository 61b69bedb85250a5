// ciaserve_core/src/domain.rs
use serde::Serialize;

/// URL + QR pair produced once per discovered file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shareable {
    pub download_url: String,
    pub qr_image: String,
}

/// One shareable file as seen by readers of the registry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    pub download_url: String,
    pub qr_image: String,
    pub progress: f64,
}

impl CatalogEntry {
    pub fn discovered(id: impl Into<String>, share: Shareable) -> Self {
        Self {
            id: id.into(),
            download_url: share.download_url,
            qr_image: share.qr_image,
            progress: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every byte captured at transfer start reached the sink.
    Completed { bytes: u64, chunks: u64 },
    /// The sink went away; nothing further was read.
    Cancelled { bytes: u64, chunks: u64 },
}

impl TransferOutcome {
    pub fn bytes(&self) -> u64 {
        match self {
            TransferOutcome::Completed { bytes, .. } | TransferOutcome::Cancelled { bytes, .. } => {
                *bytes
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed { .. })
    }
}
