use crate::domain::Shareable;
use crate::error::Result;

/// Produces the download URL and QR payload for a newly discovered file.
pub trait ShareableGenerator: Send + Sync {
    fn generate(&self, id: &str, base_url: &str) -> Result<Shareable>;
}

pub mod qr;

pub use qr::QrSvgGenerator;

/// `{base_url}/{percent-encoded id}`
pub fn download_url(id: &str, base_url: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        crate::util::pct::encode_path_segment(id)
    )
}
