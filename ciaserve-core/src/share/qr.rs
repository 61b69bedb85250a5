use qrcode::QrCode;
use qrcode::render::svg;

use super::{ShareableGenerator, download_url};
use crate::domain::Shareable;
use crate::error::{Result, ShareError};

/// Encodes the download URL as an inline SVG QR symbol.
#[derive(Clone, Debug)]
pub struct QrSvgGenerator {
    pub min_side: u32,
}

impl Default for QrSvgGenerator {
    fn default() -> Self {
        Self { min_side: 200 }
    }
}

impl ShareableGenerator for QrSvgGenerator {
    fn generate(&self, id: &str, base_url: &str) -> Result<Shareable> {
        let url = download_url(id, base_url);
        let code = QrCode::new(url.as_bytes()).map_err(|e| ShareError::Generation {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        let image = code
            .render::<svg::Color>()
            .min_dimensions(self.min_side, self.min_side)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build();
        Ok(Shareable {
            download_url: url,
            qr_image: image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_percent_encoded_and_image_is_svg() {
        let g = QrSvgGenerator::default();
        let s = g.generate("My Game.cia", "http://192.168.0.5:8888").unwrap();
        assert_eq!(s.download_url, "http://192.168.0.5:8888/My%20Game.cia");
        assert!(s.qr_image.contains("<svg"));
    }

    #[test]
    fn generation_is_deterministic() {
        let g = QrSvgGenerator::default();
        let a = g.generate("a.cia", "http://h:1/").unwrap();
        let b = g.generate("a.cia", "http://h:1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_payload_is_a_generation_error() {
        let g = QrSvgGenerator::default();
        let huge = "x".repeat(8000) + ".cia";
        match g.generate(&huge, "http://h:1") {
            Err(ShareError::Generation { id, .. }) => assert_eq!(id, huge),
            other => panic!("expected generation failure, got {other:?}"),
        }
    }
}
