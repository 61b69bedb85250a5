use std::io::Write;

use ciaserve_core::error::Result;
use ciaserve_core::{Shareable, ShareableGenerator};
use qrcode::QrCode;
use qrcode::render::unicode;

/// Wraps a generator and echoes every new code to the terminal, so the
/// operator can scan straight from the console.
pub struct TerminalEcho<G> {
    inner: G,
}

impl<G> TerminalEcho<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

impl<G: ShareableGenerator> ShareableGenerator for TerminalEcho<G> {
    fn generate(&self, id: &str, base_url: &str) -> Result<Shareable> {
        let share = self.inner.generate(id, base_url)?;
        if let Some(block) = render_qr(&share.download_url) {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "\n{id}\n{}\n{block}", share.download_url);
        }
        Ok(share)
    }
}

/// Dense half-block rendering, light-on-dark so it scans on dark terminals.
pub fn render_qr(url: &str) -> Option<String> {
    let code = QrCode::new(url.as_bytes()).ok()?;
    Some(
        code.render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build(),
    )
}
