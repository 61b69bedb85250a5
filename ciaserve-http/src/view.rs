use ciaserve_core::CatalogEntry;
use maud::{DOCTYPE, Markup, PreEscaped, html};

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2em; background: #fafafa; }
.entry { display: inline-block; margin: 1em; padding: 1em; background: #fff; border: 1px solid #ddd; text-align: center; }
.entry svg { width: 200px; height: 200px; }
.name { font-weight: bold; margin: .5em 0; word-break: break-all; max-width: 220px; }
progress { width: 200px; }
"#;

// Reloads when the catalog changes, otherwise just moves the bars.
const POLL_SCRIPT: &str = r#"
async function poll() {
  try {
    const res = await fetch('/progress', { cache: 'no-store' });
    const data = await res.json();
    const shown = Array.from(document.querySelectorAll('.entry')).map(e => e.dataset.id);
    const ids = Object.keys(data);
    if (ids.length !== shown.length || ids.some(id => !shown.includes(id))) {
      location.reload();
      return;
    }
    for (const entry of document.querySelectorAll('.entry')) {
      const item = data[entry.dataset.id];
      const pct = Math.round(item.progress * 100);
      entry.querySelector('progress').value = pct;
      entry.querySelector('.pct').textContent = pct + '%';
    }
  } catch (e) {}
  setTimeout(poll, 1000);
}
poll();
"#;

fn percent(progress: f64) -> u32 {
    (progress * 100.0).round() as u32
}

/// Home page listing every shared file with its QR code and live progress.
pub fn render_home(entries: &[CatalogEntry]) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "ciaserve" }
                style { (PreEscaped(STYLE)) }
            }
            body {
                h1 { "Scan a code with your homebrew manager" }
                @if entries.is_empty() {
                    p { "No files are being shared yet. Drop some into the shared folder." }
                }
                @for e in entries {
                    div.entry data-id=(e.id) {
                        // generated by the QR encoder, not user text
                        (PreEscaped(&e.qr_image))
                        div.name {
                            a href=(e.download_url) { (e.id) }
                        }
                        progress max="100" value=(percent(e.progress)) {}
                        " "
                        span.pct { (percent(e.progress)) "%" }
                    }
                }
                script { (PreEscaped(POLL_SCRIPT)) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_entries_with_escaped_names() {
        let entries = vec![CatalogEntry {
            id: "<b>&.cia".into(),
            download_url: "http://h:8888/%3Cb%3E%26.cia".into(),
            qr_image: "<svg></svg>".into(),
            progress: 0.5,
        }];
        let html = render_home(&entries).into_string();
        assert!(html.contains("data-id=\"&lt;b&gt;&amp;.cia\""));
        assert!(html.contains(">&lt;b&gt;&amp;.cia</a>"));
        assert!(!html.contains("<b>&"));
        assert!(html.contains("<svg></svg>"));
        assert!(html.contains("50%"));
        assert!(!html.contains("No files are being shared"));
    }

    #[test]
    fn empty_catalog_says_so() {
        let html = render_home(&[]).into_string();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("No files are being shared yet"));
        assert!(html.contains("fetch('/progress'"));
    }
}
