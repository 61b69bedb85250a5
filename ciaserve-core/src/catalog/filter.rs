use std::path::Path;

use tracing::debug;

use crate::config::ShareConfig;

/// Decides which names in the serving root are shareable.
#[derive(Clone, Debug)]
pub struct ExtensionFilter {
    exts: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let exts = exts
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { exts }
    }

    pub fn from_config(cfg: &ShareConfig) -> Self {
        Self::new(&cfg.extensions)
    }

    pub fn extensions(&self) -> &[String] {
        &self.exts
    }

    pub fn matches(&self, name: &str) -> bool {
        match Path::new(name).extension().and_then(|e| e.to_str()) {
            Some(ext) => self.exts.iter().any(|e| e.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    /// A client-supplied id is servable only if it names a single eligible
    /// entry directly inside the root.
    pub fn accepts_id(&self, id: &str) -> bool {
        !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\', '\0'])
            && self.matches(id)
    }
}

/// Eligible regular files directly inside `root`, sorted by name.
///
/// Fails only when `root` itself cannot be read; unreadable children are
/// skipped.
pub fn list_eligible(root: &Path, filter: &ExtensionFilter) -> std::io::Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        if filter.matches(name) {
            out.push(name.to_string());
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_configured_extensions_case_insensitively() {
        let f = ExtensionFilter::new([".cia", "3dsx"]);
        assert!(f.matches("game.cia"));
        assert!(f.matches("GAME.CIA"));
        assert!(f.matches("tool.3dsx"));
        assert!(!f.matches("notes.txt"));
        assert!(!f.matches("cia"));
        assert!(!f.matches("archive.cia.bak"));
    }

    #[test]
    fn rejects_ids_that_escape_the_root() {
        let f = ExtensionFilter::new(["cia"]);
        assert!(f.accepts_id("a b.cia"));
        assert!(!f.accepts_id("../secret.cia"));
        assert!(!f.accepts_id("sub/a.cia"));
        assert!(!f.accepts_id("sub\\a.cia"));
        assert!(!f.accepts_id(""));
        assert!(!f.accepts_id("readme.md"));
    }

    #[test]
    fn lists_only_top_level_eligible_files() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("b.3dsx"), b"x")?;
        std::fs::write(dir.path().join("a.cia"), b"y")?;
        std::fs::write(dir.path().join("skip.txt"), b"z")?;
        std::fs::create_dir(dir.path().join("nested.cia"))?;
        std::fs::create_dir(dir.path().join("sub"))?;
        std::fs::write(dir.path().join("sub").join("deep.cia"), b"w")?;

        let f = ExtensionFilter::new(["cia", "3dsx"]);
        let names = list_eligible(dir.path(), &f)?;
        assert_eq!(names, vec!["a.cia".to_string(), "b.3dsx".to_string()]);
        Ok(())
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        let f = ExtensionFilter::new(["cia"]);
        assert!(list_eligible(&gone, &f).is_err());
    }
}
