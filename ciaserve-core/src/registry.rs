use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::domain::CatalogEntry;

/// Immutable per-file record; only `progress` moves after insertion.
#[derive(Debug)]
struct Slot {
    download_url: String,
    qr_image: String,
    // f64 bits
    progress: AtomicU64,
}

impl Slot {
    fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Acquire))
    }

    fn to_entry(&self, id: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            download_url: self.download_url.clone(),
            qr_image: self.qr_image.clone(),
            progress: self.progress(),
        }
    }
}

/// Catalog membership plus live progress, shared by the watcher, every
/// download task and the HTTP readers.
///
/// Membership changes take a shard write lock; progress writes only take a
/// shard read lock and store into the entry's atomic cell, so chunk
/// accounting never queues behind a reconcile.
#[derive(Debug, Default)]
pub struct ProgressRegistry {
    entries: DashMap<String, Arc<Slot>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. The record is fully built before it is
    /// published, so readers never see it half-populated.
    pub fn upsert(&self, entry: CatalogEntry) {
        let slot = Arc::new(Slot {
            download_url: entry.download_url,
            qr_image: entry.qr_image,
            progress: AtomicU64::new(clamp_fraction(entry.progress).to_bits()),
        });
        self.entries.insert(entry.id, slot);
    }

    pub fn remove(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// No-op when `id` was removed in the meantime.
    pub fn set_progress(&self, id: &str, fraction: f64) {
        if let Some(slot) = self.entries.get(id) {
            slot.progress
                .store(clamp_fraction(fraction).to_bits(), Ordering::Release);
        }
    }

    pub fn progress(&self, id: &str) -> Option<f64> {
        self.entries.get(id).map(|s| s.progress())
    }

    pub fn get(&self, id: &str) -> Option<CatalogEntry> {
        self.entries.get(id).map(|s| s.to_entry(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the catalog ordered by id.
    pub fn snapshot(&self) -> Vec<CatalogEntry> {
        let mut out: Vec<CatalogEntry> = self
            .entries
            .iter()
            .map(|r| r.value().to_entry(r.key()))
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

fn clamp_fraction(f: f64) -> f64 {
    if f.is_nan() { 0.0 } else { f.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Shareable;

    fn entry(id: &str) -> CatalogEntry {
        CatalogEntry::discovered(
            id,
            Shareable {
                download_url: format!("http://10.0.0.2:8888/{id}"),
                qr_image: format!("<svg>{id}</svg>"),
            },
        )
    }

    #[test]
    fn upsert_then_snapshot_is_sorted_and_complete() {
        let reg = ProgressRegistry::new();
        reg.upsert(entry("b.3dsx"));
        reg.upsert(entry("a.cia"));

        let snap = reg.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].id, "a.cia");
        assert_eq!(snap[1].id, "b.3dsx");
        assert_eq!(snap[0].download_url, "http://10.0.0.2:8888/a.cia");
        assert_eq!(snap[0].qr_image, "<svg>a.cia</svg>");
        assert_eq!(snap[0].progress, 0.0);
    }

    #[test]
    fn snapshot_is_idempotent() {
        let reg = ProgressRegistry::new();
        reg.upsert(entry("a.cia"));
        reg.upsert(entry("c.cia"));
        reg.set_progress("a.cia", 0.25);
        assert_eq!(reg.snapshot(), reg.snapshot());
    }

    #[test]
    fn set_progress_on_missing_id_is_noop() {
        let reg = ProgressRegistry::new();
        reg.set_progress("ghost.cia", 0.5);
        assert!(reg.is_empty());
        assert_eq!(reg.progress("ghost.cia"), None);
    }

    #[test]
    fn set_progress_clamps() {
        let reg = ProgressRegistry::new();
        reg.upsert(entry("a.cia"));
        reg.set_progress("a.cia", 1.7);
        assert_eq!(reg.progress("a.cia"), Some(1.0));
        reg.set_progress("a.cia", -3.0);
        assert_eq!(reg.progress("a.cia"), Some(0.0));
        reg.set_progress("a.cia", f64::NAN);
        assert_eq!(reg.progress("a.cia"), Some(0.0));
    }

    #[test]
    fn remove_then_rediscover_starts_fresh() {
        let reg = ProgressRegistry::new();
        reg.upsert(entry("a.cia"));
        reg.set_progress("a.cia", 0.75);
        assert!(reg.remove("a.cia"));
        assert!(!reg.remove("a.cia"));

        reg.upsert(entry("a.cia"));
        assert_eq!(reg.progress("a.cia"), Some(0.0));
        assert_eq!(reg.ids(), vec!["a.cia".to_string()]);
    }

    #[test]
    fn concurrent_progress_writers_do_not_touch_membership() {
        let reg = Arc::new(ProgressRegistry::new());
        reg.upsert(entry("a.cia"));
        reg.upsert(entry("b.cia"));

        let handles: Vec<_> = ["a.cia", "b.cia"]
            .into_iter()
            .map(|id| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for i in 0..=100 {
                        reg.set_progress(id, i as f64 / 100.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.progress("a.cia"), Some(1.0));
        assert_eq!(reg.progress("b.cia"), Some(1.0));
    }
}
