use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ShareConfig;
use crate::domain::{CatalogEntry, Shareable};
use crate::error::Result;
use crate::registry::ProgressRegistry;
use crate::share::ShareableGenerator;

pub mod filter;

use filter::{ExtensionFilter, list_eligible};

/// What one reconcile cycle changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl ReconcileReport {
    pub fn is_quiet(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.failed.is_empty()
    }
}

/// Keeps the registry in step with the eligible files in the serving root.
/// Sole writer of catalog membership.
pub struct CatalogWatcher {
    root: PathBuf,
    filter: ExtensionFilter,
    base_url: String,
    interval: Duration,
    registry: Arc<ProgressRegistry>,
    generator: Arc<dyn ShareableGenerator>,
}

impl CatalogWatcher {
    pub fn new(
        cfg: &ShareConfig,
        registry: Arc<ProgressRegistry>,
        generator: Arc<dyn ShareableGenerator>,
    ) -> Self {
        Self {
            root: cfg.root.clone(),
            filter: ExtensionFilter::from_config(cfg),
            base_url: cfg.base_url(),
            interval: cfg.poll_interval(),
            registry,
            generator,
        }
    }

    pub fn registry(&self) -> &Arc<ProgressRegistry> {
        &self.registry
    }

    /// One poll: add new files, drop vanished ones.
    ///
    /// Listing and URL/QR generation run on the blocking pool so a slow disk
    /// only stretches this cycle.
    pub async fn reconcile(&self) -> ReconcileReport {
        let root = self.root.clone();
        let filter = self.filter.clone();
        let listed = tokio::task::spawn_blocking(move || list_eligible(&root, &filter))
            .await
            .map_err(std::io::Error::other)
            .and_then(|r| r);
        let on_disk = match listed {
            Ok(names) => names,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "listing failed, treating as empty");
                Vec::new()
            }
        };

        let mut report = ReconcileReport::default();

        let present: HashSet<&str> = on_disk.iter().map(String::as_str).collect();
        let stale: Vec<String> = self
            .registry
            .ids()
            .into_iter()
            .filter(|id| !present.contains(id.as_str()))
            .collect();
        for id in stale {
            if self.registry.remove(&id) {
                info!(id = %id, "file gone, removed from catalog");
                report.removed.push(id);
            }
        }

        let fresh: Vec<String> = on_disk
            .into_iter()
            .filter(|id| !self.registry.contains(id))
            .collect();
        if fresh.is_empty() {
            return report;
        }

        let generator = Arc::clone(&self.generator);
        let base_url = self.base_url.clone();
        let generated = tokio::task::spawn_blocking(move || {
            fresh
                .into_iter()
                .map(|id| {
                    let res = generator.generate(&id, &base_url);
                    (id, res)
                })
                .collect::<Vec<(String, Result<Shareable>)>>()
        })
        .await;

        let generated = match generated {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "share generation task failed");
                return report;
            }
        };

        for (id, res) in generated {
            match res {
                Ok(share) => {
                    info!(id = %id, url = %share.download_url, "sharing new file");
                    self.registry.upsert(CatalogEntry::discovered(id.clone(), share));
                    report.added.push(id);
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "skipping file this cycle");
                    report.failed.push(id);
                }
            }
        }
        report
    }

    /// Reconcile on every tick until `shutdown` flips to true or its sender
    /// is dropped. The first cycle runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.reconcile().await;
                    if !report.is_quiet() {
                        debug!(
                            added = report.added.len(),
                            removed = report.removed.len(),
                            failed = report.failed.len(),
                            total = self.registry.len(),
                            "catalog reconciled"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("catalog watcher stopping");
                        return;
                    }
                }
            }
        }
    }
}
