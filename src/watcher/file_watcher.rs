use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::{ChangeBatch, ChangeSource, ChangeStream, WatchSet};
use crate::error::{Error, Result};

/// OS-level watcher feeding matching changes into a [`ChangeStream`].
///
/// Notifications arrive on notify's own thread; only paths covered by the [`WatchSet`]
/// are forwarded. The underlying watcher stops when this value is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    set: Arc<WatchSet>,
    stream: ChangeStream,
}

impl FileWatcher {
    /// Start watching `patterns` relative to `base`, coalescing over `scan_period`.
    ///
    /// Any setup failure (no patterns, bad pattern, missing base or root directory, OS
    /// watcher error) is an [`Error::Watch`]; callers treat it as fatal rather than
    /// running unwatched.
    pub fn start(patterns: &[String], base: &Path, scan_period: Duration) -> Result<Self> {
        if patterns.is_empty() {
            return Err(Error::Watch {
                target: base.display().to_string(),
                reason: "no watch patterns given".to_string(),
            });
        }
        let base = std::fs::canonicalize(base).map_err(|e| Error::Watch {
            target: base.display().to_string(),
            reason: e.to_string(),
        })?;
        let set = Arc::new(WatchSet::new(patterns, &base)?);

        let (tx, rx) = mpsc::unbounded_channel();
        let filter = Arc::clone(&set);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    for path in event.paths {
                        if filter.matches(&path) {
                            trace!(target: "vertx_run::watcher", path = %path.display(), kind = ?event.kind, "Matching change");
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => warn!(target: "vertx_run::watcher", error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(scan_period),
        )
        .map_err(|e| Error::Watch {
            target: base.display().to_string(),
            reason: e.to_string(),
        })?;

        for root in set.roots() {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| Error::Watch {
                    target: root.display().to_string(),
                    reason: e.to_string(),
                })?;
            debug!(target: "vertx_run::watcher", root = %root.display(), "Watching");
        }

        info!(
            target: "vertx_run::watcher",
            patterns = ?set.patterns(),
            scan_period_ms = scan_period.as_millis() as u64,
            "File watcher started"
        );

        Ok(Self {
            _watcher: watcher,
            set,
            stream: ChangeStream::new(rx, scan_period),
        })
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.set
    }

    pub async fn next_batch(&mut self) -> Option<ChangeBatch> {
        self.stream.next_batch().await
    }
}

impl ChangeSource for FileWatcher {
    async fn next_batch(&mut self) -> Option<ChangeBatch> {
        self.stream.next_batch().await
    }
}
