/*!
File watching for redeploy mode.

- `globs`        -> `WatchSet`    (pattern matching and the directories to watch)
- `stream`       -> `ChangeStream` (coalesce changes into one batch per scan window)
- `file_watcher` -> `FileWatcher` (notify-backed source of changes)

The redeploy loop consumes any [`ChangeSource`]; tests drive it with a bare
`ChangeStream` fed from a channel instead of the filesystem.
*/

use std::future::Future;
use std::path::PathBuf;

pub mod file_watcher;
pub mod globs;
pub mod stream;

pub use file_watcher::FileWatcher;
pub use globs::WatchSet;
pub use stream::ChangeStream;

/// Distinct paths changed within one scan window, in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeBatch {
    paths: Vec<PathBuf>,
}

impl ChangeBatch {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut paths: Vec<PathBuf> = paths.into_iter().collect();
        paths.sort();
        paths.dedup();
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Anything producing coalesced change batches.
pub trait ChangeSource: Send {
    /// Next batch, or `None` when no more changes will ever arrive.
    ///
    /// Must be cancel-safe: dropping the future may not lose reported changes.
    fn next_batch(&mut self) -> impl Future<Output = Option<ChangeBatch>> + Send;
}
