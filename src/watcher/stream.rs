//! Scan-window coalescing of individual change notifications.
//!
//! The first changed path opens a window of one scan period; every path reported before
//! the window closes lands in the same [`ChangeBatch`]. Partial windows are kept in the
//! stream itself, so `next_batch` is cancel-safe and can sit in a `tokio::select!`.

use std::collections::BTreeSet;
use std::mem;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

use super::{ChangeBatch, ChangeSource};

/// Coalesces changed paths arriving on a channel into one batch per scan window.
#[derive(Debug)]
pub struct ChangeStream {
    rx: mpsc::UnboundedReceiver<PathBuf>,
    scan_period: Duration,
    pending: BTreeSet<PathBuf>,
    window_end: Option<Instant>,
}

impl ChangeStream {
    pub fn new(rx: mpsc::UnboundedReceiver<PathBuf>, scan_period: Duration) -> Self {
        Self {
            rx,
            scan_period,
            pending: BTreeSet::new(),
            window_end: None,
        }
    }

    /// A stream plus the sender feeding it.
    pub fn channel(scan_period: Duration) -> (mpsc::UnboundedSender<PathBuf>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx, scan_period))
    }

    pub fn scan_period(&self) -> Duration {
        self.scan_period
    }

    /// Wait for the next coalesced batch. `None` once the sending side is gone and
    /// nothing is pending.
    pub async fn next_batch(&mut self) -> Option<ChangeBatch> {
        loop {
            match self.window_end {
                None => {
                    let path = self.rx.recv().await?;
                    trace!(target: "vertx_run::watcher", path = %path.display(), "Change opens scan window");
                    self.pending.insert(path);
                    self.window_end = Some(Instant::now() + self.scan_period);
                }
                Some(end) => {
                    tokio::select! {
                        _ = sleep_until(end) => return Some(self.flush()),
                        path = self.rx.recv() => match path {
                            Some(path) => {
                                self.pending.insert(path);
                            }
                            None => return Some(self.flush()),
                        },
                    }
                }
            }
        }
    }

    fn flush(&mut self) -> ChangeBatch {
        self.window_end = None;
        ChangeBatch::new(mem::take(&mut self.pending))
    }
}

impl ChangeSource for ChangeStream {
    async fn next_batch(&mut self) -> Option<ChangeBatch> {
        ChangeStream::next_batch(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simultaneous_changes_make_one_batch() {
        let (tx, mut stream) = ChangeStream::channel(Duration::from_millis(100));
        for name in ["a.java", "b.java", "c.java", "a.java", "d.java"] {
            tx.send(PathBuf::from(name)).unwrap();
        }

        let batch = stream.next_batch().await.unwrap();
        assert_eq!(batch.len(), 4);
        assert!(batch.paths().contains(&PathBuf::from("a.java")));

        let next = tokio::time::timeout(Duration::from_millis(300), stream.next_batch()).await;
        assert!(next.is_err(), "no further batch expected");
    }

    #[tokio::test]
    async fn changes_after_window_form_a_new_batch() {
        let (tx, mut stream) = ChangeStream::channel(Duration::from_millis(50));
        tx.send(PathBuf::from("one")).unwrap();
        let first = stream.next_batch().await.unwrap();
        assert_eq!(first.len(), 1);

        tx.send(PathBuf::from("two")).unwrap();
        tx.send(PathBuf::from("three")).unwrap();
        let second = stream.next_batch().await.unwrap();
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn partial_window_survives_cancellation() {
        let (tx, mut stream) = ChangeStream::channel(Duration::from_millis(200));
        tx.send(PathBuf::from("kept")).unwrap();

        let cut = tokio::time::timeout(Duration::from_millis(20), stream.next_batch()).await;
        assert!(cut.is_err());

        let batch = stream.next_batch().await.unwrap();
        assert_eq!(batch.paths(), &[PathBuf::from("kept")]);
    }

    #[tokio::test]
    async fn closed_channel_flushes_then_ends() {
        let (tx, mut stream) = ChangeStream::channel(Duration::from_secs(60));
        tx.send(PathBuf::from("last")).unwrap();
        drop(tx);

        assert_eq!(stream.next_batch().await.unwrap().len(), 1);
        assert!(stream.next_batch().await.is_none());
    }
}
