//! Project file watcher
//!
//! Filesystem events for the watched project directory are coalesced with a
//! trailing debounce: every event restarts the settle timer, and one
//! notification fires once the directory has been quiet for the whole window.
//! Watching another directory tears the previous watch down first.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use puppetry_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Forward events until the channel closes, collapsing bursts.
///
/// `notify` receives the number of events folded into each notification.
/// A burst still pending when the sender goes away is flushed.
pub async fn debounce<T, F>(mut events: mpsc::UnboundedReceiver<T>, settle: Duration, mut notify: F)
where
    F: FnMut(usize),
{
    while events.recv().await.is_some() {
        let mut burst = 1;
        loop {
            tokio::select! {
                next = events.recv() => match next {
                    Some(_) => burst += 1,
                    None => {
                        notify(burst);
                        return;
                    }
                },
                _ = tokio::time::sleep(settle) => {
                    notify(burst);
                    break;
                }
            }
        }
    }
}

struct ActiveWatch {
    directory: PathBuf,
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for ActiveWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Watches at most one project directory at a time
pub struct ProjectFileWatcher {
    settle: Duration,
    active: Option<ActiveWatch>,
}

fn is_relevant(event: &Event) -> bool {
    !matches!(event.kind, EventKind::Access(_))
}

impl ProjectFileWatcher {
    pub fn new(settle: Duration) -> Self {
        Self { settle, active: None }
    }

    /// Watch `directory`, calling `on_settled` after each settled burst.
    /// Must be called inside a tokio runtime.
    pub fn watch<F>(&mut self, directory: &Path, mut on_settled: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();

        if !directory.is_dir() {
            return Err(Error::Watch(format!("{} is not a directory", directory.display())));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_relevant(&event) => {
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => warn!("File watcher error: {}", e),
            },
            Config::default(),
        )
        .map_err(|e| Error::Watch(format!("failed to create watcher: {}", e)))?;
        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch(format!("failed to watch {}: {}", directory.display(), e)))?;

        let label = directory.display().to_string();
        let task = tokio::spawn(debounce(rx, self.settle, move |burst| {
            debug!("{} settled after {} event(s)", label, burst);
            on_settled();
        }));

        info!("Watching {} (settle {} ms)", directory.display(), self.settle.as_millis());
        self.active = Some(ActiveWatch {
            directory: directory.to_path_buf(),
            _watcher: watcher,
            task,
        });
        Ok(())
    }

    /// Cancel the current watch, returning the directory it covered
    pub fn stop(&mut self) -> Option<PathBuf> {
        let previous = self.active.take()?;
        debug!("Stopped watching {}", previous.directory.display());
        Some(previous.directory.clone())
    }

    pub fn directory(&self) -> Option<&Path> {
        self.active.as_ref().map(|watch| watch.directory.as_path())
    }
}

impl Default for ProjectFileWatcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    const SETTLE: Duration = Duration::from_millis(300);

    fn counter() -> (Arc<AtomicUsize>, impl FnMut(usize) + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_notification() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (count, notify) = counter();
        let task = tokio::spawn(debounce(rx, SETTLE, notify));

        for _ in 0..5 {
            tx.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        drop(tx);
        task.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separated_events_notify_each() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (count, notify) = counter();
        tokio::spawn(debounce(rx, SETTLE, notify));

        for _ in 0..3 {
            tx.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_resets_on_every_event() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (count, notify) = counter();
        tokio::spawn(debounce(rx, SETTLE, notify));

        // each gap is shorter than the window, the whole burst is longer
        for _ in 0..6 {
            tx.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_burst_flushed_on_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (count, notify) = counter();
        let task = tokio::spawn(debounce(rx, SETTLE, notify));
        tx.send(()).unwrap();
        drop(tx);
        task.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_watch_rejects_missing_directory() {
        let mut watcher = ProjectFileWatcher::new(SETTLE);
        let err = watcher.watch(Path::new("/no/such/project"), || {}).unwrap_err();
        assert!(matches!(err, Error::Watch(_)));
        assert!(watcher.directory().is_none());
    }

    #[tokio::test]
    async fn test_rewatch_replaces_previous_directory() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let mut watcher = ProjectFileWatcher::new(Duration::from_millis(50));

        let (stale, _) = counter();
        let stale_hits = stale.clone();
        watcher
            .watch(first.path(), move || {
                stale_hits.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        watcher.watch(second.path(), || {}).unwrap();
        assert_eq!(watcher.directory(), Some(second.path()));

        std::fs::write(first.path().join("a.json"), "{}").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(stale.load(Ordering::SeqCst), 0);

        assert_eq!(watcher.stop(), Some(second.path().to_path_buf()));
        assert_eq!(watcher.stop(), None);
    }

    #[tokio::test]
    async fn test_file_changes_are_reported() {
        let dir = TempDir::new().unwrap();
        let mut watcher = ProjectFileWatcher::new(Duration::from_millis(100));
        let (tx, mut rx) = mpsc::unbounded_channel();
        watcher
            .watch(dir.path(), move || {
                let _ = tx.send(());
            })
            .unwrap();

        std::fs::write(dir.path().join("suite.json"), "{}").unwrap();
        let settled = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(settled, Ok(Some(()))));
    }
}
