use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::ReindexPolicy;
use crate::core::{NashError, Result};
use crate::indexer::Indexer;

enum WatchMessage {
    Events(DebounceEventResult),
    Shutdown,
}

/// Background reindexing driven by filesystem notifications.
///
/// Events are handled on a dedicated thread that only does local file I/O
/// and embedding through the shared [`Indexer`]. [`FileWatcher::stop`] (or
/// dropping the watcher) stops notifications and joins that thread.
pub struct FileWatcher {
    root: PathBuf,
    tx: Sender<WatchMessage>,
    debouncer: Option<Debouncer<RecommendedWatcher>>,
    handle: Option<JoinHandle<()>>,
}

impl FileWatcher {
    /// Begins watching `path` recursively. Returns once the subscription is
    /// in place; event handling never blocks the caller.
    pub fn start(path: &Path, indexer: Arc<Indexer>, debounce: Duration) -> Result<Self> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        info!("Starting watcher on: {}", root.display());

        let (tx, rx) = mpsc::channel::<WatchMessage>();

        let event_tx = tx.clone();
        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
            // The receiver is gone only after shutdown.
            let _ = event_tx.send(WatchMessage::Events(result));
        })?;
        debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;

        let handle = thread::Builder::new()
            .name("nash-watcher".to_string())
            .spawn(move || {
                for message in rx {
                    match message {
                        WatchMessage::Events(Ok(events)) => {
                            for event in events {
                                handle_path(&indexer, &event.path);
                            }
                        }
                        WatchMessage::Events(Err(e)) => error!("Watch error: {:?}", e),
                        WatchMessage::Shutdown => break,
                    }
                }
                debug!("Watcher thread exiting");
            })
            .map_err(NashError::Io)?;

        Ok(Self {
            root,
            tx,
            debouncer: Some(debouncer),
            handle: Some(handle),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops notifications, lets the in-flight event finish and joins the thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the debouncer unsubscribes before the loop is told to exit.
        self.debouncer.take();
        let _ = self.tx.send(WatchMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Watcher thread panicked");
            }
            info!("Stopped watcher on: {}", self.root.display());
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn handle_path(indexer: &Indexer, path: &Path) {
    if path.is_dir() {
        return;
    }
    if path.exists() {
        // Create or write; exclusion policy lives in the indexer.
        indexer.reindex_one(path);
    } else if indexer.store().policy() == ReindexPolicy::ReplaceByPath {
        // Remove or move away.
        indexer.remove_path(path);
    }
}
