use std::{
    collections::BTreeSet,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use notify::{recommended_watcher, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::config::manager::ConfigManager;

const DEBOUNCE: Duration = Duration::from_millis(200);

/// The notify watcher together with the paths it currently watches.
struct WatchedPaths {
    watcher: RecommendedWatcher,
    paths: BTreeSet<PathBuf>,
}

impl WatchedPaths {
    /// Watches newly wanted paths and drops the ones the configuration no longer uses.
    /// Paths that fail to register are retried on the next sync.
    fn sync(&mut self, wanted: Vec<PathBuf>) {
        let wanted: BTreeSet<PathBuf> = wanted.into_iter().collect();

        for stale in self.paths.difference(&wanted) {
            match self.watcher.unwatch(stale) {
                Ok(()) => debug!(path = %stale.display(), "Stopped watching path"),
                Err(err) => debug!(path = %stale.display(), error = %err, "Cannot unwatch path"),
            }
        }

        let mut watched = BTreeSet::new();
        for path in wanted {
            if self.paths.contains(&path) {
                watched.insert(path);
                continue;
            }
            let mode = if path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            match self.watcher.watch(&path, mode) {
                Ok(()) => {
                    debug!(path = %path.display(), "Watching path");
                    watched.insert(path);
                }
                Err(err) => warn!(path = %path.display(), error = %err, "Cannot watch path"),
            }
        }
        self.paths = watched;
    }
}

type SharedWatch = Arc<Mutex<Option<WatchedPaths>>>;

fn resync(watched: &SharedWatch, wanted: Vec<PathBuf>) {
    if let Some(watch) = watched
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_mut()
    {
        watch.sync(wanted);
    }
}

/// Keeps the filesystem watch alive. Dropping or stopping it releases the watches.
pub struct WatchHandle {
    watched: SharedWatch,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn stop(&mut self) {
        let released = self
            .watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            info!("Stopped watching project files");
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Paths currently registered with the watcher.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|w| w.paths.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_relevant(event: &Event) -> bool {
    !event.kind.is_access() && !event.kind.is_other()
}

/// Receives change notifications and reloads. Events arriving during the debounce
/// window or while a reload runs are coalesced into the next reload. After a
/// successful reload the watch set follows the new configuration.
async fn reload_loop(
    manager: ConfigManager,
    watched: SharedWatch,
    mut rx: mpsc::Receiver<notify::Result<Event>>,
) {
    while let Some(res) = rx.recv().await {
        match res {
            Ok(event) if is_relevant(&event) => {
                debug!(?event, "File change detected");
            }
            Ok(_) => continue,
            Err(err) => {
                error!(error = ?err, "Watch error");
                continue;
            }
        }

        tokio::time::sleep(DEBOUNCE).await;
        let mut coalesced = 0usize;
        while rx.try_recv().is_ok() {
            coalesced += 1;
        }
        info!(coalesced, "Reloading configuration");

        let reloading = manager.clone();
        match tokio::task::spawn_blocking(move || reloading.reload()).await {
            Ok(Ok(_)) => resync(&watched, manager.watch_paths()),
            Ok(Err(err)) => {
                error!(error = %err, "Configuration reload error, keeping previous routes")
            }
            Err(err) => error!(error = %err, "Reload task failed"),
        }
    }
}

pub fn spawn_watcher(manager: ConfigManager) -> notify::Result<WatchHandle> {
    let (tx, rx) = mpsc::channel::<notify::Result<Event>>(100);

    // Runs on the notify thread. A full channel already guarantees a pending reload.
    let watcher = recommended_watcher(move |res| {
        if tx.try_send(res).is_err() {
            debug!("File watcher event dropped, reload already pending");
        }
    })?;

    let mut initial = WatchedPaths {
        watcher,
        paths: BTreeSet::new(),
    };
    initial.sync(manager.watch_paths());
    info!(paths = initial.paths.len(), "Watching project files for changes...");

    let watched: SharedWatch = Arc::new(Mutex::new(Some(initial)));
    let task = tokio::spawn(reload_loop(manager, Arc::clone(&watched), rx));
    Ok(WatchHandle {
        watched,
        task: Some(task),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_adds_new_paths_and_drops_stale_ones() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let fixture = outside.path().join("book.json");
        std::fs::write(&fixture, "{}").unwrap();

        let watcher = recommended_watcher(|_: notify::Result<Event>| {}).unwrap();
        let mut watched = WatchedPaths {
            watcher,
            paths: BTreeSet::new(),
        };

        watched.sync(vec![root.path().to_path_buf()]);
        assert_eq!(watched.paths.len(), 1);

        watched.sync(vec![root.path().to_path_buf(), fixture.clone()]);
        assert!(watched.paths.contains(&fixture));
        assert_eq!(watched.paths.len(), 2);

        watched.sync(vec![root.path().to_path_buf()]);
        assert!(!watched.paths.contains(&fixture));

        let missing = outside.path().join("missing.json");
        watched.sync(vec![root.path().to_path_buf(), missing.clone()]);
        assert!(!watched.paths.contains(&missing));
    }
}
