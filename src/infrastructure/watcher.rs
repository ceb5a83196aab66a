//! File watcher with a stability window.
//!
//! `notify` delivers raw events over a channel; a path is reported only
//! after it has gone a full window without further writes, so partially
//! written files are never exported.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::domain::{AppError, Result};

/// Default quiet period before a change counts as complete.
pub const DEFAULT_STABILITY_WINDOW: Duration = Duration::from_secs(2);

const IDLE_TICK: Duration = Duration::from_secs(1);

/// A directory to watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub path: PathBuf,
    pub recursive: bool,
}

impl WatchTarget {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            path: path.into(),
            recursive,
        }
    }
}

/// Tracks the last write per path and releases paths once they are quiet.
#[derive(Debug)]
pub struct ChangeDebouncer {
    window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl ChangeDebouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Note a write to `path` at `at`, restarting its window.
    pub fn record(&mut self, path: PathBuf, at: Instant) {
        self.pending.insert(path, at);
    }

    /// Remove and return every path whose window has elapsed, sorted.
    pub fn take_stable(&mut self, now: Instant) -> Vec<PathBuf> {
        let window = self.window;
        let mut stable: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) >= window)
            .map(|(path, _)| path.clone())
            .collect();

        for path in &stable {
            self.pending.remove(path);
        }
        stable.sort();
        stable
    }

    /// When the earliest pending path becomes stable.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().map(|last| *last + self.window)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Watches directories and reports stable changes.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    debouncer: ChangeDebouncer,
    watched: Vec<PathBuf>,
}

impl ChangeWatcher {
    /// Start watching every existing target.
    ///
    /// # Errors
    /// Returns error if the watcher cannot be created or no target exists.
    pub fn new(targets: &[WatchTarget], window: Duration) -> Result<Self> {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| AppError::watch("Failed to create file watcher", e))?;

        let mut watched = Vec::new();
        for target in targets {
            if !target.path.exists() {
                tracing::warn!(path = %target.path.display(), "Not watching missing path");
                continue;
            }

            let mode = if target.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };

            match watcher.watch(&target.path, mode) {
                Ok(()) => {
                    tracing::info!(path = %target.path.display(), recursive = target.recursive, "Watching");
                    watched.push(target.path.clone());
                }
                Err(e) => {
                    tracing::warn!(path = %target.path.display(), error = %e, "Cannot watch path");
                }
            }
        }

        if watched.is_empty() {
            return Err(AppError::Watch {
                message: "None of the watch targets exist".to_string(),
                source: None,
            });
        }

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            debouncer: ChangeDebouncer::new(window),
            watched,
        })
    }

    #[must_use]
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Block, calling `on_stable_changes` once with every batch of paths
    /// that settle together.
    ///
    /// Returns only when the underlying watcher shuts down.
    ///
    /// # Errors
    /// Returns error if the event channel disconnects.
    pub fn run(&mut self, mut on_stable_changes: impl FnMut(&[PathBuf])) -> Result<()> {
        loop {
            let timeout = self.debouncer.next_deadline().map_or(IDLE_TICK, |deadline| {
                deadline.saturating_duration_since(Instant::now())
            });

            match self.receiver.recv_timeout(timeout) {
                Ok(Ok(event)) => self.observe(event),
                Ok(Err(e)) => tracing::warn!(error = %e, "Watch error"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(AppError::Watch {
                        message: "File watcher stopped".to_string(),
                        source: None,
                    });
                }
            }

            if self.debouncer.is_empty() {
                continue;
            }

            let settled = self.debouncer.take_stable(Instant::now());
            if !settled.is_empty() {
                tracing::debug!(count = settled.len(), "Changes settled");
                on_stable_changes(&settled);
            }
        }
    }

    fn observe(&mut self, event: Event) {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }

        let now = Instant::now();
        for path in event.paths {
            tracing::trace!(path = %path.display(), "Raw change");
            self.debouncer.record(path, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_waits_for_window() {
        let start = Instant::now();
        let mut debouncer = ChangeDebouncer::new(Duration::from_secs(2));
        let path = PathBuf::from("/u/settings.json");

        debouncer.record(path.clone(), start);
        assert!(debouncer.take_stable(start + Duration::from_secs(1)).is_empty());

        // A further write restarts the window
        debouncer.record(path.clone(), start + Duration::from_millis(1500));
        assert!(debouncer.take_stable(start + Duration::from_secs(3)).is_empty());
        assert_eq!(
            debouncer.next_deadline(),
            Some(start + Duration::from_millis(3500))
        );

        assert_eq!(
            debouncer.take_stable(start + Duration::from_millis(3600)),
            vec![path]
        );
        assert!(debouncer.is_empty());
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn test_paths_settle_independently() {
        let start = Instant::now();
        let mut debouncer = ChangeDebouncer::new(Duration::from_secs(2));
        let a = PathBuf::from("/u/a.json");
        let b = PathBuf::from("/u/b.json");

        debouncer.record(a.clone(), start);
        debouncer.record(b.clone(), start + Duration::from_secs(1));

        assert_eq!(debouncer.take_stable(start + Duration::from_secs(2)), vec![a]);
        assert_eq!(debouncer.take_stable(start + Duration::from_secs(3)), vec![b]);
    }

    #[test]
    fn test_watcher_requires_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let missing = WatchTarget::new(dir.path().join("missing"), false);
        assert!(ChangeWatcher::new(&[missing], DEFAULT_STABILITY_WINDOW).is_err());
    }
}
