//! Filesystem watching for `cpai watch`.
//!
//! Raw notify events are flattened into per-path [`WatchEvent`]s on a channel;
//! [`Debouncer`] drops bursts for the same path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Modified(PathBuf),
    Created(PathBuf),
    Deleted(PathBuf),
    Error(String),
}

impl WatchEvent {
    pub fn path(&self) -> Option<&Path> {
        match self {
            WatchEvent::Modified(p) | WatchEvent::Created(p) | WatchEvent::Deleted(p) => Some(p),
            WatchEvent::Error(_) => None,
        }
    }
}

/// Recursive watcher over a scan root. Dropping it stops the watch.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<WatchEvent>,
}

impl FileWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        let (tx, rx) = unbounded();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) => {
                    for path in event.paths {
                        let watch_event = match event.kind {
                            EventKind::Modify(_) => WatchEvent::Modified(path),
                            EventKind::Create(_) => WatchEvent::Created(path),
                            EventKind::Remove(_) => WatchEvent::Deleted(path),
                            _ => continue,
                        };
                        let _ = tx.send(watch_event);
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            },
            Config::default(),
        )?;
        watcher.watch(path, RecursiveMode::Recursive)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Blocks up to `timeout` for the next event.
    pub fn next_event(&self, timeout: Duration) -> Option<WatchEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

/// Per-path rate limiter.
pub struct Debouncer {
    last_events: HashMap<PathBuf, Instant>,
    delay: Duration,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            last_events: HashMap::new(),
            delay,
        }
    }

    /// False when the same path fired less than `delay` ago.
    pub fn should_process(&mut self, path: &Path) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_events.get(path)
            && now.duration_since(*last) < self.delay
        {
            return false;
        }
        self.last_events.insert(path.to_path_buf(), now);
        true
    }

    /// Forgets paths that have been quiet for a while.
    pub fn cleanup(&mut self) {
        let now = Instant::now();
        self.last_events
            .retain(|_, last| now.duration_since(*last) < self.delay * 10);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let path = Path::new("src/lib.rs");

        assert!(debouncer.should_process(path));
        assert!(!debouncer.should_process(path));
        assert!(debouncer.should_process(Path::new("src/main.rs")));

        std::thread::sleep(Duration::from_millis(150));
        assert!(debouncer.should_process(path));
    }

    #[test]
    fn test_cleanup_drops_quiet_paths() {
        let mut debouncer = Debouncer::new(Duration::from_millis(1));
        debouncer.should_process(Path::new("a"));
        std::thread::sleep(Duration::from_millis(20));
        debouncer.cleanup();
        assert!(debouncer.last_events.is_empty());
    }

    #[test]
    fn test_event_path() {
        let e = WatchEvent::Created(PathBuf::from("x.rs"));
        assert_eq!(e.path(), Some(Path::new("x.rs")));
        assert_eq!(WatchEvent::Error("boom".into()).path(), None);
    }
}
