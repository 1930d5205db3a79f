// src/watch.rs
//! Change-notification bridge
//!
//! The tail reader registers interest in one file of a directory while it
//! waits for new data, and unregisters as soon as it has been woken.

use crate::error::Result;
use log::{debug, warn};
use notify::{
    event::{ModifyKind, RenameMode},
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    MovedIn,
    Created,
    Removed,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub file_name: String,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, file_name: impl Into<String>) -> Self {
        Self {
            kind,
            file_name: file_name.into(),
        }
    }

    /// Whether this event should wake a reader tailing `tracked`
    pub fn resumes(&self, tracked: &str) -> bool {
        self.file_name == tracked && matches!(self.kind, ChangeKind::Modified | ChangeKind::MovedIn)
    }
}

pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Identifies one registration so it can be withdrawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchToken(u64);

impl WatchToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Delivers file change events for a directory to a handler.
///
/// Handlers may be called from any thread and for any file in `dir`;
/// filtering on the file name is the handler's job.
pub trait ChangeNotifier: Send + Sync {
    fn register(&self, dir: &Path, file_name: &str, handler: ChangeHandler) -> Result<WatchToken>;

    fn unregister(&self, dir: &Path, token: WatchToken);
}

/// [`ChangeNotifier`] backed by the platform watcher (inotify on Linux)
#[derive(Default)]
pub struct NotifyBridge {
    next_token: AtomicU64,
    watchers: Mutex<HashMap<WatchToken, RecommendedWatcher>>,
}

impl NotifyBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.watchers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl ChangeNotifier for NotifyBridge {
    fn register(&self, dir: &Path, file_name: &str, handler: ChangeHandler) -> Result<WatchToken> {
        let token = WatchToken(self.next_token.fetch_add(1, Ordering::Relaxed));

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for (index, path) in event.paths.iter().enumerate() {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        handler(ChangeEvent::new(classify(&event.kind, index), name));
                    }
                }
            }
            Err(e) => warn!("File watcher error: {}", e),
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        debug!("Watching {} for {}", dir.display(), file_name);
        self.watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token, watcher);

        Ok(token)
    }

    fn unregister(&self, dir: &Path, token: WatchToken) {
        let removed = self
            .watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&token);

        if let Some(mut watcher) = removed {
            if let Err(e) = watcher.unwatch(dir) {
                debug!("Unwatch of {} failed: {}", dir.display(), e);
            }
        }
    }
}

/// Map a platform event onto the kinds the reader understands.
/// `index` is the position of the path within the event.
fn classify(kind: &EventKind, index: usize) -> ChangeKind {
    match kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::MovedIn,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if index == 1 => ChangeKind::MovedIn,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Removed,
        EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::Other,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => ChangeKind::Other,
    }
}
