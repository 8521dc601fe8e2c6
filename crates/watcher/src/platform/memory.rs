//! Scripted in-process facility
//!
//! Nothing is observed from the host: notifications are injected through a
//! [`MemoryFeed`]. Readiness and shutdown behave like the native binding, so a
//! session driven by this facility blocks, wakes, and closes the same way.

use crate::error::FacilityError;
use crate::event::{ChangeKind, KindSet};
use crate::facility::{
    ready_pair, Interrupter, PendingQueues, RawNotification, ReadyChannel, WatchFacility, Watched,
    WatchToken,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct MemoryState {
    dirs: HashMap<PathBuf, Watched>,
    watch_log: Vec<PathBuf>,
    fail_next_watch: Option<io::Error>,
    fail_watch_of: HashMap<PathBuf, io::Error>,
    queues: PendingQueues,
    released: bool,
    /// Report `Closed` without firing the interrupter
    reports_closed: bool,
    next_token: u64,
}

/// Facility whose notifications come from a [`MemoryFeed`]
pub struct MemoryFacility {
    state: Arc<Mutex<MemoryState>>,
    ready: ReadyChannel,
}

/// Test-side handle of a [`MemoryFacility`]
#[derive(Clone)]
pub struct MemoryFeed {
    state: Arc<Mutex<MemoryState>>,
    interrupter: Interrupter,
}

impl MemoryFacility {
    /// Create a facility and the feed that drives it
    pub fn new() -> (Self, MemoryFeed) {
        let (queues, ready) = ready_pair();
        let state = Arc::new(Mutex::new(MemoryState {
            dirs: HashMap::new(),
            watch_log: Vec::new(),
            fail_next_watch: None,
            fail_watch_of: HashMap::new(),
            queues,
            released: false,
            reports_closed: false,
            next_token: 0,
        }));
        let feed = MemoryFeed {
            state: Arc::clone(&state),
            interrupter: ready.interrupter().clone(),
        };
        (Self { state, ready }, feed)
    }

    fn is_down(&self) -> bool {
        let state = self.state.lock();
        state.released || state.reports_closed
    }
}

impl WatchFacility for MemoryFacility {
    fn watch(&mut self, dir: &Path, kinds: &[ChangeKind]) -> Result<WatchToken, FacilityError> {
        if self.ready.interrupter().is_interrupted() {
            return Err(FacilityError::Closed);
        }

        let mut state = self.state.lock();
        if state.released || state.reports_closed {
            return Err(FacilityError::Closed);
        }
        if let Some(err) = state.fail_next_watch.take() {
            return Err(FacilityError::Io(err));
        }
        if let Some(err) = state.fail_watch_of.remove(dir) {
            return Err(FacilityError::Io(err));
        }

        state.watch_log.push(dir.to_path_buf());
        let kinds = KindSet::from_kinds(kinds);
        if let Some(watched) = state.dirs.get_mut(dir) {
            watched.kinds = watched.kinds.union(kinds);
            return Ok(watched.token);
        }

        state.next_token += 1;
        let token = WatchToken::new(state.next_token);
        state.dirs.insert(dir.to_path_buf(), Watched { token, kinds });
        Ok(token)
    }

    fn wait_ready(&mut self) -> Result<WatchToken, FacilityError> {
        if self.is_down() {
            return Err(FacilityError::Closed);
        }
        self.ready.wait()
    }

    fn poll_ready(&mut self) -> Result<Option<WatchToken>, FacilityError> {
        if self.is_down() {
            return Err(FacilityError::Closed);
        }
        self.ready.try_next()
    }

    fn pending(&mut self, token: WatchToken) -> Vec<RawNotification> {
        self.state.lock().queues.drain(token)
    }

    fn release(&mut self) -> Result<(), FacilityError> {
        self.ready.interrupter().interrupt();
        let mut state = self.state.lock();
        state.released = true;
        state.queues.clear();
        Ok(())
    }

    fn interrupter(&self) -> Interrupter {
        self.ready.interrupter().clone()
    }
}

impl MemoryFeed {
    /// Deliver a notification for an entry of the watched directory `dir`
    ///
    /// Returns false when `dir` is not watched or does not want `kind`.
    pub fn notify(&self, dir: impl AsRef<Path>, kind: ChangeKind, name: impl Into<PathBuf>) -> bool {
        let mut state = self.state.lock();
        let Some(watched) = state.dirs.get(dir.as_ref()).copied() else {
            return false;
        };
        if !watched.kinds.contains(kind) {
            return false;
        }
        state.queues.push(watched.token, RawNotification::new(kind, name));
        true
    }

    /// Deliver a notification for a child path, routed by its parent directory
    pub fn notify_path(&self, path: impl AsRef<Path>, kind: ChangeKind) -> bool {
        let path = path.as_ref();
        match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => self.notify(parent, kind, name),
            _ => false,
        }
    }

    /// Queue notifications under an arbitrary token, registered or not
    pub fn inject(&self, token: WatchToken, notifications: Vec<RawNotification>) {
        let mut state = self.state.lock();
        for notification in notifications {
            state.queues.push(token, notification);
        }
    }

    /// Token assigned to `dir`, if it is watched
    pub fn token_for(&self, dir: impl AsRef<Path>) -> Option<WatchToken> {
        self.state.lock().dirs.get(dir.as_ref()).map(|w| w.token)
    }

    /// Every `watch` call that succeeded, in order
    pub fn watch_log(&self) -> Vec<PathBuf> {
        self.state.lock().watch_log.clone()
    }

    /// Make the next `watch` call fail with `err`
    pub fn fail_next_watch(&self, err: io::Error) {
        self.state.lock().fail_next_watch = Some(err);
    }

    /// Make watching `dir` fail once with `err`
    pub fn fail_watch_of(&self, dir: impl Into<PathBuf>, err: io::Error) {
        self.state.lock().fail_watch_of.insert(dir.into(), err);
    }

    /// Make the facility answer `Closed` while its interrupter stays quiet,
    /// like a backend that died without signalling
    pub fn report_closed(&self) {
        self.state.lock().reports_closed = true;
    }

    /// Shut the facility down behind the session's back
    pub fn close_out_of_band(&self) {
        self.interrupter.interrupt();
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }
}
