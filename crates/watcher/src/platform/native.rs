//! Native facility backed by `notify`
//!
//! Each registered directory gets its own non-recursive watch. Backend events
//! arrive on notify's delivery thread, are routed to the token of the event
//! path's parent directory, and queued there until the session drains them.

use crate::error::FacilityError;
use crate::event::{ChangeKind, KindSet};
use crate::facility::{
    ready_pair, Interrupter, PendingQueues, RawNotification, ReadyChannel, WatchFacility, Watched,
    WatchToken,
};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Routing state shared with notify's delivery thread
struct Routing {
    /// Watched directory -> registration
    dirs: HashMap<PathBuf, Watched>,

    /// Watched directories already reported as removed, so the second half of
    /// a self-removal/entry-removal pair is dropped
    retired: HashSet<PathBuf>,

    queues: PendingQueues,
}

impl Routing {
    fn dispatch(&mut self, event: Event) {
        for (kind, path) in classify(&event) {
            self.route(kind, path);
        }
    }

    fn route(&mut self, kind: ChangeKind, path: &Path) {
        match kind {
            ChangeKind::Deleted => {
                if self.retired.remove(path) {
                    trace!("Dropping repeated removal of {}", path.display());
                    return;
                }
                if self.dirs.remove(path).is_some() {
                    debug!("Watched directory removed: {}", path.display());
                    self.retired.insert(path.to_path_buf());
                }
            }
            ChangeKind::Created => {
                self.retired.remove(path);
            }
            ChangeKind::Modified => {}
        }

        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        let Some(watched) = self.dirs.get(parent).copied() else {
            trace!("No registration for parent of {}", path.display());
            return;
        };
        if !watched.kinds.contains(kind) {
            return;
        }

        let notification = RawNotification::new(kind, name);
        // A watched subdirectory's metadata change arrives from its own watch
        // and from its parent's; both land on the parent's token.
        if kind == ChangeKind::Modified
            && self.dirs.contains_key(path)
            && self.queues.is_pending(watched.token, &notification)
        {
            trace!("Dropping repeated modification of {}", path.display());
            return;
        }

        trace!("{} {} -> {}", kind, path.display(), watched.token);
        self.queues.push(watched.token, notification);
    }
}

/// Map a backend event onto change kinds per affected path
fn classify(event: &Event) -> Vec<(ChangeKind, &Path)> {
    match &event.kind {
        EventKind::Create(_) => tagged(event, ChangeKind::Created),
        EventKind::Remove(_) => tagged(event, ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => tagged(event, ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => tagged(event, ChangeKind::Created),
        // The From and To halves are delivered on their own
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Vec::new(),
        EventKind::Modify(_) => tagged(event, ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn tagged(event: &Event, kind: ChangeKind) -> Vec<(ChangeKind, &Path)> {
    event.paths.iter().map(|p| (kind, p.as_path())).collect()
}

/// Host notification service through `notify`'s recommended watcher
pub struct NotifyFacility {
    watcher: Option<RecommendedWatcher>,
    routing: Arc<Mutex<Routing>>,
    ready: ReadyChannel,
    next_token: u64,
}

impl NotifyFacility {
    pub fn new() -> Result<Self, FacilityError> {
        let (queues, ready) = ready_pair();
        let routing = Arc::new(Mutex::new(Routing {
            dirs: HashMap::new(),
            retired: HashSet::new(),
            queues,
        }));

        let handler_routing = Arc::clone(&routing);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => handler_routing.lock().dispatch(event),
            Err(e) => warn!("Watch backend error: {}", e),
        })?;

        Ok(Self {
            watcher: Some(watcher),
            routing,
            ready,
            next_token: 0,
        })
    }

    fn is_closed(&self) -> bool {
        self.watcher.is_none() || self.ready.interrupter().is_interrupted()
    }
}

impl WatchFacility for NotifyFacility {
    fn watch(&mut self, dir: &Path, kinds: &[ChangeKind]) -> Result<WatchToken, FacilityError> {
        if self.is_closed() {
            return Err(FacilityError::Closed);
        }
        let kinds = KindSet::from_kinds(kinds);

        {
            let mut routing = self.routing.lock();
            if let Some(watched) = routing.dirs.get_mut(dir) {
                watched.kinds = watched.kinds.union(kinds);
                return Ok(watched.token);
            }
        }

        self.next_token += 1;
        let token = WatchToken::new(self.next_token);
        self.routing
            .lock()
            .dirs
            .insert(dir.to_path_buf(), Watched { token, kinds });

        // The routing lock must not be held here: notify's event loop may be
        // inside our handler waiting for it.
        let watcher = self.watcher.as_mut().ok_or(FacilityError::Closed)?;
        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            self.routing.lock().dirs.remove(dir);
            return Err(e.into());
        }

        debug!("Watching {} as {}", dir.display(), token);
        Ok(token)
    }

    fn wait_ready(&mut self) -> Result<WatchToken, FacilityError> {
        if self.watcher.is_none() {
            return Err(FacilityError::Closed);
        }
        self.ready.wait()
    }

    fn poll_ready(&mut self) -> Result<Option<WatchToken>, FacilityError> {
        if self.watcher.is_none() {
            return Err(FacilityError::Closed);
        }
        self.ready.try_next()
    }

    fn pending(&mut self, token: WatchToken) -> Vec<RawNotification> {
        self.routing.lock().queues.drain(token)
    }

    fn release(&mut self) -> Result<(), FacilityError> {
        self.ready.interrupter().interrupt();
        if let Some(watcher) = self.watcher.take() {
            // Dropping the watcher stops notify's delivery thread
            drop(watcher);
            let mut routing = self.routing.lock();
            routing.dirs.clear();
            routing.retired.clear();
            routing.queues.clear();
            debug!("Released native watch facility");
        }
        Ok(())
    }

    fn interrupter(&self) -> Interrupter {
        self.ready.interrupter().clone()
    }
}
