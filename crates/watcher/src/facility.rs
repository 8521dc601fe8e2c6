//! Native watch facility abstraction
//!
//! A facility watches single directories and hands out raw notifications
//! keyed by a [`WatchToken`]. Readiness works like a signalled key: a token is
//! queued for retrieval once when its first notification arrives, and is not
//! queued again until its pending notifications have been drained.

use crate::error::FacilityError;
use crate::event::{ChangeKind, KindSet};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Opaque identifier of one watched directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchToken(u64);

impl WatchToken {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for WatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

/// Unresolved notification: a change kind and an entry name relative to the
/// watched directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub kind: ChangeKind,
    pub name: PathBuf,
}

impl RawNotification {
    pub fn new(kind: ChangeKind, name: impl Into<PathBuf>) -> Self {
        Self { kind, name: name.into() }
    }
}

/// Host change-notification service, one registration per directory
pub trait WatchFacility {
    /// Start watching `dir` (non-recursively) for `kinds`
    ///
    /// Watching the same directory again returns the same token.
    fn watch(&mut self, dir: &Path, kinds: &[ChangeKind]) -> Result<WatchToken, FacilityError>;

    /// Block until a registration has pending notifications
    ///
    /// Must return [`FacilityError::Closed`] once the facility's interrupter fires.
    fn wait_ready(&mut self) -> Result<WatchToken, FacilityError>;

    /// Next ready registration, without blocking
    fn poll_ready(&mut self) -> Result<Option<WatchToken>, FacilityError>;

    /// Drain the pending notifications of `token` and re-arm its readiness
    fn pending(&mut self, token: WatchToken) -> Vec<RawNotification>;

    /// Release backend resources. Safe to call more than once.
    fn release(&mut self) -> Result<(), FacilityError>;

    /// Handle that shuts the facility down from any thread
    fn interrupter(&self) -> Interrupter;
}

/// Shared shutdown flag plus a wake-up for a blocked `wait_ready`
#[derive(Debug, Clone)]
pub struct Interrupter {
    closed: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl Interrupter {
    /// Create an interrupter and the receiver a facility selects on
    pub fn pair() -> (Self, Receiver<()>) {
        let (wake, wake_rx) = crossbeam_channel::bounded(1);
        (
            Self {
                closed: Arc::new(AtomicBool::new(false)),
                wake,
            },
            wake_rx,
        )
    }

    /// Mark the facility closed and wake any blocked waiter
    pub fn interrupt(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.wake.try_send(());
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Cross-thread handle for closing a [`WatchSession`](crate::session::WatchSession)
///
/// Closing through the handle unblocks a `take()` parked on another thread;
/// the session then reports itself closed.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    interrupter: Interrupter,
}

impl CloseHandle {
    pub(crate) fn new(interrupter: Interrupter) -> Self {
        Self { interrupter }
    }

    pub fn close(&self) {
        self.interrupter.interrupt();
    }

    pub fn is_closed(&self) -> bool {
        self.interrupter.is_interrupted()
    }
}

#[derive(Default)]
struct Queue {
    pending: Vec<RawNotification>,
    signalled: bool,
}

/// Per-token notification queues feeding a ready channel
pub(crate) struct PendingQueues {
    queues: HashMap<WatchToken, Queue>,
    ready_tx: Sender<WatchToken>,
}

impl PendingQueues {
    /// Queue a notification; signals the token if it was not already ready
    pub(crate) fn push(&mut self, token: WatchToken, notification: RawNotification) {
        let queue = self.queues.entry(token).or_default();
        queue.pending.push(notification);
        if !queue.signalled {
            queue.signalled = true;
            let _ = self.ready_tx.send(token);
        }
    }

    /// Whether an identical notification is still waiting to be drained
    pub(crate) fn is_pending(&self, token: WatchToken, notification: &RawNotification) -> bool {
        self.queues
            .get(&token)
            .is_some_and(|queue| queue.pending.contains(notification))
    }

    pub(crate) fn drain(&mut self, token: WatchToken) -> Vec<RawNotification> {
        match self.queues.get_mut(&token) {
            Some(queue) => {
                queue.signalled = false;
                std::mem::take(&mut queue.pending)
            }
            None => Vec::new(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.queues.clear();
    }
}

/// Receiving side of the ready channel, aware of the interrupter
pub(crate) struct ReadyChannel {
    ready_rx: Receiver<WatchToken>,
    wake_rx: Receiver<()>,
    interrupter: Interrupter,
}

impl ReadyChannel {
    pub(crate) fn wait(&self) -> Result<WatchToken, FacilityError> {
        if self.interrupter.is_interrupted() {
            return Err(FacilityError::Closed);
        }
        crossbeam_channel::select! {
            recv(self.ready_rx) -> token => token.map_err(|_| FacilityError::Closed),
            recv(self.wake_rx) -> _ => Err(FacilityError::Closed),
        }
    }

    pub(crate) fn try_next(&self) -> Result<Option<WatchToken>, FacilityError> {
        if self.interrupter.is_interrupted() {
            return Err(FacilityError::Closed);
        }
        match self.ready_rx.try_recv() {
            Ok(token) => Ok(Some(token)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(FacilityError::Closed),
        }
    }

    pub(crate) fn interrupter(&self) -> &Interrupter {
        &self.interrupter
    }
}

/// Build the queue/channel pair shared by facility bindings
pub(crate) fn ready_pair() -> (PendingQueues, ReadyChannel) {
    let (ready_tx, ready_rx) = crossbeam_channel::unbounded();
    let (interrupter, wake_rx) = Interrupter::pair();
    (
        PendingQueues {
            queues: HashMap::new(),
            ready_tx,
        },
        ReadyChannel {
            ready_rx,
            wake_rx,
            interrupter,
        },
    )
}

/// Directory registered with a facility binding
#[derive(Debug, Clone, Copy)]
pub(crate) struct Watched {
    pub(crate) token: WatchToken,
    pub(crate) kinds: KindSet,
}
