//! Watch session: registrations, directory tracking, and event resolution
//!
//! A native facility reports changes as names relative to a registration, and
//! by the time a deletion is reported the object is gone, so the filesystem
//! can no longer say whether it was a directory. The session keeps a set of
//! paths known to be directories, seeded from each registered directory's
//! listing and updated from every created/modified notification, and answers
//! deletions from that set instead of from the disk.

use crate::config::WatchConfig;
use crate::error::{FacilityError, WatchError};
use crate::event::{ChangeEvent, ChangeKind};
use crate::facility::{CloseHandle, Interrupter, RawNotification, WatchFacility, WatchToken};
use crate::fs::{FsQuery, LocalFs};
use crate::ignore::{IgnoreConfig, IgnoreRules};
use crate::platform::native::NotifyFacility;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace, warn};

/// Lifecycle of a session; open -> closed is one-way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Directory-aware session over a watch facility
///
/// The session is single-owner: all bookkeeping happens through `&mut self`.
/// The only cross-thread operation is closing via [`CloseHandle`].
pub struct WatchSession<W = NotifyFacility, F = LocalFs> {
    facility: W,
    fs: F,

    /// Registration token -> watched directory
    registrations: HashMap<WatchToken, PathBuf>,

    /// Paths currently believed to be directories
    directories: HashSet<PathBuf>,

    state: SessionState,
    interrupter: Interrupter,

    /// Pruning rules for recursive registration
    ignore: Option<IgnoreConfig>,
}

impl WatchSession {
    /// Session over the host's native facility and filesystem
    pub fn new() -> Result<Self, WatchError> {
        let facility = NotifyFacility::new().map_err(WatchError::Facility)?;
        Ok(Self::with_backend(facility, LocalFs))
    }
}

impl<W: WatchFacility, F: FsQuery> WatchSession<W, F> {
    pub fn with_backend(facility: W, fs: F) -> Self {
        let interrupter = facility.interrupter();
        Self {
            facility,
            fs,
            registrations: HashMap::new(),
            directories: HashSet::new(),
            state: SessionState::Open,
            interrupter,
            ignore: None,
        }
    }

    /// Prune recursive registration with these rules
    pub fn set_ignore(&mut self, config: IgnoreConfig) {
        self.ignore = if config.is_noop() { None } else { Some(config) };
    }

    /// Watch a single directory
    ///
    /// The directory's current subdirectories are remembered, so their later
    /// deletion is reported as a directory deletion.
    pub fn register(&mut self, path: impl AsRef<Path>, kinds: &[ChangeKind]) -> Result<WatchToken, WatchError> {
        let path = path.as_ref();
        self.ensure_open(|| format!("failed to register path: {}", path.display()))?;
        let dir = absolute(path)?;
        self.register_dir(&dir, kinds)
    }

    /// Watch a directory and every directory below it
    ///
    /// Each directory is registered exactly once, root first. The first
    /// failure stops the walk and is returned.
    pub fn register_recursive(&mut self, path: impl AsRef<Path>, kinds: &[ChangeKind]) -> Result<(), WatchError> {
        let path = path.as_ref();
        self.ensure_open(|| format!("failed to register path: {}", path.display()))?;
        let root = absolute(path)?;

        let rules = match &self.ignore {
            Some(config) => {
                let rules = IgnoreRules::load(&root, config)?;
                debug!("Pruning {} with {} ignore patterns", rules.root().display(), rules.len());
                Some(rules)
            }
            None => None,
        };

        self.register_dir(&root, kinds)?;

        let skip = |dir: &Path| rules.as_ref().is_some_and(|r| r.should_skip_dir(dir));
        let descendants = self
            .fs
            .walk_dirs(&root, &skip)
            .map_err(|e| WatchError::filesystem(&root, e))?;

        for dir in &descendants {
            self.register_dir(dir, kinds)?;
        }

        debug!(
            "Registered {} directories under {}",
            descendants.len() + 1,
            root.display()
        );
        Ok(())
    }

    /// Apply a configuration to one root
    pub fn apply_config(&mut self, root: impl AsRef<Path>, config: &WatchConfig) -> Result<(), WatchError> {
        self.set_ignore(config.ignore.clone());
        if config.recursive {
            self.register_recursive(root, &config.kinds)
        } else {
            self.register(root, &config.kinds).map(|_| ())
        }
    }

    /// List first, then watch: a failed registration leaves no table entry,
    /// no seeded directories, and no native watch behind.
    fn register_dir(&mut self, dir: &Path, kinds: &[ChangeKind]) -> Result<WatchToken, WatchError> {
        let subdirs: Vec<PathBuf> = self
            .fs
            .list_children(dir)
            .map_err(|e| WatchError::filesystem(dir, e))?
            .into_iter()
            .filter(|child| self.fs.is_dir(child))
            .collect();

        let token = match self.facility.watch(dir, kinds) {
            Ok(token) => token,
            Err(e) => return Err(self.facility_failure(e, || format!("failed to register path: {}", dir.display()))),
        };
        self.registrations.insert(token, dir.to_path_buf());

        debug!("Registered {} as {} ({} subdirectories)", dir.display(), token, subdirs.len());
        self.directories.extend(subdirs);
        Ok(token)
    }

    /// Absolute path of `name` within the directory registered as `token`
    pub fn resolve_absolute_path(&self, token: WatchToken, name: &Path) -> Result<PathBuf, WatchError> {
        self.registrations
            .get(&token)
            .map(|base| base.join(name))
            .ok_or(WatchError::UnknownRegistration(token))
    }

    /// Classify raw notifications for one registration, in arrival order
    ///
    /// Created and modified entries are checked on disk and recorded when they
    /// are directories. Deleted entries are never checked on disk: their
    /// directory flag is whatever the session last knew, and they are
    /// forgotten afterwards.
    pub fn resolve_events(&mut self, token: WatchToken, raw: &[RawNotification]) -> Result<Vec<ChangeEvent>, WatchError> {
        let base = self
            .registrations
            .get(&token)
            .cloned()
            .ok_or(WatchError::UnknownRegistration(token))?;

        let mut events = Vec::with_capacity(raw.len());
        for notification in raw {
            let path = base.join(&notification.name);

            let is_dir = match notification.kind {
                ChangeKind::Created | ChangeKind::Modified => {
                    let is_dir = self.fs.is_dir(&path);
                    if is_dir {
                        self.directories.insert(path.clone());
                    }
                    is_dir
                }
                ChangeKind::Deleted => self.directories.remove(&path),
            };

            trace!("{} {} (dir: {})", notification.kind, path.display(), is_dir);
            events.push(ChangeEvent::new(notification.kind, path, is_dir));
        }

        Ok(events)
    }

    /// Wait for changes on any registration
    ///
    /// Returns the resolved events of one ready registration. The list can be
    /// empty if the facility woke up without pending notifications; call again.
    pub fn take(&mut self) -> Result<Vec<ChangeEvent>, WatchError> {
        self.ensure_open(|| "failed to take next event".to_string())?;

        let token = match self.facility.wait_ready() {
            Ok(token) => token,
            Err(e) => return Err(self.facility_failure(e, || "failed to take next event".to_string())),
        };
        self.drain(token)
    }

    /// Resolved events of one ready registration, without blocking
    ///
    /// Empty when closed or when nothing is ready. Failures other than
    /// closure are logged and dropped; use [`try_poll`](Self::try_poll) to
    /// receive them.
    pub fn poll(&mut self) -> Vec<ChangeEvent> {
        match self.try_poll() {
            Ok(events) => events,
            Err(e) if e.is_closed() => Vec::new(),
            Err(e) => {
                error!("Dropping polled events: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`poll`](Self::poll), but surfaces failures other than closure
    pub fn try_poll(&mut self) -> Result<Vec<ChangeEvent>, WatchError> {
        if self.is_closed() {
            self.mark_closed();
            return Ok(Vec::new());
        }

        match self.facility.poll_ready() {
            Ok(Some(token)) => self.drain(token),
            Ok(None) => Ok(Vec::new()),
            Err(FacilityError::Closed) => {
                self.mark_closed();
                Ok(Vec::new())
            }
            Err(e) => Err(WatchError::Facility(e)),
        }
    }

    fn drain(&mut self, token: WatchToken) -> Result<Vec<ChangeEvent>, WatchError> {
        let raw = self.facility.pending(token);
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        self.resolve_events(token, &raw)
    }

    /// Close the session and release the facility
    ///
    /// Calling it again only repeats the release. To stop a `take()` running
    /// on another thread, use [`close_handle`](Self::close_handle).
    pub fn close(&mut self) -> Result<(), WatchError> {
        if self.state == SessionState::Open {
            debug!("Closing watch session ({} registrations)", self.registrations.len());
        }
        self.state = SessionState::Closed;
        self.interrupter.interrupt();
        self.facility.release().map_err(WatchError::Facility)
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed || self.interrupter.is_interrupted()
    }

    pub fn state(&self) -> SessionState {
        if self.is_closed() {
            SessionState::Closed
        } else {
            SessionState::Open
        }
    }

    /// Handle for closing this session from another thread
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle::new(self.interrupter.clone())
    }

    /// Whether `path` is currently remembered as a directory
    pub fn is_known_dir(&self, path: impl AsRef<Path>) -> bool {
        self.directories.contains(path.as_ref())
    }

    /// Number of registered directories
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Directory registered as `token`
    pub fn registered_path(&self, token: WatchToken) -> Option<&Path> {
        self.registrations.get(&token).map(PathBuf::as_path)
    }

    fn ensure_open(&mut self, context: impl FnOnce() -> String) -> Result<(), WatchError> {
        if self.is_closed() {
            self.mark_closed();
            return Err(WatchError::closed(context()));
        }
        Ok(())
    }

    /// Convert a facility failure, moving to closed when the facility was shut
    fn facility_failure(&mut self, err: FacilityError, context: impl FnOnce() -> String) -> WatchError {
        match err {
            FacilityError::Closed => {
                self.mark_closed();
                WatchError::closed(context())
            }
            other => WatchError::Facility(other),
        }
    }

    fn mark_closed(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        debug!("Watch facility closed out-of-band");
        self.state = SessionState::Closed;
        if let Err(e) = self.facility.release() {
            warn!("Failed to release watch facility: {}", e);
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf, WatchError> {
    std::path::absolute(path).map_err(|e| WatchError::filesystem(path, e))
}
