//! Directory-aware file system watching
//!
//! This crate wraps a native, per-directory change notification facility in a
//! [`WatchSession`] that hands back fully resolved [`ChangeEvent`]s:
//! - Absolute paths instead of names relative to a registration
//! - Recursive registration built out of single-level watches
//! - Reliable `is_dir` flags for deletions, remembered from earlier observations
//! - Open/closed lifecycle with a cross-thread close handle that unblocks `take()`

pub mod config;
pub mod error;
pub mod event;
pub mod facility;
pub mod fs;
pub mod ignore;
pub mod platform;
pub mod session;

pub use config::WatchConfig;
pub use error::{FacilityError, WatchError};
pub use event::{ChangeEvent, ChangeKind, KindSet};
pub use facility::{CloseHandle, RawNotification, WatchFacility, WatchToken};
pub use fs::{FsQuery, LocalFs, MemoryFs};
pub use platform::memory::{MemoryFacility, MemoryFeed};
pub use platform::native::NotifyFacility;
pub use session::{SessionState, WatchSession};
