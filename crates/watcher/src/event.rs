//! Resolved change events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Type of file system change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Entry created (or moved into the watched directory)
    Created,
    /// Entry modified
    Modified,
    /// Entry deleted (or moved out of the watched directory)
    Deleted,
}

impl ChangeKind {
    /// Every kind, in declaration order
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Created, ChangeKind::Modified, ChangeKind::Deleted];

    fn bit(self) -> u8 {
        match self {
            ChangeKind::Created => 0b001,
            ChangeKind::Modified => 0b010,
            ChangeKind::Deleted => 0b100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" | "create" => Ok(ChangeKind::Created),
            "modified" | "modify" => Ok(ChangeKind::Modified),
            "deleted" | "delete" => Ok(ChangeKind::Deleted),
            other => Err(format!("unknown change kind: {other}")),
        }
    }
}

/// Set of change kinds a registration is interested in
///
/// An empty slice of kinds means "everything".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSet(u8);

impl KindSet {
    pub const ALL: KindSet = KindSet(0b111);

    pub fn from_kinds(kinds: &[ChangeKind]) -> Self {
        if kinds.is_empty() {
            return Self::ALL;
        }
        KindSet(kinds.iter().fold(0, |bits, kind| bits | kind.bit()))
    }

    pub fn contains(self, kind: ChangeKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn union(self, other: KindSet) -> KindSet {
        KindSet(self.0 | other.0)
    }
}

/// One resolved change
///
/// Built once per raw notification and never mutated afterwards. `is_dir`
/// for a deletion comes from what the session remembered about the path,
/// since the object no longer exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    kind: ChangeKind,
    path: PathBuf,
    is_dir: bool,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: PathBuf, is_dir: bool) -> Self {
        Self { kind, path, is_dir }
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Absolute path of the changed entry
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_kinds_means_all() {
        let set = KindSet::from_kinds(&[]);
        for kind in ChangeKind::ALL {
            assert!(set.contains(kind));
        }
    }

    #[test]
    fn test_kind_set_filters() {
        let set = KindSet::from_kinds(&[ChangeKind::Created, ChangeKind::Deleted]);
        assert!(set.contains(ChangeKind::Created));
        assert!(!set.contains(ChangeKind::Modified));
        assert!(set.contains(ChangeKind::Deleted));

        let widened = set.union(KindSet::from_kinds(&[ChangeKind::Modified]));
        assert_eq!(widened, KindSet::ALL);
    }

    #[test]
    fn test_parse_kind_names() {
        assert_eq!("created".parse::<ChangeKind>().unwrap(), ChangeKind::Created);
        assert_eq!(" Modify ".parse::<ChangeKind>().unwrap(), ChangeKind::Modified);
        assert_eq!("DELETED".parse::<ChangeKind>().unwrap(), ChangeKind::Deleted);
        assert!("renamed".parse::<ChangeKind>().is_err());
    }
}
