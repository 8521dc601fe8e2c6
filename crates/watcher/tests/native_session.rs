//! Sessions over the host's native notification service

use dirwatch::{ChangeEvent, ChangeKind, WatchSession};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const DEADLINE: Duration = Duration::from_secs(5);

/// Poll until an event for `path` with `kind` shows up
fn wait_for(session: &mut WatchSession, kind: ChangeKind, path: &Path) -> ChangeEvent {
    let start = Instant::now();
    while start.elapsed() < DEADLINE {
        let events = session.try_poll().unwrap();
        if let Some(event) = events
            .into_iter()
            .find(|e| e.kind() == kind && e.path() == path)
        {
            return event;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("no {} event for {} within {:?}", kind, path.display(), DEADLINE);
}

fn canonical_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    (temp_dir, root)
}

#[test]
fn test_deleted_directory_is_reported_as_directory() {
    let (_temp_dir, root) = canonical_temp_dir();
    let mut session = WatchSession::new().unwrap();
    session.register(&root, &[]).unwrap();

    let sub = root.join("sub");
    fs::create_dir(&sub).unwrap();
    let created = wait_for(&mut session, ChangeKind::Created, &sub);
    assert!(created.is_dir());

    fs::remove_dir(&sub).unwrap();
    let deleted = wait_for(&mut session, ChangeKind::Deleted, &sub);
    assert!(deleted.is_dir());

    session.close().unwrap();
}

#[test]
fn test_deleted_file_is_reported_as_file() {
    let (_temp_dir, root) = canonical_temp_dir();
    let mut session = WatchSession::new().unwrap();
    session.register(&root, &[]).unwrap();

    let file = root.join("notes.txt");
    fs::write(&file, b"content").unwrap();
    assert!(!wait_for(&mut session, ChangeKind::Created, &file).is_dir());

    fs::remove_file(&file).unwrap();
    assert!(!wait_for(&mut session, ChangeKind::Deleted, &file).is_dir());
}

#[test]
fn test_preexisting_directory_deletion_uses_registration_listing() {
    let (_temp_dir, root) = canonical_temp_dir();
    let existing = root.join("existing");
    fs::create_dir(&existing).unwrap();

    let mut session = WatchSession::new().unwrap();
    session.register(&root, &[ChangeKind::Deleted]).unwrap();

    fs::remove_dir(&existing).unwrap();
    assert!(wait_for(&mut session, ChangeKind::Deleted, &existing).is_dir());
}

#[test]
fn test_recursive_registration_sees_nested_changes() {
    let (_temp_dir, root) = canonical_temp_dir();
    let deep = root.join("a/b/c");
    fs::create_dir_all(&deep).unwrap();

    let mut session = WatchSession::new().unwrap();
    session.register_recursive(&root, &[]).unwrap();
    assert_eq!(session.registration_count(), 4);

    let file = deep.join("deep.txt");
    fs::write(&file, b"content").unwrap();
    let event = wait_for(&mut session, ChangeKind::Created, &file);
    assert!(!event.is_dir());
}

#[test]
fn test_register_file_leaves_no_registration() {
    let (_temp_dir, root) = canonical_temp_dir();
    let file = root.join("plain.txt");
    fs::write(&file, b"content").unwrap();

    let mut session = WatchSession::new().unwrap();
    assert!(session.register(&file, &[]).is_err());
    assert_eq!(session.registration_count(), 0);
    assert!(!session.is_closed());
}

#[cfg(unix)]
#[test]
fn test_watched_subdirectory_metadata_change_reported_once() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp_dir, root) = canonical_temp_dir();
    let sub = root.join("sub");
    fs::create_dir(&sub).unwrap();

    let mut session = WatchSession::new().unwrap();
    session.register_recursive(&root, &[ChangeKind::Modified]).unwrap();
    assert_eq!(session.registration_count(), 2);

    fs::set_permissions(&sub, fs::Permissions::from_mode(0o700)).unwrap();
    // Let both backend reports land before draining
    thread::sleep(Duration::from_millis(300));

    let mut modified = Vec::new();
    let settle = Instant::now();
    while settle.elapsed() < Duration::from_millis(500) {
        modified.extend(
            session
                .try_poll()
                .unwrap()
                .into_iter()
                .filter(|e| e.kind() == ChangeKind::Modified && e.path() == sub),
        );
        thread::sleep(Duration::from_millis(20));
    }

    assert_eq!(modified.len(), 1);
    assert!(modified[0].is_dir());
}

#[test]
fn test_close_handle_unblocks_take() {
    let (_temp_dir, root) = canonical_temp_dir();
    let mut session = WatchSession::new().unwrap();
    session.register(&root, &[]).unwrap();
    let handle = session.close_handle();

    let worker = thread::spawn(move || session.take());
    thread::sleep(Duration::from_millis(100));
    handle.close();

    let result = worker.join().unwrap();
    assert!(result.unwrap_err().is_closed());
}

#[test]
fn test_closed_session_rejects_work() {
    let (_temp_dir, root) = canonical_temp_dir();
    let mut session = WatchSession::new().unwrap();
    assert!(session.poll().is_empty());

    session.close().unwrap();
    assert!(session.is_closed());
    assert!(session.register(&root, &[]).unwrap_err().is_closed());
    assert!(session.take().unwrap_err().is_closed());
    assert!(session.poll().is_empty());
}
