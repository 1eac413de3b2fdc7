use atomic_paths::{AtomicPathsError, Op};
use std::error::Error as _;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use tempfile::tempdir;

fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[test]
fn permission_denied_carries_op_path_and_hint() {
    if running_as_root() {
        eprintln!("Skipping: root bypasses directory permissions");
        return;
    }
    let td = tempdir().unwrap();
    let locked = td.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

    let err = atomic_paths::create_file(locked.join("f"), 0o644).unwrap_err();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();

    assert_eq!(err.op(), Some(Op::Create));
    let msg = err.to_string();
    assert!(msg.starts_with("create '"), "{msg}");
    assert!(msg.contains("permission denied"), "{msg}");
    assert!(msg.contains("os code"), "{msg}");
    assert!(err.source().is_some());
}

#[test]
fn rename_failure_is_tagged_rename() {
    let td = tempdir().unwrap();
    let target = td.path().join("busy");
    fs::create_dir(&target).unwrap();
    fs::write(target.join("child"), "x").unwrap();

    let mut f = atomic_paths::create_file(&target, 0o644).unwrap();
    f.write_all(b"y").unwrap();
    let err = f.commit().unwrap_err();
    match &err {
        AtomicPathsError::Io { op, path, .. } => {
            assert_eq!(*op, Op::Rename);
            assert_eq!(path, &target);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("busy"));
    // Closing after a failed placement discards the temp file.
    let temp = f.name().to_path_buf();
    f.close().unwrap();
    assert!(!temp.exists());
}

#[test]
fn codes_are_stable() {
    assert_eq!(AtomicPathsError::AlreadyCommitted.code(), "already_committed");
    assert_eq!(AtomicPathsError::AlreadyClosed.code(), "already_closed");
    assert_eq!(AtomicPathsError::RolledBack.code(), "rolled_back");
    assert_eq!(AtomicPathsError::AlreadyClosed.op(), None);
}
