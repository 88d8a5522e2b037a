//! Ordering and failure policy of folder uploads.

mod common;

use std::fs;

use common::{payload, Call, MockServer};
use filebrowser_cli::error::exit_code;
use filebrowser_cli::tree::EntryKind;
use filebrowser_cli::{CancelFlag, Error, FailurePolicy, TreeUploader, UploadOptions};
use tempfile::TempDir;

fn options() -> UploadOptions {
    UploadOptions {
        override_existing: false,
        max_attempts: 2,
        chunk_size: 8,
    }
}

/// root/{a.txt, sub/b.txt}
fn simple_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("b.txt"), b"bravo!").unwrap();
    dir
}

#[test]
fn files_before_folders_then_descend() {
    let dir = simple_tree();
    let server = MockServer::new();

    let report = TreeUploader::new(&server, options(), CancelFlag::new())
        .upload(dir.path(), "/up")
        .unwrap();

    assert_eq!(
        server.mutations(),
        vec!["upload up/a.txt", "mkdir up/sub", "upload up/sub/b.txt"]
    );
    assert!(report.first_error().is_none());
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.outcomes[1].kind, EntryKind::Folder);
    assert_eq!(report.uploaded_bytes(), 11);
    assert_eq!(server.file("up/a.txt").unwrap(), b"alpha");
    assert_eq!(server.file("up/sub/b.txt").unwrap(), b"bravo!");
}

#[test]
fn level_order_in_a_deeper_tree() {
    // root/{x.txt, d1/{y.txt, d2/{z.txt}}, e/}
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::write(root.join("x.txt"), b"x").unwrap();
    fs::create_dir_all(root.join("d1").join("d2")).unwrap();
    fs::write(root.join("d1").join("y.txt"), payload(20)).unwrap();
    fs::write(root.join("d1").join("d2").join("z.txt"), b"z").unwrap();
    fs::create_dir(root.join("e")).unwrap();
    let server = MockServer::new();

    let report = TreeUploader::new(&server, options(), CancelFlag::new())
        .upload(root, "up/")
        .unwrap();

    assert_eq!(
        server.mutations(),
        vec![
            "upload up/x.txt",
            "mkdir up/d1",
            "mkdir up/e",
            "upload up/d1/y.txt",
            "mkdir up/d1/d2",
            "upload up/d1/d2/z.txt",
        ]
    );
    assert!(report.first_error().is_none());
    assert!(server.has_folder("up/e"));
    assert_eq!(server.file("up/d1/y.txt").unwrap(), payload(20));
}

#[test]
fn folder_without_parent_fails_and_halts() {
    // Nothing uploaded at the top level, so "up" never comes into being.
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("b.txt"), b"b").unwrap();
    let server = MockServer::new();

    let report = TreeUploader::new(&server, options(), CancelFlag::new())
        .upload(dir.path(), "up")
        .unwrap();

    assert_eq!(server.mutations(), vec!["mkdir up/sub"]);
    assert_eq!(report.outcomes.len(), 1);
    let err = report.first_error().unwrap();
    assert!(matches!(err, Error::CreateFolder { .. }));
    assert_eq!(err.exit_code(), exit_code::CREATE_FOLDER);
}

#[test]
fn keep_going_collects_all_outcomes() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("b.txt"), b"b").unwrap();
    let server = MockServer::new();

    let report = TreeUploader::new(&server, options(), CancelFlag::new())
        .with_policy(FailurePolicy::Continue)
        .upload(dir.path(), "up")
        .unwrap();

    // The file upload still lands: it creates its own parents.
    assert_eq!(server.mutations(), vec!["mkdir up/sub", "upload up/sub/b.txt"]);
    assert_eq!(report.failures().count(), 1);
    assert!(report.outcomes[1].is_ok());
    assert_eq!(server.file("up/sub/b.txt").unwrap(), b"b");
}

#[test]
fn halt_stops_after_first_failed_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"a").unwrap();
    fs::write(dir.path().join("b.txt"), b"b").unwrap();
    let server = MockServer::new().with_file("up/a.txt", b"remote");

    let report = TreeUploader::new(&server, options(), CancelFlag::new())
        .upload(dir.path(), "up")
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert!(matches!(report.first_error(), Some(Error::RemoteExists(_))));
    assert!(server.mutations().is_empty());
    assert!(server.file("up/b.txt").is_none());
}

#[test]
fn continue_uploads_remaining_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"a").unwrap();
    fs::write(dir.path().join("b.txt"), b"b").unwrap();
    let server = MockServer::new().with_file("up/a.txt", b"remote");

    let report = TreeUploader::new(&server, options(), CancelFlag::new())
        .with_policy(FailurePolicy::Continue)
        .upload(dir.path(), "up")
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.failures().count(), 1);
    assert_eq!(server.mutations(), vec!["upload up/b.txt"]);
    assert_eq!(server.file("up/a.txt").unwrap(), b"remote");
}

#[test]
fn single_file_root_uploads_to_target() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("one.txt");
    fs::write(&file, b"one").unwrap();
    let server = MockServer::new();

    let report = TreeUploader::new(&server, options(), CancelFlag::new())
        .upload(&file, "/remote/one.txt")
        .unwrap();

    assert_eq!(server.mutations(), vec!["upload remote/one.txt"]);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].kind, EntryKind::File);
}

#[test]
fn missing_root_is_local_error_without_calls() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::new();

    let err = TreeUploader::new(&server, options(), CancelFlag::new())
        .upload(&dir.path().join("absent"), "up")
        .unwrap_err();

    assert!(matches!(err, Error::LocalMissing(_)));
    assert!(server.calls().is_empty());
}

#[test]
fn cancelled_walk_schedules_nothing() {
    let dir = simple_tree();
    let server = MockServer::new();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = TreeUploader::new(&server, options(), cancel)
        .upload(dir.path(), "up")
        .unwrap();

    assert!(report.cancelled);
    assert!(report.outcomes.is_empty());
    assert!(server.calls().is_empty());
}

#[test]
fn cancel_during_file_stops_the_walk() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.bin"), payload(40)).unwrap();
    fs::write(dir.path().join("b.bin"), payload(40)).unwrap();
    let server = MockServer::new();
    let cancel = CancelFlag::new();
    server.cancel_after(1, cancel.clone());

    let report = TreeUploader::new(&server, options(), cancel)
        .with_policy(FailurePolicy::Continue)
        .upload(dir.path(), "up")
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), 1);
    assert!(matches!(report.first_error(), Some(Error::Cancelled(_))));
    assert_eq!(server.mutations(), vec!["upload up/a.bin", "delete up/a.bin"]);
    assert_eq!(server.count(|c| matches!(c, Call::Patch { .. })), 1);
}
