use std::collections::BTreeMap;
use std::io::{Cursor, Write as _};
use std::path::Path;

use shelf_sync::UpdateQueue;
use shelf_sync::replace::{backup_path, replace_root};
use shelf_sync::version::read_recorded_revision;

const PREFIX: &str = "richardwilkes-gcs_library-";

fn library_zip(revision: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (relative, contents) in files {
        let name = format!("{PREFIX}{revision}/Library/{relative}");
        writer
            .start_file(name, options)
            .expect("file entry should be started");
        writer
            .write_all(contents)
            .expect("file entry should be written");
    }
    writer
        .finish()
        .expect("zip archive should be finalized")
        .into_inner()
}

/// Relative path -> contents for every file below `root`, for byte-identical
/// state comparisons.
fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).expect("directory should be readable") {
            let entry = entry.expect("entry should be readable");
            let path = entry.path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .expect("path should be below root")
                    .to_string_lossy()
                    .into_owned();
                out.insert(relative, std::fs::read(&path).expect("file should be readable"));
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

#[test]
fn fresh_install_extracts_content_and_records_revision() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let root = temp.path().join("master");
    let archive = library_zip("abc1234", &[("foo/bar.txt", b"0123456789")]);

    let extraction = replace_root(&root, Cursor::new(archive), PREFIX, "Library")
        .expect("first install should succeed");

    assert_eq!(extraction.revision, "abc1234");
    let contents = std::fs::read(root.join("foo/bar.txt")).expect("file should exist");
    assert_eq!(contents.len(), 10);
    assert_eq!(read_recorded_revision(&root), "abc1234");
    assert!(!backup_path(&root).exists());
}

#[test]
fn repeated_update_with_unchanged_revision_is_idempotent() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let root = temp.path().join("master");
    let archive = library_zip("abc1234", &[("a.txt", b"alpha"), ("dir/b.txt", b"beta")]);

    replace_root(&root, Cursor::new(archive.clone()), PREFIX, "Library")
        .expect("first update should succeed");
    let first = snapshot(&root);

    replace_root(&root, Cursor::new(archive), PREFIX, "Library")
        .expect("second update should succeed");
    let second = snapshot(&root);

    assert_eq!(first, second);
    assert_eq!(read_recorded_revision(&root), "abc1234");
}

#[test]
fn failed_update_restores_the_previous_tree_byte_for_byte() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let root = temp.path().join("master");
    let archive = library_zip("abc1234", &[("a.txt", b"alpha"), ("deep/nested/c.txt", b"gamma")]);
    replace_root(&root, Cursor::new(archive), PREFIX, "Library")
        .expect("initial install should succeed");
    let before = snapshot(&root);

    let result = replace_root(
        &root,
        Cursor::new(b"truncated garbage, not a zip".to_vec()),
        PREFIX,
        "Library",
    );

    assert!(result.is_err());
    assert_eq!(snapshot(&root), before);
    assert!(!backup_path(&root).exists());
}

#[tokio::test]
async fn queued_updates_apply_strictly_in_submission_order() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let root = temp.path().join("master");
    let first_archive = library_zip("aaa1111", &[("a.txt", b"first")]);
    let second_archive = library_zip("bbb2222", &[("b.txt", b"second")]);

    let queue = UpdateQueue::new();
    let first_root = root.clone();
    let first = queue.submit(async move {
        replace_root(&first_root, Cursor::new(first_archive), PREFIX, "Library")
            .map(|extraction| extraction.revision)
    });
    let second_root = root.clone();
    let second = queue.submit(async move {
        replace_root(&second_root, Cursor::new(second_archive), PREFIX, "Library")
            .map(|extraction| extraction.revision)
    });

    let first_revision = first
        .await
        .expect("first task should complete")
        .expect("first update should succeed");
    let second_revision = second
        .await
        .expect("second task should complete")
        .expect("second update should succeed");

    assert_eq!(first_revision, "aaa1111");
    assert_eq!(second_revision, "bbb2222");
    // The second attempt began only after the first reached a terminal
    // state: it saw (and replaced) the first attempt's content.
    assert_eq!(read_recorded_revision(&root), "bbb2222");
    assert!(root.join("b.txt").exists());
    assert!(!root.join("a.txt").exists());
    assert!(!backup_path(&root).exists());
}
