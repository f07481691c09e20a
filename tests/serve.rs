//! End-to-end tests for serving files out of asar archives.
//!
//! These build real containers on disk and go through the public API only.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use asar_vfs::{
    ArchiveIndex, ArchiveRegistry, EntryPath, JobError, Location, PathResolver, ServeContext,
    ServeOptions, fetch, stream_to,
};
use tempfile::TempDir;

/// Pack `files` (path, bytes) into a container, mimicking what a packer writes.
fn pack(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut root = serde_json::json!({ "files": {} });
    let mut content = Vec::new();

    for (path, data) in files {
        let mut node = &mut root;
        let components: Vec<&str> = path.split('/').collect();
        let (name, dirs) = components.split_last().unwrap();
        for dir in dirs {
            node = node["files"]
                .as_object_mut()
                .unwrap()
                .entry(dir.to_string())
                .or_insert_with(|| serde_json::json!({ "files": {} }));
        }
        node["files"][*name] = serde_json::json!({
            "offset": content.len().to_string(),
            "size": data.len(),
        });
        content.extend_from_slice(data);
    }

    let json = root.to_string();
    let padded = json.len().next_multiple_of(4);
    let header_size = (8 + padded) as u32;

    let mut out = Vec::new();
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&header_size.to_le_bytes());
    out.extend_from_slice(&((padded + 4) as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(json.as_bytes());
    out.resize(8 + header_size as usize, 0);
    out.extend_from_slice(&content);
    out
}

fn create_test_archive(files: &[(&str, &[u8])]) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("resources").join("app.asar");
    std::fs::create_dir_all(archive_path.parent().unwrap()).unwrap();
    std::fs::write(&archive_path, pack(files)).unwrap();
    (temp_dir, archive_path)
}

const FILES: &[(&str, &[u8])] = &[
    ("index.html", b"<!doctype html><title>hi</title>"),
    ("dist/app.js", b"console.log('hello from the archive');"),
    ("dist/vendor/lib.js", b"export default 42;"),
];

#[tokio::test]
async fn test_every_entry_round_trips() {
    let (_dir, archive) = create_test_archive(FILES);
    let context = Arc::new(ServeContext::default());

    for (path, data) in FILES {
        let response = fetch(Arc::clone(&context), archive.join(path), None)
            .await
            .unwrap();
        assert_eq!(response.body, *data, "{path}");
        assert_eq!(response.info.content_length, data.len() as u64);
        assert_eq!(response.info.header("Accept-Ranges"), Some("bytes"));
    }
    assert_eq!(context.registry().build_count(), 1);
}

#[tokio::test]
async fn test_mime_from_entry_name() {
    let (_dir, archive) = create_test_archive(FILES);
    let context = Arc::new(ServeContext::default());

    let html = fetch(Arc::clone(&context), archive.join("index.html"), None)
        .await
        .unwrap();
    assert_eq!(html.info.header("Content-Type"), Some("text/html"));

    let js = fetch(context, archive.join("dist/app.js"), None)
        .await
        .unwrap();
    assert_eq!(js.info.header("Content-Type"), Some("text/javascript"));
}

#[tokio::test]
async fn test_stream_range_to_writer() {
    let (_dir, archive) = create_test_archive(FILES);
    let mut out = Vec::new();
    let info = stream_to(
        Arc::new(ServeContext::default()),
        archive.join("dist/app.js"),
        Some("bytes=8-10"),
        &mut out,
    )
    .await
    .unwrap();
    assert_eq!(info.content_length, 3);
    assert_eq!(out, b"log");
}

#[tokio::test]
async fn test_directories_are_not_entries() {
    let (_dir, archive) = create_test_archive(FILES);
    let err = fetch(Arc::new(ServeContext::default()), archive.join("dist"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::NotFound(_)));
}

#[tokio::test]
async fn test_shared_registry() {
    let (_dir, archive) = create_test_archive(FILES);
    let registry = Arc::new(ArchiveRegistry::new());
    let strict = Arc::new(ServeContext::with_registry(
        Arc::clone(&registry),
        ServeOptions::default(),
    ));
    let lax = Arc::new(ServeContext::with_registry(
        Arc::clone(&registry),
        ServeOptions {
            verify_integrity: false,
            ..Default::default()
        },
    ));

    fetch(strict, archive.join("index.html"), None).await.unwrap();
    fetch(lax, archive.join("index.html"), None).await.unwrap();
    assert_eq!(registry.build_count(), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_index_listing() {
    let (_dir, archive) = create_test_archive(FILES);
    let index = ArchiveIndex::open(&archive).unwrap();
    let paths: Vec<&str> = index.iter().map(|(path, _)| path.as_str()).collect();
    assert_eq!(paths, ["dist/app.js", "dist/vendor/lib.js", "index.html"]);

    let bytes = std::fs::read(&archive).unwrap();
    for (path, record) in index.iter() {
        let expected = FILES.iter().find(|(p, _)| *p == path.as_str()).unwrap().1;
        let start = record.offset as usize;
        assert_eq!(&bytes[start..start + record.size as usize], expected);
    }
}

#[test]
fn test_copy_file_out() {
    let (_dir, archive) = create_test_archive(FILES);
    let registry = ArchiveRegistry::new();
    let copy = registry
        .copy_file_out(&archive, &EntryPath::new("dist/vendor/lib.js").unwrap())
        .unwrap();
    assert_eq!(std::fs::read(copy).unwrap(), b"export default 42;");
}

#[test]
fn test_resolver_is_pure() {
    let resolver = PathResolver::default();
    let location = resolver
        .classify(Path::new("/does/not/exist/app.asar/a/b.txt"))
        .unwrap();
    assert_eq!(
        location,
        Location::Archive {
            archive_path: PathBuf::from("/does/not/exist/app.asar"),
            entry_path: EntryPath::new("a/b.txt").unwrap(),
        }
    );
}
