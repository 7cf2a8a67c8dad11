//! Integration tests for uploads, listings, signed URLs, and search.

mod helpers;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use canopy_core::config::AppConfig;
use canopy_core::error::ErrorKind;
use canopy_core::result::AppResult;
use canopy_core::traits::{BlobStore, ByteStream, SignedUrl};
use canopy_core::types::UserId;
use canopy_database::{MemoryStore, NodeRepository};
use canopy_entity::node::{MaterializedPath, NewNode};
use canopy_storage::MemoryBlobStore;

use helpers::{TestApp, member, upload};

/// Blob store that lets a competing upload claim a name while the bytes
/// of the next upload are being stored.
#[derive(Debug)]
struct RacingBlobStore {
    inner: Arc<MemoryBlobStore>,
    store: Arc<MemoryStore>,
    rival: Mutex<Option<NewNode>>,
}

#[async_trait]
impl BlobStore for RacingBlobStore {
    fn provider_type(&self) -> &str {
        "racing"
    }

    async fn put(&self, data: Bytes, content_type: &str) -> AppResult<String> {
        let rival = self.rival.lock().unwrap().take();
        if let Some(rival) = rival {
            self.store.insert(rival).await?;
        }
        self.inner.put(data, content_type).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.inner.delete(key).await
    }

    async fn download_url(&self, key: &str, file_name: &str) -> AppResult<SignedUrl> {
        self.inner.download_url(key, file_name).await
    }

    async fn preview_url(&self, key: &str) -> AppResult<SignedUrl> {
        self.inner.preview_url(key).await
    }

    async fn read_stream(&self, key: &str) -> AppResult<ByteStream> {
        self.inner.read_stream(key).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}

#[tokio::test]
async fn test_duplicate_upload_gets_numbered_name() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let folder = app.folder(owner, "Reports", None).await;

    app.file(owner, "report.pdf", Some(folder.id), b"v1").await;
    let second = app.file(owner, "report.pdf", Some(folder.id), b"v2").await;
    assert_eq!(second.name, "report (1).pdf");

    let batch = app
        .services
        .uploads
        .register_upload(
            vec![upload("report.pdf", b"v3"), upload("README", b"r"), upload("README", b"r")],
            owner,
            Some(folder.id),
        )
        .await
        .unwrap();
    let names: Vec<&str> = batch.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["report (2).pdf", "README", "README (1)"]);
    assert_eq!(app.blobs.len().await, 5);
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected_before_storing() {
    let mut config = AppConfig::default();
    config.storage.max_upload_size_bytes = 4;
    let app = TestApp::with_config(config).await;
    let owner = UserId::new();

    let err = app
        .services
        .uploads
        .register_upload(
            vec![upload("small.txt", b"ok"), upload("big.txt", b"too large")],
            owner,
            None,
        )
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::InvalidArgument));
    assert!(app.blobs.is_empty().await);
}

#[tokio::test]
async fn test_upload_losing_name_race_conflicts_and_drops_blob() {
    let owner = UserId::new();
    let rival = NewNode {
        owner_id: owner,
        name: "report.pdf".to_string(),
        is_folder: false,
        parent_id: None,
        path: MaterializedPath::root(),
        size_bytes: 1,
        content_ref: Some("elsewhere".to_string()),
        mime_type: Some("application/pdf".to_string()),
    };
    let app = TestApp::with_blob_store(AppConfig::default(), |blobs, store| {
        Arc::new(RacingBlobStore {
            inner: blobs,
            store,
            rival: Mutex::new(Some(rival)),
        })
    })
    .await;

    let err = app
        .services
        .uploads
        .register_upload(vec![upload("report.pdf", b"mine")], owner, None)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Conflict));
    assert!(app.blobs.is_empty().await);

    let root = app.services.files.list(&member(owner), None).await.unwrap();
    assert_eq!(root.nodes.len(), 1);
    assert_eq!(root.nodes[0].content_ref.as_deref(), Some("elsewhere"));

    // With the rival settled, a retry picks the next free name.
    let retried = app.file(owner, "report.pdf", None, b"mine").await;
    assert_eq!(retried.name, "report (1).pdf");
}

#[tokio::test]
async fn test_root_listing_sorts_folders_first() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    app.file(owner, "b.txt", None, b"b").await;
    app.folder(owner, "zeta", None).await;
    app.file(owner, "A.txt", None, b"a").await;
    app.folder(owner, "Alpha", None).await;
    app.folder(UserId::new(), "not mine", None).await;

    let listing = app.services.files.list(&member(owner), None).await.unwrap();
    let names: Vec<&str> = listing.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "zeta", "A.txt", "b.txt"]);
    assert!(listing.current_folder.is_none());
    assert!(listing.breadcrumbs.is_empty());
}

#[tokio::test]
async fn test_shared_notes_breadcrumbs_start_at_shared_folder() {
    let app = TestApp::new().await;
    let owner = app.create_user("Owner", true).await;
    let friend = app.create_user("Friend", true).await;

    let courses = app.folder(owner, "Courses", None).await;
    let notes = app.folder(owner, "Notes", Some(courses.id)).await;
    let week = app.folder(owner, "Week1", Some(notes.id)).await;
    app.file(owner, "intro.pdf", Some(week.id), b"pdf").await;

    app.services
        .shares
        .share_with_user(notes.id, owner, friend, None)
        .await
        .unwrap();

    let listing = app
        .services
        .files
        .list(&member(friend), Some(week.id))
        .await
        .unwrap();
    assert_eq!(listing.nodes.len(), 1);
    let trail: Vec<&str> = listing.breadcrumbs.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(trail, vec!["Notes", "Week1"]);

    let own = app
        .services
        .files
        .list(&member(owner), Some(week.id))
        .await
        .unwrap();
    let trail: Vec<&str> = own.breadcrumbs.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(trail, vec!["Courses", "Notes", "Week1"]);

    let err = app
        .services
        .files
        .list(&member(friend), Some(courses.id))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Forbidden));
}

#[tokio::test]
async fn test_download_url_is_cached_per_requester() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let file = app.file(owner, "notes.txt", None, b"hello").await;

    let first = app
        .services
        .downloads
        .get_download_url(file.id, &member(owner))
        .await
        .unwrap();
    let second = app
        .services
        .downloads
        .get_download_url(file.id, &member(owner))
        .await
        .unwrap();
    assert_eq!(first, second);
    assert!(first.url.contains("name=notes.txt"));

    let preview = app
        .services
        .downloads
        .get_preview_url(file.id, &member(owner))
        .await
        .unwrap();
    assert_ne!(preview.url, first.url);
}

#[tokio::test]
async fn test_download_requires_read_access_and_a_file() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let folder = app.folder(owner, "Docs", None).await;
    let file = app.file(owner, "secret.txt", Some(folder.id), b"s").await;

    let err = app
        .services
        .downloads
        .get_download_url(file.id, &member(UserId::new()))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Forbidden));

    let err = app
        .services
        .downloads
        .get_download_url(folder.id, &member(owner))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::InvalidArgument));
}

#[tokio::test]
async fn test_search_covers_owned_and_shared_nodes() {
    let app = TestApp::new().await;
    let owner = app.create_user("Owner", true).await;
    let friend = app.create_user("Friend", true).await;

    let shared = app.folder(owner, "Shared", None).await;
    app.file(owner, "Lecture-Notes.pdf", Some(shared.id), b"l").await;
    app.file(owner, "private notes.txt", None, b"p").await;
    app.file(friend, "my notes.md", None, b"m").await;

    app.services
        .shares
        .share_with_user(shared.id, owner, friend, None)
        .await
        .unwrap();

    let results = app
        .services
        .search
        .search(&member(friend), "NOTES")
        .await
        .unwrap();
    let mut names: Vec<&str> = results.iter().map(|n| n.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Lecture-Notes.pdf", "my notes.md"]);

    let empty = app
        .services
        .search
        .search(&member(friend), "   ")
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_list_descendant_files_skips_folders() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let root = app.folder(owner, "Root", None).await;
    let sub = app.folder(owner, "Sub", Some(root.id)).await;
    app.file(owner, "a.txt", Some(root.id), b"a").await;
    app.file(owner, "b.txt", Some(sub.id), b"b").await;

    let files = app
        .services
        .files
        .list_descendant_files(root.id, &member(owner))
        .await
        .unwrap();
    let mut names: Vec<&str> = files.iter().map(|n| n.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}
