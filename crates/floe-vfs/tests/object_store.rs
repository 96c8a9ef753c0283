//! Object store backend behaviour against the in-memory store.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use floe_vfs::{
    BucketScope, FileSystem, MAX_LIST_PAGES, MemoryStore, ObjectStoreBackend, OpContext,
    RegionRouter, StoreError, VfsError,
};

fn epoch_plus(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// `docs` holds `a.txt` (10 B), `sub/b.txt` (5 B) and the zero-byte marker `sub/`.
fn docs(store: MemoryStore) -> Arc<MemoryStore> {
    store.create_bucket("docs", "us-east-1", epoch_plus(1_000));
    store.put_object("docs", "a.txt", Bytes::from_static(b"0123456789"), epoch_plus(2_000));
    store.put_object("docs", "sub/", Bytes::new(), epoch_plus(2_000));
    store.put_object("docs", "sub/b.txt", Bytes::from_static(b"hello"), epoch_plus(3_000));
    Arc::new(store)
}

fn creation_dates(store: &MemoryStore) -> HashMap<String, SystemTime> {
    store
        .bucket_regions()
        .into_keys()
        .map(|bucket| (bucket, epoch_plus(1_000)))
        .collect()
}

fn bucket_fs(store: Arc<MemoryStore>, max_entries: i64) -> ObjectStoreBackend {
    let dates = creation_dates(&store);
    let router = RegionRouter::single("us-east-1", store);
    ObjectStoreBackend::new(
        BucketScope::from_parts("docs", "").unwrap(),
        router,
        dates,
        max_entries,
    )
    .unwrap()
}

fn account_fs(store: Arc<MemoryStore>, max_entries: i64) -> ObjectStoreBackend {
    let dates = creation_dates(&store);
    let router = RegionRouter::single("us-east-1", store);
    ObjectStoreBackend::new(BucketScope::Account, router, dates, max_entries).unwrap()
}

#[tokio::test]
async fn test_docs_scenario() {
    let fs = bucket_fs(docs(MemoryStore::new()), -1);
    let ctx = OpContext::background();

    let root = fs.read_dir(&ctx, "/").await.unwrap();
    assert_eq!(root.len(), 2);
    assert_eq!(root[0].name, "sub/");
    assert!(root[0].is_dir());
    assert_eq!(root[0].size, 0);
    assert_eq!(root[1].name, "a.txt");
    assert!(!root[1].is_dir());
    assert_eq!(root[1].size, 10);

    let sub = fs.read_dir(&ctx, "/sub").await.unwrap();
    assert_eq!(sub.len(), 1);
    assert_eq!(sub[0].name, "sub/b.txt");
    assert_eq!(sub[0].size, 5);
    assert!(!sub[0].is_dir());
}

#[tokio::test]
async fn test_directory_stat_uses_bucket_creation_date() {
    let fs = bucket_fs(docs(MemoryStore::new()), -1);
    let ctx = OpContext::background();

    let info = fs.stat(&ctx, "/sub").await.unwrap();
    assert!(info.is_dir());
    assert_eq!(info.mod_time, epoch_plus(1_000));

    let info = fs.stat(&ctx, "/sub/b.txt").await.unwrap();
    assert!(info.is_file());
    assert_eq!(info.mod_time, epoch_plus(3_000));
}

#[tokio::test]
async fn test_pagination_is_transparent() {
    let small_pages = MemoryStore::new().with_page_size(3);
    for i in 0..25 {
        small_pages.put_object("docs", &format!("file-{i:02}.txt"), Bytes::from_static(b"x"), epoch_plus(0));
    }
    for dir in ["alpha", "beta"] {
        small_pages.put_object("docs", &format!("{dir}/inner.txt"), Bytes::from_static(b"x"), epoch_plus(0));
    }
    let small_pages = Arc::new(small_pages);

    let one_page = MemoryStore::new();
    for i in 0..25 {
        one_page.put_object("docs", &format!("file-{i:02}.txt"), Bytes::from_static(b"x"), epoch_plus(0));
    }
    for dir in ["alpha", "beta"] {
        one_page.put_object("docs", &format!("{dir}/inner.txt"), Bytes::from_static(b"x"), epoch_plus(0));
    }
    let one_page = Arc::new(one_page);

    let ctx = OpContext::background();
    let paged = bucket_fs(small_pages.clone(), -1).read_dir(&ctx, "/").await.unwrap();
    let whole = bucket_fs(one_page.clone(), -1).read_dir(&ctx, "/").await.unwrap();

    assert_eq!(paged.len(), 27);
    assert_eq!(paged.len(), whole.len());
    assert_eq!(small_pages.list_calls(), 9);
    assert_eq!(one_page.list_calls(), 1);
    assert_eq!(small_pages.last_max_keys(), Some(None));
}

#[tokio::test]
async fn test_page_ceiling() {
    let store = MemoryStore::new().with_page_size(1);
    for i in 0..30 {
        store.put_object("docs", &format!("k{i:02}"), Bytes::from_static(b"x"), epoch_plus(0));
    }
    let store = Arc::new(store);

    let entries = bucket_fs(store.clone(), -1)
        .read_dir(&OpContext::background(), "/")
        .await
        .unwrap();
    assert_eq!(entries.len(), MAX_LIST_PAGES);
    assert_eq!(store.list_calls(), MAX_LIST_PAGES);
}

#[tokio::test]
async fn test_max_entries_caps_listing() {
    let store = MemoryStore::new().with_page_size(4);
    for i in 0..50 {
        store.put_object("docs", &format!("k{i:02}"), Bytes::from_static(b"x"), epoch_plus(0));
    }
    let store = Arc::new(store);
    let ctx = OpContext::background();

    let entries = bucket_fs(store.clone(), 10).read_dir(&ctx, "/").await.unwrap();
    assert_eq!(entries.len(), 10);
    // 4 + 4 + 2: no page is fetched once the cap is reached.
    assert_eq!(store.list_calls(), 3);
    assert_eq!(store.last_max_keys(), Some(Some(10)));

    let entries = bucket_fs(store.clone(), 0).read_dir(&ctx, "/").await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_zero_byte_objects_are_directories() {
    let store = docs(MemoryStore::new());
    store.put_object("docs", "empty.txt", Bytes::new(), epoch_plus(0));
    let fs = bucket_fs(store, -1);
    let ctx = OpContext::background();

    let entries = fs.read_dir(&ctx, "/").await.unwrap();
    let empty = entries.iter().find(|e| e.name == "empty.txt").unwrap();
    assert!(empty.is_dir());
    assert!(fs.stat(&ctx, "/empty.txt").await.unwrap().is_dir());
}

#[tokio::test]
async fn test_account_scope() {
    let store = docs(MemoryStore::new());
    store.create_bucket("media", "us-east-1", epoch_plus(500));
    store.put_object("media", "logo.svg", Bytes::from_static(b"<svg/>"), epoch_plus(0));
    let dates: HashMap<String, SystemTime> =
        [("docs".to_string(), epoch_plus(1_000)), ("media".to_string(), epoch_plus(500))]
            .into_iter()
            .collect();
    let router = RegionRouter::single("us-east-1", store.clone());
    let fs = ObjectStoreBackend::new(BucketScope::Account, router, dates, -1).unwrap();
    let ctx = OpContext::background();

    let buckets = fs.read_dir(&ctx, "/").await.unwrap();
    let names: Vec<_> = buckets.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["docs", "media"]);
    assert!(buckets.iter().all(|e| e.is_dir()));

    let root = fs.stat(&ctx, "/").await.unwrap();
    assert!(root.is_dir());
    assert_eq!(root.mod_time, epoch_plus(500));

    let bucket = fs.stat(&ctx, "/media").await.unwrap();
    assert!(bucket.is_dir());
    assert_eq!(bucket.mod_time, epoch_plus(500));

    let sub = fs.read_dir(&ctx, "/docs/sub").await.unwrap();
    assert_eq!(sub.len(), 1);
    assert_eq!(sub[0].name, "docs/sub/b.txt");

    let info = fs.stat(&ctx, "/docs/a.txt").await.unwrap();
    assert_eq!(info.size, 10);

    let err = fs.stat(&ctx, "/nope").await.unwrap_err();
    assert!(fs.is_not_exist(&err));
}

#[tokio::test]
async fn test_account_listing_respects_cap() {
    let store = MemoryStore::new();
    for name in ["a", "b", "c", "d"] {
        store.create_bucket(name, "us-east-1", epoch_plus(0));
    }
    let fs = account_fs(Arc::new(store), 2);
    let buckets = fs.read_dir(&OpContext::background(), "/").await.unwrap();
    assert_eq!(buckets.len(), 2);
}

#[tokio::test]
async fn test_failure_on_first_page_propagates() {
    let store = docs(MemoryStore::new().with_list_failure_after(0));
    let fs = bucket_fs(store, -1);

    let err = fs.read_dir(&OpContext::background(), "/").await.unwrap_err();
    assert!(matches!(err, VfsError::Backend { .. }));
    assert!(!fs.is_not_exist(&err));
}

#[tokio::test]
async fn test_failure_on_later_page_is_partial() {
    let store = MemoryStore::new().with_page_size(2).with_list_failure_after(1);
    for i in 0..6 {
        store.put_object("docs", &format!("k{i}"), Bytes::from_static(b"x"), epoch_plus(0));
    }
    let fs = bucket_fs(Arc::new(store), -1);

    let err = fs.read_dir(&OpContext::background(), "/").await.unwrap_err();
    match &err {
        VfsError::PartialListing { pages_fetched, .. } => assert_eq!(*pages_fetched, 1),
        other => panic!("expected partial listing, got {other:?}"),
    }
    assert!(!fs.is_not_exist(&err));
}

#[tokio::test]
async fn test_missing_bucket_is_not_exist() {
    let store = Arc::new(MemoryStore::new());
    let fs = bucket_fs(store, -1);
    let ctx = OpContext::background();

    let err = fs.read_dir(&ctx, "/").await.unwrap_err();
    assert!(fs.is_not_exist(&err));
    let err = fs.stat(&ctx, "/").await.unwrap_err();
    assert!(fs.is_not_exist(&err));
}

#[tokio::test]
async fn test_not_exist_classification() {
    let fs = bucket_fs(docs(MemoryStore::new()), -1);
    let missing = VfsError::backend("head object", StoreError::status(404, "gone"));
    let denied = VfsError::backend("head object", StoreError::status(403, "denied"));
    let network = VfsError::backend("head object", StoreError::transport("reset"));
    assert!(fs.is_not_exist(&missing));
    assert!(!fs.is_not_exist(&denied));
    assert!(!fs.is_not_exist(&network));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_multi_page_listing() {
    let store = MemoryStore::new()
        .with_page_size(1)
        .with_latency(Duration::from_millis(100));
    for i in 0..10 {
        store.put_object("docs", &format!("k{i}"), Bytes::from_static(b"x"), epoch_plus(0));
    }
    let store = Arc::new(store);
    let fs = bucket_fs(store.clone(), -1);

    let ctx = OpContext::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        canceller.cancel();
    });

    let err = fs.read_dir(&ctx, "/").await.unwrap_err();
    assert!(matches!(err, VfsError::Cancelled));
    assert!(store.list_calls() < 10);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_abandons_stalled_store() {
    let store = docs(MemoryStore::new().with_latency(Duration::from_secs(30)));
    let fs = bucket_fs(store, -1);

    let ctx = OpContext::background().with_timeout(Duration::from_secs(1));
    let err = fs.stat(&ctx, "/a.txt").await.unwrap_err();
    assert!(matches!(err, VfsError::DeadlineExceeded));
}

#[tokio::test]
async fn test_open_reads_exactly_size_bytes() {
    let store = docs(MemoryStore::new());
    let fs = bucket_fs(store.clone(), -1);
    let ctx = OpContext::background();

    for path in ["/a.txt", "/sub/b.txt"] {
        let size = fs.stat(&ctx, path).await.unwrap().size;
        let mut stream = fs.open(&ctx, path).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len() as i64, size);
        assert_eq!(fs.size(&ctx, path).await.unwrap(), size);
    }
}

#[tokio::test]
async fn test_open_fetches_nothing_until_read() {
    let store = docs(MemoryStore::new());
    let fs = bucket_fs(store.clone(), -1);
    let ctx = OpContext::background();

    let mut stream = fs.open(&ctx, "/a.txt").await.unwrap();
    assert_eq!(store.range_calls(), 0);

    stream.seek(SeekFrom::Start(7)).await.unwrap();
    let mut tail = String::new();
    stream.read_to_string(&mut tail).await.unwrap();
    assert_eq!(tail, "789");
    assert!(store.range_calls() >= 1);

    stream.seek(SeekFrom::Start(0)).await.unwrap();
    let mut all = String::new();
    stream.read_to_string(&mut all).await.unwrap();
    assert_eq!(all, "0123456789");

    stream.seek(SeekFrom::Start(100)).await.unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_open_missing_object() {
    let fs = bucket_fs(docs(MemoryStore::new()), -1);
    let err = fs.open(&OpContext::background(), "/missing.bin").await.err().unwrap();
    assert!(fs.is_not_exist(&err));
}

#[tokio::test]
async fn test_prefix_scope() {
    let store = docs(MemoryStore::new());
    store.put_object("docs", "site/index.html", Bytes::from_static(b"<html></html>"), epoch_plus(0));
    store.put_object("docs", "site/css/main.css", Bytes::from_static(b"body {}"), epoch_plus(0));
    let router = RegionRouter::single("us-east-1", store);
    let fs = ObjectStoreBackend::new(
        BucketScope::from_parts("docs", "site").unwrap(),
        router,
        HashMap::new(),
        -1,
    )
    .unwrap();
    let ctx = OpContext::background();

    assert!(fs.stat(&ctx, "/").await.unwrap().is_dir());
    assert_eq!(fs.stat(&ctx, "/index.html").await.unwrap().size, 13);

    let css = fs.read_dir(&ctx, "/css").await.unwrap();
    assert_eq!(css.len(), 1);
    assert_eq!(css[0].name, "css/main.css");
}

#[test]
fn test_prefix_without_bucket_rejected() {
    let err = BucketScope::from_parts("", "site").unwrap_err();
    assert!(matches!(err, VfsError::InvalidConfig(_)));
}
