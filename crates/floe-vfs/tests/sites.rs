//! Configuration to served site, across local and regional object store roots.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

use floe_vfs::{
    FloeConfig, MemoryStore, ObjectStore, OpContext, RegionRouter, SiteTable, VfsError,
    build_file_systems,
};

struct Fixture {
    _www: TempDir,
    config: FloeConfig,
    east: Arc<MemoryStore>,
    west: Arc<MemoryStore>,
    router: RegionRouter,
}

fn fixture() -> Fixture {
    let www = TempDir::new().unwrap();
    std::fs::write(www.path().join("index.html"), "<h1>hi</h1>").unwrap();
    let www_root = www.path().to_string_lossy().into_owned();

    let created = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    let east = MemoryStore::new();
    east.create_bucket("docs", "us-east-1", created);
    east.put_object("docs", "guides/intro.md", Bytes::from_static(b"# Intro\n"), created);
    let east = Arc::new(east);

    let west = MemoryStore::new();
    west.create_bucket("media", "us-west-2", created);
    west.put_object("media", "img/logo.svg", Bytes::from_static(b"<svg/>"), created);
    let west = Arc::new(west);

    let config = FloeConfig::from_toml_str(&format!(
        r#"
        default_root = "{www_root}"
        file_systems = ["s3://docs/guides", "s3://media"]

        [sites]
        "www.example.com" = "{www_root}"
        "docs.example.com" = "s3://docs/guides"
        "media.example.com" = "s3://media"

        [store]
        default_region = "us-east-1"
        bucket_regions = {{ media = "us-west-2" }}
        "#
    ))
    .unwrap();

    let mut clients: HashMap<String, Arc<dyn ObjectStore>> = HashMap::new();
    clients.insert("us-east-1".into(), east.clone());
    clients.insert("us-west-2".into(), west.clone());
    let router = RegionRouter::new("us-east-1", clients, config.store.bucket_regions.clone()).unwrap();

    Fixture {
        _www: www,
        config,
        east,
        west,
        router,
    }
}

async fn site_table(fixture: &Fixture) -> SiteTable {
    let ctx = OpContext::background();
    let file_systems = build_file_systems(&fixture.config, Some(&fixture.router), &ctx)
        .await
        .unwrap();
    SiteTable::from_config(&fixture.config, file_systems).unwrap()
}

#[tokio::test]
async fn test_sites_serve_their_roots() {
    let fixture = fixture();
    let sites = site_table(&fixture).await;
    let ctx = OpContext::background();

    let www = sites.resolve("www.example.com").unwrap();
    assert_eq!(www.stat(&ctx, "/index.html").await.unwrap().size, 11);

    let docs = sites.resolve("Docs.Example.com:443").unwrap();
    let entries = docs.read_dir(&ctx, "/").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "intro.md");

    let mut stream = docs.open(&ctx, "/intro.md").await.unwrap();
    let mut text = String::new();
    stream.read_to_string(&mut text).await.unwrap();
    assert_eq!(text, "# Intro\n");

    let err = sites.resolve("unknown.example.com").err().unwrap();
    assert!(matches!(err, VfsError::NoSite(_)));
}

#[tokio::test]
async fn test_buckets_route_to_their_region() {
    let fixture = fixture();
    let sites = site_table(&fixture).await;
    let ctx = OpContext::background();

    let media = sites.resolve("media.example.com").unwrap();
    let east_calls = fixture.east.list_calls();

    let entries = media.read_dir(&ctx, "/img").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "img/logo.svg");
    assert_eq!(entries[0].size, 6);

    assert_eq!(fixture.east.list_calls(), east_calls);
    assert!(fixture.west.list_calls() >= 1);
}

#[tokio::test]
async fn test_discovered_creation_dates_stamp_directories() {
    let fixture = fixture();
    let sites = site_table(&fixture).await;
    let ctx = OpContext::background();

    let docs = sites.resolve("docs.example.com").unwrap();
    let info = docs.stat(&ctx, "/").await.unwrap();
    assert!(info.is_dir());
    assert_eq!(
        info.mod_time,
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000)
    );
}

#[tokio::test]
async fn test_missing_object_reports_not_exist() {
    let fixture = fixture();
    let sites = site_table(&fixture).await;
    let ctx = OpContext::background();

    let media = sites.resolve("media.example.com").unwrap();
    let err = media.stat(&ctx, "/img/missing.png").await.unwrap_err();
    assert!(media.is_not_exist(&err));
    assert!(err.is_not_found());
}

#[test]
fn test_site_pointing_at_unconfigured_root_rejected() {
    let mut sites = BTreeMap::new();
    sites.insert("a.example.com".to_string(), "s3://elsewhere".to_string());
    let err = SiteTable::new(None, sites, BTreeMap::new()).unwrap_err();
    assert!(matches!(err, VfsError::InvalidConfig(_)));
}
