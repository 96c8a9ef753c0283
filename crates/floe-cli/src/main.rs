//! floe command-line client
//!
//! Runs one read-only filesystem operation against a configured root.
//!
//! ## Usage
//!
//! ```bash
//! # Try it against a built-in in-memory bucket
//! floe --demo ls /
//! floe --demo cat /sub/b.txt
//!
//! # Local directory
//! floe --root /srv/www stat /index.html
//!
//! # Object store, routed by site name from a config file
//! floe --config ~/.config/floe.toml --site docs.example.com ls /guides
//! ```
//!
//! Exits 2 when the path does not exist and 1 on any other failure.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use floe_vfs::{
    DirEntry, FileInfo, FileSystem, FloeConfig, MemoryStore, OpContext, RegionRouter,
    SiteTable, VfsError, build_file_systems,
};

/// Read-only access to local and object store roots.
#[derive(Parser, Debug)]
#[command(name = "floe")]
#[command(about = "Read-only access to local and object store roots")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Serve a built-in in-memory bucket instead of a real object store
    #[arg(long)]
    demo: bool,

    /// Resolve the filesystem by server name from the configured sites
    #[arg(long, conflicts_with = "root")]
    site: Option<String>,

    /// Root to serve (local path, s3://, or s3://bucket[/prefix])
    #[arg(short, long)]
    root: Option<String>,

    /// Cap on directory entries returned from object stores (-1 = unlimited)
    #[arg(long, allow_hyphen_values = true)]
    max_entries: Option<i64>,

    /// Abandon the operation after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show metadata for a path
    Stat { path: String },
    /// List a directory
    Ls { path: String },
    /// Write a file to stdout
    Cat { path: String },
    /// Print a file's size in bytes
    Size { path: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let not_found = e
                .downcast_ref::<VfsError>()
                .is_some_and(VfsError::is_not_found);
            if not_found {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            let path: PathBuf = shellexpand::tilde(path).as_ref().into();
            FloeConfig::load(&path)
                .await
                .with_context(|| format!("loading {}", path.display()))?
        }
        None => FloeConfig::default(),
    };
    config.apply_env();

    if let Some(root) = &args.root {
        config.default_root = Some(root.clone());
    }
    if let Some(max) = args.max_entries {
        config.max_directory_entries = max;
    }
    if args.demo {
        if config.default_root.is_none() && config.file_systems.is_empty() {
            config.default_root = Some("s3://docs".to_string());
        }
        config.store.default_region.get_or_insert_with(|| DEMO_REGION.to_string());
    }

    let ctx = operation_context(args.timeout);
    let router = if args.demo {
        Some(demo_router())
    } else if config.uses_object_store() {
        Some(store_router(&config)?)
    } else {
        None
    };

    let file_systems = build_file_systems(&config, router.as_ref(), &ctx).await?;
    let sites = SiteTable::from_config(&config, file_systems)?;

    let fs = match (&args.site, sites.default_root()) {
        (Some(site), _) => sites.resolve(site)?,
        (None, Some(root)) => sites
            .root(root)
            .with_context(|| format!("no file system for {root}"))?,
        (None, None) => bail!("no root selected: pass --root, --site or set default_root"),
    };

    match args.command {
        Command::Stat { path } => {
            let info = fs.stat(&ctx, &path).await?;
            print_info(&info);
        }
        Command::Ls { path } => {
            for entry in fs.read_dir(&ctx, &path).await? {
                print_entry(&entry);
            }
        }
        Command::Cat { path } => {
            let mut stream = fs.open(&ctx, &path).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut stream, &mut stdout)
                .await
                .with_context(|| format!("reading {path}"))?;
        }
        Command::Size { path } => {
            println!("{}", fs.size(&ctx, &path).await?);
        }
    }
    Ok(())
}

/// Context cancelled by Ctrl-C and, optionally, a timeout.
fn operation_context(timeout: Option<u64>) -> OpContext {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let ctx = OpContext::with_token(token);
    match timeout {
        Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
        None => ctx,
    }
}

#[cfg(feature = "s3")]
fn store_router(config: &FloeConfig) -> Result<RegionRouter> {
    Ok(floe_vfs::store::region_router(&config.store)?)
}

#[cfg(not(feature = "s3"))]
fn store_router(_config: &FloeConfig) -> Result<RegionRouter> {
    bail!("object store roots need the `s3` feature; rebuild with --features s3 or use --demo")
}

const DEMO_REGION: &str = "us-east-1";

/// A small in-memory account: `docs` and `media`.
fn demo_router() -> RegionRouter {
    let store = MemoryStore::new();
    let created = SystemTime::UNIX_EPOCH + Duration::from_secs(1_577_836_800);
    store.create_bucket("docs", DEMO_REGION, created);
    store.create_bucket("media", DEMO_REGION, created);

    let now = SystemTime::now();
    store.put_object("docs", "a.txt", Bytes::from_static(b"0123456789"), now);
    store.put_object("docs", "sub/", Bytes::new(), now);
    store.put_object("docs", "sub/b.txt", Bytes::from_static(b"hello"), now);
    store.put_object("media", "logo.svg", Bytes::from_static(b"<svg/>"), now);

    RegionRouter::single(DEMO_REGION, Arc::new(store))
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn print_info(info: &FileInfo) {
    let kind = if info.is_dir() { "dir" } else { "file" };
    println!("name:     {}", info.name);
    println!("type:     {kind}");
    println!("size:     {}", info.size);
    println!("modified: {}", format_time(info.mod_time));
}

fn print_entry(entry: &DirEntry) {
    let kind = if entry.is_dir() { "d" } else { "-" };
    println!(
        "{kind} {:>12} {} {}",
        entry.size,
        format_time(entry.mod_time),
        entry.name
    );
}
