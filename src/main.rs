use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use playlist_dedup::aggregate::{aggregate_with, AggregationConfig};
use playlist_dedup::fingerprint::DEFAULT_BUCKET_SECONDS;
use playlist_dedup::input::{list_page_files, load_metadata, load_names, load_pages, page_offsets};
use playlist_dedup::progress::{spinner, PhaseProgress};
use playlist_dedup::report::render_text;
use playlist_dedup::store::Store;
use playlist_dedup::users::{DisplayNameResolver, NoResolver, PrefetchedNames};

#[derive(Parser)]
#[command(name = "playlist-dedup")]
#[command(about = "Aggregate fetched playlist pages into per-user lists, duplicate groups and totals")]
struct Args {
    /// Directory of fetched page files (*.json)
    pages_dir: PathBuf,

    /// Playlist metadata response (snapshot_id, name, images, tracks.total)
    #[arg(long)]
    metadata: PathBuf,

    /// JSON object of user id -> display name, used when entries carry none
    #[arg(long)]
    names: Option<PathBuf>,

    /// Write the aggregate JSON here
    #[arg(long)]
    output: Option<PathBuf>,

    /// SQLite store for publication and snapshot tracking
    #[arg(long, env = "PLAYLIST_DEDUP_STORE")]
    store: Option<PathBuf>,

    /// Aggregate and publish even if the snapshot is unchanged
    #[arg(long)]
    force: bool,

    #[arg(long, default_value_t = DEFAULT_BUCKET_SECONDS)]
    bucket_seconds: u64,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Hide progress bars, print periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write run statistics JSON here
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();

    let (metadata, total_entries) = load_metadata(&args.metadata)
        .context("Failed to load playlist metadata")?;
    info!(playlist = %metadata.name, snapshot = %metadata.snapshot_id, total_entries = total_entries, "loaded metadata");

    let mut store = match &args.store {
        Some(path) => Some(
            Store::open(path).with_context(|| format!("Failed to open store {:?}", path))?,
        ),
        None => None,
    };

    if let Some(store) = &store {
        if !store.snapshot_changed(&metadata.snapshot_id)? && !args.force {
            info!("Snapshot unchanged, skipping processing");
            return Ok(());
        }
    }

    let files = list_page_files(&args.pages_dir).context("Failed to list page files")?;
    let expected_pages = page_offsets(total_entries).len();
    if files.len() != expected_pages {
        warn!(
            found = files.len(),
            expected = expected_pages,
            "page file count does not match playlist total"
        );
    }

    let progress = PhaseProgress::new("load", files.len() as u64, 10, args.log_only);
    let pages = load_pages(&files, || progress.tick()).context("Failed to load pages")?;
    progress.finish(format!("Loaded {} pages", pages.len()));

    let resolver: Box<dyn DisplayNameResolver> = match &args.names {
        Some(path) => {
            let directory = load_names(path).context("Failed to load display names")?;
            let pb = spinner("Resolving display names", args.log_only);
            let prefetched = PrefetchedNames::resolve_all(&pages, &directory);
            pb.finish_and_clear();
            info!(looked_up = prefetched.len(), "resolved display names");
            Box::new(prefetched)
        }
        None => Box::new(NoResolver),
    };

    let config = AggregationConfig {
        bucket_seconds: args.bucket_seconds,
    };
    let (aggregate, stats) = aggregate_with(&pages, &metadata, resolver.as_ref(), Utc::now(), config)
        .context("Aggregation failed")?;

    if let Some(path) = &args.output {
        let json = aggregate.to_json_pretty()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write output {:?}", path))?;
        info!(path = %path.display(), "wrote aggregate JSON");
    }

    if let Some(store) = store.as_mut() {
        store.publish(&aggregate).context("Failed to publish aggregate")?;
        info!("published aggregate and snapshot id");
    }

    stats.log();
    if let Some(path) = &args.stats {
        std::fs::write(path, stats.to_json_pretty()?)
            .with_context(|| format!("Failed to write stats {:?}", path))?;
    }

    print!("{}", render_text(&aggregate));
    println!("Elapsed: {:.1?}", start.elapsed());

    Ok(())
}
