//! Print the semantic key for a (title, artist, duration) triple.
//! Usage: fingerprint "<title>" "<primary artist>" <duration_ms> [--bucket-seconds N]

use anyhow::{bail, Result};
use clap::Parser;

use playlist_dedup::fingerprint::{
    canonical_artist, canonical_title, duration_bucket_with, semantic_key_with,
    DEFAULT_BUCKET_SECONDS,
};

#[derive(Parser)]
#[command(name = "fingerprint")]
#[command(about = "Show how a track is canonicalized for duplicate detection")]
struct Args {
    title: String,

    artist: String,

    duration_ms: u64,

    #[arg(long, default_value_t = DEFAULT_BUCKET_SECONDS)]
    bucket_seconds: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.bucket_seconds == 0 {
        bail!("--bucket-seconds must be greater than zero");
    }

    println!("title:  {:?} -> {:?}", args.title, canonical_title(&args.title));
    println!("artist: {:?} -> {:?}", args.artist, canonical_artist(&args.artist));
    println!(
        "bucket: {} ms -> {} s",
        args.duration_ms,
        duration_bucket_with(args.duration_ms, args.bucket_seconds)
    );
    println!(
        "key:    {}",
        semantic_key_with(&args.title, &args.artist, args.duration_ms, args.bucket_seconds)
    );

    Ok(())
}
