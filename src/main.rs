#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    batch::collect_entries,
    channels::load_channels,
    playlist::save_playlist,
    util::{ensure_cookie_file, init_http_client, spawn_ct_watcher},
    ytdlp::YtDlp,
};

pub mod batch;
pub mod channels;
pub mod hls;
pub mod playlist;
pub mod util;
pub mod youtube;
pub mod ytdlp;

/// Checks YouTube channels for live broadcasts and writes their HLS streams into an M3U playlist
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON file mapping channel IDs to their name, logo and group
    #[arg(long, env = "CHANNELS_FILE", default_value = "YT_channels.json")]
    channels: PathBuf,

    /// Netscape formatted cookie file used to access YouTube
    #[arg(long, env = "COOKIES_FILE", default_value = "cookies.txt")]
    cookies: PathBuf,

    /// Where the playlist is written. Overwritten on every run
    #[arg(short, long, env = "PLAYLIST_FILE", default_value = "YT_playlist.m3u")]
    output: PathBuf,

    /// yt-dlp executable
    #[arg(long = "yt-dlp", env = "YT_DLP_PATH", default_value = "yt-dlp")]
    yt_dlp: PathBuf,

    /// Fetch every resolved manifest and skip channels whose manifest is not a playable master playlist
    #[arg(long, env = "VERIFY_MANIFEST", default_value_t = false)]
    verify_manifest: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let ct = CancellationToken::new();
    spawn_ct_watcher(ct.clone());

    run(&args, &ct).await
}

/// Runs the whole batch once
async fn run(args: &Args, ct: &CancellationToken) -> Result<()> {
    let channels = load_channels(&args.channels).await?;
    let cookies = ensure_cookie_file(&args.cookies)?;

    let ytdlp = YtDlp::new(&args.yt_dlp, cookies);
    let version = ytdlp.version().await.context("Checking yt-dlp")?;
    debug!("Using yt-dlp {version}");

    let verify_client = if args.verify_manifest {
        Some(init_http_client().context("Building manifest HTTP client")?)
    } else {
        None
    };

    let entries = collect_entries(&ytdlp, &channels, verify_client.as_ref(), ct).await?;

    save_playlist(&args.output, &entries)
        .await
        .context("Saving playlist")?;
    info!("Playlist updated!");
    info!(
        "{} of {} channels written to {}",
        entries.len(),
        channels.len(),
        args.output.display()
    );

    Ok(())
}
