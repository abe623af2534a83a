use anyhow::{Context, Result, bail, ensure};
use m3u8_rs::{MasterPlaylist, Playlist};
use tracing::{info, instrument};

/// Parses a fetched manifest, only accepting master playlists
///
/// # Errors
/// Errors when the body is not an HLS master playlist
pub fn parse_master(body: &[u8]) -> Result<MasterPlaylist> {
    match m3u8_rs::parse_playlist_res(body) {
        Ok(Playlist::MasterPlaylist(playlist)) => {
            ensure!(!playlist.variants.is_empty(), "Master playlist has no variants");
            Ok(playlist)
        }
        Ok(Playlist::MediaPlaylist(_)) => bail!("Expected a master playlist, got a media playlist"),
        Err(e) => bail!("Unable to parse manifest: {e:?}"),
    }
}

/// Fetches a resolved manifest and makes sure it is a playable master playlist
///
/// # Errors
/// Errors on network errors, non-success status or an unparsable manifest
#[instrument(skip(client))]
pub async fn probe_manifest(client: &reqwest::Client, url: &str) -> Result<MasterPlaylist> {
    let res = client
        .get(url)
        .send()
        .await
        .context("Fetching stream manifest")?;
    ensure!(
        res.status().is_success(),
        "Manifest request returned {}",
        res.status()
    );

    let body = res.bytes().await.context("Decoding stream manifest")?;
    let playlist = parse_master(&body)?;

    info!(
        "Available stream quality: {}",
        playlist
            .variants
            .iter()
            .map(|v| v
                .resolution
                .map_or("Unknown resolution".to_string(), |v| v.to_string()))
            .collect::<Vec<String>>()
            .join(", ")
    );

    Ok(playlist)
}
