use rand::seq::IndexedRandom;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    channels::live_page_url,
    ytdlp::{ExtractOptions, Extractor},
};

/// `(major, build, patch)` of the Chrome releases we pretend to be
const CHROME_VERSIONS: [(u16, u16, u16); 3] = [
    (122, 6267, 70),
    (121, 6167, 131),
    (120, 6099, 109),
];

/// Delivery protocols accepted for a resolved stream
const HLS_PROTOCOLS: [&str; 2] = ["m3u8", "m3u8_native"];

/// A desktop Chrome User-Agent with a randomly picked version
#[must_use]
pub fn random_user_agent() -> String {
    let (major, build, patch) = CHROME_VERSIONS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(CHROME_VERSIONS[0]);

    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36"
    )
}

fn is_live(info: &Value) -> bool {
    info["is_live"].as_bool().unwrap_or(false)
}

/// Picks the watch page of whatever is live in a channel's `/live` info
#[must_use]
pub fn pick_live_watch_url(info: &Value) -> Option<String> {
    if is_live(info) {
        return info["webpage_url"].as_str().map(ToString::to_string);
    }

    info["entries"]
        .as_array()?
        .iter()
        .find(|entry| is_live(entry))
        .and_then(|entry| entry["webpage_url"].as_str())
        .map(ToString::to_string)
}

/// Picks the manifest of the first HLS format
#[must_use]
pub fn pick_manifest_url(info: &Value) -> Option<String> {
    info["formats"]
        .as_array()?
        .iter()
        .find(|format| {
            format["protocol"]
                .as_str()
                .is_some_and(|p| HLS_PROTOCOLS.contains(&p))
        })
        .and_then(|format| format["manifest_url"].as_str())
        .map(ToString::to_string)
}

/// Returns the watch URL of the channel's live broadcast
///
/// Returns `None` when the channel is offline or when anything goes wrong while looking it up
#[instrument(skip(extractor))]
pub async fn get_live_watch_url(extractor: &impl Extractor, channel_id: &str) -> Option<String> {
    let options = ExtractOptions {
        user_agent: Some(random_user_agent()),
        ..Default::default()
    };

    match extractor
        .extract_info(&live_page_url(channel_id), &options)
        .await
    {
        Ok(info) => pick_live_watch_url(&info),
        Err(e) => {
            debug!("Live lookup failed: {e:#}");
            None
        }
    }
}

/// Returns the HLS manifest URL of the best stream on a watch page
///
/// Returns `None` when no HLS format exists or when anything goes wrong while resolving it
#[instrument(skip(extractor))]
pub async fn get_stream_url(extractor: &impl Extractor, watch_url: &str) -> Option<String> {
    let options = ExtractOptions {
        format: Some("best"),
        ..Default::default()
    };

    match extractor.extract_info(watch_url, &options).await {
        Ok(info) => pick_manifest_url(&info),
        Err(e) => {
            debug!("Stream resolution failed: {e:#}");
            None
        }
    }
}
