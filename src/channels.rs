use std::{path::Path, sync::LazyLock};

use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, instrument, warn};

pub static CHANNEL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[0-9A-Za-z_-]{22}$").unwrap());

/// Display metadata of a single channel, as written in the channel file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelMeta {
    pub channel_name: String,
    pub channel_logo: String,
    pub group_title: String,
}

/// Channel identifier -> metadata, kept in file order
pub type Channels = IndexMap<String, ChannelMeta>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// `UC...` channel ID
    Id,
    /// `@handle`
    Handle,
    /// Anything else. Treated as a channel ID
    Unknown,
}

#[must_use]
pub fn classify(channel_id: &str) -> ChannelKind {
    if channel_id.starts_with('@') {
        ChannelKind::Handle
    } else if CHANNEL_ID_REGEX.is_match(channel_id) {
        ChannelKind::Id
    } else {
        ChannelKind::Unknown
    }
}

/// The URL of a channel's current live broadcast page
#[must_use]
pub fn live_page_url(channel_id: &str) -> String {
    match classify(channel_id) {
        ChannelKind::Handle => format!("https://www.youtube.com/{channel_id}/live"),
        ChannelKind::Id | ChannelKind::Unknown => {
            format!("https://www.youtube.com/channel/{channel_id}/live")
        }
    }
}

/// Parses the channel file content
///
/// # Errors
/// Errors when the content is not a JSON object of channel metadata
pub fn parse_channels(content: &str) -> Result<Channels> {
    let channels =
        serde_json::from_str::<Channels>(content).context("Parsing channel list JSON")?;

    for id in channels.keys() {
        ensure!(!id.trim().is_empty(), "Channel list contains an empty channel ID");
        if classify(id) == ChannelKind::Unknown {
            warn!("`{id}` does not look like a YouTube channel ID or @handle");
        }
    }

    Ok(channels)
}

/// Loads the channel list from disk
///
/// # Errors
/// Errors when the file cannot be read or is malformed
#[instrument]
pub async fn load_channels(path: &Path) -> Result<Channels> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Reading channel list {}", path.display()))?;

    let channels = parse_channels(&content)?;
    info!("Loaded {} channels", channels.len());

    Ok(channels)
}
