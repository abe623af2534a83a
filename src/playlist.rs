use std::{fmt, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone, Timelike};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::channels::ChannelMeta;

/// A live channel with its resolved stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub name: String,
    pub logo: String,
    pub group: String,
    pub url: String,
}

impl PlaylistEntry {
    #[must_use]
    pub fn new(meta: &ChannelMeta, url: String) -> Self {
        Self {
            name: meta.channel_name.clone(),
            logo: meta.channel_logo.clone(),
            group: meta.group_title.clone(),
            url,
        }
    }
}

impl fmt::Display for PlaylistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#EXTINF:-1 group-title=\"{}\" tvg-logo=\"{}\", {}\n{}",
            self.group, self.logo, self.name, self.url
        )
    }
}

/// Renders the full playlist file content
#[must_use]
pub fn render<Tz: TimeZone>(entries: &[PlaylistEntry], updated_at: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    // Whole seconds carry no fraction at all
    let timestamp_format = if updated_at.nanosecond() / 1_000 == 0 {
        "%Y-%m-%d %H:%M:%S"
    } else {
        "%Y-%m-%d %H:%M:%S%.6f"
    };

    let mut out = String::from("#EXTM3U\n");
    out.push_str(&format!(
        "# Updated {}\n",
        updated_at.format(timestamp_format)
    ));
    for entry in entries {
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

/// Overwrites `path` with a playlist of `entries`
///
/// Content goes to a sibling temporary file first and is then renamed over `path`
///
/// # Errors
/// Errors when the file cannot be written or renamed
#[instrument(skip(entries), fields(entries = entries.len()))]
pub async fn save_playlist(path: &Path, entries: &[PlaylistEntry]) -> Result<()> {
    let content = render(entries, &Local::now());

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "playlist.m3u".into());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    debug!("Writing playlist to {tmp_path:?}");
    let written = async {
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("Creating {}", tmp_path.display()))?;
        file.write_all(content.as_bytes())
            .await
            .context("Writing playlist")?;
        file.sync_all().await.context("Flushing playlist")?;
        drop(file);

        tokio::fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("Replacing {}", path.display()))
    }
    .await;

    if written.is_err() {
        tokio::fs::remove_file(&tmp_path).await.ok();
    }

    written
}
