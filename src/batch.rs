use anyhow::{Result, bail};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    channels::Channels,
    hls::probe_manifest,
    playlist::PlaylistEntry,
    youtube::{get_live_watch_url, get_stream_url},
    ytdlp::Extractor,
};

/// Looks up every channel once, in order, and returns the entries of the live ones
///
/// When `verify_client` is set, resolved manifests are fetched and must parse as master playlists
///
/// # Errors
/// Errors only when the run is cancelled
pub async fn collect_entries(
    extractor: &impl Extractor,
    channels: &Channels,
    verify_client: Option<&reqwest::Client>,
    ct: &CancellationToken,
) -> Result<Vec<PlaylistEntry>> {
    let mut entries = Vec::new();

    for (channel_id, meta) in channels {
        info!("Checking: {}", meta.channel_name);

        let lookup = async {
            let Some(live) = get_live_watch_url(extractor, channel_id).await else {
                info!("Not live!");
                return None;
            };
            debug!("{} is live at {live}", meta.channel_name);

            let Some(stream) = get_stream_url(extractor, &live).await else {
                info!("Stream not found");
                return None;
            };

            if let Some(client) = verify_client {
                if let Err(e) = probe_manifest(client, &stream).await {
                    debug!("Manifest verification failed: {e:#}");
                    info!("Stream not found");
                    return None;
                }
            }

            Some(stream)
        };

        let stream = select! {
            biased;
            () = ct.cancelled() => {
                warn!("Cancelled while checking {}", meta.channel_name);
                bail!("Run cancelled, playlist left untouched");
            }
            s = lookup => s,
        };

        if let Some(stream) = stream {
            entries.push(PlaylistEntry::new(meta, stream));
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        future::Future,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use anyhow::anyhow;
    use serde_json::{Value, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::{channels::parse_channels, util::init_http_client, ytdlp::ExtractOptions};

    /// Serves canned info JSON per URL, erroring for unknown URLs
    #[derive(Default)]
    struct FakeExtractor {
        responses: HashMap<String, Value>,
        calls: AtomicUsize,
        seen: Mutex<Vec<ExtractOptions>>,
    }

    impl FakeExtractor {
        fn with(mut self, url: &str, info: Value) -> Self {
            self.responses.insert(url.to_string(), info);
            self
        }
    }

    impl Extractor for FakeExtractor {
        fn extract_info(
            &self,
            url: &str,
            options: &ExtractOptions,
        ) -> impl Future<Output = Result<Value>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(options.clone());
            let res = self
                .responses
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("ERROR: {url} is not currently live"));
            async move { res }
        }
    }

    const CHANNELS: &str = r#"{
        "UCaaaaaaaaaaaaaaaaaaaaaa": {"channel_name": "Alpha", "channel_logo": "https://img/a.png", "group_title": "News"},
        "UCbbbbbbbbbbbbbbbbbbbbbb": {"channel_name": "Bravo", "channel_logo": "https://img/b.png", "group_title": "Music"},
        "@charlie": {"channel_name": "Charlie", "channel_logo": "https://img/c.png", "group_title": "Sports"},
        "UCdddddddddddddddddddddd": {"channel_name": "Delta", "channel_logo": "https://img/d.png", "group_title": "News"}
    }"#;

    fn fake() -> FakeExtractor {
        FakeExtractor::default()
            // Alpha: live at top level, resolvable
            .with(
                "https://www.youtube.com/channel/UCaaaaaaaaaaaaaaaaaaaaaa/live",
                json!({"is_live": true, "webpage_url": "https://www.youtube.com/watch?v=alpha"}),
            )
            .with(
                "https://www.youtube.com/watch?v=alpha",
                json!({"formats": [
                    {"protocol": "https", "url": "https://cdn/a.mp4"},
                    {"protocol": "m3u8_native", "manifest_url": "https://manifest/alpha.m3u8"}
                ]}),
            )
            // Bravo: lookup fails -> offline
            // Charlie: live inside entries, but no HLS format
            .with(
                "https://www.youtube.com/@charlie/live",
                json!({"entries": [{"is_live": true, "webpage_url": "https://www.youtube.com/watch?v=charlie"}]}),
            )
            .with(
                "https://www.youtube.com/watch?v=charlie",
                json!({"formats": [{"protocol": "dash", "manifest_url": "https://manifest/c.mpd"}]}),
            )
            // Delta: live via entries, resolvable
            .with(
                "https://www.youtube.com/channel/UCdddddddddddddddddddddd/live",
                json!({"is_live": false, "entries": [
                    {"is_live": false, "webpage_url": "https://www.youtube.com/watch?v=old"},
                    {"is_live": true, "webpage_url": "https://www.youtube.com/watch?v=delta"}
                ]}),
            )
            .with(
                "https://www.youtube.com/watch?v=delta",
                json!({"formats": [{"protocol": "m3u8", "manifest_url": "https://manifest/delta.m3u8"}]}),
            )
    }

    #[tokio::test]
    async fn only_live_and_resolvable_channels_are_kept() {
        let channels = parse_channels(CHANNELS).unwrap();
        let extractor = fake();

        let entries = collect_entries(&extractor, &channels, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            entries,
            [
                PlaylistEntry {
                    name: "Alpha".to_string(),
                    logo: "https://img/a.png".to_string(),
                    group: "News".to_string(),
                    url: "https://manifest/alpha.m3u8".to_string(),
                },
                PlaylistEntry {
                    name: "Delta".to_string(),
                    logo: "https://img/d.png".to_string(),
                    group: "News".to_string(),
                    url: "https://manifest/delta.m3u8".to_string(),
                },
            ]
        );
        // 4 live lookups + 3 stream resolutions (Bravo never got past the first)
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn lookups_use_the_expected_options() {
        let channels = parse_channels(CHANNELS).unwrap();
        let extractor = fake();
        collect_entries(&extractor, &channels, None, &CancellationToken::new())
            .await
            .unwrap();

        let seen = extractor.seen.lock().unwrap();
        // Alpha: live lookup, then stream resolution
        assert!(seen[0].user_agent.is_some());
        assert_eq!(seen[0].format, None);
        assert_eq!(seen[1].format, Some("best"));
        assert_eq!(seen[1].user_agent, None);
    }

    #[tokio::test]
    async fn reruns_are_identical() {
        let channels = parse_channels(CHANNELS).unwrap();
        let ct = CancellationToken::new();

        let first = collect_entries(&fake(), &channels, None, &ct).await.unwrap();
        let second = collect_entries(&fake(), &channels, None, &ct).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn nothing_live_yields_no_entries() {
        let channels = parse_channels(CHANNELS).unwrap();
        let entries = collect_entries(
            &FakeExtractor::default(),
            &channels,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn cancelled_run_is_an_error() {
        let channels = parse_channels(CHANNELS).unwrap();
        let ct = CancellationToken::new();
        ct.cancel();

        assert!(collect_entries(&fake(), &channels, None, &ct).await.is_err());
    }

    const MASTER_PLAYLIST: &str = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720\nhttps://manifest/720.m3u8\n";

    /// Answers every HTTP request with a master playlist, returning a manifest URL on it
    async fn serve_master_playlist() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    socket.read(&mut buf).await.ok();
                    let res = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/vnd.apple.mpegurl\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{MASTER_PLAYLIST}",
                        MASTER_PLAYLIST.len()
                    );
                    socket.write_all(res.as_bytes()).await.ok();
                    socket.shutdown().await.ok();
                });
            }
        });

        format!("http://{addr}/alpha.m3u8")
    }

    #[tokio::test]
    async fn unreachable_manifest_is_skipped_when_verifying() {
        let channels = parse_channels(CHANNELS).unwrap();
        let alpha_manifest = serve_master_playlist().await;
        let extractor = fake()
            .with(
                "https://www.youtube.com/watch?v=alpha",
                json!({"formats": [{"protocol": "m3u8_native", "manifest_url": alpha_manifest}]}),
            )
            // Nothing listens on port 1
            .with(
                "https://www.youtube.com/watch?v=delta",
                json!({"formats": [{"protocol": "m3u8", "manifest_url": "http://127.0.0.1:1/x.m3u8"}]}),
            );
        let client = init_http_client().unwrap();

        let entries = collect_entries(
            &extractor,
            &channels,
            Some(&client),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            entries,
            [PlaylistEntry {
                name: "Alpha".to_string(),
                logo: "https://img/a.png".to_string(),
                group: "News".to_string(),
                url: alpha_manifest,
            }]
        );
    }
}
