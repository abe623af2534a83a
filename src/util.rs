use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Result, bail, ensure};
use reqwest::header::{HeaderMap, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::youtube::random_user_agent;

/// Makes sure the cookie file used for authenticated extraction exists
///
/// # Errors
/// Errors when the path does not exist or is not a regular file
pub fn ensure_cookie_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        bail!("Missing cookies file! Expected it at {}", path.display());
    }
    ensure!(path.is_file(), "Cookies path {} is not a file", path.display());

    Ok(path.to_path_buf())
}

/// HTTP client used to probe resolved manifests
///
/// # Errors
/// Errors when the client cannot be built
pub fn init_http_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert("User-Agent", HeaderValue::from_str(&random_user_agent())?);

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()?)
}

/// Spawn a task that watches for CTRL + C signal and cancels a [`CancellationToken`] when caught
pub fn spawn_ct_watcher(ct: CancellationToken) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Caught CTRL+C signal!");
        ct.cancel();
    });
}
