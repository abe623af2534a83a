use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{Context, Result, bail, ensure};
use serde_json::Value;
use tracing::debug;

/// Per-call extraction options
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Format selector (`--format`)
    pub format: Option<&'static str>,
    /// Overrides the User-Agent header (`--user-agent`)
    pub user_agent: Option<String>,
}

/// Something able to turn a page URL into a yt-dlp style info JSON
pub trait Extractor {
    fn extract_info(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> impl Future<Output = Result<Value>> + Send;
}

/// Extractor backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    cookie_file: PathBuf,
}

impl YtDlp {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, cookie_file: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cookie_file: cookie_file.into(),
        }
    }

    /// Checks if yt-dlp is installed / runnable, returning its version
    ///
    /// # Errors
    /// Errors when the binary cannot be spawned or exits unsuccessfully
    pub async fn version(&self) -> Result<String> {
        debug!("Checking for yt-dlp installation");
        let out = match tokio::process::Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                bail!("`{}` is not installed or available in PATH!", self.program.display())
            }
            Err(e) => bail!("Unable to run `{}`: {e}", self.program.display()),
        };

        ensure!(out.status.success(), "yt-dlp --version exit code not success");
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn args(&self, url: &str, options: &ExtractOptions) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-download".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--force-ipv4".to_string(),
            "--cookies".to_string(),
            path_arg(&self.cookie_file),
        ];
        if let Some(ua) = &options.user_agent {
            args.push("--user-agent".to_string());
            args.push(ua.clone());
        }
        if let Some(format) = options.format {
            args.push("--format".to_string());
            args.push(format.to_string());
        }
        args.push(url.to_string());
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl Extractor for YtDlp {
    fn extract_info(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> impl Future<Output = Result<Value>> + Send {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(self.args(url, options))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        async move {
            let out = command.output().await.context("Spawning yt-dlp")?;
            if !out.status.success() {
                bail!(
                    "yt-dlp exited with {}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                );
            }

            serde_json::from_slice::<Value>(&out.stdout).context("Parsing yt-dlp info JSON")
        }
    }
}
