//! # Downloader Module
//!
//! Questo modulo scarica il video sorgente con yt-dlp.
//!
//! ## Responsabilità:
//! - Selezione del miglior stream video+audio e merge in mp4
//! - Salvataggio sotto filename fisso (sovrascrive run precedenti)
//! - Estrazione del titolo dal JSON info di yt-dlp
//! - Header User-Agent configurabile contro i rifiuti da bot-detection
//! - Retry limitati per errori transienti (timeout, frammenti, 5xx)
//!
//! Un fallimento dopo i retry è fatale e propaga al boundary in main.

use crate::config::Config;
use crate::error::PipelineError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const FALLBACK_TITLE: &str = "Unknown Title";

/// Downloaded source video plus its extracted title
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub path: PathBuf,
    pub title: String,
}

/// Wraps the yt-dlp binary
pub struct Downloader {
    config: Config,
}

impl Downloader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Check that yt-dlp is available
    pub fn check_dependencies() -> Result<(), PipelineError> {
        which::which("yt-dlp").map_err(|_| {
            PipelineError::MissingDependency("yt-dlp is required for downloading".to_string())
        })?;
        Ok(())
    }

    /// Fetch the video at `url` to the fixed local filename.
    ///
    /// Transient failures are retried up to `config.download_retries`
    /// attempts with a linear backoff; anything else surfaces immediately.
    pub async fn fetch(&self, url: &str) -> Result<MediaAsset, PipelineError> {
        Self::check_dependencies()?;

        let mut attempt = 1;
        loop {
            info!(
                "Downloading {} (attempt {}/{})",
                url, attempt, self.config.download_retries
            );

            match self.attempt(url).await {
                Ok(asset) => {
                    info!("Downloaded \"{}\" to {}", asset.title, asset.path.display());
                    return Ok(asset);
                }
                Err(e) => {
                    let message = e.to_string();
                    if attempt < self.config.download_retries && is_transient(&message) {
                        warn!("Transient download failure, retrying: {message}");
                        tokio::time::sleep(Duration::from_secs(5 * attempt as u64)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<MediaAsset, PipelineError> {
        let args = self.build_args(url);
        debug!("yt-dlp {}", args.join(" "));

        let output = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {stderr}");
            let last_line = stderr.lines().last().unwrap_or("unknown error");
            return Err(PipelineError::Download(format!(
                "yt-dlp failed: {last_line}"
            )));
        }

        if !self.config.input_path.exists() {
            return Err(PipelineError::Download(
                "yt-dlp reported success but the output file is missing".to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(MediaAsset {
            path: self.config.input_path.clone(),
            title: extract_title(&stdout),
        })
    }

    /// Build the yt-dlp argument list for one attempt.
    fn build_args(&self, url: &str) -> Vec<String> {
        vec![
            "--no-playlist".to_string(),
            "--force-overwrites".to_string(),
            "--no-progress".to_string(),
            // Dump the info JSON on stdout while still downloading
            "--print-json".to_string(),
            "--user-agent".to_string(),
            self.config.user_agent.clone(),
            "--retries".to_string(),
            "3".to_string(),
            "--fragment-retries".to_string(),
            "3".to_string(),
            "-f".to_string(),
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-o".to_string(),
            self.config.input_path.to_string_lossy().to_string(),
            url.to_string(),
        ]
    }
}

/// Pull the title out of the yt-dlp info JSON, with a placeholder fallback.
fn extract_title(stdout: &str) -> String {
    stdout
        .lines()
        .find(|line| line.trim_start().starts_with('{'))
        .and_then(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .and_then(|info| info["title"].as_str().map(str::to_string))
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

/// Classify a failure message as worth another attempt.
fn is_transient(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    const MARKERS: &[&str] = &[
        "timed out",
        "timeout",
        "temporary failure",
        "connection reset",
        "fragment",
        "incomplete read",
        "http error 429",
        "http error 500",
        "http error 502",
        "http error 503",
    ];
    MARKERS.iter().any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let downloader = Downloader::new(Config::default());
        let args = downloader.build_args("https://youtu.be/abc");

        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"--print-json".to_string()));
        assert!(args.contains(&"mp4".to_string()));
        assert!(args.iter().any(|a| a.contains("bestvideo[ext=mp4]")));
        assert!(args.iter().any(|a| a.starts_with("Mozilla/5.0")));
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");

        // Output flag pairs with the fixed filename
        let o = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o + 1], "input_video.mp4");
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("{\"title\": \"Night Drive\", \"id\": \"x\"}\n"),
            "Night Drive"
        );
        assert_eq!(extract_title("{\"id\": \"x\"}"), FALLBACK_TITLE);
        assert_eq!(extract_title("not json at all"), FALLBACK_TITLE);
        assert_eq!(extract_title("{\"title\": \"  \"}"), FALLBACK_TITLE);
        assert_eq!(
            extract_title("[download] 100%\n{\"title\": \"Rainy Loop\"}"),
            "Rainy Loop"
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(is_transient("yt-dlp failed: Connection timed out"));
        assert!(is_transient("yt-dlp failed: fragment 3 not found"));
        assert!(is_transient("yt-dlp failed: HTTP Error 503: Service Unavailable"));
        assert!(!is_transient("yt-dlp failed: Video unavailable"));
        assert!(!is_transient("yt-dlp failed: Unsupported URL"));
    }
}
