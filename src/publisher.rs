//! # Publisher Module
//!
//! Upload del file renderizzato sulla piattaforma video.
//!
//! ## Flusso:
//! 1. Scambia il refresh token long-lived con un access token (nessun
//!    flusso interattivo)
//! 2. Apre una sessione di upload resumabile con i metadata generati
//! 3. Invia il file a chunk fissi con header `Content-Range`
//!    (308 = continua, 200/201 = completato)
//!
//! ## Metadata generati:
//! - Titolo `[Lofi Mix] {titolo} - {data}` troncato al limite piattaforma
//! - Descrizione con titolo sorgente e hashtag fissi
//! - Categoria fissa Music (10), privacy configurabile,
//!   `selfDeclaredMadeForKids: false` esplicito
//!
//! Qualunque fallimento qui è fatale e propaga al boundary in main.

use crate::config::{Config, Privacy};
use crate::error::PipelineError;
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Platform cap on video titles, in characters
const TITLE_MAX_CHARS: usize = 100;

/// Resumable upload chunk size (must stay a multiple of 256 KiB)
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

/// Uploads rendered files with OAuth refresh-token credentials
pub struct Publisher {
    http: reqwest::Client,
    config: Config,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl Publisher {
    pub fn new(
        config: Config,
        client_id: String,
        client_secret: String,
        refresh_token: String,
    ) -> Result<Self, PipelineError> {
        // The resumable protocol answers chunk PUTs with 308; redirect
        // following must stay off so those reach the caller.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("lofi-publisher/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config,
            client_id,
            client_secret,
            refresh_token,
        })
    }

    /// Upload `file` and return the platform-assigned video id.
    pub async fn upload(&self, file: &Path, source_title: &str) -> Result<String, PipelineError> {
        let token = self.access_token().await?;
        let today = Local::now().format("%Y-%m-%d").to_string();
        let metadata = build_metadata(source_title, &today, self.config.privacy);

        let size = tokio::fs::metadata(file).await?.len();
        info!("Starting resumable upload of {} ({} bytes)", file.display(), size);

        let session_uri = self.open_session(&token, &metadata, size).await?;
        let video_id = self.send_chunks(&session_uri, &token, file, size).await?;
        info!("Upload complete, video id {video_id}");

        Ok(video_id)
    }

    /// Exchange the long-lived refresh token for a bearer access token.
    async fn access_token(&self) -> Result<String, PipelineError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Upload(format!(
                "token refresh failed with {status}: {body}"
            )));
        }

        Ok(response.json::<TokenResponse>().await?.access_token)
    }

    async fn open_session(
        &self,
        token: &str,
        metadata: &serde_json::Value,
        size: u64,
    ) -> Result<String, PipelineError> {
        let response = self
            .http
            .post(UPLOAD_URL)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", size.to_string())
            .json(metadata)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Upload(format!(
                "resumable session request failed with {status}: {body}"
            )));
        }

        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::Upload("no resumable session URI returned".to_string())
            })
    }

    async fn send_chunks(
        &self,
        session_uri: &str,
        token: &str,
        file: &Path,
        size: u64,
    ) -> Result<String, PipelineError> {
        let mut reader = tokio::fs::File::open(file).await?;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut offset: u64 = 0;

        loop {
            let read = read_full(&mut reader, &mut buffer).await?;
            if read == 0 {
                return Err(PipelineError::Upload(
                    "file ended before the upload completed".to_string(),
                ));
            }

            let end = offset + read as u64 - 1;
            debug!("Uploading bytes {offset}-{end}/{size}");

            let response = self
                .http
                .put(session_uri)
                .bearer_auth(token)
                .header(
                    reqwest::header::CONTENT_RANGE,
                    format!("bytes {offset}-{end}/{size}"),
                )
                .body(buffer[..read].to_vec())
                .send()
                .await?;

            match response.status().as_u16() {
                // 308 Resume Incomplete: the chunk was accepted
                308 => offset = end + 1,
                200 | 201 => {
                    return Ok(response.json::<UploadResponse>().await?.id);
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(PipelineError::Upload(format!(
                        "chunk upload failed with {status}: {body}"
                    )));
                }
            }
        }
    }
}

/// Build the platform metadata body for the rendered asset.
pub fn build_metadata(source_title: &str, date: &str, privacy: Privacy) -> serde_json::Value {
    let title = truncate_chars(&format!("[Lofi Mix] {source_title} - {date}"), TITLE_MAX_CHARS);
    json!({
        "snippet": {
            "title": title,
            "description": format!(
                "Relaxing lofi remix of {source_title}.\n\n#lofi #remix #relaxing"
            ),
            "tags": ["lofi", "remix", "relaxing"],
            "categoryId": "10",
        },
        "status": {
            "privacyStatus": privacy.as_str(),
            "selfDeclaredMadeForKids": false,
        }
    })
}

/// Char-boundary-safe truncation
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

async fn read_full(
    reader: &mut tokio::fs::File,
    buffer: &mut [u8],
) -> Result<usize, std::io::Error> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
