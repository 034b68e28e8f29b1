//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri della pipeline
//! - Fornisce validazione robusta dei parametri di input
//! - Carica i segreti (credenziali) dalle variabili d'ambiente in `Secrets`
//! - Fornisce valori di default che replicano il comportamento storico
//!   dello script (velocità 0.85, durata 180s, upload privato)
//!
//! ## Parametri di configurazione:
//! - `strategy`: Politica di selezione link (date-match o random)
//! - `random_seed`: Seed opzionale per selezione random deterministica
//! - `target_duration`: Durata esatta dell'output in secondi
//! - `speed`: Moltiplicatore di velocità (< 1.0 rallenta e abbassa il pitch)
//! - `max_height`: Limite di risoluzione verticale (0 = nessun limite)
//! - `privacy`: Visibilità dell'upload (private/unlisted/public)
//! - `download_retries`: Tentativi per errori transienti di download
//!
//! ## Segreti (fatali se assenti all'avvio):
//! - `GCP_SA_KEY`: JSON del service account per il foglio di calcolo
//! - `SHEET_URL`: URL del foglio con i link candidati
//! - `YOUTUBE_CLIENT_ID` / `YOUTUBE_CLIENT_SECRET` / `YOUTUBE_REFRESH_TOKEN`
//! - `EMAIL_USER` / `EMAIL_PASS`: Account SMTP per il report

use crate::error::PipelineError;
use std::path::PathBuf;
use std::str::FromStr;

/// Upload visibility on the video platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privacy {
    Private,
    Unlisted,
    Public,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Private => "private",
            Privacy::Unlisted => "unlisted",
            Privacy::Public => "public",
        }
    }
}

impl FromStr for Privacy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Privacy::Private),
            "unlisted" => Ok(Privacy::Unlisted),
            "public" => Ok(Privacy::Public),
            other => Err(PipelineError::Config(format!(
                "unknown privacy level: {other} (expected private, unlisted or public)"
            ))),
        }
    }
}

/// Link selection policy.
///
/// The script revisions disagreed on this: early ones matched today's date
/// against a date column, later ones picked a random link-bearing cell.
/// Both survive as an explicit strategy; date-match is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    DateMatch,
    RandomValid,
}

impl FromStr for SelectionStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" | "date-match" => Ok(SelectionStrategy::DateMatch),
            "random" | "random-valid" => Ok(SelectionStrategy::RandomValid),
            other => Err(PipelineError::Config(format!(
                "unknown selection strategy: {other} (expected date-match or random)"
            ))),
        }
    }
}

/// Configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct Config {
    /// Link selection policy
    pub strategy: SelectionStrategy,
    /// Seed for the random strategy (None = OS entropy)
    pub random_seed: Option<u64>,
    /// Exact output duration in seconds
    pub target_duration: f64,
    /// Playback speed multiplier (0 < speed <= 1)
    pub speed: f64,
    /// Cap on output height in pixels (None = keep source resolution)
    pub max_height: Option<u32>,
    /// Upload visibility
    pub privacy: Privacy,
    /// Bounded retry count for transient download failures
    pub download_retries: u32,
    /// Identifying header sent by the downloader
    pub user_agent: String,
    /// Fixed local path for the downloaded asset
    pub input_path: PathBuf,
    /// Fixed local path for the rendered asset
    pub output_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::DateMatch,
            random_seed: None,
            target_duration: 180.0,
            speed: 0.85,
            max_height: Some(720),
            privacy: Privacy::Private,
            download_retries: 3,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            input_path: PathBuf::from("input_video.mp4"),
            output_path: PathBuf::from("output_lofi.mp4"),
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.speed <= 0.0 || self.speed > 1.0 {
            return Err(PipelineError::Config(
                "speed multiplier must be in (0.0, 1.0]".to_string(),
            ));
        }

        if self.target_duration <= 0.0 {
            return Err(PipelineError::Config(
                "target duration must be greater than zero".to_string(),
            ));
        }

        if self.download_retries == 0 {
            return Err(PipelineError::Config(
                "download retries must be at least 1".to_string(),
            ));
        }

        if let Some(height) = self.max_height {
            if height == 0 {
                return Err(PipelineError::Config(
                    "max height must be greater than zero when set".to_string(),
                ));
            }
        }

        if self.input_path == self.output_path {
            return Err(PipelineError::Config(
                "input and output filenames must differ".to_string(),
            ));
        }

        Ok(())
    }
}

/// Credentials read once from the environment at startup.
///
/// Every field is required; a missing variable aborts the run before any
/// external call is made.
#[derive(Clone)]
pub struct Secrets {
    /// Service account key JSON (content, not a path)
    pub service_account_key: String,
    /// URL of the spreadsheet holding candidate links
    pub sheet_url: String,
    pub youtube_client_id: String,
    pub youtube_client_secret: String,
    pub youtube_refresh_token: String,
    pub email_user: String,
    pub email_pass: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self, PipelineError> {
        Ok(Self {
            service_account_key: required("GCP_SA_KEY")?,
            sheet_url: required("SHEET_URL")?,
            youtube_client_id: required("YOUTUBE_CLIENT_ID")?,
            youtube_client_secret: required("YOUTUBE_CLIENT_SECRET")?,
            youtube_refresh_token: required("YOUTUBE_REFRESH_TOKEN")?,
            email_user: required("EMAIL_USER")?,
            email_pass: required("EMAIL_PASS")?,
        })
    }
}

// Secrets never appear in logs or error chains.
impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("sheet_url", &self.sheet_url)
            .finish_non_exhaustive()
    }
}

fn required(name: &str) -> Result<String, PipelineError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(PipelineError::Config(format!(
            "missing required environment variable {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.strategy, SelectionStrategy::DateMatch);
        assert_eq!(config.target_duration, 180.0);
        assert_eq!(config.speed, 0.85);
        assert_eq!(config.max_height, Some(720));
        assert_eq!(config.privacy, Privacy::Private);
        assert_eq!(config.download_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.speed = 0.0;
        assert!(config.validate().is_err());
        config.speed = 1.2;
        assert!(config.validate().is_err());
        config.speed = 1.0;
        assert!(config.validate().is_ok());

        config.target_duration = 0.0;
        assert!(config.validate().is_err());
        config.target_duration = 60.0;

        config.download_retries = 0;
        assert!(config.validate().is_err());
        config.download_retries = 1;

        config.max_height = Some(0);
        assert!(config.validate().is_err());
        config.max_height = None;
        assert!(config.validate().is_ok());

        config.output_path = config.input_path.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_privacy_parsing() {
        assert_eq!("private".parse::<Privacy>().unwrap(), Privacy::Private);
        assert_eq!("UNLISTED".parse::<Privacy>().unwrap(), Privacy::Unlisted);
        assert_eq!("Public".parse::<Privacy>().unwrap(), Privacy::Public);
        assert!("friends-only".parse::<Privacy>().is_err());
        assert_eq!(Privacy::Unlisted.as_str(), "unlisted");
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "date-match".parse::<SelectionStrategy>().unwrap(),
            SelectionStrategy::DateMatch
        );
        assert_eq!(
            "random".parse::<SelectionStrategy>().unwrap(),
            SelectionStrategy::RandomValid
        );
        assert!("newest".parse::<SelectionStrategy>().is_err());
    }
}
