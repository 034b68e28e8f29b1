//! # Error Types Module
//!
//! Tipi di errore custom per la pipeline di pubblicazione.
//!
//! ## Categorie di errori:
//! - `Config`: Variabili d'ambiente mancanti o parametri fuori range
//! - `Sheet`: Accesso al foglio di calcolo fallito (credenziali, rete)
//! - `Download`: yt-dlp fallito dopo i retry
//! - `Probe` / `Transform`: ffprobe / ffmpeg falliti
//! - `Upload`: Refresh token o upload resumabile falliti
//! - `Notify`: Invio email fallito (mai fatale, vedi notifier)
//! - `MissingDependency`: Tool esterno mancante (ffmpeg, ffprobe, yt-dlp)
//!
//! La distinzione fatale/recuperabile è decisa dal chiamante: gli errori
//! `Sheet` degradano a "nessun candidato", gli errori `Notify` vengono
//! loggati e ignorati, tutto il resto propaga fino al boundary in main.

/// Custom error types for the publish pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("spreadsheet access error: {0}")]
    Sheet(String),

    #[error("download error: {0}")]
    Download(String),

    #[error("probe error: {0}")]
    Probe(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("upload error: {0}")]
    Upload(String),

    #[error("notification error: {0}")]
    Notify(String),

    #[error("dependency missing: {0}")]
    MissingDependency(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
