//! # Lofi Auto Publisher Library
//!
//! Questo è il modulo principale della libreria che espone le API pubbliche.
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione immutabile e segreti da ambiente
//! - `error`: Tipi di errore custom per le diverse operazioni
//! - `sheets`: Client REST per il foglio dei link candidati
//! - `selector`: Politiche di selezione del link (date-match / random)
//! - `downloader`: Wrapper yt-dlp con retry limitati
//! - `transformer`: Trasformazione lofi via ffmpeg (loop, filtri, caption)
//! - `publisher`: Upload resumabile con credenziali refresh-token
//! - `notifier`: Report email best-effort
//! - `cleanup`: Rimozione garantita dei file locali
//! - `pipeline`: Orchestratore sequenziale dell'intera run
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use lofi_auto_publisher::{Config, Pipeline, Secrets};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let secrets = Secrets::from_env()?;
//! let _outcome = Pipeline::new(config, secrets)?.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod config;
pub mod downloader;
pub mod error;
pub mod notifier;
pub mod pipeline;
pub mod publisher;
pub mod selector;
pub mod sheets;
pub mod transformer;

pub use config::{Config, Privacy, Secrets, SelectionStrategy};
pub use error::PipelineError;
pub use pipeline::{Pipeline, RunOutcome};
