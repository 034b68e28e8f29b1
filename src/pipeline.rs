//! # Pipeline Orchestrator Module
//!
//! Questo è il modulo che orchestra l'intera run di pubblicazione.
//!
//! ## Flusso di esecuzione:
//! 1. **Selector**: sceglie il link candidato (o termina con no-candidate)
//! 2. **Downloader**: scarica il video e ne estrae il titolo
//! 3. **Transformer**: renderizza la versione lofi
//! 4. **Publisher**: upload resumabile e id del video risultante
//! 5. **Notifier**: email di esito (best-effort, mai fatale)
//! 6. **Cleanup**: rimozione dei due file locali su ogni percorso d'uscita
//!
//! ## Error handling:
//! - Un solo boundary fatale attorno a download → transform → upload
//! - Il fallimento fatale produce una mail di errore col testo grezzo
//!   dell'eccezione, poi il cleanup, poi l'errore propaga a main
//! - "Nessun candidato" è terminazione normale: nessun download, nessun
//!   upload, nessuna email

use crate::cleanup;
use crate::config::Config;
use crate::downloader::Downloader;
use crate::notifier::Notifier;
use crate::publisher::Publisher;
use crate::selector::{LinkSelector, Selection};
use crate::transformer::{CaptionOutcome, Transformer};
use crate::Secrets;
use anyhow::Result;
use tracing::{error, info, warn};

/// Final state of one pipeline run
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Published { video_id: String, title: String },
    NoCandidate { reason: String },
}

/// Sequential publish pipeline
pub struct Pipeline {
    config: Config,
    secrets: Secrets,
}

impl Pipeline {
    pub fn new(config: Config, secrets: Secrets) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, secrets })
    }

    /// Run the full pipeline once.
    ///
    /// Success and failure both pass through the notification and cleanup
    /// stages; only the fatal error (if any) propagates to the caller.
    pub async fn run(&self) -> Result<RunOutcome> {
        let result = self.run_inner().await;

        let notifier = Notifier::new(
            self.secrets.email_user.clone(),
            self.secrets.email_pass.clone(),
        );

        match &result {
            Ok(RunOutcome::Published { video_id, title }) => {
                let body = format!(
                    "Source title: {title}\nResult: https://youtu.be/{video_id}\n\
                     Visibility: {}",
                    self.config.privacy.as_str()
                );
                notifier
                    .send_report("[lofi-publisher] upload complete", &body)
                    .await;
            }
            Ok(RunOutcome::NoCandidate { reason }) => {
                // Normal empty-result termination: nothing happened, so
                // there is nothing to report by mail.
                info!("No candidate link this run: {reason}");
            }
            Err(e) => {
                error!("Pipeline failed: {e:#}");
                notifier
                    .send_report("[lofi-publisher] run failed", &format!("{e:#}"))
                    .await;
            }
        }

        cleanup::remove_artifacts(&[&self.config.input_path, &self.config.output_path]).await;

        result
    }

    async fn run_inner(&self) -> Result<RunOutcome> {
        let selector = LinkSelector::new(
            &self.config,
            &self.secrets.service_account_key,
            &self.secrets.sheet_url,
        );
        let url = match selector.select().await {
            Selection::Chosen(url) => url,
            Selection::NoCandidate { reason } => {
                return Ok(RunOutcome::NoCandidate { reason });
            }
        };
        info!("🎯 Candidate link: {url}");

        let asset = Downloader::new(self.config.clone()).fetch(&url).await?;

        let rendered = Transformer::new(self.config.clone())
            .render(&asset.path, &asset.title)
            .await?;
        if let CaptionOutcome::Skipped { reason } = &rendered.caption {
            warn!("Caption skipped: {reason}");
        }

        let publisher = Publisher::new(
            self.config.clone(),
            self.secrets.youtube_client_id.clone(),
            self.secrets.youtube_client_secret.clone(),
            self.secrets.youtube_refresh_token.clone(),
        )?;
        let video_id = publisher.upload(&rendered.path, &asset.title).await?;

        Ok(RunOutcome::Published {
            video_id,
            title: asset.title,
        })
    }
}
