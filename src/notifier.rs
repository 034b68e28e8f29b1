//! # Notifier Module
//!
//! Invio del report di fine run via SMTP autenticato (STARTTLS).
//!
//! ## Contratto:
//! - Un solo messaggio per run, auto-indirizzato allo stesso account
//! - Il fallimento dell'invio è sempre non-fatale: viene loggato e
//!   inghiottito, perché un disservizio mail non deve mai mascherare
//!   l'esito del task primario né bloccare il cleanup

use crate::error::PipelineError;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

const SMTP_HOST: &str = "smtp.gmail.com";

/// Sends one-shot status mails to the configured account
pub struct Notifier {
    user: String,
    pass: String,
}

impl Notifier {
    pub fn new(user: String, pass: String) -> Self {
        Self { user, pass }
    }

    /// Send a report, swallowing (and logging) any failure.
    pub async fn send_report(&self, subject: &str, body: &str) {
        match self.try_send(subject, body).await {
            Ok(()) => info!("Report email sent: {subject}"),
            Err(e) => warn!("Report email failed (ignored): {e}"),
        }
    }

    async fn try_send(&self, subject: &str, body: &str) -> Result<(), PipelineError> {
        let message = build_message(&self.user, subject, body)?;

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(SMTP_HOST)
                .map_err(|e| PipelineError::Notify(e.to_string()))?
                .credentials(Credentials::new(self.user.clone(), self.pass.clone()))
                .build();

        mailer
            .send(message)
            .await
            .map_err(|e| PipelineError::Notify(e.to_string()))?;
        Ok(())
    }
}

/// Build the self-addressed plain-text message.
fn build_message(user: &str, subject: &str, body: &str) -> Result<Message, PipelineError> {
    let mailbox: Mailbox = user
        .parse()
        .map_err(|e| PipelineError::Notify(format!("invalid mail address {user}: {e}")))?;

    Message::builder()
        .from(mailbox.clone())
        .to(mailbox)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| PipelineError::Notify(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message_is_self_addressed() {
        let message = build_message("bot@example.com", "[ok] done", "all good").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("From: bot@example.com"));
        assert!(raw.contains("To: bot@example.com"));
        assert!(raw.contains("Subject: [ok] done"));
        assert!(raw.contains("all good"));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        assert!(build_message("not an address", "s", "b").is_err());
    }
}
