//! # Cleanup Module
//!
//! Rimozione garantita dei file intermedi e di output dopo ogni run.
//!
//! ## Contratto:
//! - Cancella ogni path presente, ignora quelli assenti
//! - Nessun errore di cancellazione propaga mai: viene loggato e
//!   inghiottito, così il cleanup completa sempre tutta la lista
//! - Eseguito dall'orchestratore su ogni uscita (successo, nessun
//!   candidato, errore fatale)

use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// Delete every listed file that exists. Never fails.
pub async fn remove_artifacts(paths: &[&Path]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => info!("Removed {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Nothing to remove at {}", path.display());
            }
            Err(e) => warn!("Could not remove {} (ignored): {e}", path.display()),
        }
    }
}
