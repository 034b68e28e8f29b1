//! # Lofi Auto Publisher - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento dei segreti da ambiente (fatale se incompleti)
//! - Verifica delle dipendenze esterne (ffmpeg, ffprobe, yt-dlp)
//! - Avvio della pipeline e mappatura dell'esito sull'exit code
//!
//! ## Exit code:
//! - 0: upload completato, oppure nessun link candidato (terminazione
//!   normale a vuoto)
//! - 1: errore fatale, dopo il tentativo di notifica di fallimento
//!
//! ## Esempio di utilizzo:
//! ```bash
//! lofi-publisher --strategy random --seed 42 --target-duration 120 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use lofi_auto_publisher::{
    downloader::Downloader, transformer::Transformer, Config, Pipeline, RunOutcome, Secrets,
};

#[derive(Parser)]
#[command(name = "lofi-publisher")]
#[command(about = "Pick a sheet link, render a lofi remix, upload it and report by mail")]
struct Args {
    /// Link selection strategy (date-match or random)
    #[arg(long, default_value = "date-match")]
    strategy: String,

    /// Seed for the random strategy (deterministic selection)
    #[arg(long)]
    seed: Option<u64>,

    /// Exact output duration in seconds
    #[arg(short = 'd', long, default_value = "180")]
    target_duration: f64,

    /// Playback speed multiplier (< 1.0 slows and lowers pitch)
    #[arg(short, long, default_value = "0.85")]
    speed: f64,

    /// Cap on output height in pixels (0 disables the cap)
    #[arg(long, default_value = "720")]
    max_height: u32,

    /// Upload visibility (private, unlisted or public)
    #[arg(short, long, default_value = "private")]
    privacy: String,

    /// Retry attempts for transient download failures
    #[arg(long, default_value = "3")]
    download_retries: u32,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config {
        strategy: args.strategy.parse()?,
        random_seed: args.seed,
        target_duration: args.target_duration,
        speed: args.speed,
        max_height: (args.max_height > 0).then_some(args.max_height),
        privacy: args.privacy.parse()?,
        download_retries: args.download_retries,
        ..Config::default()
    };
    config.validate()?;

    // Credentials are required up front, before any work begins
    let secrets = Secrets::from_env()?;

    // External tools are part of the contract too
    Transformer::check_dependencies()?;
    Downloader::check_dependencies()?;

    let pipeline = Pipeline::new(config, secrets)?;
    match pipeline.run().await {
        Ok(RunOutcome::Published { video_id, title }) => {
            info!("Run complete: \"{title}\" published as {video_id}");
            Ok(())
        }
        Ok(RunOutcome::NoCandidate { reason }) => {
            info!("Run complete with nothing to do: {reason}");
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {e:#}");
            std::process::exit(1);
        }
    }
}
