//! # Link Selector Module
//!
//! Questo modulo sceglie il link sorgente da processare nella run corrente.
//!
//! ## Politiche di selezione:
//! - **Date-match**: cerca una colonna data (nome case-insensitive) e
//!   ritorna il link della prima riga la cui data contiene la data odierna
//! - **Random-among-valid**: raccoglie tutte le celle con un link video
//!   riconoscibile e ne sceglie una uniformemente (seed opzionale per
//!   selezione deterministica nei test)
//!
//! ## Contratto:
//! - "Nessun dato" non è mai un errore: ritorna `Selection::NoCandidate`
//! - Errori di accesso al foglio (credenziali, rete) vengono catturati e
//!   convertiti in `NoCandidate` con il testo dell'errore come motivo
//! - Meno di 2 righe (solo header) ⇒ `NoCandidate`
//!
//! La logica di selezione è pura su `Vec<Vec<String>>` ed è testabile
//! senza rete.

use crate::config::{Config, SelectionStrategy};
use crate::error::PipelineError;
use crate::sheets::SheetsClient;
use chrono::Local;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

/// Header names accepted for the date column (trimmed, case-insensitive)
const DATE_HEADERS: &[&str] = &["날짜", "date"];

/// Header names accepted for the link column
const LINK_HEADERS: &[&str] = &["링크", "link"];

/// Substrings that mark a cell as a recognizable video link
const LINK_MARKERS: &[&str] = &["youtube.com/watch", "youtu.be/", "vimeo.com/"];

/// Outcome of link selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Chosen(String),
    NoCandidate { reason: String },
}

impl Selection {
    fn none(reason: impl Into<String>) -> Self {
        Selection::NoCandidate {
            reason: reason.into(),
        }
    }
}

/// Picks the candidate link for this run
pub struct LinkSelector<'a> {
    config: &'a Config,
    sheet_url: &'a str,
    service_account_key: &'a str,
}

impl<'a> LinkSelector<'a> {
    pub fn new(config: &'a Config, service_account_key: &'a str, sheet_url: &'a str) -> Self {
        Self {
            config,
            sheet_url,
            service_account_key,
        }
    }

    /// Select a link according to the configured strategy.
    ///
    /// Never returns an error: spreadsheet access failures degrade to
    /// `NoCandidate` so the run terminates normally with a diagnostic.
    pub async fn select(&self) -> Selection {
        let rows = match self.fetch_rows().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Spreadsheet unavailable, treating as no candidate: {e}");
                return Selection::none(format!("spreadsheet access failed: {e}"));
            }
        };

        info!("Fetched {} sheet rows", rows.len());
        let today = Local::now().format("%Y-%m-%d").to_string();

        match self.config.strategy {
            SelectionStrategy::DateMatch => select_by_date(&rows, &today),
            SelectionStrategy::RandomValid => match self.config.random_seed {
                Some(seed) => select_random(&rows, &mut StdRng::seed_from_u64(seed)),
                None => select_random(&rows, &mut rand::thread_rng()),
            },
        }
    }

    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, PipelineError> {
        let client = SheetsClient::new(self.service_account_key, self.sheet_url)?;
        client.fetch_rows().await
    }
}

/// Return the link of the first data row whose date cell contains `today`.
pub fn select_by_date(rows: &[Vec<String>], today: &str) -> Selection {
    if rows.len() < 2 {
        return Selection::none("spreadsheet has no data rows");
    }

    let header = &rows[0];
    let date_col = find_column(header, DATE_HEADERS);
    let link_col = find_column(header, LINK_HEADERS);

    let (Some(date_col), Some(link_col)) = (date_col, link_col) else {
        return Selection::none("no date/link columns found in header row");
    };

    for row in &rows[1..] {
        let matches_today = row
            .get(date_col)
            .is_some_and(|cell| cell.contains(today));
        if !matches_today {
            continue;
        }
        if let Some(link) = row.get(link_col).map(|l| l.trim()).filter(|l| !l.is_empty()) {
            return Selection::Chosen(link.to_string());
        }
    }

    Selection::none(format!("no row dated {today} with a link"))
}

/// Pick one recognizable video link uniformly among all data-row cells.
pub fn select_random(rows: &[Vec<String>], rng: &mut impl Rng) -> Selection {
    if rows.len() < 2 {
        return Selection::none("spreadsheet has no data rows");
    }

    let candidates: Vec<&str> = rows[1..]
        .iter()
        .flatten()
        .map(|cell| cell.trim())
        .filter(|cell| looks_like_video_link(cell))
        .collect();

    if candidates.is_empty() {
        return Selection::none("no cell contains a recognizable video link");
    }

    let index = rng.gen_range(0..candidates.len());
    Selection::Chosen(candidates[index].to_string())
}

/// True when the cell contains a marker of a supported video platform
pub fn looks_like_video_link(cell: &str) -> bool {
    LINK_MARKERS.iter().any(|marker| cell.contains(marker))
}

fn find_column(header: &[String], names: &[&str]) -> Option<usize> {
    header.iter().position(|cell| {
        let cell = cell.trim();
        names
            .iter()
            .any(|name| cell.eq_ignore_ascii_case(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_header_only_is_no_candidate() {
        let sheet = rows(&[&["Date", "Link"]]);
        assert!(matches!(
            select_by_date(&sheet, "2026-08-29"),
            Selection::NoCandidate { .. }
        ));
        assert!(matches!(
            select_random(&sheet, &mut StdRng::seed_from_u64(0)),
            Selection::NoCandidate { .. }
        ));
    }

    #[test]
    fn test_empty_sheet_is_no_candidate() {
        let sheet: Vec<Vec<String>> = Vec::new();
        assert!(matches!(
            select_by_date(&sheet, "2026-08-29"),
            Selection::NoCandidate { .. }
        ));
    }

    #[test]
    fn test_date_match_returns_paired_link() {
        let sheet = rows(&[
            &["Date", "Link"],
            &["2026-08-28", "https://youtu.be/aaaaaaaaaaa"],
            &["2026-08-29", "https://youtu.be/bbbbbbbbbbb"],
        ]);
        assert_eq!(
            select_by_date(&sheet, "2026-08-29"),
            Selection::Chosen("https://youtu.be/bbbbbbbbbbb".to_string())
        );
    }

    #[test]
    fn test_date_match_is_containment_not_equality() {
        // Sheet cells often carry a time suffix next to the date
        let sheet = rows(&[
            &["date", "link"],
            &["2026-08-29 09:00", "https://youtu.be/ccccccccccc"],
        ]);
        assert_eq!(
            select_by_date(&sheet, "2026-08-29"),
            Selection::Chosen("https://youtu.be/ccccccccccc".to_string())
        );
    }

    #[test]
    fn test_date_match_korean_headers() {
        let sheet = rows(&[
            &["날짜", "링크"],
            &["2026-08-29", "https://youtube.com/watch?v=ddddddddddd"],
        ]);
        assert_eq!(
            select_by_date(&sheet, "2026-08-29"),
            Selection::Chosen("https://youtube.com/watch?v=ddddddddddd".to_string())
        );
    }

    #[test]
    fn test_no_matching_date_is_no_candidate() {
        let sheet = rows(&[
            &["Date", "Link"],
            &["2026-01-01", "https://youtu.be/aaaaaaaaaaa"],
        ]);
        assert!(matches!(
            select_by_date(&sheet, "2026-08-29"),
            Selection::NoCandidate { .. }
        ));
    }

    #[test]
    fn test_missing_columns_is_no_candidate() {
        let sheet = rows(&[
            &["Title", "Notes"],
            &["something", "https://youtu.be/aaaaaaaaaaa"],
        ]);
        assert!(matches!(
            select_by_date(&sheet, "2026-08-29"),
            Selection::NoCandidate { .. }
        ));
    }

    #[test]
    fn test_random_excludes_non_link_cells() {
        let sheet = rows(&[
            &["Date", "Link", "Notes"],
            &["2026-08-29", "https://youtu.be/aaaaaaaaaaa", "not a link"],
            &["plain text", "", "also not a link"],
        ]);
        for seed in 0..16 {
            let picked = select_random(&sheet, &mut StdRng::seed_from_u64(seed));
            assert_eq!(
                picked,
                Selection::Chosen("https://youtu.be/aaaaaaaaaaa".to_string())
            );
        }
    }

    #[test]
    fn test_random_is_deterministic_with_seed() {
        let sheet = rows(&[
            &["Link"],
            &["https://youtu.be/aaaaaaaaaaa"],
            &["https://youtu.be/bbbbbbbbbbb"],
            &["https://vimeo.com/12345"],
        ]);
        let first = select_random(&sheet, &mut StdRng::seed_from_u64(7));
        let second = select_random(&sheet, &mut StdRng::seed_from_u64(7));
        assert_eq!(first, second);
        assert!(matches!(first, Selection::Chosen(_)));
    }

    #[test]
    fn test_random_without_any_link_is_no_candidate() {
        let sheet = rows(&[&["Link"], &["nothing here"], &["still nothing"]]);
        assert!(matches!(
            select_random(&sheet, &mut StdRng::seed_from_u64(0)),
            Selection::NoCandidate { .. }
        ));
    }

    #[test]
    fn test_looks_like_video_link() {
        assert!(looks_like_video_link("https://youtube.com/watch?v=abc"));
        assert!(looks_like_video_link("https://youtu.be/abc"));
        assert!(looks_like_video_link("https://vimeo.com/123"));
        assert!(!looks_like_video_link("https://example.com/video"));
        assert!(!looks_like_video_link("2026-08-29"));
    }
}
