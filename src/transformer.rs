//! # Lofi Transformer Module
//!
//! Questo modulo applica la trasformazione "lofi" al video scaricato.
//!
//! ## Pipeline di trasformazione:
//! 1. Analizza la durata sorgente con ffprobe
//! 2. Pianifica la catena di filtri (`FilterPlan`, pura e testabile):
//!    - Video: rallentamento `setpts`, desaturazione e contrasto con `eq`,
//!      limite di risoluzione opzionale, frame rate fisso
//!    - Audio: rallentamento con pitch abbassato (`asetrate` + `aresample`),
//!      volume ridotto, fade-out finale
//!    - Loop: se la clip stilizzata è più corta del target viene ripetuta
//!      per intero (`-stream_loop`) e poi tagliata esattamente al target
//! 3. Renderizza con ffmpeg (libx264 `veryfast`, AAC, `+faststart`)
//!
//! ## Caption best-effort:
//! L'overlay `drawtext` (titolo troncato + etichetta fissa) richiede un
//! font di sistema. Se nessun font è disponibile, o se il render con
//! caption fallisce, si procede senza testo: il fallimento della caption
//! non deve mai abortire la trasformazione. L'esito è riportato come
//! `CaptionOutcome` invece di essere inghiottito.

use crate::config::Config;
use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Fixed output sample rate; audio is resampled here before the pitch shift
const AUDIO_RATE: u32 = 48000;

/// Fixed output frame rate
const OUTPUT_FPS: u32 = 30;

/// Audio fade-out length near the end of the clip
const FADE_SECS: f64 = 3.0;

/// Caption title budget before the ellipsis
const TITLE_CHARS: usize = 30;

/// Bold sans fonts commonly present on build hosts, probed in order
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Whether the title caption made it into the rendered file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionOutcome {
    Applied,
    Skipped { reason: String },
}

/// The rendered output file
#[derive(Debug, Clone)]
pub struct RenderedAsset {
    pub path: PathBuf,
    pub caption: CaptionOutcome,
}

/// Caption inputs for the planning step
#[derive(Debug, Clone, Copy)]
pub struct Caption<'a> {
    pub font: &'a Path,
    pub title: &'a str,
}

/// Complete, precomputed ffmpeg invocation parameters for one render
#[derive(Debug, Clone)]
pub struct FilterPlan {
    /// Extra whole input repetitions (`-stream_loop` value)
    pub extra_loops: u32,
    /// Exact output duration (`-t` value)
    pub output_duration: f64,
    pub video_filter: String,
    pub audio_filter: String,
    pub captioned: bool,
}

impl FilterPlan {
    /// Plan the filter chain for a source of `source_duration` seconds.
    pub fn build(config: &Config, source_duration: f64, caption: Option<Caption<'_>>) -> Self {
        let extra_loops = extra_loops(source_duration, config.speed, config.target_duration);

        let mut video = vec![
            format!("setpts=PTS/{}", config.speed),
            "eq=saturation=0.8:brightness=-0.04:contrast=1.1".to_string(),
        ];
        if let Some(height) = config.max_height {
            // Never upscale; -2 keeps the width even for yuv420p
            video.push(format!("scale=-2:min({height}\\,ih)"));
        }
        video.push(format!("fps={OUTPUT_FPS}"));
        video.push("format=yuv420p".to_string());
        if let Some(caption) = caption {
            video.push(drawtext_filter(caption.font, caption.title));
        }

        let shifted_rate = (AUDIO_RATE as f64 * config.speed).round() as u32;
        let fade_start = (config.target_duration - FADE_SECS).max(0.0);
        let audio = format!(
            "aresample={AUDIO_RATE},asetrate={shifted_rate},aresample={AUDIO_RATE},\
             volume=0.8,afade=t=out:st={fade_start:.3}:d={FADE_SECS}"
        );

        Self {
            extra_loops,
            output_duration: config.target_duration,
            video_filter: video.join(","),
            audio_filter: audio,
            captioned: caption.is_some(),
        }
    }
}

/// Whole extra repetitions needed for the styled clip to reach the target.
///
/// The styled clip lasts `source / speed` seconds (slowing lengthens it).
/// When it already meets the target the source plays once and is trimmed
/// directly, including the exact-boundary case.
pub fn extra_loops(source_duration: f64, speed: f64, target_duration: f64) -> u32 {
    if source_duration <= 0.0 {
        return 0;
    }
    let styled = source_duration / speed;
    if styled >= target_duration {
        0
    } else {
        (target_duration / styled).ceil() as u32 - 1
    }
}

/// Applies the lofi restyle via ffmpeg
pub struct Transformer {
    config: Config,
}

impl Transformer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Check that ffmpeg and ffprobe are available
    pub fn check_dependencies() -> Result<(), PipelineError> {
        for tool in ["ffmpeg", "ffprobe"] {
            which::which(tool).map_err(|_| {
                PipelineError::MissingDependency(format!(
                    "{tool} is required for video processing"
                ))
            })?;
        }
        Ok(())
    }

    /// Render the lofi version of `input` to the fixed output filename.
    pub async fn render(&self, input: &Path, title: &str) -> Result<RenderedAsset, PipelineError> {
        let source_duration = probe_duration(input).await?;
        info!(
            "Source duration {:.1}s, target {:.1}s at speed {}",
            source_duration, self.config.target_duration, self.config.speed
        );

        let mut skip_reason = None;
        if let Some(font) = find_font() {
            let plan = FilterPlan::build(
                &self.config,
                source_duration,
                Some(Caption {
                    font: &font,
                    title,
                }),
            );
            match self.run_ffmpeg(input, &plan).await {
                Ok(()) => {
                    info!("✅ Lofi render completed with caption");
                    return Ok(RenderedAsset {
                        path: self.config.output_path.clone(),
                        caption: CaptionOutcome::Applied,
                    });
                }
                Err(e) => {
                    // Font presence alone does not prove drawtext works;
                    // fall back to an uncaptioned render.
                    warn!("Captioned render failed, retrying without caption: {e}");
                    skip_reason = Some(format!("captioned render failed: {e}"));
                }
            }
        } else {
            warn!("No usable font found, rendering without caption");
            skip_reason = Some("no usable font found".to_string());
        }

        let plan = FilterPlan::build(&self.config, source_duration, None);
        self.run_ffmpeg(input, &plan).await?;
        info!("✅ Lofi render completed without caption");

        Ok(RenderedAsset {
            path: self.config.output_path.clone(),
            caption: CaptionOutcome::Skipped {
                reason: skip_reason.unwrap_or_else(|| "caption disabled".to_string()),
            },
        })
    }

    async fn run_ffmpeg(&self, input: &Path, plan: &FilterPlan) -> Result<(), PipelineError> {
        let args = self.build_ffmpeg_args(input, plan);
        debug!("ffmpeg {}", args.join(" "));

        let start = std::time::Instant::now();
        let output = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(PipelineError::Transform(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        if !self.config.output_path.exists() {
            return Err(PipelineError::Transform(
                "ffmpeg reported success but the output file is missing".to_string(),
            ));
        }

        info!("Render finished in {:.1}s", start.elapsed().as_secs_f64());
        Ok(())
    }

    fn build_ffmpeg_args(&self, input: &Path, plan: &FilterPlan) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            "warning".to_string(),
        ];
        if plan.extra_loops > 0 {
            args.push("-stream_loop".to_string());
            args.push(plan.extra_loops.to_string());
        }
        args.extend([
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vf".to_string(),
            plan.video_filter.clone(),
            "-af".to_string(),
            plan.audio_filter.clone(),
            "-t".to_string(),
            format!("{:.3}", plan.output_duration),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "28".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            self.config.output_path.to_string_lossy().to_string(),
        ]);
        args
    }
}

/// Read the container duration in seconds with ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64, PipelineError> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(PipelineError::Probe(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let info: serde_json::Value = serde_json::from_str(&String::from_utf8_lossy(&output.stdout))?;
    info["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .ok_or_else(|| PipelineError::Probe("ffprobe output has no duration".to_string()))
}

fn find_font() -> Option<PathBuf> {
    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn drawtext_filter(font: &Path, title: &str) -> String {
    let text = format!(
        "Now Playing\n{}\nLofi Remixed",
        sanitize_caption(&truncate_title(title))
    );
    format!(
        "drawtext=fontfile={}:text={}:fontsize=30:fontcolor=white:alpha=0.7:\
         x=(w-text_w)/2:y=h-text_h-40:line_spacing=12",
        font.display(),
        text
    )
}

/// Truncate the display title to the caption budget, char-boundary safe.
fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_CHARS {
        let short: String = title.chars().take(TITLE_CHARS).collect();
        format!("{short}...")
    } else {
        title.to_string()
    }
}

/// Strip characters the filtergraph parser treats specially.
///
/// Keeping the text free of `:,;'\[]=%` avoids the drawtext double-escape
/// dance entirely; anything else (including CJK) passes through.
fn sanitize_caption(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || "-_.!?&()".contains(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_loops_short_source() {
        // Styled clip lasts 60/0.85 ≈ 70.6s, three plays reach 180s
        assert_eq!(extra_loops(60.0, 0.85, 180.0), 2);
    }

    #[test]
    fn test_extra_loops_long_source() {
        assert_eq!(extra_loops(600.0, 0.85, 180.0), 0);
    }

    #[test]
    fn test_extra_loops_boundary() {
        // Styled duration exactly equal to target: one play, no loop
        assert_eq!(extra_loops(180.0, 1.0, 180.0), 0);
        // Source equal to target but slowed past it: still no loop
        assert_eq!(extra_loops(180.0, 0.85, 180.0), 0);
        // Exact integer multiple below target
        assert_eq!(extra_loops(60.0, 1.0, 180.0), 2);
    }

    #[test]
    fn test_extra_loops_degenerate_source() {
        assert_eq!(extra_loops(0.0, 0.85, 180.0), 0);
    }

    #[test]
    fn test_plan_speed_changes_no_selection_logic() {
        // Changing only the speed multiplier never alters trim semantics
        let mut config = Config::default();
        config.speed = 0.85;
        let slow = FilterPlan::build(&config, 600.0, None);
        config.speed = 1.0;
        let fast = FilterPlan::build(&config, 600.0, None);
        assert_eq!(slow.extra_loops, fast.extra_loops);
        assert_eq!(slow.output_duration, fast.output_duration);
    }

    #[test]
    fn test_plan_filters() {
        let config = Config::default();
        let plan = FilterPlan::build(&config, 600.0, None);

        assert!(plan.video_filter.contains("setpts=PTS/0.85"));
        assert!(plan.video_filter.contains("eq=saturation=0.8"));
        assert!(plan.video_filter.contains("scale=-2:min(720\\,ih)"));
        assert!(plan.video_filter.contains("fps=30"));
        assert!(!plan.video_filter.contains("drawtext"));

        assert!(plan.audio_filter.contains("asetrate=40800"));
        assert!(plan.audio_filter.contains("volume=0.8"));
        assert!(plan.audio_filter.contains("afade=t=out:st=177.000:d=3"));

        assert_eq!(plan.output_duration, 180.0);
        assert!(!plan.captioned);
    }

    #[test]
    fn test_plan_without_height_cap() {
        let mut config = Config::default();
        config.max_height = None;
        let plan = FilterPlan::build(&config, 600.0, None);
        assert!(!plan.video_filter.contains("scale="));
    }

    #[test]
    fn test_plan_with_caption() {
        let config = Config::default();
        let caption = Caption {
            font: Path::new("/tmp/font.ttf"),
            title: "Night Drive",
        };
        let plan = FilterPlan::build(&config, 600.0, Some(caption));
        assert!(plan.captioned);
        assert!(plan.video_filter.contains("drawtext=fontfile=/tmp/font.ttf"));
        assert!(plan.video_filter.contains("Night Drive"));
        assert!(plan.video_filter.contains("Lofi Remixed"));
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("short"), "short");
        let long = "a".repeat(45);
        let cut = truncate_title(&long);
        assert_eq!(cut.chars().count(), TITLE_CHARS + 3);
        assert!(cut.ends_with("..."));
        // Multibyte titles are cut on char boundaries
        let korean = "밤의 드라이브".repeat(10);
        assert!(truncate_title(&korean).ends_with("..."));
    }

    #[test]
    fn test_sanitize_caption() {
        assert_eq!(
            sanitize_caption("Mix: vol.2 [remaster], 50% 'best'"),
            "Mix vol.2 remaster 50 best"
        );
        assert_eq!(sanitize_caption("밤의 드라이브"), "밤의 드라이브");
        assert_eq!(sanitize_caption("plain title"), "plain title");
    }

    #[test]
    fn test_ffmpeg_args_with_and_without_loops() {
        let config = Config::default();
        let transformer = Transformer::new(config.clone());

        let looped = FilterPlan::build(&config, 60.0, None);
        let args = transformer.build_ffmpeg_args(Path::new("input_video.mp4"), &looped);
        let pos = args.iter().position(|a| a == "-stream_loop").unwrap();
        assert_eq!(args[pos + 1], "2");
        // Input repetition must be declared before -i
        assert!(pos < args.iter().position(|a| a == "-i").unwrap());

        let direct = FilterPlan::build(&config, 600.0, None);
        let args = transformer.build_ffmpeg_args(Path::new("input_video.mp4"), &direct);
        assert!(!args.contains(&"-stream_loop".to_string()));
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "180.000");
        assert!(args.contains(&"veryfast".to_string()));
        assert_eq!(args.last().unwrap(), "output_lofi.mp4");
    }
}
