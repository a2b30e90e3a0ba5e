//! Animated Export Pipeline
//!
//! Produces a palette-optimized GIF from a time window of a video with two
//! concurrent ffmpeg processes:
//!
//! - the palette generator renders the window down to a single PNG palette
//!   and writes it to stdout;
//! - the encoder reads the same window plus that palette (relayed into its
//!   stdin as it is produced) and writes the GIF to the destination.
//!
//! Both exit codes are checked. When one stage fails first the other is
//! killed, and the error names the earliest failing stage.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;

use super::filter_graph::{
    CropRect, FilterChain, FilterGraph, FrameRate, Pad, ScaleFlags, VideoFilter,
};
use crate::assets::VideoMetadata;
use crate::cancel::CancelToken;
use crate::error::{CoreError, CoreResult, ToolStage};
use crate::ffmpeg::{drain_stderr, FFmpegRunner};
use crate::fs::{tool_path_arg, validate_input_path, validate_output_path};

/// Default output width in pixels
pub const DEFAULT_EXPORT_WIDTH: u32 = 480;

/// Default output frame rate
pub const DEFAULT_EXPORT_FPS: u32 = 15;

const SOURCE: Pad = Pad::new("0:v");
const PALETTE: Pad = Pad::new("1:v");
const SCALED: Pad = Pad::new("v");

// =============================================================================
// Types
// =============================================================================

/// Export quality level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    #[default]
    Medium,
    Low,
}

/// Palette size and dithering strength for a quality level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityPreset {
    pub colors: u16,
    /// Bayer dither scale; higher values give a weaker pattern
    pub dither_scale: u8,
}

impl Quality {
    pub fn preset(self) -> QualityPreset {
        match self {
            Quality::High => QualityPreset {
                colors: 256,
                dither_scale: 5,
            },
            Quality::Medium => QualityPreset {
                colors: 128,
                dither_scale: 3,
            },
            Quality::Low => QualityPreset {
                colors: 64,
                dither_scale: 1,
            },
        }
    }
}

/// Caller-supplied export request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    pub input_path: PathBuf,
    /// Window start in seconds
    pub start_time: f64,
    /// Window end in seconds, must be after `start_time`
    pub end_time: f64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub crop: Option<CropRect>,
}

fn default_width() -> u32 {
    DEFAULT_EXPORT_WIDTH
}

fn default_fps() -> u32 {
    DEFAULT_EXPORT_FPS
}

impl ExportOptions {
    /// Options for `[start_time, end_time)` of `input_path` with default width, fps and quality
    pub fn new(input_path: impl Into<PathBuf>, start_time: f64, end_time: f64) -> Self {
        Self {
            input_path: input_path.into(),
            start_time,
            end_time,
            width: DEFAULT_EXPORT_WIDTH,
            fps: DEFAULT_EXPORT_FPS,
            quality: Quality::default(),
            crop: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Check option values that need no knowledge of the source
    pub fn validate(&self) -> CoreResult<()> {
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(CoreError::Validation(format!(
                "start time must be a non-negative number of seconds, got {}",
                self.start_time
            )));
        }
        if !self.end_time.is_finite() {
            return Err(CoreError::Validation(format!(
                "end time must be a finite number of seconds, got {}",
                self.end_time
            )));
        }
        if self.duration() <= 0.0 {
            return Err(CoreError::Validation(format!(
                "end time ({}) must be after start time ({})",
                self.end_time, self.start_time
            )));
        }
        // Times are passed to ffmpeg with millisecond precision.
        if (self.duration() * 1000.0).round() < 1.0 {
            return Err(CoreError::Validation(format!(
                "export window must be at least 1 ms long, got {}s",
                self.duration()
            )));
        }
        if self.width == 0 {
            return Err(CoreError::Validation("width must be positive".to_string()));
        }
        if self.fps == 0 {
            return Err(CoreError::Validation("fps must be positive".to_string()));
        }
        if let Some(crop) = &self.crop {
            if crop.width == 0 || crop.height == 0 {
                return Err(CoreError::Validation(format!(
                    "crop rectangle must have a positive size, got {}x{}",
                    crop.width, crop.height
                )));
            }
        }
        Ok(())
    }

    /// Check the crop rectangle lies within the probed source frame
    pub fn check_crop_within(&self, metadata: &VideoMetadata) -> CoreResult<()> {
        let Some(crop) = &self.crop else {
            return Ok(());
        };

        let right = u64::from(crop.x) + u64::from(crop.width);
        let bottom = u64::from(crop.y) + u64::from(crop.height);
        if right > u64::from(metadata.width) || bottom > u64::from(metadata.height) {
            return Err(CoreError::Validation(format!(
                "crop {}x{}+{}+{} exceeds source frame {}x{}",
                crop.width, crop.height, crop.x, crop.y, metadata.width, metadata.height
            )));
        }
        Ok(())
    }
}

/// Suggested file name for a save-location chooser
pub fn default_export_file_name() -> String {
    format!("export-{}.gif", chrono::Utc::now().timestamp_millis())
}

/// Progress of the two-process pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    GeneratingPalette,
    Encoding,
    Done,
    Failed(ToolStage),
}

impl ExportState {
    pub fn palette_exited(self, success: bool) -> Self {
        match self {
            ExportState::GeneratingPalette if success => ExportState::Encoding,
            ExportState::GeneratingPalette => ExportState::Failed(ToolStage::PaletteGeneration),
            other => other,
        }
    }

    pub fn encoder_exited(self, success: bool) -> Self {
        match self {
            ExportState::Encoding if success => ExportState::Done,
            ExportState::GeneratingPalette | ExportState::Encoding if !success => {
                ExportState::Failed(ToolStage::FinalEncode)
            }
            other => other,
        }
    }
}

// =============================================================================
// Export Plan
// =============================================================================

/// Fully composed arguments for both ffmpeg processes
#[derive(Clone, Debug)]
pub struct ExportPlan {
    input: PathBuf,
    destination: PathBuf,
    start: String,
    duration: String,
    palette_chain: FilterChain,
    encode_graph: FilterGraph,
}

impl ExportPlan {
    /// Validate `options` and build both filter graphs
    pub fn new(options: &ExportOptions, destination: &Path) -> CoreResult<Self> {
        options.validate()?;
        let preset = options.quality.preset();

        let palette_chain = scaled_chain(options).with(VideoFilter::PaletteGen {
            max_colors: preset.colors,
            reserve_transparent: false,
        });

        let encode_graph = FilterGraph::new()
            .chain(&[SOURCE], scaled_chain(options), &[SCALED])
            .chain(
                &[SCALED, PALETTE],
                FilterChain::new().with(VideoFilter::PaletteUse {
                    bayer_scale: preset.dither_scale,
                }),
                &[],
            );

        Ok(Self {
            input: options.input_path.clone(),
            destination: destination.to_path_buf(),
            start: format_seconds(options.start_time),
            duration: format_seconds(options.duration()),
            palette_chain,
            encode_graph,
        })
    }

    pub fn palette_filter(&self) -> String {
        self.palette_chain.to_string()
    }

    pub fn encode_filter(&self) -> String {
        self.encode_graph.to_string()
    }

    fn windowed_input_args(&self) -> Vec<OsString> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-ss".into(),
            self.start.clone().into(),
            "-t".into(),
            self.duration.clone().into(),
            "-i".into(),
            tool_path_arg(&self.input),
        ]
    }

    /// Palette generator: windowed input -> PNG palette on stdout
    pub fn palette_args(&self) -> Vec<OsString> {
        let mut args = self.windowed_input_args();
        args.extend([
            "-vf".into(),
            self.palette_filter().into(),
            "-f".into(),
            "image2pipe".into(),
            "-vcodec".into(),
            "png".into(),
            "-".into(),
        ]);
        args
    }

    /// Encoder: windowed input + palette on stdin -> GIF at the destination
    pub fn encode_args(&self) -> Vec<OsString> {
        let mut args = self.windowed_input_args();
        args.extend([
            "-i".into(),
            "-".into(),
            "-filter_complex".into(),
            self.encode_filter().into(),
            "-f".into(),
            "gif".into(),
            tool_path_arg(&self.destination),
        ]);
        args
    }
}

/// fps, optional crop, then a lanczos scale to the target width
fn scaled_chain(options: &ExportOptions) -> FilterChain {
    FilterChain::new()
        .with(VideoFilter::Fps(FrameRate::PerSecond(options.fps)))
        .with_optional(options.crop.map(VideoFilter::Crop))
        .with(VideoFilter::Scale {
            width: options.width,
            flags: ScaleFlags::Lanczos,
        })
}

fn format_seconds(secs: f64) -> String {
    format!("{:.3}", secs)
}

// =============================================================================
// Export Engine
// =============================================================================

/// Exit statuses collected while supervising both processes
struct Supervision {
    palette: ExitStatus,
    encoder: ExitStatus,
    /// A kill was sent to the palette generator after the encoder failed
    palette_kill_sent: bool,
}

impl Supervision {
    /// The palette generator died from the kill sent on the encoder's behalf,
    /// rather than exiting on its own. Only unix reports death by signal;
    /// elsewhere a sent kill is taken at its word.
    fn palette_killed(&self) -> bool {
        self.palette_kill_sent && (!cfg!(unix) || self.palette.code().is_none())
    }

    fn final_state(&self) -> ExportState {
        ExportState::GeneratingPalette
            .palette_exited(self.palette.success() || self.palette_killed())
            .encoder_exited(self.encoder.success())
    }

    fn status_of(&self, stage: ToolStage) -> Option<i32> {
        match stage {
            ToolStage::PaletteGeneration => self.palette.code(),
            _ => self.encoder.code(),
        }
    }
}

/// Export engine for rendering a video window to an animated GIF
#[derive(Clone, Debug)]
pub struct ExportEngine {
    ffmpeg: FFmpegRunner,
}

impl ExportEngine {
    pub fn new(ffmpeg: FFmpegRunner) -> Self {
        Self { ffmpeg }
    }

    /// Export `options` to `destination`, returning the written path.
    ///
    /// Options are validated before anything is spawned.
    pub async fn export_animated_image(
        &self,
        options: &ExportOptions,
        destination: &Path,
        cancel: &CancelToken,
    ) -> CoreResult<PathBuf> {
        let plan = ExportPlan::new(options, destination)?;
        validate_input_path(&options.input_path)?;
        let destination = validate_output_path(destination)?;

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let previous_output = OutputSnapshot::take(&destination).await;
        let started = Instant::now();
        tracing::info!(
            "Exporting {} [{:.3}s..{:.3}s] at {}px/{}fps ({:?}) -> {}",
            options.input_path.display(),
            options.start_time,
            options.end_time,
            options.width,
            options.fps,
            options.quality,
            destination.display()
        );

        let result = self.run_pipeline(&plan, cancel).await;
        match result {
            Ok(()) => {
                let file_size = tokio::fs::metadata(&destination)
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0);
                if file_size == 0 {
                    remove_partial_output(&destination).await;
                    return Err(CoreError::Export {
                        stage: ToolStage::FinalEncode,
                        status: Some(0),
                        diagnostics: "encoder exited successfully but wrote no data".to_string(),
                    });
                }
                tracing::info!(
                    "Export finished in {:.2}s: {} ({} bytes)",
                    started.elapsed().as_secs_f64(),
                    destination.display(),
                    file_size
                );
                Ok(destination)
            }
            Err(err) => {
                if OutputSnapshot::take(&destination).await != previous_output {
                    remove_partial_output(&destination).await;
                } else if previous_output.is_some() {
                    tracing::debug!(
                        "Leaving untouched existing file {}",
                        destination.display()
                    );
                }
                tracing::warn!("Export of {} failed: {}", options.input_path.display(), err);
                Err(err)
            }
        }
    }

    async fn run_pipeline(&self, plan: &ExportPlan, cancel: &CancelToken) -> CoreResult<()> {
        let palette_args = plan.palette_args();
        let encode_args = plan.encode_args();
        tracing::debug!("Palette generator args: {:?}", palette_args);
        tracing::debug!("Encoder args: {:?}", encode_args);

        let mut palette_cmd = self.ffmpeg.ffmpeg_command();
        palette_cmd
            .args(&palette_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut encoder_cmd = self.ffmpeg.ffmpeg_command();
        encoder_cmd
            .args(&encode_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut palette = palette_cmd.spawn().map_err(|source| CoreError::Spawn {
            stage: ToolStage::PaletteGeneration,
            source,
        })?;

        let mut encoder = match encoder_cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let _ = palette.kill().await;
                return Err(CoreError::Spawn {
                    stage: ToolStage::FinalEncode,
                    source,
                });
            }
        };

        // Drain stderr concurrently; a full pipe would otherwise stall either process.
        let palette_stderr = drain_stderr(palette.stderr.take());
        let encoder_stderr = drain_stderr(encoder.stderr.take());
        let relay = relay_palette(palette.stdout.take(), encoder.stdin.take());

        let supervised = tokio::select! {
            outcome = supervise(&mut palette, &mut encoder) => outcome,
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
        };

        if supervised.is_err() {
            let _ = palette.start_kill();
            let _ = encoder.start_kill();
            let _ = palette.wait().await;
            let _ = encoder.wait().await;
        }

        let diagnostics = join_diagnostics(
            palette_stderr.await.unwrap_or_default(),
            encoder_stderr.await.unwrap_or_default(),
        );
        match relay.await {
            Ok(Ok(bytes)) => tracing::debug!("Relayed {} palette bytes to encoder", bytes),
            Ok(Err(e)) => tracing::debug!("Palette relay ended early: {}", e),
            Err(e) => tracing::debug!("Palette relay task failed: {}", e),
        }

        let supervision = supervised?;
        match supervision.final_state() {
            ExportState::Done => Ok(()),
            ExportState::Failed(stage) => Err(CoreError::Export {
                stage,
                status: supervision.status_of(stage),
                diagnostics,
            }),
            state => Err(CoreError::Export {
                stage: ToolStage::FinalEncode,
                status: supervision.encoder.code(),
                diagnostics: format!("pipeline stopped in state {:?}: {}", state, diagnostics),
            }),
        }
    }
}

/// Wait for both processes. On the first failure, kill the counterpart.
///
/// The palette generator is polled first, so when both have already exited
/// its status is seen before the encoder's.
async fn supervise(palette: &mut Child, encoder: &mut Child) -> CoreResult<Supervision> {
    let mut palette_status: Option<ExitStatus> = None;
    let mut encoder_status: Option<ExitStatus> = None;
    let mut palette_kill_sent = false;

    loop {
        if let (Some(palette), Some(encoder)) = (palette_status, encoder_status) {
            return Ok(Supervision {
                palette,
                encoder,
                palette_kill_sent,
            });
        }

        tokio::select! {
            biased;

            status = palette.wait(), if palette_status.is_none() => {
                let status = status?;
                tracing::debug!("Palette generator exited: {}", status);
                if !status.success() && encoder_status.is_none() {
                    tracing::warn!("Palette generation failed; stopping encoder");
                    let _ = encoder.start_kill();
                }
                palette_status = Some(status);
            }
            status = encoder.wait(), if encoder_status.is_none() => {
                let status = status?;
                tracing::debug!("Encoder exited: {}", status);
                if !status.success() && palette_status.is_none() {
                    // A generator that already failed on its own keeps the blame.
                    match palette.try_wait()? {
                        Some(exited) => {
                            tracing::debug!("Palette generator had already exited: {}", exited);
                            palette_status = Some(exited);
                        }
                        None => {
                            tracing::warn!("Encoding failed; stopping palette generator");
                            let _ = palette.start_kill();
                            palette_kill_sent = true;
                        }
                    }
                }
                encoder_status = Some(status);
            }
        }
    }
}

/// Copy the palette PNG from the generator's stdout into the encoder's stdin,
/// closing stdin at EOF so the encoder sees the end of its second input.
fn relay_palette(
    stdout: Option<ChildStdout>,
    stdin: Option<ChildStdin>,
) -> JoinHandle<std::io::Result<u64>> {
    tokio::spawn(async move {
        let (Some(mut from), Some(mut to)) = (stdout, stdin) else {
            return Ok(0);
        };
        let copied = tokio::io::copy(&mut from, &mut to).await?;
        to.shutdown().await?;
        Ok(copied)
    })
}

fn join_diagnostics(palette: String, encoder: String) -> String {
    match (palette.trim().is_empty(), encoder.trim().is_empty()) {
        (true, _) => encoder,
        (_, true) => palette,
        _ => format!("{}\n{}", palette.trim_end(), encoder),
    }
}

/// Size and modification time of the destination, `None` when absent
#[derive(Debug, PartialEq, Eq)]
struct OutputSnapshot {
    len: u64,
    modified: Option<SystemTime>,
}

impl OutputSnapshot {
    async fn take(path: &Path) -> Option<Self> {
        let meta = tokio::fs::metadata(path).await.ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

async fn remove_partial_output(destination: &Path) {
    match tokio::fs::remove_file(destination).await {
        Ok(()) => tracing::debug!("Removed incomplete output {}", destination.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            "Failed to remove incomplete output {}: {}",
            destination.display(),
            e
        ),
    }
}

// =============================================================================
// Tests
// =============================================================================
