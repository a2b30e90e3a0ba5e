//! FFprobe Metadata Extraction Module
//!
//! Inspects the first video stream of a file and normalizes it into
//! [`VideoMetadata`]: rotation-corrected dimensions, a finite frame rate and
//! a duration in seconds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::{CoreError, CoreResult, ToolStage};
use crate::ffmpeg::FFmpegRunner;
use crate::fs::{tool_path_arg, validate_input_path};

/// Frame rate reported when the stream's rate cannot be parsed
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

// =============================================================================
// Types
// =============================================================================

/// Normalized metadata of a video file's first video stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub file_path: PathBuf,
    /// Display width, already swapped for 90/270 degree rotation
    pub width: u32,
    /// Display height, already swapped for 90/270 degree rotation
    pub height: u32,
    /// Display aspect ratio as reported by the tool, e.g. "16:9"
    pub aspect_ratio: String,
    pub frame_rate: f64,
    /// Duration in seconds
    pub duration: f64,
}

// =============================================================================
// FFprobe JSON Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    #[serde(default)]
    streams: Vec<RawStreamDescriptor>,
}

/// Raw ffprobe description of one video stream, consumed once by the probe
#[derive(Debug, Default, Deserialize)]
pub struct RawStreamDescriptor {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub display_aspect_ratio: Option<String>,
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub duration: Option<String>,
    pub duration_ts: Option<u64>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub side_data_list: Vec<SideData>,
}

/// Entry of ffprobe's `side_data_list`; only display-matrix rotation is read
#[derive(Debug, Default, Deserialize)]
pub struct SideData {
    pub rotation: Option<f64>,
}

impl RawStreamDescriptor {
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

// =============================================================================
// Metadata Probe
// =============================================================================

/// Runs ffprobe against a single file
#[derive(Clone, Debug)]
pub struct MetadataProbe {
    ffmpeg: FFmpegRunner,
}

impl MetadataProbe {
    pub fn new(ffmpeg: FFmpegRunner) -> Self {
        Self { ffmpeg }
    }

    /// Probe the first video stream of `path`.
    pub async fn probe(&self, path: &Path, cancel: &CancelToken) -> CoreResult<VideoMetadata> {
        let path = validate_input_path(path)?;

        let mut cmd = self.ffmpeg.ffprobe_command();
        cmd.args([
            "-v",
            "error",
            "-hide_banner",
            "-of",
            "default=noprint_wrappers=0",
            "-print_format",
            "json",
            "-select_streams",
            "v:0",
            "-show_streams",
        ])
        .arg(tool_path_arg(&path));

        let output = self
            .ffmpeg
            .run(cmd, ToolStage::Probe, cancel)
            .await?
            .into_success(ToolStage::Probe)?;

        let json_str = String::from_utf8_lossy(&output.stdout);
        let metadata = parse_probe_output(&json_str, &path)?;

        tracing::info!(
            "Probed {}: {}x{} @ {:.3} fps, {:.3}s",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.frame_rate,
            metadata.duration
        );
        Ok(metadata)
    }
}

/// Parse ffprobe JSON output into VideoMetadata
pub fn parse_probe_output(json: &str, path: &Path) -> CoreResult<VideoMetadata> {
    let output: FFprobeOutput = serde_json::from_str(json)
        .map_err(|e| CoreError::Parse(format!("Failed to parse ffprobe output: {}", e)))?;

    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::NoVideoStream(path.to_path_buf()))?;

    normalize_stream(stream, path)
}

fn normalize_stream(stream: RawStreamDescriptor, path: &Path) -> CoreResult<VideoMetadata> {
    let (raw_width, raw_height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(CoreError::Parse(
                "video stream has no usable width/height".to_string(),
            ))
        }
    };

    let rotation = rotation_degrees(&stream);
    let (width, height) = if matches!(rotation, Some(90) | Some(270)) {
        (raw_height, raw_width)
    } else {
        (raw_width, raw_height)
    };

    let frame_rate = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(DEFAULT_FRAME_RATE);

    let duration = parse_stream_duration(&stream).unwrap_or_else(|| {
        tracing::warn!("No usable duration for {}; reporting 0", path.display());
        0.0
    });

    let aspect_ratio = stream
        .display_aspect_ratio
        .clone()
        .unwrap_or_else(|| reduced_ratio(raw_width, raw_height));

    Ok(VideoMetadata {
        file_path: path.to_path_buf(),
        width,
        height,
        aspect_ratio,
        frame_rate,
        duration,
    })
}

/// Rotation in degrees normalized to 0..360, from the `rotate` tag or,
/// failing that, the display matrix side data.
fn rotation_degrees(stream: &RawStreamDescriptor) -> Option<i64> {
    let raw = match stream.tag("rotate") {
        Some(tag) => tag.trim().parse::<f64>().ok(),
        None => stream.side_data_list.iter().find_map(|sd| sd.rotation),
    }?;

    if !raw.is_finite() {
        return None;
    }
    Some((raw.round() as i64).rem_euclid(360))
}

/// Parse frame rate string (e.g., "30/1" or "30000/1001").
///
/// Returns `None` unless it splits into at least two numeric parts giving a
/// finite positive rate.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let mut parts = rate.split('/');
    let num: f64 = parts.next()?.trim().parse().ok()?;
    let den: f64 = parts.next()?.trim().parse().ok()?;
    let fps = num / den;
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

fn parse_stream_duration(stream: &RawStreamDescriptor) -> Option<f64> {
    let direct = stream
        .duration
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite());

    direct
        .or_else(|| stream.tag("DURATION").and_then(parse_hms_duration))
        .map(|d| d.max(0.0))
}

/// Parse "H:MM:SS[.frac]" (also "MM:SS" and "SS") into seconds
pub fn parse_hms_duration(hms: &str) -> Option<f64> {
    let trimmed = hms.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut total = 0.0;
    for part in trimmed.split(':') {
        let value: f64 = part.trim().parse().ok()?;
        total = total * 60.0 + value;
    }
    total.is_finite().then_some(total)
}

fn reduced_ratio(width: u32, height: u32) -> String {
    fn gcd(a: u32, b: u32) -> u32 {
        if b == 0 {
            a
        } else {
            gcd(b, a % b)
        }
    }
    let divisor = gcd(width, height).max(1);
    format!("{}:{}", width / divisor, height / divisor)
}

// =============================================================================
// Tests
// =============================================================================
