//! Thumbnail Sampler
//!
//! Extracts one keyframe every N seconds into a Temp Workspace with a single
//! ffmpeg run, then reads the numbered JPEG sequence back as data URLs.
//! Tool failures are not errors here: whatever frames were written (possibly
//! none) are returned.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::{EngineConfig, DEFAULT_THUMBNAIL_WIDTH, DEFAULT_WORKSPACE_PREFIX};
use crate::error::{CoreError, CoreResult, ToolStage};
use crate::ffmpeg::FFmpegRunner;
use crate::fs::{tool_path_arg, TempWorkspace};
use crate::render::{FilterChain, FrameRate, ScaleFlags, VideoFilter};

const FRAME_PATTERN: &str = "thumb-%06d.jpg";
const FRAME_EXTENSION: &str = "jpg";
const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Chronologically ordered thumbnails, each a `data:image/jpeg;base64,...` URL
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThumbnailSet {
    frames: Vec<String>,
}

impl ThumbnailSet {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FromIterator<String> for ThumbnailSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ThumbnailSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

/// Sampling interval actually used: floored, never below one second
pub fn safe_interval(interval_secs: f64) -> u32 {
    if !interval_secs.is_finite() || interval_secs < 1.0 {
        return 1;
    }
    // `as` saturates for values beyond u32::MAX
    interval_secs.floor() as u32
}

/// Build the extraction argument list writing into `out_dir`
pub fn build_extraction_args(input: &Path, out_dir: &Path, interval: u32, width: u32) -> Vec<OsString> {
    let filter = FilterChain::new()
        .with(VideoFilter::Fps(FrameRate::OneEvery(interval.max(1))))
        .with(VideoFilter::Scale {
            width,
            flags: ScaleFlags::FastBilinear,
        });

    let mut args: Vec<OsString> = [
        "-y",
        "-skip_frame",
        "nokey",
        "-hwaccel",
        "auto",
        "-nostdin",
        "-hide_banner",
        "-loglevel",
        "error",
        "-threads",
        "0",
        "-an",
        "-i",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(tool_path_arg(input));
    args.extend(
        ["-map", "0:v:0", "-vsync", "passthrough", "-vf"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(filter.to_string().into());
    args.extend(["-q:v", "31"].into_iter().map(OsString::from));
    args.push(out_dir.join(FRAME_PATTERN).into_os_string());
    args
}

/// Samples thumbnails through a fresh Temp Workspace per call
#[derive(Clone, Debug)]
pub struct ThumbnailSampler {
    ffmpeg: FFmpegRunner,
    width: u32,
    temp_root: PathBuf,
    prefix: String,
}

impl ThumbnailSampler {
    pub fn new(ffmpeg: FFmpegRunner, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg,
            width: DEFAULT_THUMBNAIL_WIDTH,
            temp_root: temp_root.into(),
            prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),
        }
    }

    pub fn from_config(ffmpeg: FFmpegRunner, config: &EngineConfig) -> Self {
        Self {
            ffmpeg,
            width: config.thumbnail_width.max(1),
            temp_root: config.temp_root(),
            prefix: config.workspace_prefix.clone(),
        }
    }

    /// Sample one thumbnail every `interval_secs` of `path`.
    ///
    /// Only workspace creation and cancellation are reported as errors.
    pub async fn sample(
        &self,
        path: &Path,
        duration_secs: f64,
        interval_secs: f64,
        cancel: &CancelToken,
    ) -> CoreResult<ThumbnailSet> {
        let interval = safe_interval(interval_secs);
        let workspace = TempWorkspace::acquire(&self.temp_root, &self.prefix)?;

        let result = self
            .extract_and_collect(&workspace, path, duration_secs, interval, cancel)
            .await;

        if let Err(e) = workspace.release() {
            tracing::warn!("Failed to release thumbnail workspace: {}", e);
        }
        result
    }

    async fn extract_and_collect(
        &self,
        workspace: &TempWorkspace,
        path: &Path,
        duration_secs: f64,
        interval: u32,
        cancel: &CancelToken,
    ) -> CoreResult<ThumbnailSet> {
        let args = build_extraction_args(path, workspace.path(), interval, self.width);
        tracing::debug!("Thumbnail extraction args: {:?}", args);

        let mut cmd = self.ffmpeg.ffmpeg_command();
        cmd.args(&args);

        match self
            .ffmpeg
            .run(cmd, ToolStage::ThumbnailExtraction, cancel)
            .await
            .and_then(|output| output.into_success(ToolStage::ThumbnailExtraction))
        {
            Ok(_) => {}
            Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
            Err(e) => tracing::warn!(
                "Thumbnail extraction for {} failed, keeping frames written so far: {}",
                path.display(),
                e
            ),
        }

        let expected = if duration_secs.is_finite() && duration_secs > 0.0 {
            (duration_secs / f64::from(interval)).ceil() as usize
        } else {
            0
        };
        let thumbnails = collect_frames(workspace.path(), expected).await;

        tracing::info!(
            "Sampled {} thumbnails from {} (every {}s, ~{} expected)",
            thumbnails.len(),
            path.display(),
            interval,
            expected
        );
        Ok(thumbnails)
    }
}

/// Read every `.jpg` in `dir` in file-name order. Unreadable files are skipped.
async fn collect_frames(dir: &Path, capacity_hint: usize) -> ThumbnailSet {
    let mut names = match list_frames(dir).await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!("Failed to list thumbnail directory {}: {}", dir.display(), e);
            return ThumbnailSet::default();
        }
    };
    names.sort();

    let mut frames = Vec::with_capacity(capacity_hint.min(names.len()));
    for file in names {
        match tokio::fs::read(&file).await {
            Ok(bytes) => frames.push(to_data_url(&bytes)),
            Err(e) => tracing::warn!("Skipping unreadable thumbnail {}: {}", file.display(), e),
        }
    }
    ThumbnailSet { frames }
}

async fn list_frames(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut frames = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(FRAME_EXTENSION))
            .unwrap_or(false);
        if is_frame {
            frames.push(path);
        }
    }
    Ok(frames)
}

fn to_data_url(bytes: &[u8]) -> String {
    format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(bytes))
}
