//! Media Service
//!
//! Single entry point a UI bridge talks to. Holds the resolved tools and
//! configuration; each call is independent and may run concurrently with
//! any other.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assets::{MetadataProbe, ThumbnailSampler, ThumbnailSet, VideoMetadata};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::ffmpeg::{FFmpegInfo, FFmpegRunner};
use crate::render::{ExportEngine, ExportOptions};

/// Result of the combined probe + thumbnail request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFile {
    pub video_data: VideoMetadata,
    pub thumbnails: ThumbnailSet,
}

/// Export outcome as reported to a UI
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn succeeded(output_path: PathBuf) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            error: None,
        }
    }

    pub fn failed(error: &CoreError) -> Self {
        Self {
            success: false,
            output_path: None,
            error: Some(error.to_string()),
        }
    }
}

impl From<CoreResult<PathBuf>> for ExportResponse {
    fn from(result: CoreResult<PathBuf>) -> Self {
        match result {
            Ok(path) => Self::succeeded(path),
            Err(e) => Self::failed(&e),
        }
    }
}

/// Facade over the probe, sampler and export engine
#[derive(Clone, Debug)]
pub struct MediaService {
    config: EngineConfig,
    probe: MetadataProbe,
    sampler: ThumbnailSampler,
    exporter: ExportEngine,
}

impl MediaService {
    /// Resolve the tools named by `config` (or detect them) and build the service
    pub fn new(config: EngineConfig) -> CoreResult<Self> {
        let info = FFmpegInfo::resolve(&config)?;
        Ok(Self::with_runner(config, FFmpegRunner::new(info)))
    }

    /// Build the service around already located tools
    pub fn with_runner(config: EngineConfig, ffmpeg: FFmpegRunner) -> Self {
        Self {
            probe: MetadataProbe::new(ffmpeg.clone()),
            sampler: ThumbnailSampler::from_config(ffmpeg.clone(), &config),
            exporter: ExportEngine::new(ffmpeg),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn probe(&self, path: &Path, cancel: &CancelToken) -> CoreResult<VideoMetadata> {
        self.probe.probe(path, cancel).await
    }

    /// Sample thumbnails; `interval_secs` of `None` uses the configured default
    pub async fn sample_thumbnails(
        &self,
        path: &Path,
        duration_secs: f64,
        interval_secs: Option<f64>,
        cancel: &CancelToken,
    ) -> CoreResult<ThumbnailSet> {
        let interval = interval_secs.unwrap_or(self.config.default_thumbnail_interval);
        self.sampler
            .sample(path, duration_secs, interval, cancel)
            .await
    }

    pub async fn export_animated_image(
        &self,
        options: &ExportOptions,
        destination: &Path,
        cancel: &CancelToken,
    ) -> CoreResult<PathBuf> {
        self.exporter
            .export_animated_image(options, destination, cancel)
            .await
    }

    /// Probe `path`, then sample thumbnails across its probed duration
    pub async fn process_file(&self, path: &Path, cancel: &CancelToken) -> CoreResult<ProcessedFile> {
        let video_data = self.probe(path, cancel).await?;
        let thumbnails = self
            .sample_thumbnails(path, video_data.duration, None, cancel)
            .await?;
        Ok(ProcessedFile {
            video_data,
            thumbnails,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolStage;

    fn missing_tools_service(temp_root: &Path) -> MediaService {
        let config = EngineConfig {
            temp_root: Some(temp_root.to_path_buf()),
            ..EngineConfig::default()
        };
        MediaService::with_runner(
            config,
            FFmpegRunner::new(FFmpegInfo::from_paths(
                "/nonexistent/gifsmith/ffmpeg",
                "/nonexistent/gifsmith/ffprobe",
            )),
        )
    }

    #[test]
    fn test_new_with_bogus_explicit_tool_fails() {
        let config = EngineConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/gifsmith/ffmpeg")),
            ffprobe_path: Some(PathBuf::from("/nonexistent/gifsmith/ffprobe")),
            ..EngineConfig::default()
        };
        assert!(MediaService::new(config).is_err());
    }

    #[test]
    fn test_export_response_shapes() {
        let ok = ExportResponse::succeeded(PathBuf::from("/out/export-1.gif"));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"success": true, "outputPath": "/out/export-1.gif"})
        );

        let failed = ExportResponse::from(Err::<PathBuf, _>(CoreError::Validation(
            "end time must be after start time".to_string(),
        )));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("outputPath").is_none());
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains("end time must be after start time"));
    }

    #[test]
    fn test_processed_file_wire_shape() {
        let processed = ProcessedFile {
            video_data: VideoMetadata {
                file_path: PathBuf::from("/videos/in.mp4"),
                width: 1920,
                height: 1080,
                aspect_ratio: "16:9".to_string(),
                frame_rate: 30.0,
                duration: 12.5,
            },
            thumbnails: ThumbnailSet::default(),
        };
        let json = serde_json::to_value(&processed).unwrap();
        assert_eq!(json["videoData"]["aspectRatio"], "16:9");
        assert_eq!(json["videoData"]["frameRate"], 30.0);
        assert_eq!(json["thumbnails"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_probe_missing_file_is_file_not_found() {
        let root = tempfile::tempdir().unwrap();
        let service = missing_tools_service(root.path());
        let err = service
            .probe(Path::new("/nonexistent/in.mp4"), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_probe_spawn_failure_is_tagged_probe() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("in.mp4");
        std::fs::write(&input, b"stub").unwrap();
        let service = missing_tools_service(root.path());

        let err = service
            .process_file(&input, &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(ToolStage::Probe));
    }

    #[tokio::test]
    async fn test_sample_thumbnails_degrades_to_empty() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("scratch");
        let service = missing_tools_service(&scratch);

        let set = service
            .sample_thumbnails(Path::new("/nonexistent/in.mp4"), 30.0, None, &CancelToken::new())
            .await
            .unwrap();
        assert!(set.is_empty());
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }
}
