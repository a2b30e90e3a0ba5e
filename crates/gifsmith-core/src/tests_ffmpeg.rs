//! End-to-end tests against a real ffmpeg install.
//!
//! Each test returns early when ffmpeg/ffprobe cannot be found.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::render::CropRect;
use crate::{
    detect_system_ffmpeg, CancelToken, CoreError, EngineConfig, ExportOptions, FFmpegInfo,
    MediaService, Quality,
};

fn installed_ffmpeg() -> Option<FFmpegInfo> {
    match detect_system_ffmpeg() {
        Ok(info) => Some(info),
        Err(e) => {
            eprintln!("skipping: ffmpeg not available ({})", e);
            None
        }
    }
}

fn service(info: FFmpegInfo, temp_root: &Path) -> MediaService {
    let config = EngineConfig {
        ffmpeg_path: Some(info.ffmpeg_path),
        ffprobe_path: Some(info.ffprobe_path),
        temp_root: Some(temp_root.to_path_buf()),
        ..EngineConfig::default()
    };
    MediaService::new(config).unwrap()
}

/// Render a 320x240, 25 fps test pattern of `secs` seconds
fn make_source(ffmpeg: &Path, dir: &Path, secs: u32) -> PathBuf {
    let out = dir.join("source.mp4");
    let status = Command::new(ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=duration={}:size=320x240:rate=25", secs))
        .args(["-pix_fmt", "yuv420p", "-g", "25"])
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());
    out
}

#[tokio::test]
async fn test_probe_reports_dimensions_and_duration() {
    let Some(info) = installed_ffmpeg() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let source = make_source(&info.ffmpeg_path, dir.path(), 3);
    let service = service(info, &dir.path().join("tmp"));

    let meta = service.probe(&source, &CancelToken::new()).await.unwrap();
    assert_eq!((meta.width, meta.height), (320, 240));
    assert!((meta.frame_rate - 25.0).abs() < 0.01);
    assert!((meta.duration - 3.0).abs() < 0.5);
}

#[tokio::test]
async fn test_probe_non_video_is_an_error() {
    let Some(info) = installed_ffmpeg() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("notes.txt");
    std::fs::write(&bogus, "not a video").unwrap();
    let service = service(info, &dir.path().join("tmp"));

    let err = service.probe(&bogus, &CancelToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Process { .. } | CoreError::NoVideoStream(_) | CoreError::Parse(_)
    ));
}

#[tokio::test]
async fn test_sampling_real_video_returns_jpegs_and_cleans_up() {
    let Some(info) = installed_ffmpeg() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let source = make_source(&info.ffmpeg_path, dir.path(), 4);
    let temp_root = dir.path().join("tmp");
    let service = service(info, &temp_root);

    let thumbnails = service
        .sample_thumbnails(&source, 4.0, Some(1.0), &CancelToken::new())
        .await
        .unwrap();
    assert!(!thumbnails.is_empty());
    assert!(thumbnails
        .into_iter()
        .all(|t| t.starts_with("data:image/jpeg;base64,")));
    assert_eq!(std::fs::read_dir(&temp_root).unwrap().count(), 0);
}

#[tokio::test]
async fn test_export_writes_nonempty_gif() {
    let Some(info) = installed_ffmpeg() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let source = make_source(&info.ffmpeg_path, dir.path(), 3);
    let service = service(info, &dir.path().join("tmp"));
    let dest = dir.path().join("out").join("clip.gif");

    let mut options = ExportOptions::new(&source, 0.5, 2.0);
    options.width = 160;
    options.fps = 10;
    options.quality = Quality::Low;
    options.crop = Some(CropRect {
        x: 40,
        y: 20,
        width: 200,
        height: 160,
    });

    let written = service
        .export_animated_image(&options, &dest, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(written, dest);
    let bytes = std::fs::read(&dest).unwrap();
    assert!(bytes.len() > 6);
    assert_eq!(&bytes[..3], b"GIF");
}

#[tokio::test]
async fn test_export_of_undecodable_input_reports_diagnostics() {
    let Some(info) = installed_ffmpeg() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("broken.mp4");
    std::fs::write(&bogus, b"definitely not mp4").unwrap();
    let service = service(info, &dir.path().join("tmp"));
    let dest = dir.path().join("broken.gif");

    let err = service
        .export_animated_image(&ExportOptions::new(&bogus, 0.0, 1.0), &dest, &CancelToken::new())
        .await
        .unwrap_err();
    match err {
        CoreError::Export { diagnostics, .. } => assert!(!diagnostics.trim().is_empty()),
        other => panic!("expected export error, got {:?}", other),
    }
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_cancelled_export_leaves_no_output() {
    let Some(info) = installed_ffmpeg() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let source = make_source(&info.ffmpeg_path, dir.path(), 3);
    let service = service(info, &dir.path().join("tmp"));
    let dest = dir.path().join("cancelled.gif");

    let token = CancelToken::new();
    token.cancel();
    let err = service
        .export_animated_image(&ExportOptions::new(&source, 0.0, 2.0), &dest, &token)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Cancelled));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_process_file_pairs_metadata_with_thumbnails() {
    let Some(info) = installed_ffmpeg() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let source = make_source(&info.ffmpeg_path, dir.path(), 6);
    let service = service(info, &dir.path().join("tmp"));

    let processed = service
        .process_file(&source, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(processed.video_data.width, 320);
    // default interval of 5s over a 6s source
    assert!(!processed.thumbnails.is_empty());
    assert!(processed.thumbnails.len() <= 3);
}
