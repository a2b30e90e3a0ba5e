//! gifsmith Core Library
//!
//! Drives external ffmpeg/ffprobe processes to:
//!
//! - extract normalized metadata from a video file,
//! - sample periodic thumbnails as inline JPEG data URLs,
//! - export a palette-optimized animated GIF over a time window and crop.
//!
//! The tools are treated as opaque executables. Every public operation takes
//! a [`CancelToken`]; dropping an operation's future also kills its children.

pub mod assets;
pub mod cancel;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod fs;
pub mod process;
pub mod render;
pub mod service;

pub use assets::{MetadataProbe, ThumbnailSampler, ThumbnailSet, VideoMetadata};
pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use error::{CoreError, CoreResult, ToolStage};
pub use ffmpeg::{detect_system_ffmpeg, FFmpegInfo, FFmpegRunner};
pub use render::{
    default_export_file_name, CropRect, ExportEngine, ExportOptions, ExportState, Quality,
};
pub use service::{ExportResponse, MediaService, ProcessedFile};

#[cfg(test)]
mod tests_ffmpeg;
