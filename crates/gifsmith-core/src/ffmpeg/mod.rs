//! FFmpeg Integration Module
//!
//! Locates the ffmpeg/ffprobe executables and runs them as supervised
//! child processes. Everything above this module treats the tools as opaque
//! executables with a documented argument grammar and exit-code contract.

mod detection;
mod runner;

pub use detection::{detect_system_ffmpeg, FFmpegInfo};
pub(crate) use runner::drain_stderr;
pub use runner::{FFmpegRunner, ToolOutput};
