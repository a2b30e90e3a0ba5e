//! FFmpeg Detection Module
//!
//! Locates the ffmpeg/ffprobe binaries, either from explicit configuration
//! or from common install locations and the system PATH.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult, ToolStage};
use crate::process::configure_std_command;

/// Information about a resolved FFmpeg installation
#[derive(Debug, Clone, PartialEq)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string, when it was queried
    pub version: Option<String>,
}

impl FFmpegInfo {
    /// Use the given binaries as-is, without checking they exist
    pub fn from_paths(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            version: None,
        }
    }

    /// Resolve binaries from configuration, falling back to detection,
    /// and confirm ffmpeg is executable by querying its version.
    pub fn resolve(config: &EngineConfig) -> CoreResult<Self> {
        let ffmpeg_path = match &config.ffmpeg_path {
            Some(path) => path.clone(),
            None => which_binary("ffmpeg")?,
        };
        let ffprobe_path = match &config.ffprobe_path {
            Some(path) => path.clone(),
            None => which_binary("ffprobe")?,
        };

        let version = get_ffmpeg_version(&ffmpeg_path)?;
        tracing::info!(
            "Using ffmpeg {} at {} (ffprobe at {})",
            version,
            ffmpeg_path.display(),
            ffprobe_path.display()
        );

        Ok(Self {
            ffmpeg_path,
            ffprobe_path,
            version: Some(version),
        })
    }
}

/// Detect FFmpeg from system PATH
pub fn detect_system_ffmpeg() -> CoreResult<FFmpegInfo> {
    FFmpegInfo::resolve(&EngineConfig::default())
}

fn platform_binary_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Find a binary in common install locations, then via `where`/`which`
fn which_binary(name: &str) -> CoreResult<PathBuf> {
    let binary_name = platform_binary_name(name);

    for dir in get_common_ffmpeg_paths() {
        let candidate = dir.join(&binary_name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let lookup = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let mut cmd = Command::new(lookup);
    configure_std_command(&mut cmd);
    let output = cmd
        .arg(name)
        .output()
        .map_err(|_| CoreError::ToolNotFound(name.to_string()))?;

    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = path_str.lines().map(str::trim).find(|l| !l.is_empty()) {
            return Ok(PathBuf::from(first_line));
        }
    }

    Err(CoreError::ToolNotFound(name.to_string()))
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));

        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }
        if let Ok(userprofile) = std::env::var("USERPROFILE") {
            paths.push(PathBuf::from(userprofile).join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin")); // MacPorts
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Get FFmpeg version string
fn get_ffmpeg_version(ffmpeg_path: &Path) -> CoreResult<String> {
    let mut cmd = Command::new(ffmpeg_path);
    configure_std_command(&mut cmd);
    let output = cmd.arg("-version").output().map_err(|source| CoreError::Spawn {
        stage: ToolStage::VersionCheck,
        source,
    })?;

    if !output.status.success() {
        return Err(CoreError::Process {
            stage: ToolStage::VersionCheck,
            status: output.status.code(),
            diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    parse_version_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse version from first line: "ffmpeg version X.X.X ..."
fn parse_version_output(output: &str) -> CoreResult<String> {
    let first_line = output
        .lines()
        .next()
        .ok_or_else(|| CoreError::Parse("Empty ffmpeg -version output".to_string()))?;

    if let Some(version_part) = first_line.strip_prefix("ffmpeg version ") {
        if let Some(version) = version_part.split_whitespace().next() {
            return Ok(version.to_string());
        }
    }
    Ok(first_line.to_string())
}
