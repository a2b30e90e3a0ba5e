//! Engine Configuration
//!
//! Runtime knobs for locating the external tools and staging thumbnails.
//! Nothing here is persisted; callers build it from flags or environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default thumbnail width in pixels (height follows the aspect ratio)
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 320;

/// Default sampling interval in seconds
pub const DEFAULT_THUMBNAIL_INTERVAL_SECS: f64 = 5.0;

/// Default Temp Workspace directory prefix
pub const DEFAULT_WORKSPACE_PREFIX: &str = "thumbs-";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Explicit ffmpeg binary (detected when absent)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit ffprobe binary (detected when absent)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,

    #[serde(default = "default_thumbnail_interval")]
    pub default_thumbnail_interval: f64,

    /// Root for Temp Workspaces (system temp dir when absent)
    #[serde(default)]
    pub temp_root: Option<PathBuf>,

    #[serde(default = "default_workspace_prefix")]
    pub workspace_prefix: String,
}

fn default_thumbnail_width() -> u32 {
    DEFAULT_THUMBNAIL_WIDTH
}

fn default_thumbnail_interval() -> f64 {
    DEFAULT_THUMBNAIL_INTERVAL_SECS
}

fn default_workspace_prefix() -> String {
    DEFAULT_WORKSPACE_PREFIX.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            default_thumbnail_interval: DEFAULT_THUMBNAIL_INTERVAL_SECS,
            temp_root: None,
            workspace_prefix: default_workspace_prefix(),
        }
    }
}

impl EngineConfig {
    /// Directory under which Temp Workspaces are created
    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}
