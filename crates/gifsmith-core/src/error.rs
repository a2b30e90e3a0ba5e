//! gifsmith Error Definitions
//!
//! Defines the error taxonomy shared by the probe, thumbnail sampler and
//! export pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies which external tool invocation an error belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolStage {
    /// `ffprobe` inspection of the source file
    Probe,
    /// `ffmpeg` keyframe extraction into a temp workspace
    ThumbnailExtraction,
    /// `ffmpeg` palette generator writing PNG to stdout
    PaletteGeneration,
    /// `ffmpeg` encoder consuming the source plus the piped palette
    FinalEncode,
    /// `-version` query during tool detection
    VersionCheck,
}

impl fmt::Display for ToolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolStage::Probe => "probe",
            ToolStage::ThumbnailExtraction => "thumbnail extraction",
            ToolStage::PaletteGeneration => "palette generation",
            ToolStage::FinalEncode => "final encode",
            ToolStage::VersionCheck => "version check",
        };
        f.write_str(name)
    }
}

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Process Errors
    // =========================================================================
    #[error("Failed to spawn {stage} process: {source}")]
    Spawn {
        stage: ToolStage,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} process exited with {}: {diagnostics}", format_status(.status))]
    Process {
        stage: ToolStage,
        status: Option<i32>,
        diagnostics: String,
    },

    #[error("Export failed during {stage} (exit {}): {diagnostics}", format_status(.status))]
    Export {
        stage: ToolStage,
        status: Option<i32>,
        diagnostics: String,
    },

    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    // =========================================================================
    // Probe Errors
    // =========================================================================
    #[error("Failed to parse probe output: {0}")]
    Parse(String),

    #[error("No video stream found in {}", .0.display())]
    NoVideoStream(PathBuf),

    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

fn format_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

impl CoreError {
    /// Stage of the external tool run this error came from, if any
    pub fn stage(&self) -> Option<ToolStage> {
        match self {
            CoreError::Spawn { stage, .. }
            | CoreError::Process { stage, .. }
            | CoreError::Export { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Captured tool diagnostics, verbatim
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            CoreError::Process { diagnostics, .. } | CoreError::Export { diagnostics, .. } => {
                Some(diagnostics)
            }
            _ => None,
        }
    }
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
