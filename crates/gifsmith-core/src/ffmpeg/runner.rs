//! FFmpeg Runner Module
//!
//! Builds configured tool commands and runs them to completion while
//! capturing their output.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tokio::task::JoinHandle;

use super::FFmpegInfo;
use crate::cancel::CancelToken;
use crate::error::{CoreError, CoreResult, ToolStage};
use crate::process::configure_tokio_command;

/// Captured result of a finished tool run
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    /// Turn a nonzero exit into `CoreError::Process`, keeping stderr verbatim
    pub fn into_success(self, stage: ToolStage) -> CoreResult<Self> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(CoreError::Process {
                stage,
                status: self.status.code(),
                diagnostics: self.stderr,
            })
        }
    }
}

/// FFmpeg Runner for executing video processing commands
#[derive(Clone, Debug)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
}

impl FFmpegRunner {
    pub fn new(info: FFmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
        }
    }

    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    /// An ffmpeg command with platform flags applied and stdin closed
    pub fn ffmpeg_command(&self) -> Command {
        let mut cmd = Command::new(&self.info.ffmpeg_path);
        configure_tokio_command(&mut cmd);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// An ffprobe command with platform flags applied and stdin closed
    pub fn ffprobe_command(&self) -> Command {
        let mut cmd = Command::new(&self.info.ffprobe_path);
        configure_tokio_command(&mut cmd);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Spawn `cmd`, wait for it to exit and collect stdout and stderr.
    ///
    /// The exit status is not checked here; see [`ToolOutput::into_success`].
    /// Cancellation drops the child, which kills it.
    pub async fn run(
        &self,
        mut cmd: Command,
        stage: ToolStage,
        cancel: &CancelToken,
    ) -> CoreResult<ToolOutput> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        tracing::debug!("Running {} command: {:?}", stage, cmd.as_std());

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let child = cmd
            .spawn()
            .map_err(|source| CoreError::Spawn { stage, source })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = cancel.cancelled() => {
                tracing::info!("{} cancelled", stage);
                return Err(CoreError::Cancelled);
            }
        };

        Ok(ToolOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Drain a child's stderr on its own task so a full pipe never stalls the child.
pub(crate) fn drain_stderr(stderr: Option<ChildStderr>) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
