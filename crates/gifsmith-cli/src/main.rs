//! gifsmith command-line entry point.
//!
//! Stands in for a UI: resolves the tools, forwards one request to the
//! core library and prints the result as JSON on stdout. Ctrl-C cancels the
//! in-flight request, which kills any running ffmpeg processes.

mod cli;
mod logging;

use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::Parser;
use gifsmith_core::{
    default_export_file_name, CancelToken, CoreError, ExportOptions, ExportResponse, MediaService,
    ThumbnailSet,
};
use serde::Serialize;

use crate::cli::{Cli, Commands, ExportArgs, ThumbnailArgs};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThumbnailSummary {
    count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(cli.global.verbose, cli.global.log_dir.as_deref())?;

    let service =
        MediaService::new(cli.global.engine_config()).context("failed to locate ffmpeg/ffprobe")?;

    let cancel = CancelToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_ctrl_c.cancel();
        }
    });

    match cli.command {
        Commands::Probe { file } => {
            let metadata = service.probe(&file, &cancel).await?;
            print_json(&metadata)
        }
        Commands::Thumbnails(args) => run_thumbnails(&service, args, &cancel).await,
        Commands::Process { file } => {
            let processed = service.process_file(&file, &cancel).await?;
            print_json(&processed)
        }
        Commands::Export(args) => run_export(&service, args, &cancel).await,
    }
}

async fn run_thumbnails(
    service: &MediaService,
    args: ThumbnailArgs,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    let duration = match args.duration {
        Some(duration) => duration,
        None => service.probe(&args.file, cancel).await?.duration,
    };

    let thumbnails = service
        .sample_thumbnails(&args.file, duration, args.interval, cancel)
        .await?;

    let count = thumbnails.len();
    let files = match &args.out_dir {
        Some(dir) => write_thumbnails(dir, thumbnails)?,
        None => Vec::new(),
    };
    print_json(&ThumbnailSummary { count, files })
}

fn write_thumbnails(dir: &Path, thumbnails: ThumbnailSet) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let mut written = Vec::with_capacity(thumbnails.len());
    for (index, data_url) in thumbnails.into_iter().enumerate() {
        let (_, payload) = data_url
            .split_once(',')
            .context("thumbnail is not a data URL")?;
        let bytes = STANDARD
            .decode(payload)
            .context("thumbnail payload is not valid base64")?;

        let path = dir.join(format!("thumb-{:06}.jpg", index + 1));
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

async fn run_export(
    service: &MediaService,
    args: ExportArgs,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    let destination = args
        .output
        .unwrap_or_else(|| PathBuf::from(default_export_file_name()));

    let options = ExportOptions {
        input_path: args.file,
        start_time: args.start,
        end_time: args.end,
        width: args.width,
        fps: args.fps,
        quality: args.quality.into(),
        crop: args.crop,
    };

    let result = match check_crop(service, &options, cancel).await {
        Ok(()) => {
            service
                .export_animated_image(&options, &destination, cancel)
                .await
        }
        Err(e) => Err(e),
    };

    let failure = result.as_ref().err().map(ToString::to_string);
    print_json(&ExportResponse::from(result))?;
    match failure {
        Some(message) => anyhow::bail!("export failed: {}", message),
        None => Ok(()),
    }
}

/// Probe the source only when a crop needs bounds checking
async fn check_crop(
    service: &MediaService,
    options: &ExportOptions,
    cancel: &CancelToken,
) -> Result<(), CoreError> {
    if options.crop.is_none() {
        return Ok(());
    }
    let metadata = service.probe(&options.input_path, cancel).await?;
    options.check_crop_within(&metadata)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_thumbnails_decodes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("thumbs");
        let set: ThumbnailSet = ["data:image/jpeg;base64,b25l", "data:image/jpeg;base64,dHdv"]
            .into_iter()
            .map(String::from)
            .collect();

        let files = write_thumbnails(&out, set).unwrap();
        assert_eq!(
            files,
            vec![out.join("thumb-000001.jpg"), out.join("thumb-000002.jpg")]
        );
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"one");
        assert_eq!(std::fs::read(&files[1]).unwrap(), b"two");
    }

    #[test]
    fn test_write_thumbnails_rejects_non_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let set: ThumbnailSet = std::iter::once("not a data url".to_string()).collect();
        assert!(write_thumbnails(dir.path(), set).is_err());
    }
}
