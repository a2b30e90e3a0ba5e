//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gifsmith_core::{CropRect, EngineConfig, Quality};

#[derive(Parser, Debug)]
#[command(
    name = "gifsmith",
    version,
    about = "Probe videos, sample thumbnails and export palette-optimized GIFs",
    long_about = "Drives ffmpeg/ffprobe to inspect a video, sample thumbnails and render a time window as an animated GIF. Results are printed as JSON on stdout."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// ffmpeg binary (detected when omitted)
    #[arg(long, global = true, value_name = "PATH", env = "GIFSMITH_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// ffprobe binary (detected when omitted)
    #[arg(long, global = true, value_name = "PATH", env = "GIFSMITH_FFPROBE")]
    pub ffprobe: Option<PathBuf>,

    /// Root directory for temporary thumbnail workspaces
    #[arg(long, global = true, value_name = "DIR", env = "GIFSMITH_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Also write a daily-rolling log file into this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            ffmpeg_path: self.ffmpeg.clone(),
            ffprobe_path: self.ffprobe.clone(),
            temp_root: self.temp_dir.clone(),
            ..EngineConfig::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print normalized metadata of the first video stream
    Probe {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Sample one thumbnail every INTERVAL seconds
    Thumbnails(ThumbnailArgs),
    /// Probe, then sample thumbnails across the whole file
    Process {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Export a time window as an animated GIF
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct ThumbnailArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Source duration in seconds (probed when omitted)
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f64>,

    /// Seconds between thumbnails; values below 1 behave as 1
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<f64>,

    /// Write decoded JPEGs here instead of printing a count
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Window start in seconds
    #[arg(long, value_name = "SECONDS")]
    pub start: f64,

    /// Window end in seconds
    #[arg(long, value_name = "SECONDS")]
    pub end: f64,

    /// Output width in pixels; height keeps the aspect ratio
    #[arg(long, default_value_t = gifsmith_core::render::DEFAULT_EXPORT_WIDTH)]
    pub width: u32,

    #[arg(long, default_value_t = gifsmith_core::render::DEFAULT_EXPORT_FPS)]
    pub fps: u32,

    #[arg(long, value_enum, default_value_t = QualityArg::Medium)]
    pub quality: QualityArg,

    /// Crop rectangle in source pixels
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_crop)]
    pub crop: Option<CropRect>,

    /// Destination file (defaults to export-<millis>.gif in the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum QualityArg {
    High,
    Medium,
    Low,
}

impl From<QualityArg> for Quality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::High => Quality::High,
            QualityArg::Medium => Quality::Medium,
            QualityArg::Low => Quality::Low,
        }
    }
}

fn parse_crop(raw: &str) -> Result<CropRect, String> {
    let parts = raw
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("crop values must be non-negative integers: {}", e))?;

    match parts.as_slice() {
        [x, y, width, height] => Ok(CropRect {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        }),
        _ => Err(format!("expected X,Y,W,H but got {} values", parts.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_crop() {
        assert_eq!(
            parse_crop("10, 20,300,200").unwrap(),
            CropRect {
                x: 10,
                y: 20,
                width: 300,
                height: 200
            }
        );
        assert!(parse_crop("1,2,3").is_err());
        assert!(parse_crop("1,2,3,-4").is_err());
        assert!(parse_crop("a,b,c,d").is_err());
    }

    #[test]
    fn test_export_defaults() {
        let cli = Cli::try_parse_from(["gifsmith", "export", "in.mp4", "--start", "1", "--end", "3.5"])
            .unwrap();
        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.width, 480);
                assert_eq!(args.fps, 15);
                assert_eq!(args.quality, QualityArg::Medium);
                assert!(args.crop.is_none());
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gifsmith",
            "probe",
            "in.mp4",
            "--ffmpeg",
            "/opt/ffmpeg",
            "--temp-dir",
            "/scratch",
            "-vv",
        ])
        .unwrap();
        let config = cli.global.engine_config();
        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg")));
        assert_eq!(config.temp_root, Some(PathBuf::from("/scratch")));
        assert_eq!(cli.global.verbose, 2);
    }
}
