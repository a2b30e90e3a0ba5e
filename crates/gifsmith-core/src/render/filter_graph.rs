//! FFmpeg Filter Graph Builder
//!
//! Typed filter stages rendered into ffmpeg's filter syntax. Every value a
//! caller controls is numeric, so the rendered graph cannot pick up stray
//! separators (`,` `;` `:` `[`) from user input. File paths never enter a
//! graph; they are passed as separate arguments.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Crop rectangle in source pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scaling algorithm passed to `scale=...:flags=`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleFlags {
    /// High quality, used for exports
    Lanczos,
    /// Cheap, used for thumbnails
    FastBilinear,
}

impl ScaleFlags {
    fn as_str(&self) -> &'static str {
        match self {
            ScaleFlags::Lanczos => "lanczos",
            ScaleFlags::FastBilinear => "fast_bilinear",
        }
    }
}

/// Output frame rate for the `fps` filter
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameRate {
    /// Frames per second
    PerSecond(u32),
    /// One frame every N seconds
    OneEvery(u32),
}

/// A single video filter stage
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VideoFilter {
    Fps(FrameRate),
    Crop(CropRect),
    /// Scale to `width`, height follows the aspect ratio
    Scale { width: u32, flags: ScaleFlags },
    PaletteGen { max_colors: u16, reserve_transparent: bool },
    /// Bayer dithering against the palette on the second input, rectangle diff mode
    PaletteUse { bayer_scale: u8 },
}

impl fmt::Display for VideoFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoFilter::Fps(FrameRate::PerSecond(fps)) => write!(f, "fps={}", fps),
            VideoFilter::Fps(FrameRate::OneEvery(secs)) => write!(f, "fps=1/{}", secs),
            VideoFilter::Crop(rect) => write!(
                f,
                "crop={}:{}:{}:{}",
                rect.width, rect.height, rect.x, rect.y
            ),
            VideoFilter::Scale { width, flags } => {
                write!(f, "scale={}:-1:flags={}", width, flags.as_str())
            }
            VideoFilter::PaletteGen {
                max_colors,
                reserve_transparent,
            } => write!(
                f,
                "palettegen=max_colors={}:reserve_transparent={}",
                max_colors,
                u8::from(*reserve_transparent)
            ),
            VideoFilter::PaletteUse { bayer_scale } => write!(
                f,
                "paletteuse=dither=bayer:bayer_scale={}:diff_mode=rectangle",
                bayer_scale
            ),
        }
    }
}

/// A linear, comma-separated filter chain (the `-vf` form)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterChain {
    filters: Vec<VideoFilter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: VideoFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_optional(self, filter: Option<VideoFilter>) -> Self {
        match filter {
            Some(filter) => self.with(filter),
            None => self,
        }
    }

    pub fn filters(&self) -> &[VideoFilter] {
        &self.filters
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        Ok(())
    }
}

/// Stream label inside a filter graph, e.g. `0:v` or `v`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pad(&'static str);

impl Pad {
    /// Panics on characters outside `[A-Za-z0-9:_]`; labels are compile-time constants.
    pub const fn new(label: &'static str) -> Self {
        let bytes = label.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            assert!(
                b.is_ascii_alphanumeric() || b == b':' || b == b'_',
                "invalid filter pad label"
            );
            i += 1;
        }
        Self(label)
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// A `-filter_complex` graph: labelled chains joined by `;`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterGraph {
    segments: Vec<(Vec<Pad>, FilterChain, Vec<Pad>)>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `[inputs]chain[outputs]`
    pub fn chain(mut self, inputs: &[Pad], chain: FilterChain, outputs: &[Pad]) -> Self {
        self.segments
            .push((inputs.to_vec(), chain, outputs.to_vec()));
        self
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (inputs, chain, outputs)) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            for pad in inputs {
                write!(f, "{}", pad)?;
            }
            write!(f, "{}", chain)?;
            for pad in outputs {
                write!(f, "{}", pad)?;
            }
        }
        Ok(())
    }
}
