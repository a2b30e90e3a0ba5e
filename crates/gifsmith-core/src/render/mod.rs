//! Render Pipeline Module
//!
//! Filter-graph construction and the two-process animated export.
//!
//! # Modules
//!
//! - `filter_graph`: typed ffmpeg filter stages, chains and labelled graphs
//! - `export`: palette generation + paletteuse encode to GIF

mod export;
mod filter_graph;

pub use export::*;
pub use filter_graph::*;
