//! Asset Inspection Module
//!
//! Metadata extraction and thumbnail sampling for source videos.

mod metadata;
mod thumbnail;

pub use metadata::*;
pub use thumbnail::*;
