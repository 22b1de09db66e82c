//
// models.rs
// spherical-tools
//
// Defines serializable data structures for stereo modes, crop regions, injection options, and parsed metadata.
//

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How left/right eye images are packed into the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StereoMode {
    Mono,
    TopBottom,
    LeftRight,
}

impl StereoMode {
    /// Canonical value written into the StereoMode XML element.
    pub fn as_str(self) -> &'static str {
        match self {
            StereoMode::Mono => "mono",
            StereoMode::TopBottom => "top-bottom",
            StereoMode::LeftRight => "left-right",
        }
    }

    /// Accepts both the XML vocabulary ("mono") and the CLI spelling ("none").
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "mono" | "none" => Some(StereoMode::Mono),
            "top-bottom" => Some(StereoMode::TopBottom),
            "left-right" => Some(StereoMode::LeftRight),
            _ => None,
        }
    }
}

impl fmt::Display for StereoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spherical mapping of the video frame. Only equirectangular is written today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    Equirectangular,
}

impl Projection {
    pub fn as_str(self) -> &'static str {
        match self {
            Projection::Equirectangular => "equirectangular",
        }
    }
}

/// Pixel rectangle describing how a full panoramic frame maps into a cropped output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub cropped_width: u32,
    pub cropped_height: u32,
    pub full_width: u32,
    pub full_height: u32,
    pub left: u32,
    pub top: u32,
}

/// Options assembled once per invocation and handed to the injector.
#[derive(Debug, Clone)]
pub struct InjectOptions {
    pub stereo: StereoMode,
    pub projection: Projection,
    pub software: String,
    pub source_count: u32,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub crop: Option<CropRegion>,
}

/// Structured view of a Spherical Video V1 document, for CLI summaries and JSON output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SphericalMetadata {
    pub spherical: bool,
    pub stitched: bool,
    pub stitching_software: Option<String>,
    pub projection: Option<String>,
    pub stereo_mode: Option<StereoMode>,
    pub source_count: Option<u32>,
    pub crop: Option<CropRegion>,
}
