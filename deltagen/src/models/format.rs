use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    InvalidInput(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormatError::InvalidInput(input) => write!(f, "Unsupported image format: {input}"),
        }
    }
}

impl std::error::Error for FormatError {}

// Output formats DeltaGen renders to and we know how to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    HDR,
    EXR,
    #[default]
    PNG,
    JPEG,
    TIFF,
    BMP,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()?.to_str()?.parse().ok()
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::HDR => "hdr",
            Format::EXR => "exr",
            Format::PNG => "png",
            Format::JPEG => "jpg",
            Format::TIFF => "tif",
            Format::BMP => "bmp",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            Format::HDR => ImageFormat::Hdr,
            Format::EXR => ImageFormat::OpenExr,
            Format::PNG => ImageFormat::Png,
            Format::JPEG => ImageFormat::Jpeg,
            Format::TIFF => ImageFormat::Tiff,
            Format::BMP => ImageFormat::Bmp,
        }
    }

    pub fn has_alpha(&self) -> bool {
        !matches!(self, Format::JPEG | Format::HDR)
    }
}

impl FromStr for Format {
    type Err = FormatError;

    /// Accepts extensions with or without the leading dot.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "hdr" => Ok(Format::HDR),
            "exr" => Ok(Format::EXR),
            "png" => Ok(Format::PNG),
            "jpg" | "jpeg" => Ok(Format::JPEG),
            "tif" | "tiff" => Ok(Format::TIFF),
            "bmp" => Ok(Format::BMP),
            _ => Err(FormatError::InvalidInput(s.to_owned())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}
