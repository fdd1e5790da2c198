use crate::abort::AbortFlag;
use crate::error::DeltaGenError;
use crate::models::format::Format;
use image::DynamicImage;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How waiting for one rendered image ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The file exists and decodes; carries its dimensions.
    Verified { width: u32, height: u32 },
    /// The file never showed up before the deadline.
    Missing,
    /// The file is there but never decoded before the deadline.
    Undecodable(String),
    Aborted,
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified { .. })
    }
}

/// Decode the whole file, not just the header, so half written images fail.
pub fn decode(path: &Path) -> Result<DynamicImage, DeltaGenError> {
    image::open(path).map_err(|e| DeltaGenError::image(path, e))
}

/// Poll for `path` every `poll_interval` until it exists and decodes, or `deadline` passes.
/// `on_tick` runs once per poll so the caller can refresh its ETA.
pub fn wait_for_image(
    path: &Path,
    poll_interval: Duration,
    deadline: Duration,
    abort: &AbortFlag,
    mut on_tick: impl FnMut(),
) -> Verification {
    let start = Instant::now();
    let mut last_error = None;

    loop {
        if abort.is_aborted() {
            return Verification::Aborted;
        }

        if path.exists() {
            match decode(path) {
                Ok(img) => {
                    debug!("Verified {path:?}");
                    return Verification::Verified {
                        width: img.width(),
                        height: img.height(),
                    };
                }
                // DeltaGen may still be writing the file
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        if start.elapsed() >= deadline {
            warn!("Gave up on {path:?} after {:?}", start.elapsed());
            return match last_error {
                Some(reason) => Verification::Undecodable(reason),
                None => Verification::Missing,
            };
        }

        on_tick();
        if abort.sleep(poll_interval) {
            return Verification::Aborted;
        }
    }
}

/// Re-encode `path` next to itself in `target` format. Returns the new path.
pub fn convert(path: &Path, target: Format) -> Result<std::path::PathBuf, DeltaGenError> {
    let source = decode(path)?;
    let converted = match target {
        Format::HDR => DynamicImage::ImageRgb32F(source.to_rgb32f()),
        Format::EXR => DynamicImage::ImageRgba32F(source.to_rgba32f()),
        t if t.has_alpha() => DynamicImage::ImageRgba8(source.to_rgba8()),
        _ => DynamicImage::ImageRgb8(source.to_rgb8()),
    };

    let destination = path.with_extension(target.extension());
    converted
        .save_with_format(&destination, target.image_format())
        .map_err(|e| DeltaGenError::image(&destination, e))?;
    Ok(destination)
}
