use crate::models::render_preset::Resolution;
use std::fmt;
use std::path::PathBuf;

/// Commands of the DeltaGen text protocol. `Display` renders the wire form, `;` included.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Variant { name: String, value: String },
    SubscribeVariantState,
    SizeViewer(Resolution),
    FreezeViewer,
    UnfreezeViewer,
    /// RGBA in 0..=1
    BackgroundViewer([f32; 4]),
    BorderlessViewer(bool),
    PositionViewer { x: i32, y: i32 },
    ImageSaaQuality(u32),
    Image { path: PathBuf, resolution: Resolution },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Command::Variant { name, value } => write!(f, "VARIANT {name} {value};"),
            Command::SubscribeVariantState => write!(f, "SUBSCRIBE VARIANT_STATE;"),
            Command::SizeViewer(size) => write!(f, "SIZE VIEWER {} {};", size.width, size.height),
            Command::FreezeViewer => write!(f, "FREEZE VIEWER;"),
            Command::UnfreezeViewer => write!(f, "UNFREEZE VIEWER;"),
            Command::BackgroundViewer([r, g, b, a]) => {
                write!(f, "BACKGROUND VIEWER {r:.4} {g:.4} {b:.4} {a:.4};")
            }
            Command::BorderlessViewer(on) => {
                let flag = if *on { "TRUE" } else { "FALSE" };
                write!(f, "BORDERLESS VIEWER {flag};")
            }
            Command::PositionViewer { x, y } => write!(f, "POSITION VIEWER {x} {y};"),
            Command::ImageSaaQuality(samples) => write!(f, "IMAGE_SAA_QUALITY VIEWER {samples};"),
            Command::Image { path, resolution } => {
                // DeltaGen expects forward slashes, even on Windows
                let path = path.to_string_lossy().replace('\\', "/");
                write!(
                    f,
                    "IMAGE \"{path}\" {} {};",
                    resolution.width, resolution.height
                )
            }
        }
    }
}

/// Join several commands into one payload that goes out in a single write.
pub fn batch(commands: &[Command]) -> String {
    commands.iter().map(ToString::to_string).collect()
}

/// Viewer state after a render run or a window sync.
pub fn restore_viewer(size: Resolution) -> String {
    batch(&[Command::SizeViewer(size), Command::UnfreezeViewer])
}
