use crate::models::error::AppError;
use deltagen::viewer_sync::WindowRect;
use deltagen::DeltaGenConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SETTINGS_PATH: &str = "PresetFarm/";
const SETTINGS_FILE_NAME: &str = "AppSettings.json";
const RENDER_DIR: &str = "PresetFarm";

/// Where the local window sits that the DeltaGen viewer follows during a window sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerWindow {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for ViewerWindow {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1280,
            height: 720,
        }
    }
}

impl From<ViewerWindow> for WindowRect {
    fn from(window: ViewerWindow) -> Self {
        WindowRect {
            x: window.x,
            y: window.y,
            width: window.width,
            height: window.height,
        }
    }
}

/// User settings, kept as json in the user's config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSetting {
    /// Default target of render runs.
    pub render_dir: PathBuf,
    /// Wait for a variant_state event after each variant of a plain send.
    pub check_confirmation_on_send: bool,
    /// Prefix every send with the variants of the reset presets.
    pub send_reset: bool,
    pub viewer_window: ViewerWindow,
    pub deltagen: DeltaGenConfig,
}

impl Default for AppSetting {
    fn default() -> Self {
        let render_dir = dirs::picture_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(RENDER_DIR);

        Self {
            render_dir,
            check_confirmation_on_send: false,
            send_reset: false,
            viewer_window: ViewerWindow::default(),
            deltagen: DeltaGenConfig::default(),
        }
    }
}

impl AppSetting {
    pub fn config_path() -> Result<PathBuf, AppError> {
        let dir = dirs::config_dir()
            .ok_or(AppError::NoConfigDir)?
            .join(SETTINGS_PATH);
        Ok(dir.join(SETTINGS_FILE_NAME))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| AppError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let data = serde_json::to_string_pretty(self).map_err(|source| AppError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, data).map_err(|source| AppError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the settings from the user's config directory. Missing or broken files fall back
    /// to defaults, and a missing file is created so it can be edited.
    pub fn load() -> AppSetting {
        match Self::config_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                warn!("{e}, using default settings");
                AppSetting::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> AppSetting {
        match fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!("Unable to parse {path:?}, using default settings: {e}");
                AppSetting::default()
            }),
            Err(_) => {
                let settings = AppSetting::default();
                match settings.save_to(path) {
                    Ok(()) => info!("Created default settings at {path:?}"),
                    Err(e) => warn!("{e}"),
                }
                settings
            }
        }
    }
}
