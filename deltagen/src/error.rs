use crate::models::render_preset::RenderSetting;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeltaGenError {
    #[error("Invalid render plan: {0}")]
    InvalidPlan(#[from] PlanError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to read image {path:?}: {message}")]
    Image { path: PathBuf, message: String },
    #[error("Invalid window title pattern: {0}")]
    TitlePattern(#[from] regex::Error),
    #[error("Unable to start viewer sync: {0}")]
    Spawn(String),
}

impl DeltaGenError {
    pub(crate) fn image(path: impl Into<PathBuf>, err: image::ImageError) -> Self {
        DeltaGenError::Image {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Reasons a render preset gets dropped from a render plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Render preset #{index} \"{name}\" has no {setting} setting")]
    MissingSetting {
        index: usize,
        name: String,
        setting: RenderSetting,
    },
    #[error("Render preset #{index} \"{name}\" has an invalid {setting} \"{value}\"")]
    InvalidSetting {
        index: usize,
        name: String,
        setting: RenderSetting,
        value: String,
    },
    #[error("Render preset #{index} \"{name}\" references no presets")]
    NoPresets { index: usize, name: String },
    #[error("Render plan contains no render presets")]
    Empty,
}

impl PlanError {
    /// Index of the offending render preset, if the error is about one.
    pub fn index(&self) -> Option<usize> {
        match self {
            PlanError::MissingSetting { index, .. }
            | PlanError::InvalidSetting { index, .. }
            | PlanError::NoPresets { index, .. } => Some(*index),
            PlanError::Empty => None,
        }
    }
}
