use super::format::Format;
use super::variant::{Variant, VariantCommand};
use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Largest accepted sampling exponent (2^12 = 4096 samples).
pub const MAX_SAMPLING: u8 = 12;

/// The three settings every render preset needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderSetting {
    Resolution,
    Sampling,
    FileExtension,
}

impl fmt::Display for RenderSetting {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RenderSetting::Resolution => "resolution",
            RenderSetting::Sampling => "sampling",
            RenderSetting::FileExtension => "file_extension",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FromStr for Resolution {
    type Err = ();

    /// Accepts the tree notation `"W H"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace().map(str::parse::<u32>);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(width)), Some(Ok(height)), None) if width > 0 && height > 0 => {
                Ok(Resolution::new(width, height))
            }
            _ => Err(()),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.width, self.height)
    }
}

/// Sampling stored as a log2 exponent, always within `0..=MAX_SAMPLING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sampling(u8);

impl Sampling {
    /// Out of range exponents are clamped rather than rejected.
    pub fn from_exponent(exponent: i64) -> Self {
        Sampling(exponent.clamp(0, MAX_SAMPLING as i64) as u8)
    }

    pub fn exponent(&self) -> u8 {
        self.0
    }

    /// Anti-aliasing samples sent to DeltaGen: `2^exponent`.
    pub fn samples(&self) -> u32 {
        1 << self.0
    }
}

/// A camera/view switch rendered for every preset entry.
/// The synthetic pass used for presets without viewsets carries no command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewset {
    command: Option<String>,
}

impl Viewset {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
        }
    }

    pub fn none() -> Self {
        Self { command: None }
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// File name suffix: `_` plus the last argument of the viewset command, empty for the
    /// synthetic pass. `VIEWSET "Front Left";` gives `_Front Left` (sanitized later).
    pub fn suffix(&self) -> String {
        let Some(command) = self.command.as_deref() else {
            return String::new();
        };
        let command = command.trim().trim_end_matches(';').trim();
        let last = match command.strip_suffix('"') {
            Some(quoted) => quoted.rsplit('"').next().unwrap_or(quoted),
            None => command.rsplit(' ').next().unwrap_or(command),
        };
        if last.is_empty() {
            String::new()
        } else {
            format!("_{last}")
        }
    }
}

/// One preset referenced by a render preset, with its variants already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetEntry {
    pub name: String,
    pub variants: Vec<Variant>,
}

impl PresetEntry {
    pub fn new(name: impl Into<String>, variants: Vec<Variant>) -> Self {
        Self {
            name: name.into(),
            variants,
        }
    }

    pub fn commands(&self) -> Vec<VariantCommand> {
        self.variants.iter().map(VariantCommand::from).collect()
    }
}

/// Render preset as read from the tree, settings possibly missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderPresetDraft {
    pub name: String,
    pub viewsets: Vec<String>,
    pub presets: BTreeMap<usize, PresetEntry>,
    pub sampling: Option<String>,
    pub resolution: Option<String>,
    pub file_extension: Option<String>,
}

impl RenderPresetDraft {
    /// Check the required settings. `index` is the position in the plan and ends up in the error.
    pub fn validate(self, index: usize) -> Result<RenderPreset, PlanError> {
        let missing = |setting| PlanError::MissingSetting {
            index,
            name: self.name.clone(),
            setting,
        };
        let invalid = |setting, value: &str| PlanError::InvalidSetting {
            index,
            name: self.name.clone(),
            setting,
            value: value.to_owned(),
        };

        let resolution = self
            .resolution
            .as_deref()
            .ok_or_else(|| missing(RenderSetting::Resolution))?;
        let resolution = resolution
            .parse::<Resolution>()
            .map_err(|_| invalid(RenderSetting::Resolution, resolution))?;

        let sampling = self
            .sampling
            .as_deref()
            .ok_or_else(|| missing(RenderSetting::Sampling))?;
        let sampling = sampling
            .trim()
            .parse::<i64>()
            .map(Sampling::from_exponent)
            .map_err(|_| invalid(RenderSetting::Sampling, sampling))?;

        let file_extension = self
            .file_extension
            .as_deref()
            .map(normalize_extension)
            .filter(|ext| ext.len() > 1)
            .ok_or_else(|| missing(RenderSetting::FileExtension))?;
        // images we could not decode would only ever time out in verification
        if file_extension.parse::<Format>().is_err() {
            return Err(invalid(RenderSetting::FileExtension, file_extension.as_str()));
        }

        if self.presets.is_empty() {
            return Err(PlanError::NoPresets {
                index,
                name: self.name,
            });
        }

        let viewsets = self
            .viewsets
            .into_iter()
            .filter(|command| !command.trim().is_empty())
            .map(Viewset::new)
            .collect();

        Ok(RenderPreset {
            name: self.name,
            viewsets,
            presets: self.presets,
            sampling,
            resolution,
            file_extension,
        })
    }
}

fn normalize_extension(extension: &str) -> String {
    let extension = extension.trim().trim_start_matches('.').to_lowercase();
    format!(".{extension}")
}

/// A validated render preset: presets x viewsets rendered with one set of settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderPreset {
    pub name: String,
    viewsets: Vec<Viewset>,
    pub presets: BTreeMap<usize, PresetEntry>,
    pub sampling: Sampling,
    pub resolution: Resolution,
    /// Always starts with a dot and is lower case, e.g. `.png`.
    pub file_extension: String,
}

impl RenderPreset {
    /// Viewsets to render. Never empty: a preset without any gets one synthetic pass.
    pub fn viewsets(&self) -> Vec<Viewset> {
        if self.viewsets.is_empty() {
            vec![Viewset::none()]
        } else {
            self.viewsets.clone()
        }
    }

    pub fn view_count(&self) -> usize {
        self.viewsets.len()
    }

    pub fn preset_count(&self) -> usize {
        self.presets.len()
    }

    pub fn image_count(&self) -> usize {
        self.view_count().max(1) * self.preset_count()
    }
}
