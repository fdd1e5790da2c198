use super::render_preset::{RenderPreset, RenderPresetDraft};
use crate::error::PlanError;
use std::collections::BTreeMap;
use tracing::warn;

/// Ordered render presets of one render run. Built once before the worker starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPlan {
    presets: BTreeMap<usize, RenderPreset>,
}

impl RenderPlan {
    /// Validate every draft. Invalid drafts are left out and reported; callers refuse to
    /// render while the error list is not empty.
    pub fn from_drafts(drafts: BTreeMap<usize, RenderPresetDraft>) -> (Self, Vec<PlanError>) {
        let mut presets = BTreeMap::new();
        let mut errors = Vec::new();

        for (index, draft) in drafts {
            match draft.validate(index) {
                Ok(preset) => {
                    presets.insert(index, preset);
                }
                Err(e) => {
                    warn!("{e}");
                    errors.push(e);
                }
            }
        }

        if presets.is_empty() && errors.is_empty() {
            errors.push(PlanError::Empty);
        }

        (Self { presets }, errors)
    }

    /// Like [`RenderPlan::from_drafts`] but all or nothing.
    pub fn try_from_drafts(drafts: BTreeMap<usize, RenderPresetDraft>) -> Result<Self, PlanError> {
        let (plan, mut errors) = Self::from_drafts(drafts);
        if errors.is_empty() {
            Ok(plan)
        } else {
            Err(errors.remove(0))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &RenderPreset)> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn total_images(&self) -> usize {
        self.presets.values().map(RenderPreset::image_count).sum()
    }
}
