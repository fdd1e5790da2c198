use crate::domains::tree_source::{Field, MatchMode, ReferenceResolver, TreeSource};
use crate::models::tree::{ItemKind, TreeItem};
use deltagen::models::render_plan::RenderPlan;
use deltagen::models::render_preset::{PresetEntry, RenderPresetDraft};
use deltagen::models::variant::Variant;
use deltagen::PlanError;
use std::collections::BTreeMap;

/// Render plan read from the tree. Runs are refused while `errors` is not empty.
#[derive(Debug, Clone, Default)]
pub struct PlanBuild {
    pub plan: RenderPlan,
    pub errors: Vec<PlanError>,
    pub warnings: Vec<String>,
}

impl PlanBuild {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_message(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn entry<T>(tree: &T, item: &TreeItem, warnings: &mut Vec<String>) -> PresetEntry
where
    T: TreeSource + ReferenceResolver + ?Sized,
{
    // an entry is named after the preset it stands for
    let name = match (&item.kind, item.reference.as_deref()) {
        (ItemKind::Reference, Some(target)) => tree
            .find_items(Field::Id, target, MatchMode::Exact)
            .first()
            .map(|target| target.name.clone())
            .unwrap_or_else(|| item.name.clone()),
        _ => item.name.clone(),
    };

    let (variants, warning) = tree.resolve(item);
    warnings.extend(warning);
    let variants = variants
        .into_iter()
        .map(|v| Variant::new(v.name, v.value))
        .collect();
    PresetEntry::new(name, variants)
}

fn draft<T>(tree: &T, render_preset: &TreeItem, warnings: &mut Vec<String>) -> RenderPresetDraft
where
    T: TreeSource + ReferenceResolver + ?Sized,
{
    let mut draft = RenderPresetDraft {
        name: render_preset.name.clone(),
        ..Default::default()
    };

    for child in &render_preset.children {
        match child.kind {
            ItemKind::RenderSetting => {
                let value = Some(child.value.clone()).filter(|v| !v.trim().is_empty());
                match child.name.trim().to_lowercase().as_str() {
                    "resolution" => draft.resolution = value,
                    "sampling" => draft.sampling = value,
                    "file_extension" | "extension" => draft.file_extension = value,
                    other => warnings.push(format!(
                        "Render preset \"{}\" has an unknown setting \"{other}\"",
                        render_preset.name
                    )),
                }
            }
            ItemKind::Viewset => {
                let command = if child.value.trim().is_empty() {
                    &child.name
                } else {
                    &child.value
                };
                draft.viewsets.push(command.clone());
            }
            ItemKind::Preset | ItemKind::Reference => {
                let index = draft.presets.len();
                draft.presets.insert(index, entry(tree, child, warnings));
            }
            _ => {}
        }
    }
    draft
}

/// Snapshot every render preset of the tree into a render plan, in tree order.
pub fn build_render_plan<T>(tree: &T) -> PlanBuild
where
    T: TreeSource + ReferenceResolver + ?Sized,
{
    let mut warnings = Vec::new();
    let drafts = tree
        .find_items(Field::Kind, ItemKind::RenderPreset.as_str(), MatchMode::Exact)
        .into_iter()
        .enumerate()
        .map(|(index, item)| (index, draft(tree, item, &mut warnings)))
        .collect::<BTreeMap<_, _>>();

    let (plan, errors) = RenderPlan::from_drafts(drafts);
    PlanBuild {
        plan,
        errors,
        warnings,
    }
}
