use crate::domains::tree_source::{Field, MatchMode, ReferenceResolver, TreeSource};
use crate::models::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::warn;

/// References nested deeper than this are not followed.
pub const MAX_REFERENCE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Groups items, never sent itself.
    Folder,
    Preset,
    /// Preset whose variants put the scene back into a known state.
    Reset,
    Variant,
    /// Points at another item through `reference`.
    Reference,
    Viewset,
    RenderPreset,
    /// `name` is resolution, sampling or file_extension.
    RenderSetting,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Folder => "folder",
            ItemKind::Preset => "preset",
            ItemKind::Reset => "reset",
            ItemKind::Variant => "variant",
            ItemKind::Reference => "reference",
            ItemKind::Viewset => "viewset",
            ItemKind::RenderPreset => "render_preset",
            ItemKind::RenderSetting => "render_setting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeItem {
    pub id: String,
    pub kind: ItemKind,
    pub name: String,
    #[serde(default)]
    pub value: String,
    /// Target id of a reference item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeItem>,
}

impl TreeItem {
    pub fn new(id: impl Into<String>, kind: ItemKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            value: String::new(),
            reference: None,
            children: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_reference(mut self, target: impl Into<String>) -> Self {
        self.reference = Some(target.into());
        self
    }

    pub fn with_children(mut self, children: Vec<TreeItem>) -> Self {
        self.children = children;
        self
    }

    fn field(&self, field: Field) -> &str {
        match field {
            Field::Id => &self.id,
            Field::Kind => self.kind.as_str(),
            Field::Name => &self.name,
            Field::Value => &self.value,
        }
    }
}

/// Snapshot of a preset tree, as exported by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetTree {
    pub items: Vec<TreeItem>,
}

impl PresetTree {
    pub fn new(items: Vec<TreeItem>) -> Self {
        Self { items }
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let data = fs::read_to_string(path).map_err(|source| AppError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| AppError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Depth first, parents before their children.
    pub fn iter(&self) -> impl Iterator<Item = &TreeItem> {
        let mut stack = self.items.iter().rev().collect::<Vec<_>>();
        std::iter::from_fn(move || {
            let item = stack.pop()?;
            stack.extend(item.children.iter().rev());
            Some(item)
        })
    }

    pub fn find_by_id(&self, id: &str) -> Option<&TreeItem> {
        self.iter().find(|item| item.id == id)
    }

    fn collect_variants(
        &self,
        item: &TreeItem,
        depth: usize,
        path: &mut HashSet<String>,
        out: &mut Vec<TreeItem>,
        warnings: &mut Vec<String>,
    ) {
        match item.kind {
            ItemKind::Variant => out.push(item.clone()),
            ItemKind::Reference => {
                let Some(target) = item.reference.as_deref() else {
                    warnings.push(format!("Reference \"{}\" points nowhere", item.name));
                    return;
                };
                if depth >= MAX_REFERENCE_DEPTH {
                    warnings.push(format!(
                        "Reference \"{}\" nested deeper than {MAX_REFERENCE_DEPTH} levels, skipped",
                        item.name
                    ));
                    return;
                }
                // only the current chain counts, two branches may share a target
                if !path.insert(target.to_owned()) {
                    warnings.push(format!(
                        "Reference \"{}\" leads back to itself, skipped",
                        item.name
                    ));
                    return;
                }
                match self.find_by_id(target) {
                    Some(resolved) => {
                        self.collect_variants(resolved, depth + 1, path, out, warnings)
                    }
                    None => warnings.push(format!(
                        "Reference \"{}\" points to missing item {target}",
                        item.name
                    )),
                }
                path.remove(target);
            }
            ItemKind::Folder | ItemKind::Preset | ItemKind::Reset => {
                for child in &item.children {
                    self.collect_variants(child, depth, path, out, warnings);
                }
            }
            ItemKind::Viewset | ItemKind::RenderPreset | ItemKind::RenderSetting => {}
        }
    }
}

impl TreeSource for PresetTree {
    fn find_items(&self, field: Field, pattern: &str, mode: MatchMode) -> Vec<&TreeItem> {
        self.iter()
            .filter(|item| {
                let value = item.field(field);
                match mode {
                    MatchMode::Exact => value == pattern,
                    MatchMode::Contains => value.contains(pattern),
                }
            })
            .collect()
    }
}

impl ReferenceResolver for PresetTree {
    fn resolve(&self, item: &TreeItem) -> (Vec<TreeItem>, Option<String>) {
        let mut out = Vec::new();
        let mut warnings = Vec::new();
        let mut path = HashSet::from([item.id.clone()]);
        self.collect_variants(item, 0, &mut path, &mut out, &mut warnings);

        if warnings.is_empty() {
            (out, None)
        } else {
            for warning in &warnings {
                warn!("{warning}");
            }
            (out, Some(warnings.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(id: &str, name: &str, value: &str) -> TreeItem {
        TreeItem::new(id, ItemKind::Variant, name).with_value(value)
    }

    fn tree() -> PresetTree {
        PresetTree::new(vec![
            TreeItem::new("1", ItemKind::Preset, "Base").with_children(vec![
                variant("2", "Paint", "red"),
                variant("3", "Rim", "R19"),
            ]),
            TreeItem::new("4", ItemKind::Preset, "Sport").with_children(vec![
                TreeItem::new("5", ItemKind::Reference, "Base").with_reference("1"),
                variant("6", "Spoiler", "on"),
            ]),
            TreeItem::new("7", ItemKind::Preset, "Loop").with_children(vec![
                TreeItem::new("8", ItemKind::Reference, "Self").with_reference("7"),
                variant("9", "Seats", "leather"),
            ]),
        ])
    }

    #[test]
    fn parses_the_exported_json() {
        let json = r#"{ "items": [
            { "id": "1", "kind": "render_preset", "name": "Beauty", "children": [
                { "id": "2", "kind": "render_setting", "name": "resolution", "value": "1280 720" },
                { "id": "3", "kind": "reference", "name": "Base", "reference": "9" }
            ] }
        ] }"#;
        let tree: PresetTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.items[0].kind, ItemKind::RenderPreset);
        assert_eq!(tree.items[0].children[1].reference.as_deref(), Some("9"));
    }

    #[test]
    fn finds_items_by_field() {
        let tree = tree();
        let found = tree.find_items(Field::Name, "Paint", MatchMode::Exact);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "2");

        let presets = tree.find_items(Field::Kind, "preset", MatchMode::Exact);
        assert_eq!(presets.len(), 3);

        let rims = tree.find_items(Field::Value, "R1", MatchMode::Contains);
        assert_eq!(rims[0].name, "Rim");
    }

    #[test]
    fn resolves_references_in_order() {
        let tree = tree();
        let sport = tree.find_by_id("4").unwrap();
        let (variants, warning) = tree.resolve(sport);
        let names = variants.iter().map(|v| v.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Paint", "Rim", "Spoiler"]);
        assert_eq!(warning, None);
    }

    #[test]
    fn cycles_are_cut_with_a_warning() {
        let tree = tree();
        let looped = tree.find_by_id("7").unwrap();
        let (variants, warning) = tree.resolve(looped);
        assert_eq!(variants.len(), 1);
        assert!(warning.unwrap().contains("leads back to itself"));
    }

    #[test]
    fn depth_is_bounded() {
        // a chain of references longer than the limit
        let mut items = vec![TreeItem::new("p0", ItemKind::Preset, "End")
            .with_children(vec![variant("v", "Paint", "red")])];
        for i in 1..=MAX_REFERENCE_DEPTH + 2 {
            items.push(
                TreeItem::new(format!("p{i}"), ItemKind::Preset, format!("P{i}")).with_children(
                    vec![TreeItem::new(format!("r{i}"), ItemKind::Reference, "next")
                        .with_reference(format!("p{}", i - 1))],
                ),
            );
        }
        let tree = PresetTree::new(items);

        let shallow = tree.find_by_id("p3").unwrap();
        assert_eq!(tree.resolve(shallow).0.len(), 1);

        let deep = tree
            .find_by_id(&format!("p{}", MAX_REFERENCE_DEPTH + 2))
            .unwrap();
        let (variants, warning) = tree.resolve(deep);
        assert!(variants.is_empty());
        assert!(warning.unwrap().contains("nested deeper"));
    }

    #[test]
    fn missing_target_is_reported() {
        let tree = PresetTree::new(vec![TreeItem::new("1", ItemKind::Preset, "Broken")
            .with_children(vec![
                TreeItem::new("2", ItemKind::Reference, "Gone").with_reference("404")
            ])]);
        let (variants, warning) = tree.resolve(&tree.items[0]);
        assert!(variants.is_empty());
        assert!(warning.unwrap().contains("missing item 404"));
    }
}
