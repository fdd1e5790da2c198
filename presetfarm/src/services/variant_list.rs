use crate::domains::tree_source::{Field, MatchMode, ReferenceResolver, TreeSource};
use crate::models::tree::{ItemKind, TreeItem};
use deltagen::models::variant::Variant;

/// Variants of one send request plus whatever could not be resolved on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantList {
    pub variants: Vec<Variant>,
    pub warnings: Vec<String>,
}

fn to_variant(item: &TreeItem) -> Variant {
    Variant::new(item.name.clone(), item.value.clone())
}

impl VariantList {
    fn extend<R: ReferenceResolver + ?Sized>(&mut self, resolver: &R, item: &TreeItem) {
        let (items, warning) = resolver.resolve(item);
        self.variants.extend(items.iter().map(to_variant));
        self.warnings.extend(warning);
    }
}

/// Flatten `selected` into variant commands, resolving references on the way.
/// With `with_reset` the variants of every reset preset go out first.
pub fn build_variant_list<T>(tree: &T, selected: &[&TreeItem], with_reset: bool) -> VariantList
where
    T: TreeSource + ReferenceResolver + ?Sized,
{
    let mut list = VariantList::default();

    if with_reset {
        for reset in tree.find_items(Field::Kind, ItemKind::Reset.as_str(), MatchMode::Exact) {
            list.extend(tree, reset);
        }
    }

    for item in selected {
        list.extend(tree, item);
    }
    list
}

/// Items named `name` that can be sent: presets, reset presets, single variants and references.
pub fn find_sendable<'a, T>(tree: &'a T, name: &str) -> Vec<&'a TreeItem>
where
    T: TreeSource + ?Sized,
{
    tree.find_items(Field::Name, name, MatchMode::Exact)
        .into_iter()
        .filter(|item| {
            matches!(
                item.kind,
                ItemKind::Preset | ItemKind::Reset | ItemKind::Variant | ItemKind::Reference
            )
        })
        .collect()
}
