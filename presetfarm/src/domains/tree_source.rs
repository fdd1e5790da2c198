use crate::models::tree::TreeItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Kind,
    Name,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Contains,
}

/// Read access to the preset tree.
pub trait TreeSource {
    /// Every item whose `field` matches `pattern`, in tree order.
    fn find_items(&self, field: Field, pattern: &str, mode: MatchMode) -> Vec<&TreeItem>;
}

/// Expands reference items into the variants they stand for.
pub trait ReferenceResolver {
    /// Leaf variant items behind `item`, plus a warning when part of it could not be resolved.
    fn resolve(&self, item: &TreeItem) -> (Vec<TreeItem>, Option<String>);
}
