use crate::command::Command;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One scene switch: the variant set `name` and the state to put it in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub value: String,
}

impl Variant {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Wire form of a [`Variant`], built once and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantCommand {
    variant: Variant,
    text: String,
}

impl VariantCommand {
    pub fn name(&self) -> &str {
        &self.variant.name
    }

    pub fn value(&self) -> &str {
        &self.variant.value
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<Variant> for VariantCommand {
    fn from(variant: Variant) -> Self {
        let text = Command::Variant {
            name: variant.name.clone(),
            value: variant.value.clone(),
        }
        .to_string();
        Self { variant, text }
    }
}

impl From<&Variant> for VariantCommand {
    fn from(variant: &Variant) -> Self {
        variant.clone().into()
    }
}

impl fmt::Display for VariantCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text)
    }
}
