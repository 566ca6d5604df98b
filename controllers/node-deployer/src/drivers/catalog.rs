//! Static model inventories per device family.

use std::collections::BTreeMap;

/// A front-panel port of a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    pub name: String,
    pub speed: String,
}

impl InterfaceSpec {
    fn new(name: impl Into<String>, speed: &str) -> Self {
        Self {
            name: name.into(),
            speed: speed.to_string(),
        }
    }
}

/// Known models of a provider and their interface inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantCatalog {
    variants: BTreeMap<String, Vec<InterfaceSpec>>,
}

impl VariantCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a model
    #[must_use]
    pub fn with_variant(mut self, model: impl Into<String>, interfaces: Vec<InterfaceSpec>) -> Self {
        self.variants.insert(model.into(), interfaces);
        self
    }

    /// Interfaces of a model; `None` for unknown models
    pub fn interfaces(&self, model: &str) -> Option<&[InterfaceSpec]> {
        self.variants.get(model).map(Vec::as_slice)
    }

    /// SR Linux hardware variants
    pub fn srlinux() -> Self {
        // ixrd3l: 2x 10G followed by 32x 100G
        let ixrd3l = (1..=34)
            .map(|port| InterfaceSpec::new(format!("e1-{port}"), if port <= 2 { "10G" } else { "100G" }))
            .collect();
        Self::new().with_variant("ixrd3l", ixrd3l)
    }

    /// SR OS hardware variants
    pub fn sros() -> Self {
        let sr1 = (1..=6)
            .map(|port| InterfaceSpec::new(format!("e1-{port}"), "100G"))
            .collect();
        Self::new().with_variant("sr-1", sr1)
    }
}
