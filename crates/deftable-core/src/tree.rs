//! Output tree: an append-only element hierarchy with ordered attributes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Element>,
}

/// The finished document handed to a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub root: Element,
}

/// Accumulates a node's attributes in insertion order and drops empty values.
///
/// Setting a name twice overwrites the earlier value in place.
#[derive(Debug, Default)]
pub struct AttrBuilder {
    attrs: Vec<Attribute>,
}

impl AttrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.insert(name, value.as_ref());
        self
    }

    pub fn set_opt(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            self.insert(name, v);
        }
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => self.attrs.push(Attribute {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn build(self) -> Vec<Attribute> {
        self.attrs
    }
}

impl Element {
    pub fn new(name: impl Into<String>, attrs: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            attrs,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Element>) -> Self {
        self.children = children;
        self
    }

    /// Append a child. Existing children are never reordered or removed.
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn attr_names(&self) -> Vec<&str> {
        self.attrs.iter().map(|a| a.name.as_str()).collect()
    }

    /// First child with the given element name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn groups(&self) -> impl Iterator<Item = &Element> {
        self.root.children_named(crate::builder::GROUP_TAG)
    }

    /// Every job node in document order, whether grouped or not.
    pub fn jobs(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        for child in &self.root.children {
            if child.name == crate::builder::JOB_TAG {
                out.push(child);
            } else {
                out.extend(child.children_named(crate::builder::JOB_TAG));
            }
        }
        out
    }
}
