//! Structured, hierarchical descriptions for introspection and printing.
//!
//! `describe()` on the context, registry, provider store, and every I/O
//! instance produces a [`Descriptor`] tree. Description is a pure read-only
//! projection; it never mutates the described object.

use core::fmt;

/// One node in a description tree.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    /// Category tag, e.g. "CONTEXT", "REGISTRY", "OUT", "IN".
    pub category: String,
    /// Display name of the described object.
    pub name: String,
    /// Identifier of the described object, when it has one.
    pub id: Option<String>,
    /// Element count for container nodes.
    pub quantity: Option<usize>,
    /// Nested child descriptions.
    pub children: Vec<Descriptor>,
}

impl Descriptor {
    /// New descriptor with the given category and name.
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the described object's id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the element count.
    pub fn quantity(mut self, quantity: usize) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Append a child description.
    pub fn add(&mut self, child: Descriptor) -> &mut Self {
        self.children.push(child);
        self
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            write!(f, "  ")?;
        }
        write!(f, "{}: {}", self.category, self.name)?;
        if let Some(id) = &self.id {
            write!(f, " [{id}]")?;
        }
        if let Some(quantity) = self.quantity {
            write!(f, " ({quantity})")?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
