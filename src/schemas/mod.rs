//! Schema registry
//!
//! Loads XSD documents, follows `include` and `import`, and indexes the
//! top-level declarations of every target namespace. The compiler reads
//! declarations from here; instance documents can be checked against a
//! namespace with the lazily built structural validator.

mod registry;
mod validation;

pub use registry::SchemaRegistry;
pub use validation::{OnError, StructuralValidator};

use crate::builders::BaseClass;
use crate::documents::Element;
use std::path::Path;
use std::sync::Arc;

/// Where a schema document comes from
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// Path, URL or in-memory text, resolved against the load path context
    Location(String),
    /// Already parsed `xs:schema` element
    Document(Element),
}

impl From<&str> for SchemaSource {
    fn from(location: &str) -> Self {
        SchemaSource::Location(location.to_string())
    }
}

impl From<String> for SchemaSource {
    fn from(location: String) -> Self {
        SchemaSource::Location(location)
    }
}

impl From<&Path> for SchemaSource {
    fn from(path: &Path) -> Self {
        SchemaSource::Location(path.to_string_lossy().to_string())
    }
}

impl From<Element> for SchemaSource {
    fn from(root: Element) -> Self {
        SchemaSource::Document(root)
    }
}

/// Options of [`SchemaRegistry::load`]
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Reload a namespace that is already present
    pub force: bool,
    /// Merge the document into the namespace it declares
    pub fragment: bool,
    /// Location relative schema locations are resolved against
    pub path_context: String,
    /// Base type strategy for the types of the loaded namespace
    pub base_class: Option<Arc<dyn BaseClass>>,
}

impl LoadOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the force flag
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set the fragment flag
    pub fn with_fragment(mut self, fragment: bool) -> Self {
        self.fragment = fragment;
        self
    }

    /// Set the path context
    pub fn with_path_context(mut self, path_context: impl Into<String>) -> Self {
        self.path_context = path_context.into();
        self
    }

    /// Set the base type strategy
    pub fn with_base_class(mut self, base_class: Arc<dyn BaseClass>) -> Self {
        self.base_class = Some(base_class);
        self
    }
}
