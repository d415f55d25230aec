//! Per-namespace schema document store

use super::validation::{OnError, StructuralValidator};
use super::{LoadOptions, SchemaSource};
use crate::builders::BaseClass;
use crate::documents::Element;
use crate::error::{Error, Result, ValidationLog};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::locations::Location;
use crate::namespaces::{NamespaceContext, QName};
use once_cell::sync::OnceCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Prefix reserved for the target namespace in WSDL documents
const TNS_PREFIX: &str = "tns";

/// Loaded documents of one target namespace
#[derive(Debug)]
struct SchemaEntry {
    /// Retained schema tree, includes and fragments spliced in
    root: Element,
    /// complexType and simpleType declarations
    types: HashMap<String, Arc<Element>>,
    /// Top-level element declarations
    elements: HashMap<String, Arc<Element>>,
    /// Model group declarations
    groups: HashMap<String, Arc<Element>>,
    /// Attribute group declarations
    attribute_groups: HashMap<String, Arc<Element>>,
    /// Structural validator, built on first use
    validator: OnceCell<Arc<StructuralValidator>>,
    /// Base type strategy for the namespace
    base_class: Option<Arc<dyn BaseClass>>,
}

impl SchemaEntry {
    fn new(root: Element, base_class: Option<Arc<dyn BaseClass>>) -> Self {
        let mut entry = Self {
            root: Element::new(root.qname.clone()),
            types: HashMap::new(),
            elements: HashMap::new(),
            groups: HashMap::new(),
            attribute_groups: HashMap::new(),
            validator: OnceCell::new(),
            base_class,
        };
        entry.index(&root);
        entry.root = root;
        entry
    }

    /// Index the first-level declarations of `root`; later names win
    fn index(&mut self, root: &Element) {
        for child in &root.children {
            if !child.qname.is_xsd() {
                continue;
            }
            let Some(name) = child.attr("name") else {
                continue;
            };
            let map = match child.local_name() {
                "complexType" | "simpleType" => &mut self.types,
                "element" => &mut self.elements,
                "group" => &mut self.groups,
                "attributeGroup" => &mut self.attribute_groups,
                _ => continue,
            };
            map.insert(name.to_string(), Arc::new(child.clone()));
        }
    }

    /// Merge a fragment of the same namespace, preferring its values
    fn merge(&mut self, fragment: Element) {
        self.index(&fragment);
        for (qname, value) in fragment.attributes {
            self.root.set_attribute(qname, value);
        }
        self.root.namespaces.merge(&fragment.namespaces);
        self.root.children.extend(fragment.children);
        self.validator = OnceCell::new();
    }
}

/// Registry of loaded schema documents keyed by target namespace
///
/// Loading needs exclusive access; once populated the registry is shared
/// read-only (usually behind an `Arc`) by compilers and validators.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    loader: Loader,
    schemas: HashMap<Option<String>, SchemaEntry>,
    /// Prefix bindings collected from every loaded document
    namespaces: NamespaceContext,
    /// Namespace to prefix, last binding wins
    reverse: HashMap<String, String>,
    /// Declaration lookups served so far
    lookups: AtomicUsize,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom loader
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// Set the limits of the loader
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.loader = self.loader.with_limits(limits);
        self
    }

    /// Limits applied while loading
    pub fn limits(&self) -> &Limits {
        self.loader.limits()
    }

    /// Load a schema document and everything it includes or imports
    ///
    /// Returns the target namespace of the document. A namespace that is
    /// already loaded is returned as is, unless `force` or `fragment` is set.
    pub fn load(
        &mut self,
        source: impl Into<SchemaSource>,
        options: &LoadOptions,
    ) -> Result<Option<String>> {
        self.load_at_depth(source.into(), options, 0)
    }

    fn load_at_depth(
        &mut self,
        source: SchemaSource,
        options: &LoadOptions,
        depth: usize,
    ) -> Result<Option<String>> {
        self.loader.limits().check_include_depth(depth)?;

        let (mut root, base) = match source {
            SchemaSource::Location(location) => {
                let location = Location::join(&options.path_context, &location)?;
                debug!(location = %location.as_str(), "loading schema");
                let root = self.loader.load_element(&location)?;
                let base = match location {
                    Location::String(_) => options.path_context.clone(),
                    other => other.as_str(),
                };
                (root, base)
            }
            SchemaSource::Document(root) => (root, options.path_context.clone()),
        };

        if !root.is_xsd("schema") {
            return Err(Error::InvalidSchema(format!(
                "expected an xs:schema document, found {}",
                root.qname
            )));
        }

        let namespace = root.attr("targetNamespace").map(str::to_string);
        let loaded = self.schemas.contains_key(&namespace);
        if loaded && !options.force && !options.fragment {
            debug!(namespace = ?namespace, "schema already loaded");
            return Ok(namespace);
        }

        self.process_includes(&mut root, &base)?;
        self.register_prefixes(&root.namespaces);

        let imports: Vec<String> = root
            .children
            .iter()
            .filter(|c| c.is_xsd("import"))
            .filter_map(|c| c.attr("schemaLocation").map(str::to_string))
            .collect();

        if loaded && options.fragment {
            debug!(namespace = ?namespace, "merging schema fragment");
            if let Some(entry) = self.schemas.get_mut(&namespace) {
                entry.merge(root);
            }
        } else {
            self.schemas.insert(
                namespace.clone(),
                SchemaEntry::new(root, options.base_class.clone()),
            );
        }

        let import_options = LoadOptions::new().with_path_context(base);
        for location in imports {
            debug!(%location, "importing schema");
            self.load_at_depth(SchemaSource::Location(location), &import_options, depth + 1)?;
        }

        Ok(namespace)
    }

    /// Splice the top-level children of every `xs:include` into `root`
    fn process_includes(&self, root: &mut Element, base: &str) -> Result<()> {
        let mut seen: HashSet<String> = HashSet::new();
        loop {
            let (includes, rest): (Vec<Element>, Vec<Element>) = std::mem::take(&mut root.children)
                .into_iter()
                .partition(|c| c.is_xsd("include"));
            root.children = rest;
            if includes.is_empty() {
                return Ok(());
            }

            for include in includes {
                let Some(location) = include.attr("schemaLocation") else {
                    continue;
                };
                let location = Location::join(base, location)?;
                let key = location.as_str();
                if !seen.insert(key.clone()) {
                    debug!(location = %key, "skipping duplicate include");
                    continue;
                }
                debug!(location = %key, "including schema");
                let included = self.loader.load_element(&location)?;
                for mut child in included.children {
                    // Nested locations are relative to the included document
                    if child.is_xsd("include") || child.is_xsd("import") {
                        if let Some(nested) = child.attr("schemaLocation") {
                            let joined = Location::join(&key, nested)?.as_str();
                            child.set_attribute(QName::local("schemaLocation"), joined);
                        }
                    }
                    root.add_child(child);
                }
            }
        }
    }

    fn register_prefixes(&mut self, namespaces: &NamespaceContext) {
        for (prefix, uri) in namespaces.iter() {
            if prefix == TNS_PREFIX {
                continue;
            }
            self.namespaces.add_prefix(prefix, uri);
            self.reverse.insert(uri.to_string(), prefix.to_string());
        }
    }

    fn entry(&self, namespace: Option<&str>) -> Result<&SchemaEntry> {
        self.schemas
            .get(&namespace.map(str::to_string))
            .ok_or_else(|| {
                Error::SchemaResolution(format!(
                    "namespace '{}' is not loaded",
                    namespace.unwrap_or("")
                ))
            })
    }

    /// Check if a target namespace is loaded
    pub fn contains(&self, namespace: Option<&str>) -> bool {
        self.schemas.contains_key(&namespace.map(str::to_string))
    }

    /// Loaded target namespaces
    pub fn target_namespaces(&self) -> impl Iterator<Item = Option<&str>> {
        self.schemas.keys().map(|k| k.as_deref())
    }

    /// Retained schema tree of a namespace
    pub fn schema_root(&self, namespace: Option<&str>) -> Option<&Element> {
        self.entry(namespace).ok().map(|e| &e.root)
    }

    /// Type declaration (complexType or simpleType) named `qname`
    pub fn type_decl(&self, qname: &QName) -> Result<Option<Arc<Element>>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let entry = self.entry(qname.namespace())?;
        Ok(entry.types.get(&qname.local_name).cloned())
    }

    /// Top-level element declaration named `qname`
    pub fn element_decl(&self, qname: &QName) -> Result<Option<Arc<Element>>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let entry = self.entry(qname.namespace())?;
        Ok(entry.elements.get(&qname.local_name).cloned())
    }

    /// Model group declaration named `qname`; a miss is an error
    pub fn group_decl(&self, qname: &QName) -> Result<Arc<Element>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let entry = self.entry(qname.namespace())?;
        entry
            .groups
            .get(&qname.local_name)
            .cloned()
            .ok_or_else(|| Error::SchemaResolution(format!("no such group: {}", qname)))
    }

    /// Attribute group declaration named `qname`; a miss is an error
    pub fn attribute_group_decl(&self, qname: &QName) -> Result<Arc<Element>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let entry = self.entry(qname.namespace())?;
        entry
            .attribute_groups
            .get(&qname.local_name)
            .cloned()
            .ok_or_else(|| Error::SchemaResolution(format!("no such attribute group: {}", qname)))
    }

    /// Base type strategy registered for the namespace of `qname`
    pub fn base_class(&self, qname: &QName) -> Option<Arc<dyn BaseClass>> {
        self.entry(qname.namespace())
            .ok()
            .and_then(|e| e.base_class.clone())
    }

    /// Prefix bindings collected from every loaded document
    pub fn namespaces(&self) -> &NamespaceContext {
        &self.namespaces
    }

    /// Prefix bound to `namespace` by a loaded document
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.reverse.get(namespace).map(String::as_str)
    }

    /// Number of declaration lookups served so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Check `elem` against the schema of its namespace
    ///
    /// Returns `None` for a valid element. Otherwise `Raise` fails with the
    /// first error, `Log` reports the errors through `tracing` and returns
    /// them, `Pass` only returns them.
    pub fn validate(&self, elem: &Element, on_error: OnError) -> Result<Option<ValidationLog>> {
        let entry = self.entry(elem.namespace())?;
        let validator = entry
            .validator
            .get_or_init(|| Arc::new(StructuralValidator::new(&entry.root)));
        let log = validator.validate(elem);
        if log.is_empty() {
            return Ok(None);
        }
        match on_error {
            OnError::Raise => Err(Error::Validation(log.into_error())),
            OnError::Log => {
                error!(element = %elem.qname, "validation failed:\n{}", log);
                Ok(Some(log))
            }
            OnError::Pass => Ok(Some(log)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;

    const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:p="urn:people" targetNamespace="urn:people">
      <xs:complexType name="Person">
        <xs:sequence><xs:element name="name" type="xs:string"/></xs:sequence>
      </xs:complexType>
      <xs:element name="person" type="p:Person"/>
      <xs:group name="Extra"><xs:sequence/></xs:group>
    </xs:schema>"#;

    fn root(xml: &str) -> Element {
        Document::from_string(xml).unwrap().root.unwrap()
    }

    #[test]
    fn test_load_document_and_lookup() {
        let mut registry = SchemaRegistry::new();
        let ns = registry.load(root(SCHEMA), &LoadOptions::new()).unwrap();
        assert_eq!(ns.as_deref(), Some("urn:people"));

        let person = QName::namespaced("urn:people", "Person");
        assert!(registry.type_decl(&person).unwrap().is_some());
        assert!(registry
            .element_decl(&QName::namespaced("urn:people", "person"))
            .unwrap()
            .is_some());
        assert!(registry
            .type_decl(&QName::namespaced("urn:people", "Nobody"))
            .unwrap()
            .is_none());
        assert!(registry.group_decl(&QName::namespaced("urn:people", "Extra")).is_ok());
        assert!(matches!(
            registry.group_decl(&QName::namespaced("urn:people", "Missing")),
            Err(Error::SchemaResolution(_))
        ));
        assert!(matches!(
            registry.type_decl(&QName::namespaced("urn:other", "Person")),
            Err(Error::SchemaResolution(_))
        ));
        assert_eq!(registry.lookup_count(), 6);
    }

    #[test]
    fn test_prefix_maps() {
        let mut registry = SchemaRegistry::new();
        registry.load(root(SCHEMA), &LoadOptions::new()).unwrap();
        assert_eq!(registry.prefix_for("urn:people"), Some("p"));
        assert_eq!(registry.namespaces().get_namespace("p"), Some("urn:people"));
    }

    #[test]
    fn test_load_is_idempotent() {
        let mut registry = SchemaRegistry::new();
        registry.load(root(SCHEMA), &LoadOptions::new()).unwrap();
        let other = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            targetNamespace="urn:people"><xs:complexType name="Late"/></xs:schema>"#;
        registry.load(root(other), &LoadOptions::new()).unwrap();
        assert!(registry
            .type_decl(&QName::namespaced("urn:people", "Late"))
            .unwrap()
            .is_none());

        registry
            .load(root(other), &LoadOptions::new().with_fragment(true))
            .unwrap();
        assert!(registry
            .type_decl(&QName::namespaced("urn:people", "Late"))
            .unwrap()
            .is_some());
        assert!(registry
            .type_decl(&QName::namespaced("urn:people", "Person"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_rejects_non_schema_root() {
        let mut registry = SchemaRegistry::new();
        let result = registry.load(root("<foo/>"), &LoadOptions::new());
        assert!(matches!(result, Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_validate_policies() {
        let mut registry = SchemaRegistry::new();
        registry.load(root(SCHEMA), &LoadOptions::new()).unwrap();

        let good = root(r#"<p:person xmlns:p="urn:people"><name>Ada</name></p:person>"#);
        assert!(registry.validate(&good, OnError::Raise).unwrap().is_none());

        let bad = root(r#"<p:person xmlns:p="urn:people"><age>3</age></p:person>"#);
        assert!(matches!(
            registry.validate(&bad, OnError::Raise),
            Err(Error::Validation(_))
        ));
        let log = registry.validate(&bad, OnError::Pass).unwrap().unwrap();
        assert_eq!(log.len(), 2);
        assert!(registry.validate(&bad, OnError::Log).unwrap().is_some());
    }
}
