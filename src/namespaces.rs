//! XML namespace handling
//!
//! This module provides utilities for working with XML namespaces,
//! qualified names (QNames), and namespace prefix mappings.

use crate::error::{Error, Result};
use crate::names::{split_qname, validate_ncname};
use crate::{XML_NAMESPACE, XSD_NAMESPACE, XSI_NAMESPACE};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Prefixes bound by convention when no declaration is in scope
pub const WELL_KNOWN_PREFIXES: &[(&str, &str)] = &[("xs", XSD_NAMESPACE), ("xsi", XSI_NAMESPACE)];

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Parse James Clark notation (`{uri}local`); plain names have no namespace
    pub fn from_clark(name: &str) -> Self {
        if let Some(rest) = name.strip_prefix('{') {
            if let Some((ns, local)) = rest.split_once('}') {
                let namespace = if ns.is_empty() { None } else { Some(ns.to_string()) };
                return Self {
                    namespace,
                    local_name: local.to_string(),
                };
            }
        }
        Self::local(name)
    }

    /// Get the namespace as a string slice
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Check if this name lives in the XML Schema namespace
    pub fn is_xsd(&self) -> bool {
        self.namespace.as_deref() == Some(XSD_NAMESPACE)
    }

    /// Same local name moved into another namespace
    pub fn with_namespace(&self, namespace: Option<&str>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local_name: self.local_name.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: IndexMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Builder form of [`add_prefix`](Self::add_prefix)
    pub fn with_prefix(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.add_prefix(prefix, namespace);
        self
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        let namespace = namespace.into();
        self.default_namespace = if namespace.is_empty() { None } else { Some(namespace) };
    }

    /// Remove the default namespace binding
    pub fn clear_default_namespace(&mut self) {
        self.default_namespace = None;
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Find a prefix bound to a namespace, most recent binding first
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        if namespace == XML_NAMESPACE {
            return Some("xml");
        }
        self.prefixes
            .iter()
            .rev()
            .find(|(_, uri)| uri.as_str() == namespace)
            .map(|(prefix, _)| prefix.as_str())
    }

    /// Iterate over the prefix bindings in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Number of prefix bindings, not counting the default namespace
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Check if no prefix or default namespace is bound
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.default_namespace.is_none()
    }

    /// Merge another context into this one; bindings from `other` win
    pub fn merge(&mut self, other: &NamespaceContext) {
        for (prefix, uri) in &other.prefixes {
            self.prefixes.insert(prefix.clone(), uri.clone());
        }
        if other.default_namespace.is_some() {
            self.default_namespace = other.default_namespace.clone();
        }
    }

    /// Resolve a prefixed name to a QName
    ///
    /// Names already in Clark notation are returned unchanged, unprefixed
    /// names take the default namespace.
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if prefixed_name.starts_with('{') {
            return Ok(QName::from_clark(prefixed_name));
        }
        let (prefix, local) = split_qname(prefixed_name.trim());
        validate_ncname(local)?;
        match prefix {
            Some(prefix) => {
                let namespace = self.get_namespace(prefix).ok_or_else(|| {
                    Error::SchemaResolution(format!("Unknown prefix: {}", prefix))
                })?;
                Ok(QName::namespaced(namespace, local))
            }
            None => Ok(QName::new(self.default_namespace.clone(), local)),
        }
    }

    /// Resolve a declaration name: unprefixed names go to the target namespace
    pub fn resolve_in_target(&self, name: &str, target_namespace: Option<&str>) -> Result<QName> {
        if name.starts_with('{') || name.contains(':') {
            return self.resolve(name);
        }
        Ok(QName::new(target_namespace, name))
    }

    /// Resolve a QName reference found in a schema attribute value
    ///
    /// Unprefixed references take the default namespace and fall back to the
    /// target namespace when no default namespace is declared.
    pub fn resolve_reference(&self, name: &str, target_namespace: Option<&str>) -> Result<QName> {
        if name.starts_with('{') || name.contains(':') {
            return self.resolve(name);
        }
        match self.default_namespace.as_deref() {
            Some(ns) => Ok(QName::namespaced(ns, name)),
            None => Ok(QName::new(target_namespace, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.namespace, Some("http://example.com".to_string()));
        assert_eq!(qname.local_name, "element");
    }

    #[test]
    fn test_qname_display_and_clark() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");
        assert_eq!(QName::from_clark("{http://example.com}element"), qname);

        let qname_local = QName::local("element");
        assert_eq!(qname_local.to_string(), "element");
        assert_eq!(QName::from_clark("element"), qname_local);
    }

    #[test]
    fn test_namespace_context() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("xs", XSD_NAMESPACE);
        ctx.set_default_namespace("http://example.com");

        assert_eq!(ctx.get_namespace("xs"), Some(XSD_NAMESPACE));
        assert_eq!(ctx.get_namespace("xml"), Some(XML_NAMESPACE));
        assert_eq!(ctx.get_default_namespace(), Some("http://example.com"));
        assert_eq!(ctx.prefix_for(XSD_NAMESPACE), Some("xs"));
    }

    #[test]
    fn test_resolve_prefixed_name() {
        let ctx = NamespaceContext::new().with_prefix("xs", XSD_NAMESPACE);

        let qname = ctx.resolve("xs:element").unwrap();
        assert!(qname.is_xsd());
        assert_eq!(qname.local_name, "element");

        assert!(matches!(
            ctx.resolve("nope:element"),
            Err(Error::SchemaResolution(_))
        ));
        assert!(matches!(ctx.resolve("xs:1st"), Err(Error::Name(_))));
    }

    #[test]
    fn test_resolve_reference_falls_back_to_target() {
        let mut ctx = NamespaceContext::new();
        let q = ctx.resolve_reference("Person", Some("urn:t")).unwrap();
        assert_eq!(q, QName::namespaced("urn:t", "Person"));

        ctx.set_default_namespace("urn:d");
        let q = ctx.resolve_reference("Person", Some("urn:t")).unwrap();
        assert_eq!(q, QName::namespaced("urn:d", "Person"));

        let q = ctx.resolve_in_target("Person", None).unwrap();
        assert_eq!(q, QName::local("Person"));
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut a = NamespaceContext::new().with_prefix("t", "urn:a");
        let b = NamespaceContext::new().with_prefix("t", "urn:b").with_prefix("u", "urn:u");
        a.merge(&b);
        assert_eq!(a.get_namespace("t"), Some("urn:b"));
        assert_eq!(a.len(), 2);
    }
}
