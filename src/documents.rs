//! XML document handling
//!
//! This module provides an owned, namespace-resolved element tree. Element
//! and attribute names are [`QName`]s, attributes keep document order and
//! every element remembers the namespace bindings in scope where it was
//! parsed, so QName-valued content (`xsi:type`, schema `type=` references)
//! can be resolved later. Comments and processing instructions are dropped.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName, WELL_KNOWN_PREFIXES};
use crate::XSI_NAMESPACE;
use indexmap::IndexMap;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt;

/// An element with its attributes, text and children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element qualified name
    pub qname: QName,
    /// Element attributes, in document order
    pub attributes: IndexMap<QName, String>,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
    /// Namespace bindings in scope for this element
    pub namespaces: NamespaceContext,
}

impl Element {
    /// Element without attributes or children
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Set the namespace bindings of this element
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Local part of the element name
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Namespace of the element name
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Check for an XML Schema declaration with the given local name
    pub fn is_xsd(&self, local_name: &str) -> bool {
        self.qname.is_xsd() && self.qname.local_name == local_name
    }

    /// Get an attribute value by local name, ignoring its namespace
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Get an unqualified attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.namespace.is_none() && qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value by qualified name
    pub fn get_attribute_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes.get(qname).map(|s| s.as_str())
    }

    /// Set an attribute value
    pub fn set_attribute(&mut self, qname: QName, value: impl Into<String>) {
        self.attributes.insert(qname, value.into());
    }

    /// Remove an attribute, keeping the order of the others
    pub fn remove_attribute(&mut self, qname: &QName) -> Option<String> {
        self.attributes.shift_remove(qname)
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Replace the text content
    pub fn set_text(&mut self, text: String) {
        self.text = Some(text);
    }

    /// Get the text content
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Check if the element has child elements
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Children with the given local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.children
            .iter()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }

    /// Find child elements by qualified name
    pub fn find_all(&self, qname: &QName) -> Vec<&Element> {
        self.children.iter().filter(|e| &e.qname == qname).collect()
    }

    /// Find the first child element with a qualified name
    pub fn find(&self, qname: &QName) -> Option<&Element> {
        self.children.iter().find(|e| &e.qname == qname)
    }

    /// Bind a prefix on this element; an empty prefix sets the default namespace
    pub fn declare_namespace(&mut self, prefix: &str, namespace: &str) {
        if prefix.is_empty() {
            self.namespaces.set_default_namespace(namespace);
        } else {
            self.namespaces.add_prefix(prefix, namespace);
        }
    }

    /// Return a prefix bound to `namespace`, binding a new one if needed
    pub fn ensure_prefix(&mut self, namespace: &str, preferred: Option<&str>) -> String {
        if let Some(prefix) = self.namespaces.prefix_for(namespace) {
            return prefix.to_string();
        }
        let prefix = choose_prefix(namespace, preferred, &self.namespaces);
        self.namespaces.add_prefix(prefix.clone(), namespace);
        prefix
    }

    /// Raw `xsi:type` attribute value
    pub fn xsi_type(&self) -> Option<&str> {
        self.attributes
            .get(&QName::namespaced(XSI_NAMESPACE, "type"))
            .map(|s| s.as_str())
    }

    /// Check for `xsi:nil="true"`
    pub fn is_nil(&self) -> bool {
        self.attributes
            .get(&QName::namespaced(XSI_NAMESPACE, "nil"))
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    /// Serialize the element tree to a compact XML string
    pub fn to_xml_string(&self) -> Result<String> {
        self.serialize(Writer::new(Vec::new()))
    }

    /// Serialize the element tree to an indented XML string
    pub fn to_pretty_string(&self) -> Result<String> {
        self.serialize(Writer::new_with_indent(Vec::new(), b' ', 2))
    }

    fn serialize(&self, mut writer: Writer<Vec<u8>>) -> Result<String> {
        self.write(&mut writer, &NamespaceContext::new())?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::Xml(format!("Serialized XML is not UTF-8: {}", e)))
    }

    fn write<W: std::io::Write>(
        &self,
        writer: &mut Writer<W>,
        parent_scope: &NamespaceContext,
    ) -> Result<()> {
        let mut scope = parent_scope.clone();
        let mut decls: IndexMap<String, String> = IndexMap::new();

        // Bindings carried by this element that the output does not have yet
        for (prefix, uri) in self.namespaces.iter() {
            if scope.get_namespace(prefix) != Some(uri) {
                scope.add_prefix(prefix, uri);
                decls.insert(format!("xmlns:{}", prefix), uri.to_string());
            }
        }
        if let Some(default) = self.namespaces.get_default_namespace() {
            if scope.get_default_namespace() != Some(default) {
                scope.set_default_namespace(default);
                decls.insert("xmlns".to_string(), default.to_string());
            }
        }

        let name = element_name(&self.qname, &mut scope, &mut decls, &self.namespaces);
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for (qname, value) in &self.attributes {
            let attr_name = attribute_name(qname, &mut scope, &mut decls, &self.namespaces);
            attributes.push((attr_name, value.as_str()));
        }

        let mut start = BytesStart::new(name.clone());
        for (key, value) in &decls {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        for (key, value) in &attributes {
            start.push_attribute((key.as_str(), *value));
        }

        if self.children.is_empty() && self.text.is_none() {
            writer.write_event(Event::Empty(start)).map_err(xml_error)?;
            return Ok(());
        }

        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        if let Some(ref text) = self.text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_error)?;
        }
        for child in &self.children {
            child.write(writer, &scope)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)?;
        Ok(())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let xml = self.to_xml_string().map_err(|_| fmt::Error)?;
        f.write_str(&xml)
    }
}

fn xml_error(e: quick_xml::Error) -> Error {
    Error::Xml(format!("Failed to write XML: {}", e))
}

fn choose_prefix(namespace: &str, preferred: Option<&str>, scope: &NamespaceContext) -> String {
    if let Some(p) = preferred {
        if !p.is_empty() && scope.get_namespace(p).is_none() {
            return p.to_string();
        }
    }
    for (prefix, uri) in WELL_KNOWN_PREFIXES {
        if *uri == namespace && scope.get_namespace(prefix).is_none() {
            return prefix.to_string();
        }
    }
    (0..)
        .map(|n| format!("ns{}", n))
        .find(|p| scope.get_namespace(p).is_none())
        .unwrap_or_else(|| "ns".to_string())
}

fn bind_prefix(
    namespace: &str,
    scope: &mut NamespaceContext,
    decls: &mut IndexMap<String, String>,
    own: &NamespaceContext,
) -> String {
    if let Some(prefix) = scope.prefix_for(namespace) {
        return prefix.to_string();
    }
    let prefix = choose_prefix(namespace, own.prefix_for(namespace), scope);
    scope.add_prefix(prefix.clone(), namespace);
    decls.insert(format!("xmlns:{}", prefix), namespace.to_string());
    prefix
}

fn element_name(
    qname: &QName,
    scope: &mut NamespaceContext,
    decls: &mut IndexMap<String, String>,
    own: &NamespaceContext,
) -> String {
    match qname.namespace.as_deref() {
        None => {
            if scope.get_default_namespace().is_some() {
                scope.clear_default_namespace();
                decls.insert("xmlns".to_string(), String::new());
            }
            qname.local_name.clone()
        }
        Some(ns) if scope.get_default_namespace() == Some(ns) => qname.local_name.clone(),
        Some(ns) => {
            let prefix = bind_prefix(ns, scope, decls, own);
            format!("{}:{}", prefix, qname.local_name)
        }
    }
}

fn attribute_name(
    qname: &QName,
    scope: &mut NamespaceContext,
    decls: &mut IndexMap<String, String>,
    own: &NamespaceContext,
) -> String {
    match qname.namespace.as_deref() {
        None => qname.local_name.clone(),
        Some(ns) => {
            let prefix = bind_prefix(ns, scope, decls, own);
            format!("{}:{}", prefix, qname.local_name)
        }
    }
}

/// A parsed XML document
#[derive(Debug, Default)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Document without a root
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Parse document text
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse document bytes under the default limits
    pub fn parse(xml: &[u8]) -> Result<Self> {
        Self::parse_with_limits(xml, &Limits::default())
    }

    /// Parse document bytes, enforcing `limits`
    pub fn parse_with_limits(xml: &[u8], limits: &Limits) -> Result<Self> {
        limits.check_size(xml.len())?;

        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut doc = Document::new();
        let mut element_stack: Vec<Element> = Vec::new();
        let mut buf = Vec::new();
        let root_scope = NamespaceContext::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let scope = element_stack.last().map(|p| &p.namespaces).unwrap_or(&root_scope);
                    let element = Self::parse_element(&e, scope, limits)?;
                    limits.check_depth(element_stack.len() + 1)?;
                    element_stack.push(element);
                }
                Ok(Event::End(_)) => {
                    if let Some(current) = element_stack.pop() {
                        if let Some(parent) = element_stack.last_mut() {
                            parent.add_child(current);
                        } else {
                            doc.root = Some(current);
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    let scope = element_stack.last().map(|p| &p.namespaces).unwrap_or(&root_scope);
                    let element = Self::parse_element(&e, scope, limits)?;
                    if let Some(parent) = element_stack.last_mut() {
                        parent.add_child(element);
                    } else {
                        doc.root = Some(element);
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?;
                        if !text.trim().is_empty() {
                            append_text(current, &text);
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        append_text(current, &String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {} // Comments, processing instructions, declarations
            }
            buf.clear();
        }

        if !element_stack.is_empty() {
            return Err(Error::Xml("Unexpected end of document".to_string()));
        }

        Ok(doc)
    }

    /// Parse element from BytesStart event, resolving names against the
    /// parent's bindings plus the element's own declarations
    fn parse_element(
        start: &BytesStart,
        parent_scope: &NamespaceContext,
        limits: &Limits,
    ) -> Result<Element> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
            .to_string();

        let mut namespaces = parent_scope.clone();
        let mut raw_attributes = Vec::new();

        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;

            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
                .to_string();

            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
                .to_string();

            if attr_name == "xmlns" {
                if attr_value.is_empty() {
                    namespaces.clear_default_namespace();
                } else {
                    namespaces.set_default_namespace(attr_value);
                }
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                namespaces.add_prefix(prefix, attr_value);
            } else {
                raw_attributes.push((attr_name, attr_value));
            }
        }
        limits.check_attributes(raw_attributes.len())?;

        let qname = resolve_name(&name, &namespaces, true)?;
        let mut element = Element::new(qname).with_namespaces(namespaces);
        for (attr_name, value) in raw_attributes {
            let attr_qname = resolve_name(&attr_name, &element.namespaces, false)?;
            element.attributes.insert(attr_qname, value);
        }

        Ok(element)
    }

    /// Root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Root element, mutably
    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.root.as_mut()
    }
}

fn append_text(element: &mut Element, text: &str) {
    match element.text {
        Some(ref mut existing) => existing.push_str(text),
        None => element.text = Some(text.to_string()),
    }
}

fn resolve_name(name: &str, scope: &NamespaceContext, use_default: bool) -> Result<QName> {
    match name.split_once(':') {
        Some((prefix, local)) => {
            let namespace = scope
                .get_namespace(prefix)
                .ok_or_else(|| Error::Xml(format!("Undeclared namespace prefix '{}'", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        }
        None if use_default => Ok(QName::new(
            scope.get_default_namespace().map(str::to_string),
            name,
        )),
        None => Ok(QName::local(name)),
    }
}
