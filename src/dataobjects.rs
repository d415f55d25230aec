//! Generic object model
//!
//! A [`Record`] is an insertion-ordered mapping from field name to
//! [`Value`]. Typed instances produced by the marshaling engine are records
//! tagged with their schema type name; untyped records are built directly
//! from XML with the schema-less rules implemented here:
//!
//! - attributes become fields named with the [`ATTRIBUTE_MARKER`] prefix
//!   followed by the attribute name (Clark notation when qualified);
//! - children in the record's namespace (or in none) are named by their
//!   local name, children from other namespaces by their Clark name;
//! - a child with children or attributes becomes a nested record, otherwise
//!   its text;
//! - a repeated child name promotes the field to a list;
//! - an element with text but no children becomes a property object whose
//!   [`PROPERTY_FIELD`] holds the text.
//!
//! [`ATTRIBUTE_MARKER`]: crate::names::ATTRIBUTE_MARKER

use crate::documents::Element;
use crate::names::{attribute_field, attribute_name, PROPERTY_FIELD};
use crate::namespaces::QName;
use crate::values::Value;
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::ops::Index;

const INDENT: usize = 4;

/// Ordered, namespace-aware dynamic record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
    type_name: Option<QName>,
    namespace: Option<String>,
    property: Option<String>,
}

impl Record {
    /// Create an empty untyped record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record tagged with a schema type
    pub fn typed(type_name: QName) -> Self {
        Self {
            namespace: type_name.namespace.clone(),
            type_name: Some(type_name),
            ..Self::default()
        }
    }

    /// Create a property object holding `value` as its text content
    pub fn property_value(value: impl Into<Value>) -> Self {
        let mut record = Self::new();
        record.property = Some(PROPERTY_FIELD.to_string());
        record.set(PROPERTY_FIELD, value);
        record
    }

    /// Build a record from key/value pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::new();
        for (key, value) in pairs {
            record.set(key, value);
        }
        record
    }

    /// Build an untyped record in the namespace of an XML element
    pub fn from_xml(elem: &Element) -> Self {
        let mut record = Self {
            namespace: elem.namespace().map(str::to_string),
            ..Self::default()
        };
        record.fill_from_xml(elem, &[]);
        record
    }

    /// Set the namespace used to qualify child element names on output
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Schema type of a typed record
    pub fn type_name(&self) -> Option<&QName> {
        self.type_name.as_ref()
    }

    /// Retag the record with another schema type
    pub fn set_type_name(&mut self, type_name: Option<QName>) {
        self.namespace = type_name
            .as_ref()
            .and_then(|q| q.namespace.clone())
            .or_else(|| self.namespace.take());
        self.type_name = type_name;
    }

    /// Namespace of the record
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Name of the field holding the text content, for property objects
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    /// Mark `name` as the field holding the text content
    pub fn set_property(&mut self, name: Option<String>) {
        self.property = name;
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a field value mutably
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    /// Get a field by position
    pub fn get_index(&self, index: usize) -> Option<(&str, &Value)> {
        self.fields.get_index(index).map(|(k, v)| (k.as_str(), v))
    }

    /// Set a field; an existing field keeps its position
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Remove a field, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    /// Check if a field is set
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if no field is set
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Delete all fields
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Import attributes and children of `elem`, skipping names in `ignore`
    ///
    /// Attribute names in `ignore` carry the attribute marker, child names
    /// are local or Clark names.
    pub fn fill_from_xml(&mut self, elem: &Element, ignore: &[String]) {
        for (qname, value) in &elem.attributes {
            let key = attribute_field(&qname.to_string());
            if ignore.contains(&key) {
                continue;
            }
            self.set(key, value.as_str());
        }

        if elem.has_children() {
            for child in &elem.children {
                let tag = match child.namespace() {
                    Some(ns) if Some(ns) != self.namespace.as_deref() => child.qname.to_string(),
                    _ => child.local_name().to_string(),
                };
                if ignore.iter().any(|i| *i == tag || i == child.local_name()) {
                    continue;
                }
                let value = if child.has_children() || !child.attributes.is_empty() {
                    Value::Record(Record::from_xml(child))
                } else {
                    Value::from(child.text.clone())
                };
                self.push_repeated(&tag, value);
            }
        } else if let Some(ref text) = elem.text {
            self.property = Some(PROPERTY_FIELD.to_string());
            self.set(PROPERTY_FIELD, text.as_str());
        }
    }

    fn push_repeated(&mut self, name: &str, value: Value) {
        match self.fields.get_mut(name) {
            None | Some(Value::Null) => self.set(name, value),
            Some(Value::List(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::take(existing);
                *existing = Value::List(vec![first, value]);
            }
        }
    }

    /// Serialize the record schema-less as an element named `tag`
    ///
    /// Without a tag, the record's type name (or `Record`) is used.
    pub fn to_xml(&self, tag: Option<&str>) -> Element {
        let tag = tag
            .map(str::to_string)
            .or_else(|| self.type_name.as_ref().map(|q| q.local_name.clone()))
            .unwrap_or_else(|| "Record".to_string());
        let mut node = Element::new(self.qualify(&tag));
        self.write_fields(&mut node, &[]);
        node
    }

    /// Write fields onto `node` with the schema-less conventions, skipping
    /// the names in `ignore`
    pub fn write_fields(&self, node: &mut Element, ignore: &[String]) {
        for (key, value) in &self.fields {
            if ignore.contains(key) {
                continue;
            }
            if let Some(attr) = attribute_name(key) {
                node.set_attribute(QName::from_clark(attr), value.to_text().unwrap_or_default());
                continue;
            }
            if self.property.as_deref() == Some(key.as_str()) {
                node.text = value.to_text();
                continue;
            }
            let name = self.qualify(key);
            let items: &[Value] = match value {
                Value::List(items) => items,
                single => std::slice::from_ref(single),
            };
            for item in items {
                match item {
                    Value::Record(record) => node.add_child(record.to_xml(Some(key))),
                    Value::Element(elem) => node.add_child(elem.clone()),
                    other => {
                        let mut child = Element::new(name.clone());
                        child.text = other.to_text();
                        node.add_child(child);
                    }
                }
            }
        }
    }

    fn qualify(&self, name: &str) -> QName {
        if name.starts_with('{') {
            QName::from_clark(name)
        } else {
            QName::new(self.namespace.clone(), name)
        }
    }

    /// Export as a JSON object
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        JsonValue::Object(map)
    }

    fn write_pretty(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let name = self
            .type_name
            .as_ref()
            .map(|q| q.local_name.as_str())
            .unwrap_or("Record");
        write!(f, "{}(", name)?;
        if self.fields.is_empty() {
            return write!(f, ")");
        }
        writeln!(f)?;
        for (key, value) in &self.fields {
            write!(f, "{:width$}{}=", "", key, width = (indent + 1) * INDENT)?;
            write_pretty_value(f, value, indent + 1)?;
            writeln!(f, ",")?;
        }
        write!(f, "{:width$})", "", width = indent * INDENT)
    }
}

fn write_pretty_value(f: &mut fmt::Formatter<'_>, value: &Value, indent: usize) -> fmt::Result {
    match value {
        Value::Record(record) => record.write_pretty(f, indent),
        Value::List(items) => {
            write!(f, "[")?;
            if items.is_empty() {
                return write!(f, "]");
            }
            writeln!(f)?;
            for item in items {
                write!(f, "{:width$}", "", width = (indent + 1) * INDENT)?;
                write_pretty_value(f, item, indent + 1)?;
                writeln!(f, ",")?;
            }
            write!(f, "{:width$}]", "", width = indent * INDENT)
        }
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_pretty(f, 0)
    }
}

/// Field access by name
///
/// Panics when the field is not set; use [`Record::get`] for a lookup that
/// may miss.
impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        match self.fields.get(name) {
            Some(value) => value,
            None => panic!("no field named '{}'", name),
        }
    }
}

/// Field access by position
///
/// Panics when `index` is out of range; use [`Record::get_index`] instead
/// when it may be.
impl Index<usize> for Record {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.fields[index]
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;

    fn parse(xml: &str) -> Element {
        Document::from_string(xml).unwrap().root.unwrap()
    }

    #[test]
    fn test_ordered_access() {
        let mut rec = Record::from_pairs([("b", 2), ("a", 1)]);
        rec.set("c", "x");
        assert_eq!(rec.len(), 3);
        assert_eq!(rec[0], Value::from(2));
        assert_eq!(rec["a"], Value::from(1));
        assert_eq!(rec.get_index(2), Some(("c", &Value::from("x"))));
        assert!(rec.contains("b"));

        rec.set("b", 5);
        assert_eq!(rec.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);

        rec.remove("b");
        assert_eq!(rec.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        rec.clear();
        assert!(rec.is_empty());
    }

    #[test]
    #[should_panic(expected = "no field named 'missing'")]
    fn test_index_panics_on_missing_field() {
        let rec = Record::from_pairs([("a", 1)]);
        assert_eq!(rec.get("missing"), None);
        let _ = &rec["missing"];
    }

    #[test]
    fn test_from_xml_inference() {
        let elem = parse(
            r#"<r xmlns:p="urn:p" id="3"><p:name>Ada</p:name><tag>x</tag><tag>y</tag><tag>z</tag>
               <addr kind="home"><city>Oslo</city></addr><empty/></r>"#,
        );
        let rec = Record::from_xml(&elem);

        assert_eq!(rec["_id"], Value::from("3"));
        assert_eq!(rec["{urn:p}name"], Value::from("Ada"));
        assert_eq!(
            rec["tag"],
            Value::List(vec![Value::from("x"), Value::from("y"), Value::from("z")])
        );
        let addr = rec["addr"].as_record().unwrap();
        assert_eq!(addr["_kind"], Value::from("home"));
        assert_eq!(addr["city"], Value::from("Oslo"));
        assert_eq!(rec["empty"], Value::Null);
    }

    #[test]
    fn test_property_object() {
        let rec = Record::from_xml(&parse(r#"<t unit="C">37</t>"#));
        assert_eq!(rec.property(), Some("value"));
        assert_eq!(rec["value"], Value::from("37"));

        let xml = rec.to_xml(Some("t")).to_xml_string().unwrap();
        assert_eq!(xml, r#"<t unit="C">37</t>"#);
    }

    #[test]
    fn test_qualified_attribute_round_trip() {
        let rec = Record::from_xml(&parse(r#"<a xmlns:q="urn:q" q:x="1"/>"#));
        assert_eq!(rec["_{urn:q}x"], Value::from("1"));

        let elem = rec.to_xml(Some("a"));
        assert_eq!(
            elem.get_attribute_qname(&QName::namespaced("urn:q", "x")),
            Some("1")
        );
    }

    #[test]
    fn test_to_xml_repeated_and_nested() {
        let mut inner = Record::new();
        inner.set("city", "Oslo");
        let mut rec = Record::new();
        rec.set("_id", 7);
        rec.set("tag", Value::List(vec![Value::from("x"), Value::from("y")]));
        rec.set("addr", inner);

        let xml = rec.to_xml(Some("p")).to_xml_string().unwrap();
        assert_eq!(
            xml,
            r#"<p id="7"><tag>x</tag><tag>y</tag><addr><city>Oslo</city></addr></p>"#
        );
    }

    #[test]
    fn test_display_and_json() {
        let mut rec = Record::new();
        rec.set("a", 1);
        rec.set("b", Value::List(vec![Value::from("x")]));
        assert_eq!(
            rec.to_string(),
            "Record(\n    a=1,\n    b=[\n        \"x\",\n    ],\n)"
        );
        assert_eq!(rec.to_json(), serde_json::json!({"a": 1, "b": ["x"]}));
        assert_eq!(Record::new().to_string(), "Record()");
    }
}
