//! Record to element encoding

use super::Marshaller;
use crate::builders::{FieldSpec, Flags, TypeDescriptor, TypeRef};
use crate::converters::Primitive;
use crate::dataobjects::Record;
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::values::Value;
use crate::XSI_NAMESPACE;
use std::borrow::Cow;

impl<'c> Marshaller<'c> {
    /// Encode `record` as an element named `tag` with the fields of `desc`
    ///
    /// Fields are written in template order. Null optional fields are
    /// skipped unless nillable, repeated fields emit one child per item and
    /// records whose type derives from the declared one carry `xsi:type`.
    pub fn encode(&self, desc: &TypeDescriptor, record: &Record, tag: &QName) -> Result<Element> {
        let mut node = Element::new(tag.clone());
        self.encode_into(desc, record, &mut node)?;
        Ok(node)
    }

    /// Encode any value declared with type `desc` as an element named `tag`
    ///
    /// Returns `None` when lax mode drops a value that does not fit the
    /// declared type.
    pub fn encode_value(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        tag: &QName,
    ) -> Result<Option<Element>> {
        match value {
            Value::Null => Ok(Some(nil_element(tag))),
            Value::Element(elem) => Ok(Some(elem.clone())),
            Value::Record(record) if !desc.is_simple() => self.encode_record(desc, record, tag),
            Value::String(s) if s.is_empty() && !desc.is_simple() => Ok(None),
            scalar if scalar.is_primitive() => match (desc.simple, desc.property_field()) {
                (Some(primitive), _) => {
                    let mut node = Element::new(tag.clone());
                    node.text = primitive.converter().to_text(scalar);
                    Ok(Some(node))
                }
                (None, Some(property)) => {
                    let mut values = Record::new();
                    values.set(property.name.clone(), scalar.clone());
                    let record = self.fill_from_values(desc, values)?;
                    self.encode(desc, &record, tag).map(Some)
                }
                (None, None) => self.mismatch(desc, value),
            },
            other => self.mismatch(desc, other),
        }
    }

    fn encode_into(&self, desc: &TypeDescriptor, record: &Record, node: &mut Element) -> Result<()> {
        let namespace = desc.namespace.as_deref();
        let mut open = false;
        let mut done = Vec::new();
        for field in &desc.fields {
            if field.has(Flags::ANY) {
                open = true;
                continue;
            }
            let value = match record.get(&field.name) {
                Some(value) => value,
                None if field.has(Flags::CHOICE) || !field.occurs.is_required() => continue,
                None => {
                    self.strict(Error::structural(&field.name, "Missing mandatory item"))?;
                    continue;
                }
            };
            done.push(field.name.clone());
            if value.is_null() && !field.occurs.is_required() && !field.has(Flags::NILLABLE) {
                continue;
            }

            if let Some(qname) = field.attribute_qname(namespace) {
                if value.is_null() {
                    continue;
                }
                if let Some(ns) = qname.namespace() {
                    node.ensure_prefix(ns, self.compiler.registry().prefix_for(ns));
                }
                let text = self.field_text(field, value)?.unwrap_or_default();
                node.set_attribute(qname, text);
                continue;
            }
            if field.has(Flags::PROPERTY) {
                node.text = self.field_text(field, value)?;
                continue;
            }

            let tag = field.element_qname(namespace);
            let items: &[Value] = match value {
                Value::List(items) => items,
                single => std::slice::from_ref(single),
            };
            for item in items {
                if let Some(child) = self.encode_item(field, item, &tag)? {
                    node.add_child(child);
                }
            }
        }

        if open {
            record.write_fields(node, &done);
        }
        self.bind_foreign_prefixes(node);
        if let Some(strategy) = &desc.strategy {
            strategy.after_encode(record, node)?;
        }
        Ok(())
    }

    /// Declare the schema prefix on children from another namespace than
    /// their parent
    fn bind_foreign_prefixes(&self, node: &mut Element) {
        let parent = node.namespace().map(str::to_string);
        for child in &mut node.children {
            let Some(ns) = child.namespace().map(str::to_string) else {
                continue;
            };
            if Some(&ns) != parent.as_ref() {
                child.ensure_prefix(&ns, self.compiler.registry().prefix_for(&ns));
            }
        }
    }

    fn encode_item(&self, field: &FieldSpec, item: &Value, tag: &QName) -> Result<Option<Element>> {
        match item {
            Value::Null if field.has(Flags::NILLABLE) => return Ok(Some(nil_element(tag))),
            Value::Null => return Ok(Some(Element::new(tag.clone()))),
            Value::Element(elem) => return Ok(Some(elem.clone())),
            _ => {}
        }

        match &field.type_ref {
            TypeRef::Primitive(Primitive::AnyType) => match item {
                Value::Record(record) => {
                    let mut child = record.to_xml(Some(&tag.local_name));
                    child.qname = tag.clone();
                    Ok(Some(child))
                }
                other => Ok(Some(text_element(tag, other.to_text()))),
            },
            TypeRef::Primitive(primitive) => {
                if !item.is_primitive() {
                    return self.mismatch_field(field, item);
                }
                Ok(Some(text_element(tag, primitive.converter().to_text(item))))
            }
            TypeRef::Named(_) if field.has(Flags::SIMPLE) => {
                if !item.is_primitive() {
                    return self.mismatch_field(field, item);
                }
                Ok(Some(text_element(tag, self.field_text(field, item)?)))
            }
            TypeRef::Named(name) => {
                let declared = self.compiler.factory_qname(name)?;
                self.encode_value(&declared, item, tag)
            }
        }
    }

    /// Encode a record declared with type `declared`, writing `xsi:type`
    /// when the record's own type is a derived one
    fn encode_record(
        &self,
        declared: &TypeDescriptor,
        record: &Record,
        tag: &QName,
    ) -> Result<Option<Element>> {
        let (runtime, record) = match record.type_name() {
            None => (
                None,
                Cow::Owned(self.fill_from_values(declared, record.clone())?),
            ),
            Some(name) if name == &declared.name => (None, Cow::Borrowed(record)),
            Some(name) => (Some(self.compiler.factory_qname(name)?), Cow::Borrowed(record)),
        };

        let mut node = Element::new(tag.clone());
        let desc = match &runtime {
            Some(runtime) if runtime.is_a(&declared.name) => {
                let name = &runtime.name;
                let value = match name.namespace() {
                    Some(ns) => {
                        let preferred = self.compiler.registry().prefix_for(ns);
                        format!("{}:{}", node.ensure_prefix(ns, preferred), name.local_name)
                    }
                    None => name.local_name.clone(),
                };
                node.set_attribute(QName::namespaced(XSI_NAMESPACE, "type"), value);
                &**runtime
            }
            Some(runtime) => {
                self.strict(Error::UnknownTypeTarget(format!(
                    "{} does not derive from {}",
                    runtime.name, declared.name
                )))?;
                return Ok(None);
            }
            None => declared,
        };
        self.encode_into(desc, &record, &mut node)?;
        Ok(Some(node))
    }

    /// Text of a primitive value for an attribute, a property or a simple
    /// typed element
    fn field_text(&self, field: &FieldSpec, value: &Value) -> Result<Option<String>> {
        let primitive = match &field.type_ref {
            TypeRef::Primitive(primitive) => Some(*primitive),
            TypeRef::Named(name) => self.compiler.factory_qname(name)?.simple,
        };
        Ok(match primitive {
            Some(primitive) => primitive.converter().to_text(value),
            None => value.to_text(),
        })
    }

    fn mismatch(&self, desc: &TypeDescriptor, value: &Value) -> Result<Option<Element>> {
        self.strict(Error::UnknownTypeTarget(format!(
            "a {} value cannot be encoded as {}",
            value.kind(),
            desc.name
        )))?;
        Ok(None)
    }

    fn mismatch_field(&self, field: &FieldSpec, value: &Value) -> Result<Option<Element>> {
        self.strict(Error::UnknownTypeTarget(format!(
            "field '{}' of type {} cannot hold a {} value",
            field.name,
            field.type_ref,
            value.kind()
        )))?;
        Ok(None)
    }
}

fn nil_element(tag: &QName) -> Element {
    let mut node = Element::new(tag.clone());
    node.set_attribute(QName::namespaced(XSI_NAMESPACE, "nil"), "true");
    node
}

fn text_element(tag: &QName, text: Option<String>) -> Element {
    let mut node = Element::new(tag.clone());
    node.text = text;
    node
}
