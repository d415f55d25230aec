//! Instance construction
//!
//! Builds values of compiled types from defaults, from loose field values
//! or from elements, converting every field to its declared type.

use super::Marshaller;
use crate::builders::{Flags, TypeDescriptor, TypeRef};
use crate::converters::Primitive;
use crate::dataobjects::Record;
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::names::PROPERTY_FIELD;
use crate::values::Value;
use crate::XSI_NAMESPACE;

impl<'c> Marshaller<'c> {
    /// Build an instance of `desc`
    ///
    /// Simple types yield a bare primitive (null without a value), except
    /// for an enumeration built without a value, which yields a record of
    /// its constants. Complex types yield typed records; a record whose type
    /// already derives from `desc` is kept as it is.
    pub fn construct(&self, desc: &TypeDescriptor, value: Option<Value>) -> Result<Value> {
        if let Some(primitive) = desc.simple {
            return match value {
                None if desc.enumeration => self.enumeration_record(desc).map(Value::Record),
                None | Some(Value::Null) => Ok(Value::Null),
                Some(Value::Element(elem)) => self.element_text(primitive, &elem),
                Some(other) => primitive.converter().coerce(other),
            };
        }

        match value {
            None | Some(Value::Null) => self.fill_from_values(desc, Record::new()).map(Value::Record),
            Some(Value::Element(elem)) => self.decode(desc, &elem).map(Value::Record),
            Some(Value::Record(record)) => {
                if let Some(type_name) = record.type_name() {
                    if type_name == &desc.name {
                        return Ok(Value::Record(record));
                    }
                    let runtime = self.compiler.factory_qname(type_name)?;
                    if runtime.is_a(&desc.name) {
                        return Ok(Value::Record(record));
                    }
                }
                self.fill_from_values(desc, record).map(Value::Record)
            }
            Some(Value::List(_)) => Err(Error::structural(
                &desc.name.local_name,
                "a list cannot initialize a single instance",
            )),
            Some(scalar) => {
                let name = desc
                    .property_field()
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| PROPERTY_FIELD.to_string());
                let mut values = Record::new();
                values.set(name, scalar);
                self.fill_from_values(desc, values).map(Value::Record)
            }
        }
    }

    /// Convert a value to a field's declared type
    ///
    /// Elements honor `xsi:type` and `xsi:nil`; an empty string for a named
    /// type is null.
    pub fn make_type(&self, value: Value, type_ref: &TypeRef) -> Result<Value> {
        match (value, type_ref) {
            (Value::Element(elem), _) => self.convert_element(&elem, type_ref),
            (value, TypeRef::Primitive(primitive)) => primitive.converter().coerce(value),
            (Value::String(s), TypeRef::Named(_)) if s.is_empty() => Ok(Value::Null),
            (value, TypeRef::Named(name)) => {
                let desc = self.compiler.factory_qname(name)?;
                self.construct(&desc, Some(value))
            }
        }
    }

    /// Convert an element to its declared type, or to the type named by
    /// its `xsi:type` attribute
    pub fn convert_element(&self, elem: &Element, declared: &TypeRef) -> Result<Value> {
        let overridden;
        let type_ref = match elem.xsi_type() {
            Some(xsi_type) => {
                let qname = elem.namespaces.resolve(xsi_type)?;
                overridden = match Primitive::from_qname(&qname) {
                    Some(primitive) => TypeRef::Primitive(primitive),
                    None => TypeRef::Named(qname),
                };
                &overridden
            }
            None => declared,
        };
        if elem.is_nil() {
            return Ok(Value::Null);
        }

        match type_ref {
            TypeRef::Primitive(Primitive::AnyType) => {
                let has_attributes = elem
                    .attributes
                    .keys()
                    .any(|q| q.namespace() != Some(XSI_NAMESPACE));
                if elem.has_children() || has_attributes {
                    Ok(Value::Record(Record::from_xml(elem)))
                } else {
                    self.element_text(Primitive::AnyType, elem)
                }
            }
            TypeRef::Primitive(primitive) => self.element_text(*primitive, elem),
            TypeRef::Named(name) => {
                let desc = self.compiler.factory_qname(name)?;
                match desc.simple {
                    Some(primitive) => self.element_text(primitive, elem),
                    None => self.decode(&desc, elem).map(Value::Record),
                }
            }
        }
    }

    /// Populate a record of `desc` from loose field values
    ///
    /// Missing fields take their default. Singular fields without a value
    /// stay null, repeated ones become empty lists and choice members
    /// without a value are left out. Values the template does not name are kept only
    /// when the type accepts open content.
    pub(crate) fn fill_from_values(&self, desc: &TypeDescriptor, mut values: Record) -> Result<Record> {
        let mut record = Record::typed(desc.name.clone());
        if let Some(property) = desc.property_field() {
            record.set_property(Some(property.name.clone()));
        }

        let mut open = false;
        for field in &desc.fields {
            if field.has(Flags::ANY) {
                open = true;
                continue;
            }
            if record.contains(&field.name) {
                continue;
            }
            let value = match values.remove(&field.name) {
                Some(value) => value,
                None => field.default.clone().map(Value::String).unwrap_or_default(),
            };
            if value.is_null() && field.has(Flags::CHOICE) {
                continue;
            }

            let value = if field.occurs.is_singular() {
                if value.is_null() {
                    Value::Null
                } else {
                    self.make_type(value, &field.type_ref)?
                }
            } else {
                match value {
                    Value::Null => Value::List(Vec::new()),
                    Value::List(items) => Value::List(
                        items
                            .into_iter()
                            .map(|item| self.make_type(item, &field.type_ref))
                            .collect::<Result<_>>()?,
                    ),
                    other => {
                        self.strict(Error::structural(
                            &field.name,
                            format!("expected a list, got a {} value", other.kind()),
                        ))?;
                        Value::List(Vec::new())
                    }
                }
            };
            record.set(field.name.clone(), value);
        }

        if open {
            for (name, value) in &values {
                record.set(name.clone(), value.clone());
            }
        }
        Ok(record)
    }

    /// Record holding the constants of an enumeration
    fn enumeration_record(&self, desc: &TypeDescriptor) -> Result<Record> {
        let mut record = Record::typed(desc.name.clone());
        for field in &desc.fields {
            let value = field.default.clone().map(Value::String).unwrap_or_default();
            record.set(field.name.clone(), self.make_type(value, &field.type_ref)?);
        }
        Ok(record)
    }

    /// Converted text content of an element
    ///
    /// An empty element is an empty string for string types and null for
    /// every other primitive.
    pub(crate) fn element_text(&self, primitive: Primitive, elem: &Element) -> Result<Value> {
        match elem.text() {
            Some(text) => primitive.converter().from_text(text),
            None if matches!(primitive, Primitive::String | Primitive::AnyType) => {
                Ok(Value::String(String::new()))
            }
            None => Ok(Value::Null),
        }
    }
}
