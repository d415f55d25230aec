//! Element to record decoding

use super::Marshaller;
use crate::builders::{FieldSpec, Flags, TypeDescriptor};
use crate::dataobjects::Record;
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::names::attribute_field;
use crate::namespaces::QName;
use crate::values::Value;
use crate::XSI_NAMESPACE;

/// Raw material found in an element for one field
enum Found<'e> {
    Text(&'e str),
    Node(&'e Element),
}

impl<'c> Marshaller<'c> {
    /// Decode `elem` into a record of the complex type `desc`
    ///
    /// Attributes, text content and child elements are matched against the
    /// field template in order. Singular fields take at most one child
    /// (the first one in lax mode), repeated fields take every matching
    /// child in document order. With open content, whatever the template
    /// did not claim is imported with the schema-less rules.
    pub fn decode(&self, desc: &TypeDescriptor, elem: &Element) -> Result<Record> {
        let mut record = Record::typed(desc.name.clone());
        if let Some(property) = desc.property_field() {
            record.set_property(Some(property.name.clone()));
        }

        let namespace = desc.namespace.as_deref();
        let mut open = false;
        let mut claimed = Vec::new();
        for field in &desc.fields {
            if field.has(Flags::ANY) {
                open = true;
                continue;
            }
            if record.contains(&field.name) {
                continue;
            }

            let found: Vec<Found<'_>> = if let Some(qname) = field.attribute_qname(namespace) {
                claimed.push(attribute_field(&qname.to_string()));
                let value = elem
                    .get_attribute_qname(&qname)
                    .or_else(|| elem.attr(&qname.local_name));
                value.map(Found::Text).into_iter().collect()
            } else if field.has(Flags::PROPERTY) {
                elem.text().map(Found::Text).into_iter().collect()
            } else {
                elem.children
                    .iter()
                    .filter(|child| matches_field(child, field, namespace))
                    .map(Found::Node)
                    .collect()
            };
            if found.is_empty() && field.has(Flags::CHOICE) {
                continue;
            }

            let value = if field.occurs.is_singular() {
                match found.as_slice() {
                    [] => self.missing(field)?,
                    [one] => self.convert(one, field)?,
                    [first, ..] => {
                        self.strict(Error::structural(
                            &field.name,
                            format!("Expecting exactly 0 or 1 items, found {}", found.len()),
                        ))?;
                        self.convert(first, field)?
                    }
                }
            } else {
                Value::List(
                    found
                        .iter()
                        .map(|item| self.convert(item, field))
                        .collect::<Result<_>>()?,
                )
            };
            record.set(field.name.clone(), value);
        }

        if open {
            let mut ignore: Vec<String> = record.keys().map(str::to_string).collect();
            ignore.extend(claimed);
            for local in ["type", "nil", "schemaLocation", "noNamespaceSchemaLocation"] {
                ignore.push(attribute_field(&QName::namespaced(XSI_NAMESPACE, local).to_string()));
            }
            record.fill_from_xml(elem, &ignore);
        }

        if let Some(strategy) = &desc.strategy {
            strategy.after_decode(&mut record, elem)?;
        }
        Ok(record)
    }

    /// Value of a singular field with nothing to decode
    fn missing(&self, field: &FieldSpec) -> Result<Value> {
        if let Some(default) = &field.default {
            return self.make_type(Value::String(default.clone()), &field.type_ref);
        }
        if field.occurs.is_required() {
            self.strict(Error::structural(&field.name, "Missing mandatory item"))?;
        }
        Ok(Value::Null)
    }

    fn convert(&self, found: &Found<'_>, field: &FieldSpec) -> Result<Value> {
        match found {
            Found::Text(text) => self.make_type(Value::String(text.to_string()), &field.type_ref),
            Found::Node(node) => self.convert_element(node, &field.type_ref),
        }
    }
}

/// Children match a field by local name, in no namespace, in the
/// namespace of the type or in the namespace the element was declared in
fn matches_field(child: &Element, field: &FieldSpec, namespace: Option<&str>) -> bool {
    if child.local_name() != field.name {
        return false;
    }
    match child.namespace() {
        None => true,
        Some(ns) => Some(ns) == namespace || field.element_qname(namespace) == child.qname,
    }
}

#[cfg(test)]
mod tests {
    use crate::builders::{Compiler, TypeCache};
    use crate::documents::{Document, Element};
    use crate::error::Error;
    use crate::marshal::MarshalOptions;
    use crate::schemas::{LoadOptions, SchemaRegistry};
    use crate::values::Value;
    use std::sync::Arc;

    const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:t="urn:t" targetNamespace="urn:t" elementFormDefault="qualified">
      <xs:complexType name="Person">
        <xs:sequence>
          <xs:element name="name" type="xs:string"/>
          <xs:element name="born" type="xs:date" minOccurs="0"/>
          <xs:element name="tag" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
        </xs:sequence>
        <xs:attribute name="id" type="xs:int" use="required"/>
        <xs:attribute name="active" type="xs:boolean" default="true"/>
      </xs:complexType>
      <xs:complexType name="Bag">
        <xs:sequence>
          <xs:element name="label" type="xs:string"/>
          <xs:any minOccurs="0" maxOccurs="unbounded" processContents="lax"/>
        </xs:sequence>
        <xs:anyAttribute/>
      </xs:complexType>
      <xs:complexType name="Shape">
        <xs:choice>
          <xs:element name="circle" type="xs:decimal"/>
          <xs:element name="square" type="xs:decimal"/>
        </xs:choice>
      </xs:complexType>
    </xs:schema>"#;

    fn compiler() -> Compiler {
        let root = Document::from_string(SCHEMA).unwrap().root.unwrap();
        let mut registry = SchemaRegistry::new();
        registry.load(root, &LoadOptions::new()).unwrap();
        Compiler::new(Arc::new(registry))
            .with_namespace("urn:t")
            .with_cache(Arc::new(TypeCache::new()))
    }

    fn parse(xml: &str) -> Element {
        Document::from_string(xml).unwrap().root.unwrap()
    }

    #[test]
    fn test_decode_fields() {
        let compiler = compiler();
        let elem = parse(
            r#"<t:p xmlns:t="urn:t" id="3"><t:name>Ada</t:name><t:born>1815-12-10</t:born>
               <t:tag>x</t:tag><t:tag>y</t:tag></t:p>"#,
        );
        let person = compiler.bind("Person").unwrap().from_xml(&elem).unwrap();
        let person = person.as_record().unwrap();
        assert_eq!(person["_id"], Value::Int(3));
        assert_eq!(person["_active"], Value::Bool(true));
        assert_eq!(person["name"], Value::from("Ada"));
        assert!(matches!(person["born"], Value::Date(_)));
        assert_eq!(
            person["tag"],
            Value::List(vec![Value::from("x"), Value::from("y")])
        );
    }

    #[test]
    fn test_unqualified_children_match() {
        let compiler = compiler();
        let elem = parse(r#"<p id="1"><name>Bo</name></p>"#);
        let person = compiler.bind("Person").unwrap().from_xml(&elem).unwrap();
        let person = person.as_record().unwrap();
        assert_eq!(person["name"], Value::from("Bo"));
        assert_eq!(person["born"], Value::Null);
        assert_eq!(person["tag"], Value::List(vec![]));
    }

    #[test]
    fn test_occurrence_enforcement() {
        let compiler = compiler();
        let handle = compiler.bind("Person").unwrap();

        let missing = parse(r#"<p id="1"/>"#);
        assert!(matches!(handle.from_xml(&missing), Err(Error::Structural(_))));

        let twice = parse(r#"<p id="1"><name>A</name><name>B</name></p>"#);
        let err = handle.from_xml(&twice).unwrap_err();
        assert!(err.to_string().contains("Expecting exactly 0 or 1 items"));

        let relaxed = handle.with_options(MarshalOptions::new().with_relax(true));
        let person = relaxed.from_xml(&twice).unwrap();
        assert_eq!(person.as_record().unwrap()["name"], Value::from("A"));
        let person = relaxed.from_xml(&missing).unwrap();
        assert_eq!(person.as_record().unwrap()["name"], Value::Null);
    }

    #[test]
    fn test_open_content() {
        let compiler = compiler();
        let elem = parse(
            r#"<bag xmlns:x="urn:x" x:flag="on"><label>L</label><extra>1</extra>
               <nested k="v"><leaf>2</leaf></nested></bag>"#,
        );
        let bag = compiler.bind("Bag").unwrap().from_xml(&elem).unwrap();
        let bag = bag.as_record().unwrap();
        assert_eq!(bag["label"], Value::from("L"));
        assert_eq!(bag["extra"], Value::from("1"));
        assert_eq!(bag["_{urn:x}flag"], Value::from("on"));
        let nested = bag["nested"].as_record().unwrap();
        assert_eq!(nested["_k"], Value::from("v"));
        assert_eq!(nested["leaf"], Value::from("2"));
        assert!(!bag.contains("#any"));
    }

    #[test]
    fn test_choice_members_left_out() {
        let compiler = compiler();
        let shape = compiler
            .bind("Shape")
            .unwrap()
            .from_xml(&parse(r#"<s><square>2.5</square></s>"#))
            .unwrap();
        let shape = shape.as_record().unwrap();
        assert!(!shape.contains("circle"));
        assert_eq!(shape["square"], Value::Decimal("2.5".parse().unwrap()));
    }

    #[test]
    fn test_malformed_text_is_conversion_error() {
        let compiler = compiler();
        let elem = parse(r#"<p id="three"><name>A</name></p>"#);
        let err = compiler.bind("Person").unwrap().from_xml(&elem).unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
    }
}
