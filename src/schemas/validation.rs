//! Structural validation of instance documents
//!
//! The validator checks what the marshaling engine relies on: the root
//! element is declared, children and attributes are declared with
//! occurrence counts in range, nil is only used on nillable elements and
//! simple text parses as its primitive type. Facets and content model
//! ordering are not checked.

use crate::builders::Occurs;
use crate::converters::Primitive;
use crate::documents::Element;
use crate::error::{Error, Result, ValidationError, ValidationLog};
use crate::namespaces::QName;
use crate::values::Value;
use crate::{XML_NAMESPACE, XSI_NAMESPACE};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Policy applied when validation finds errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Fail with a validation error
    #[default]
    Raise,
    /// Report the errors through the log and continue
    Log,
    /// Record the errors silently and continue
    Pass,
}

impl OnError {
    /// Parse a policy name
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "raise" => Ok(OnError::Raise),
            "log" => Ok(OnError::Log),
            "pass" => Ok(OnError::Pass),
            _ => Err(Error::InvalidSchema(format!(
                "Invalid validation policy: '{}'. Must be 'raise', 'log', or 'pass'",
                s
            ))),
        }
    }

    /// Get the policy as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            OnError::Raise => "raise",
            OnError::Log => "log",
            OnError::Pass => "pass",
        }
    }
}

impl fmt::Display for OnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type of an element as seen by the validator
enum Shape<'s> {
    Simple(Primitive),
    Declared(&'s Element),
    Any,
}

struct Particle<'s> {
    name: String,
    occurs: Occurs,
    decl: &'s Element,
}

struct AttributeUse {
    name: String,
    required: bool,
    primitive: Option<Primitive>,
}

/// Flattened content model of a complex type
#[derive(Default)]
struct ContentModel<'s> {
    particles: Vec<Particle<'s>>,
    attributes: Vec<AttributeUse>,
    any_element: bool,
    any_attribute: bool,
    simple_content: Option<Primitive>,
}

/// Validator over the retained schema tree of one target namespace
#[derive(Debug)]
pub struct StructuralValidator {
    target_namespace: Option<String>,
    types: HashMap<String, Arc<Element>>,
    elements: HashMap<String, Arc<Element>>,
    groups: HashMap<String, Arc<Element>>,
    attribute_groups: HashMap<String, Arc<Element>>,
    attributes: HashMap<String, Arc<Element>>,
}

impl StructuralValidator {
    /// Build a validator from an `xs:schema` element
    pub fn new(root: &Element) -> Self {
        let mut validator = Self {
            target_namespace: root.attr("targetNamespace").map(str::to_string),
            types: HashMap::new(),
            elements: HashMap::new(),
            groups: HashMap::new(),
            attribute_groups: HashMap::new(),
            attributes: HashMap::new(),
        };
        for child in &root.children {
            if !child.qname.is_xsd() {
                continue;
            }
            let Some(name) = child.attr("name") else {
                continue;
            };
            let map = match child.local_name() {
                "complexType" | "simpleType" => &mut validator.types,
                "element" => &mut validator.elements,
                "group" => &mut validator.groups,
                "attributeGroup" => &mut validator.attribute_groups,
                "attribute" => &mut validator.attributes,
                _ => continue,
            };
            map.insert(name.to_string(), Arc::new(child.clone()));
        }
        validator
    }

    /// Validate an instance element, collecting every error found
    pub fn validate(&self, elem: &Element) -> ValidationLog {
        let mut log = ValidationLog::new();
        let path = format!("/{}", elem.local_name());
        let decl = if elem.namespace() == self.target_namespace.as_deref() {
            self.elements.get(elem.local_name())
        } else {
            None
        };
        match decl {
            Some(decl) => self.check_element(elem, decl, &path, &mut log),
            None => log.push(
                ValidationError::new(format!("Unknown root element '{}'", elem.qname))
                    .with_path(path),
            ),
        }
        log
    }

    /// Look up a global component by reference, in this namespace only
    fn global<'s>(
        &'s self,
        map: &'s HashMap<String, Arc<Element>>,
        node: &Element,
        reference: &str,
    ) -> Option<&'s Element> {
        let qname = self.reference(node, reference)?;
        if qname.namespace() != self.target_namespace.as_deref() {
            return None;
        }
        map.get(&qname.local_name).map(|e| e.as_ref())
    }

    fn reference(&self, node: &Element, reference: &str) -> Option<QName> {
        node.namespaces
            .resolve_reference(reference, self.target_namespace.as_deref())
            .ok()
    }

    fn check_element(&self, elem: &Element, decl: &Element, path: &str, log: &mut ValidationLog) {
        if elem.is_nil() {
            if decl.attr("nillable") != Some("true") {
                log.push(
                    ValidationError::new(format!("Element '{}' is not nillable", elem.local_name()))
                        .with_path(path),
                );
            } else if elem.has_children() || elem.text().map_or(false, |t| !t.trim().is_empty()) {
                log.push(
                    ValidationError::new("A nil element must be empty").with_path(path),
                );
            }
            return;
        }
        let shape = self.element_shape(elem, decl);
        self.check_shape(elem, shape, path, log);
    }

    fn element_shape<'s>(&'s self, elem: &Element, decl: &'s Element) -> Shape<'s> {
        if let Some(xsi_type) = elem.xsi_type() {
            if let Ok(qname) = elem.namespaces.resolve(xsi_type) {
                if let Some(shape) = self.named_shape(&qname) {
                    return shape;
                }
            }
        }
        if let Some(type_name) = decl.attr("type") {
            return self
                .reference(decl, type_name)
                .and_then(|q| self.named_shape(&q))
                .unwrap_or(Shape::Any);
        }
        decl.children
            .iter()
            .find(|c| c.is_xsd("complexType") || c.is_xsd("simpleType"))
            .map(Shape::Declared)
            .unwrap_or(Shape::Any)
    }

    fn named_shape(&self, qname: &QName) -> Option<Shape<'_>> {
        if let Some(primitive) = Primitive::from_qname(qname) {
            return Some(if primitive.is_any() {
                Shape::Any
            } else {
                Shape::Simple(primitive)
            });
        }
        if qname.namespace() != self.target_namespace.as_deref() {
            return None;
        }
        self.types
            .get(&qname.local_name)
            .map(|t| Shape::Declared(t.as_ref()))
    }

    fn check_shape(&self, elem: &Element, shape: Shape<'_>, path: &str, log: &mut ValidationLog) {
        match shape {
            Shape::Any => {}
            Shape::Simple(primitive) => self.check_simple(elem, primitive, path, log),
            Shape::Declared(node) if node.is_xsd("simpleType") => {
                let primitive = self.simple_primitive(node, 0);
                self.check_simple(elem, primitive, path, log);
            }
            Shape::Declared(node) => {
                let mut model = ContentModel::default();
                self.collect(node, Occurs::REQUIRED, &mut model, 0);
                self.check_complex(elem, &model, path, log);
            }
        }
    }

    fn check_simple(&self, elem: &Element, primitive: Primitive, path: &str, log: &mut ValidationLog) {
        if elem.has_children() {
            log.push(
                ValidationError::new(format!(
                    "Element '{}' of simple type must not have child elements",
                    elem.local_name()
                ))
                .with_path(path),
            );
            return;
        }
        check_text(elem.text().unwrap_or(""), primitive, path, log);
    }

    /// Primitive restriction base of a simple type declaration
    fn simple_primitive(&self, node: &Element, depth: usize) -> Primitive {
        if depth > MAX_DERIVATION {
            return Primitive::String;
        }
        for child in &node.children {
            if child.is_xsd("restriction") {
                let Some(base) = child.attr("base") else {
                    return Primitive::String;
                };
                let Some(qname) = self.reference(child, base) else {
                    return Primitive::String;
                };
                if let Some(primitive) = Primitive::from_qname(&qname) {
                    return primitive;
                }
                if let Some(Shape::Declared(t)) = self.named_shape(&qname) {
                    return self.simple_primitive(t, depth + 1);
                }
            }
        }
        Primitive::String
    }

    /// Flatten the particles and attributes of a type declaration
    fn collect<'s>(&'s self, node: &'s Element, scale: Occurs, model: &mut ContentModel<'s>, depth: usize) {
        if depth > MAX_DERIVATION {
            return;
        }
        for child in &node.children {
            if !child.qname.is_xsd() {
                continue;
            }
            match child.local_name() {
                "sequence" | "all" | "choice" => {
                    let own = Occurs::parse(
                        child.attr("minOccurs"),
                        child.attr("maxOccurs"),
                        Occurs::REQUIRED,
                    )
                    .unwrap_or(Occurs::REQUIRED);
                    let mut inner = multiply(scale, own);
                    if child.local_name() == "choice" {
                        inner.min = 0;
                    }
                    self.collect(child, inner, model, depth);
                }
                "group" => {
                    if let Some(group) = child
                        .attr("ref")
                        .and_then(|r| self.global(&self.groups, child, r))
                    {
                        self.collect(group, scale, model, depth + 1);
                    }
                }
                "element" => self.collect_element(child, scale, model),
                "any" => model.any_element = true,
                "anyAttribute" => model.any_attribute = true,
                "attribute" => self.collect_attribute(child, model),
                "attributeGroup" => {
                    if let Some(group) = child
                        .attr("ref")
                        .and_then(|r| self.global(&self.attribute_groups, child, r))
                    {
                        self.collect(group, scale, model, depth + 1);
                    }
                }
                "complexContent" => self.collect(child, scale, model, depth),
                "simpleContent" => {
                    model.simple_content = Some(Primitive::String);
                    self.collect(child, scale, model, depth);
                }
                "extension" | "restriction" => {
                    let base = child.attr("base").and_then(|b| self.reference(child, b));
                    if let Some(base) = base {
                        self.collect_base(node, child, &base, scale, model, depth);
                    }
                    self.collect(child, scale, model, depth);
                }
                _ => {}
            }
        }
    }

    fn collect_base<'s>(
        &'s self,
        content: &Element,
        derivation: &Element,
        base: &QName,
        scale: Occurs,
        model: &mut ContentModel<'s>,
        depth: usize,
    ) {
        let simple = content.is_xsd("simpleContent");
        match self.named_shape(base) {
            Some(Shape::Simple(primitive)) if simple => model.simple_content = Some(primitive),
            Some(Shape::Declared(t)) if t.is_xsd("simpleType") && simple => {
                model.simple_content = Some(self.simple_primitive(t, depth + 1));
            }
            // Complex content restrictions restate the content model
            Some(Shape::Declared(t)) if derivation.is_xsd("extension") || simple => {
                self.collect(t, scale, model, depth + 1);
            }
            None if !base.is_xsd() => {
                // Base outside this namespace; accept what it may contribute
                model.any_element = true;
                model.any_attribute = true;
            }
            _ => {}
        }
    }

    fn collect_element<'s>(&'s self, node: &'s Element, scale: Occurs, model: &mut ContentModel<'s>) {
        let occurs = Occurs::parse(node.attr("minOccurs"), node.attr("maxOccurs"), Occurs::REQUIRED)
            .unwrap_or(Occurs::REQUIRED);
        let (name, decl) = match node.attr("ref") {
            Some(reference) => {
                let Some(qname) = self.reference(node, reference) else {
                    return;
                };
                match self.global(&self.elements, node, reference) {
                    Some(decl) => (qname.local_name, decl),
                    None => {
                        model.any_element = true;
                        return;
                    }
                }
            }
            None => match node.attr("name") {
                Some(name) => (name.to_string(), node),
                None => return,
            },
        };
        model.particles.push(Particle {
            name,
            occurs: multiply(scale, occurs),
            decl,
        });
    }

    fn collect_attribute(&self, node: &Element, model: &mut ContentModel<'_>) {
        let required = node.attr("use") == Some("required");
        if node.attr("use") == Some("prohibited") {
            return;
        }
        let (name, decl) = match node.attr("ref") {
            Some(reference) => {
                let Some(qname) = self.reference(node, reference) else {
                    return;
                };
                let decl = self.global(&self.attributes, node, reference);
                (qname.local_name, decl.unwrap_or(node))
            }
            None => match node.attr("name") {
                Some(name) => (name.to_string(), node),
                None => return,
            },
        };
        let primitive = match decl.attr("type") {
            Some(t) => match self.reference(decl, t).and_then(|q| self.named_shape(&q)) {
                Some(Shape::Simple(p)) => Some(p),
                Some(Shape::Declared(t)) if t.is_xsd("simpleType") => Some(self.simple_primitive(t, 0)),
                _ => None,
            },
            None => None,
        };
        model.attributes.push(AttributeUse {
            name,
            required,
            primitive,
        });
    }

    fn check_complex(&self, elem: &Element, model: &ContentModel<'_>, path: &str, log: &mut ValidationLog) {
        for (qname, value) in &elem.attributes {
            if matches!(qname.namespace(), Some(XSI_NAMESPACE) | Some(XML_NAMESPACE)) {
                continue;
            }
            let attr_path = format!("{}/@{}", path, qname.local_name);
            match model.attributes.iter().find(|a| a.name == qname.local_name) {
                Some(decl) => {
                    if let Some(primitive) = decl.primitive {
                        check_text(value, primitive, &attr_path, log);
                    }
                }
                None if model.any_attribute => {}
                None => log.push(
                    ValidationError::new(format!("Undeclared attribute '{}'", qname))
                        .with_path(attr_path),
                ),
            }
        }
        for decl in model.attributes.iter().filter(|a| a.required) {
            if elem.get_attribute(&decl.name).is_none() {
                log.push(
                    ValidationError::new(format!("Missing required attribute '{}'", decl.name))
                        .with_path(path),
                );
            }
        }

        if let Some(primitive) = model.simple_content {
            self.check_simple(elem, primitive, path, log);
            return;
        }

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for child in &elem.children {
            let child_path = format!("{}/{}", path, child.local_name());
            match model.particles.iter().find(|p| p.name == child.local_name()) {
                Some(particle) => {
                    *counts.entry(particle.name.as_str()).or_default() += 1;
                    self.check_element(child, particle.decl, &child_path, log);
                }
                None if model.any_element => {}
                None => log.push(
                    ValidationError::new(format!(
                        "Unexpected child element '{}'",
                        child.local_name()
                    ))
                    .with_path(child_path),
                ),
            }
        }
        for particle in &model.particles {
            let count = counts.get(particle.name.as_str()).copied().unwrap_or(0);
            if count < particle.occurs.min {
                log.push(
                    ValidationError::new(format!("Missing required element '{}'", particle.name))
                        .with_reason(format!(
                            "expected at least {}, found {}",
                            particle.occurs.min, count
                        ))
                        .with_path(path),
                );
            }
            if let Some(max) = particle.occurs.max {
                if count > max {
                    log.push(
                        ValidationError::new(format!("Too many '{}' elements", particle.name))
                            .with_reason(format!("expected at most {}, found {}", max, count))
                            .with_path(path),
                    );
                }
            }
        }
    }
}

/// Derivation and group nesting followed before giving up on a cycle
const MAX_DERIVATION: usize = 64;

fn multiply(outer: Occurs, inner: Occurs) -> Occurs {
    Occurs {
        min: outer.min.saturating_mul(inner.min),
        max: match (outer.max, inner.max) {
            (Some(a), Some(b)) => Some(a.saturating_mul(b)),
            _ => None,
        },
    }
}

fn check_text(text: &str, primitive: Primitive, path: &str, log: &mut ValidationLog) {
    if matches!(primitive, Primitive::String | Primitive::AnyType) {
        return;
    }
    let valid = match primitive.converter().from_text(text) {
        Ok(Value::Null) => text.trim().is_empty(),
        Ok(value) => primitive.converter().check(&value),
        Err(_) => false,
    };
    if !valid {
        log.push(
            ValidationError::new(format!("Invalid value '{}' for {}", text, primitive))
                .with_path(path),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;

    const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:t="urn:t" targetNamespace="urn:t">
      <xs:simpleType name="Small">
        <xs:restriction base="xs:byte"/>
      </xs:simpleType>
      <xs:complexType name="Base">
        <xs:sequence>
          <xs:element name="name" type="xs:string"/>
        </xs:sequence>
        <xs:attribute name="id" type="xs:int" use="required"/>
      </xs:complexType>
      <xs:complexType name="Derived">
        <xs:complexContent>
          <xs:extension base="t:Base">
            <xs:sequence>
              <xs:element name="size" type="t:Small" minOccurs="0" maxOccurs="2"/>
              <xs:element name="note" type="xs:string" minOccurs="0" nillable="true"/>
            </xs:sequence>
          </xs:extension>
        </xs:complexContent>
      </xs:complexType>
      <xs:element name="item" type="t:Derived"/>
    </xs:schema>"#;

    fn validator() -> StructuralValidator {
        let doc = Document::from_string(SCHEMA).unwrap();
        StructuralValidator::new(doc.root().unwrap())
    }

    fn check(xml: &str) -> ValidationLog {
        let doc = Document::from_string(xml).unwrap();
        validator().validate(doc.root().unwrap())
    }

    #[test]
    fn test_on_error_parse() {
        assert_eq!(OnError::from_str("log").unwrap(), OnError::Log);
        assert_eq!(OnError::default(), OnError::Raise);
        assert_eq!(OnError::Pass.to_string(), "pass");
        assert!(OnError::from_str("ignore").is_err());
    }

    #[test]
    fn test_valid_instance() {
        let log = check(
            r#"<t:item xmlns:t="urn:t" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" id="1">
                 <name>a</name><size>3</size><note xsi:nil="true"/>
               </t:item>"#,
        );
        assert!(log.is_empty(), "{}", log);
    }

    #[test]
    fn test_unknown_root() {
        let log = check(r#"<t:other xmlns:t="urn:t"/>"#);
        assert_eq!(log.len(), 1);
        assert!(log.to_string().contains("Unknown root element"));
    }

    #[test]
    fn test_structure_errors() {
        let log = check(
            r#"<t:item xmlns:t="urn:t" bogus="x">
                 <size>300</size><size>1</size><size>2</size><extra/>
               </t:item>"#,
        );
        let text = log.to_string();
        assert!(text.contains("Undeclared attribute 'bogus'"));
        assert!(text.contains("Missing required attribute 'id'"));
        assert!(text.contains("/item/size: Invalid value '300' for xs:byte"));
        assert!(text.contains("/item/extra: Unexpected child element 'extra'"));
        assert!(text.contains("Missing required element 'name'"));
        assert!(text.contains("Too many 'size' elements"));
        assert_eq!(log.len(), 6);
    }

    #[test]
    fn test_nil_on_non_nillable() {
        let log = check(
            r#"<t:item xmlns:t="urn:t" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" id="1">
                 <name xsi:nil="true"/>
               </t:item>"#,
        );
        assert_eq!(log.len(), 1);
        assert!(log.to_string().contains("is not nillable"));
    }
}
