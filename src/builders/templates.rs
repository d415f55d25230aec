//! Field templates and type descriptors
//!
//! A [`TypeDescriptor`] is plain data: the qualified name of a schema type,
//! its effective field template (inherited fields first), the chain of base
//! types and, for simple types, the primitive they wrap. One generic
//! marshaling routine interprets every descriptor.

use crate::converters::Primitive;
use crate::dataobjects::Record;
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::names::{attribute_name, PROPERTY_FIELD};
use crate::namespaces::QName;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

bitflags::bitflags! {
    /// Per-field marshaling flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct Flags: u32 {
        /// Null values are written as `xsi:nil="true"`
        const NILLABLE = 1;
        /// The field holds the element's text content
        const PROPERTY = 1 << 1;
        /// The field maps to an XML attribute
        const ATTRIBUTE = 1 << 2;
        /// Member of an `xs:choice`; absent when there is no data
        const CHOICE = 1 << 3;
        /// Open content marker (`xs:any` / `xs:anyAttribute`)
        const ANY = 1 << 4;
        /// The attribute or child element name is namespace-qualified
        const QUALIFIED = 1 << 5;
        /// The declared type is itself a simple type wrapper
        const SIMPLE = 1 << 6;
    }
}

/// Occurrence range of a field; `max: None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Occurs {
    /// Minimum number of occurrences
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded)
    pub max: Option<u32>,
}

impl Occurs {
    /// `(0, 1)`
    pub const OPTIONAL: Occurs = Occurs { min: 0, max: Some(1) };
    /// `(1, 1)`
    pub const REQUIRED: Occurs = Occurs { min: 1, max: Some(1) };
    /// `(0, 0)`
    pub const PROHIBITED: Occurs = Occurs { min: 0, max: Some(0) };

    /// Create an occurrence range
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Parse `minOccurs` / `maxOccurs` attribute values, each falling back
    /// to the corresponding bound of `default`
    pub fn parse(min: Option<&str>, max: Option<&str>, default: Occurs) -> Result<Self> {
        let min = match min {
            Some(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::InvalidSchema(format!("invalid minOccurs value '{}'", s)))?,
            None => default.min,
        };
        let max = match max.map(str::trim) {
            Some("unbounded") => None,
            Some(s) => Some(
                s.parse::<u32>()
                    .map_err(|_| Error::InvalidSchema(format!("invalid maxOccurs value '{}'", s)))?,
            ),
            None => default.max,
        };
        Ok(Self { min, max })
    }

    /// Map an attribute `use` value to its occurrence range
    pub fn from_use(value: &str) -> Result<Self> {
        match value {
            "optional" => Ok(Self::OPTIONAL),
            "prohibited" => Ok(Self::PROHIBITED),
            "required" => Ok(Self::REQUIRED),
            other => Err(Error::InvalidSchema(format!(
                "invalid attribute use '{}'",
                other
            ))),
        }
    }

    /// A singular field holds at most one value
    pub fn is_singular(&self) -> bool {
        self.max == Some(1)
    }

    /// Check for a mandatory field
    pub fn is_required(&self) -> bool {
        self.min > 0
    }

    /// Check for `maxOccurs="0"`
    pub fn is_prohibited(&self) -> bool {
        self.max == Some(0)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::OPTIONAL
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "({}, {})", self.min, max),
            None => write!(f, "({}, unbounded)", self.min),
        }
    }
}

/// Declared type of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TypeRef {
    /// A primitive `xs:` type
    Primitive(Primitive),
    /// A compiled schema type
    Named(QName),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{}", p),
            TypeRef::Named(q) => write!(f, "{}", q),
        }
    }
}

/// One entry of a field template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Record field name; attributes carry the attribute marker
    pub name: String,
    /// Declared type
    pub type_ref: TypeRef,
    /// Lexical default (or fixed) value
    pub default: Option<String>,
    /// Occurrence range
    pub occurs: Occurs,
    /// Marshaling flags
    pub flags: Flags,
    /// Namespace of the declaration, for qualified elements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl FieldSpec {
    /// Create a field spec
    pub fn new(name: impl Into<String>, type_ref: TypeRef, occurs: Occurs, flags: Flags) -> Self {
        Self {
            name: name.into(),
            type_ref,
            default: None,
            occurs,
            flags,
            namespace: None,
        }
    }

    /// Set the namespace the element was declared in
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Set the default value
    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }

    /// Text content field of a "value + attributes" type
    pub fn property(type_ref: TypeRef, flags: Flags) -> Self {
        Self::new(PROPERTY_FIELD, type_ref, Occurs::OPTIONAL, flags | Flags::PROPERTY)
    }

    /// Check a flag
    pub fn has(&self, flag: Flags) -> bool {
        self.flags.contains(flag)
    }

    /// Attribute name for attribute fields
    pub fn attribute_name(&self) -> Option<&str> {
        if self.has(Flags::ATTRIBUTE) {
            attribute_name(&self.name).or(Some(self.name.as_str()))
        } else {
            None
        }
    }

    /// Qualified XML attribute name of an attribute field
    pub fn attribute_qname(&self, namespace: Option<&str>) -> Option<QName> {
        self.attribute_name().map(|local| {
            if self.has(Flags::QUALIFIED) {
                QName::new(namespace, local)
            } else {
                QName::local(local)
            }
        })
    }

    /// Tag of the child elements of an element field
    ///
    /// Qualified elements use their declaration namespace, falling back to
    /// `namespace` (the enclosing type's) when none was recorded.
    pub fn element_qname(&self, namespace: Option<&str>) -> QName {
        if self.has(Flags::QUALIFIED) {
            QName::new(self.namespace.as_deref().or(namespace), self.name.as_str())
        } else {
            QName::local(self.name.as_str())
        }
    }

    /// Check if the field maps to child elements
    pub fn is_element(&self) -> bool {
        !self
            .flags
            .intersects(Flags::ATTRIBUTE | Flags::PROPERTY | Flags::ANY)
    }
}

/// Per-namespace base type strategy
///
/// A strategy contributes inherited fields to every type compiled with it
/// and can post-process instances after decode and elements after encode.
pub trait BaseClass: fmt::Debug + Send + Sync {
    /// Name of the strategy, recorded on descriptors
    fn name(&self) -> &str;

    /// Fields placed before every other field of the template
    fn fields(&self) -> Vec<FieldSpec> {
        Vec::new()
    }

    /// Called after an instance was decoded from `elem`
    fn after_decode(&self, _record: &mut Record, _elem: &Element) -> Result<()> {
        Ok(())
    }

    /// Called after `record` was encoded into `elem`
    fn after_encode(&self, _record: &Record, _elem: &mut Element) -> Result<()> {
        Ok(())
    }
}

/// Compiled, immutable description of a schema type
#[derive(Debug, Clone, Serialize)]
pub struct TypeDescriptor {
    /// Qualified type name
    pub name: QName,
    /// Target namespace of the declaring schema
    pub namespace: Option<String>,
    /// Effective field template, inherited fields first
    pub fields: Vec<FieldSpec>,
    /// Base types, nearest first
    pub base_chain: Vec<QName>,
    /// Primitive wrapped by a simple type
    pub simple: Option<Primitive>,
    /// The type is a restriction by enumeration
    pub enumeration: bool,
    /// Base type strategy
    #[serde(rename = "base_class", serialize_with = "serialize_strategy")]
    pub strategy: Option<Arc<dyn BaseClass>>,
}

fn serialize_strategy<S: serde::Serializer>(
    strategy: &Option<Arc<dyn BaseClass>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match strategy {
        Some(s) => serializer.serialize_some(s.name()),
        None => serializer.serialize_none(),
    }
}

impl TypeDescriptor {
    /// Check for a simple (primitive wrapping) type
    pub fn is_simple(&self) -> bool {
        self.simple.is_some()
    }

    /// Check if this type is `name` or derives from it
    pub fn is_a(&self, name: &QName) -> bool {
        &self.name == name || self.base_chain.contains(name)
    }

    /// Direct base type
    pub fn base(&self) -> Option<&QName> {
        self.base_chain.first()
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check if the type accepts open content
    pub fn has_open_content(&self) -> bool {
        self.fields.iter().any(|f| f.has(Flags::ANY))
    }

    /// Text content field, if any
    pub fn property_field(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.has(Flags::PROPERTY))
    }

    /// JSON rendering of the descriptor for inspection
    pub fn dump(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        for field in &self.fields {
            writeln!(
                f,
                "    {}: {} {} {:?}",
                field.name, field.type_ref, field.occurs, field.flags
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_parse() {
        let o = Occurs::parse(Some("0"), Some("unbounded"), Occurs::REQUIRED).unwrap();
        assert_eq!(o, Occurs::new(0, None));
        assert!(!o.is_singular());

        let o = Occurs::parse(None, None, Occurs::REQUIRED).unwrap();
        assert!(o.is_singular() && o.is_required());

        assert!(Occurs::parse(Some("x"), None, Occurs::OPTIONAL).is_err());
        assert_eq!(Occurs::from_use("prohibited").unwrap(), Occurs::PROHIBITED);
        assert!(Occurs::from_use("sometimes").is_err());
        assert_eq!(Occurs::new(0, None).to_string(), "(0, unbounded)");
    }

    #[test]
    fn test_attribute_names() {
        let field = FieldSpec::new(
            "_id",
            TypeRef::Primitive(Primitive::Int),
            Occurs::REQUIRED,
            Flags::ATTRIBUTE | Flags::QUALIFIED,
        );
        assert_eq!(field.attribute_name(), Some("id"));
        assert_eq!(
            field.attribute_qname(Some("urn:t")),
            Some(QName::namespaced("urn:t", "id"))
        );
        assert!(!field.is_element());
    }

    #[test]
    fn test_descriptor_dump() {
        let desc = TypeDescriptor {
            name: QName::namespaced("urn:t", "Temp"),
            namespace: Some("urn:t".to_string()),
            fields: vec![FieldSpec::property(
                TypeRef::Primitive(Primitive::Decimal),
                Flags::empty(),
            )],
            base_chain: vec![],
            simple: None,
            enumeration: false,
            strategy: None,
        };
        let dump = desc.dump();
        assert!(dump.contains("\"decimal\""));
        assert!(dump.contains("\"PROPERTY\""));
        assert!(desc.is_a(&QName::namespaced("urn:t", "Temp")));
        assert_eq!(desc.property_field().map(|f| f.name.as_str()), Some("value"));
    }
}
