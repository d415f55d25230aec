//! Primitive type converters
//!
//! Each primitive XSD type has a stateless converter between its lexical
//! form and a [`Value`]:
//!
//! - `check`: is the value already a native instance of the type (sized
//!   integers also check their bounds)
//! - `from_text`: parse the lexical form
//! - `to_text`: canonical, locale-independent text (`None` for null)
//!
//! Temporal parse failures yield [`Value::Null`]; other malformed input is a
//! [`Error::Conversion`]. Unknown `xs:` names fall back to the string
//! converter.

mod binary;
mod numeric;
mod strings;
mod temporal;

pub use binary::{Base64BinaryConverter, HexBinaryConverter};
pub use numeric::{format_float, DecimalConverter, FloatConverter, IntegerConverter};
pub use strings::{AnyTypeConverter, BooleanConverter, StringConverter};
pub use temporal::{
    format_date, format_datetime, format_time, DateConverter, DateTimeConverter, TimeConverter,
};

use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::values::Value;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// String/value codec of one primitive type
pub trait XsConverter: Send + Sync {
    /// Check if `value` is already a native instance of the type
    fn check(&self, value: &Value) -> bool;

    /// Parse the lexical form of the type
    fn from_text(&self, text: &str) -> Result<Value>;

    /// Canonical text of `value`, `None` for null
    fn to_text(&self, value: &Value) -> Option<String> {
        value.to_text()
    }

    /// Convert `value` to the type unless it already is an instance of it
    fn coerce(&self, value: Value) -> Result<Value> {
        if value.is_null() || self.check(&value) {
            return Ok(value);
        }
        match value.to_text() {
            Some(text) => self.from_text(&text),
            None => Err(Error::Conversion(format!(
                "cannot convert a {} value to a primitive",
                value.kind()
            ))),
        }
    }
}

/// Primitive XSD types with a dedicated converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Primitive {
    /// xs:string (and every unknown xs: type)
    String,
    /// xs:boolean
    Boolean,
    /// xs:integer
    Integer,
    /// xs:byte
    Byte,
    /// xs:short
    Short,
    /// xs:int
    Int,
    /// xs:long
    Long,
    /// xs:unsignedByte
    UnsignedByte,
    /// xs:unsignedShort
    UnsignedShort,
    /// xs:unsignedInt
    UnsignedInt,
    /// xs:unsignedLong
    UnsignedLong,
    /// xs:decimal
    Decimal,
    /// xs:float
    Float,
    /// xs:double
    Double,
    /// xs:dateTime
    DateTime,
    /// xs:date
    Date,
    /// xs:time
    Time,
    /// xs:base64Binary
    Base64Binary,
    /// xs:hexBinary
    HexBinary,
    /// xs:anyType, decoded with the generic object model
    AnyType,
}

lazy_static::lazy_static! {
    /// Registry of primitive types by XSD local name
    static ref PRIMITIVES: HashMap<&'static str, Primitive> = {
        let mut m = HashMap::new();
        for p in Primitive::ALL {
            m.insert(p.name(), *p);
        }
        m
    };
}

static STRING: StringConverter = StringConverter;
static BOOLEAN: BooleanConverter = BooleanConverter;
static ANY_TYPE: AnyTypeConverter = AnyTypeConverter;
static INTEGER: IntegerConverter = IntegerConverter::unbounded();
static BYTE: IntegerConverter = IntegerConverter::bounded(-(1 << 7), (1 << 7) - 1);
static SHORT: IntegerConverter = IntegerConverter::bounded(-(1 << 15), (1 << 15) - 1);
static INT: IntegerConverter = IntegerConverter::bounded(-(1 << 31), (1 << 31) - 1);
static LONG: IntegerConverter = IntegerConverter::bounded(-(1 << 63), (1 << 63) - 1);
static UNSIGNED_BYTE: IntegerConverter = IntegerConverter::bounded(0, (1 << 8) - 1);
static UNSIGNED_SHORT: IntegerConverter = IntegerConverter::bounded(0, (1 << 16) - 1);
static UNSIGNED_INT: IntegerConverter = IntegerConverter::bounded(0, (1 << 32) - 1);
static UNSIGNED_LONG: IntegerConverter = IntegerConverter::bounded(0, (1 << 64) - 1);
static DECIMAL: DecimalConverter = DecimalConverter;
static FLOAT: FloatConverter = FloatConverter;
static DATE_TIME: DateTimeConverter = DateTimeConverter;
static DATE: DateConverter = DateConverter;
static TIME: TimeConverter = TimeConverter;
static BASE64_BINARY: Base64BinaryConverter = Base64BinaryConverter;
static HEX_BINARY: HexBinaryConverter = HexBinaryConverter;

impl Primitive {
    /// Every primitive type
    pub const ALL: &'static [Primitive] = &[
        Primitive::String,
        Primitive::Boolean,
        Primitive::Integer,
        Primitive::Byte,
        Primitive::Short,
        Primitive::Int,
        Primitive::Long,
        Primitive::UnsignedByte,
        Primitive::UnsignedShort,
        Primitive::UnsignedInt,
        Primitive::UnsignedLong,
        Primitive::Decimal,
        Primitive::Float,
        Primitive::Double,
        Primitive::DateTime,
        Primitive::Date,
        Primitive::Time,
        Primitive::Base64Binary,
        Primitive::HexBinary,
        Primitive::AnyType,
    ];

    /// XSD local name of the type
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Boolean => "boolean",
            Primitive::Integer => "integer",
            Primitive::Byte => "byte",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::UnsignedByte => "unsignedByte",
            Primitive::UnsignedShort => "unsignedShort",
            Primitive::UnsignedInt => "unsignedInt",
            Primitive::UnsignedLong => "unsignedLong",
            Primitive::Decimal => "decimal",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::DateTime => "dateTime",
            Primitive::Date => "date",
            Primitive::Time => "time",
            Primitive::Base64Binary => "base64Binary",
            Primitive::HexBinary => "hexBinary",
            Primitive::AnyType => "anyType",
        }
    }

    /// Look up a primitive by XSD local name
    pub fn lookup(name: &str) -> Option<Primitive> {
        PRIMITIVES.get(name).copied()
    }

    /// Primitive for an XSD local name (`xs:` prefix allowed), falling back
    /// to [`Primitive::String`]
    pub fn from_name(name: &str) -> Primitive {
        let local = name.strip_prefix("xs:").unwrap_or(name);
        Self::lookup(local).unwrap_or(Primitive::String)
    }

    /// Primitive for a name in the XSD namespace, `None` for other namespaces
    pub fn from_qname(qname: &QName) -> Option<Primitive> {
        if qname.is_xsd() {
            Some(Self::from_name(&qname.local_name))
        } else {
            None
        }
    }

    /// Check for [`Primitive::AnyType`]
    pub fn is_any(&self) -> bool {
        matches!(self, Primitive::AnyType)
    }

    /// Converter of the type
    pub fn converter(&self) -> &'static dyn XsConverter {
        match self {
            Primitive::String => &STRING,
            Primitive::Boolean => &BOOLEAN,
            Primitive::Integer => &INTEGER,
            Primitive::Byte => &BYTE,
            Primitive::Short => &SHORT,
            Primitive::Int => &INT,
            Primitive::Long => &LONG,
            Primitive::UnsignedByte => &UNSIGNED_BYTE,
            Primitive::UnsignedShort => &UNSIGNED_SHORT,
            Primitive::UnsignedInt => &UNSIGNED_INT,
            Primitive::UnsignedLong => &UNSIGNED_LONG,
            Primitive::Decimal => &DECIMAL,
            Primitive::Float | Primitive::Double => &FLOAT,
            Primitive::DateTime => &DATE_TIME,
            Primitive::Date => &DATE,
            Primitive::Time => &TIME,
            Primitive::Base64Binary => &BASE64_BINARY,
            Primitive::HexBinary => &HEX_BINARY,
            Primitive::AnyType => &ANY_TYPE,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xs:{}", self.name())
    }
}

/// Converter for an `xs:` type name, falling back to the string converter
pub fn converter(name: &str) -> &'static dyn XsConverter {
    Primitive::from_name(name).converter()
}
