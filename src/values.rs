//! Tagged instance values
//!
//! [`Value`] is the generic value carried by record fields: a converted
//! primitive, a nested [`Record`], a pass-through XML [`Element`] or an
//! ordered list of those for repeated elements.

use crate::converters;
use crate::dataobjects::Record;
use crate::documents::Element;
use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::fmt;

/// A field value of a record
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / nil value
    #[default]
    Null,
    /// xs:boolean
    Bool(bool),
    /// xs:integer and its sized variants
    Int(i128),
    /// xs:decimal
    Decimal(Decimal),
    /// xs:float and xs:double
    Float(f64),
    /// xs:string and unconverted text
    String(String),
    /// xs:base64Binary and xs:hexBinary
    Binary(Vec<u8>),
    /// xs:dateTime (timezone offsets are folded in)
    DateTime(NaiveDateTime),
    /// xs:date
    Date(NaiveDate),
    /// xs:time
    Time(NaiveTime),
    /// Nested record
    Record(Record),
    /// Pass-through XML node
    Element(Element),
    /// Repeated values, in document order
    List(Vec<Value>),
}

impl Value {
    /// Check for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::DateTime(_) => "dateTime",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Record(_) => "record",
            Value::Element(_) => "element",
            Value::List(_) => "list",
        }
    }

    /// Check if the value is a primitive (not a record, element or list)
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Value::Null | Value::Record(_) | Value::Element(_) | Value::List(_)
        )
    }

    /// Get the string content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the boolean content
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the integer content
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the floating point content
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Get the nested record
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Get the nested record mutably
    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Get the pass-through element
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Value::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get the list items
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Normalize to a sequence: lists are returned as-is, anything else is
    /// wrapped in a single item list
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            other => vec![other],
        }
    }

    /// Canonical text of a primitive value
    ///
    /// Returns `None` for null, records and elements. Lists have no text
    /// either, callers emit one node per item.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null | Value::Record(_) | Value::Element(_) | Value::List(_) => None,
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Float(f) => Some(converters::format_float(*f)),
            Value::String(s) => Some(s.clone()),
            Value::Binary(b) => Some(base64::engine::general_purpose::STANDARD.encode(b)),
            Value::DateTime(dt) => Some(converters::format_datetime(dt)),
            Value::Date(d) => Some(converters::format_date(d)),
            Value::Time(t) => Some(converters::format_time(t)),
        }
    }

    /// Export as a JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => {
                if let Ok(n) = i64::try_from(*i) {
                    JsonValue::from(n)
                } else if let Ok(n) = u64::try_from(*i) {
                    JsonValue::from(n)
                } else {
                    JsonValue::String(i.to_string())
                }
            }
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(converters::format_float(*f))),
            Value::Record(r) => r.to_json(),
            Value::Element(e) => e
                .to_xml_string()
                .map(JsonValue::String)
                .unwrap_or(JsonValue::Null),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            other => other
                .to_text()
                .map(JsonValue::String)
                .unwrap_or(JsonValue::Null),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Record(r) => write!(f, "{}", r),
            Value::Element(e) => write!(f, "{}", e),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            other => write!(f, "{}", other.to_text().unwrap_or_default()),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i128)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl From<Element> for Value {
    fn from(v: Element) -> Self {
        Value::Element(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
