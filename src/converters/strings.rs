//! String-like converters: xs:string, xs:boolean and xs:anyType

use super::XsConverter;
use crate::error::{Error, Result};
use crate::values::Value;
use std::collections::HashMap;

lazy_static::lazy_static! {
    /// XSD boolean vocabulary
    static ref XSD_BOOLEAN_MAP: HashMap<&'static str, bool> = {
        let mut m = HashMap::new();
        m.insert("true", true);
        m.insert("false", false);
        m
    };
}

/// xs:string
#[derive(Debug, Clone, Copy)]
pub struct StringConverter;

impl XsConverter for StringConverter {
    fn check(&self, value: &Value) -> bool {
        matches!(value, Value::String(_))
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        Ok(Value::String(text.to_string()))
    }
}

/// xs:boolean, accepting only `true` and `false`
#[derive(Debug, Clone, Copy)]
pub struct BooleanConverter;

impl XsConverter for BooleanConverter {
    fn check(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        XSD_BOOLEAN_MAP
            .get(text.trim())
            .map(|b| Value::Bool(*b))
            .ok_or_else(|| Error::Conversion(format!("'{}' is not a valid boolean value", text)))
    }
}

/// xs:anyType: any value is accepted as is, text stays text
#[derive(Debug, Clone, Copy)]
pub struct AnyTypeConverter;

impl XsConverter for AnyTypeConverter {
    fn check(&self, _value: &Value) -> bool {
        true
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        Ok(Value::String(text.to_string()))
    }
}
