//! Binary converters: xs:base64Binary and xs:hexBinary

use super::XsConverter;
use crate::error::{Error, Result};
use crate::values::Value;
use base64::Engine;
use regex::Regex;

/// Pattern for validating hexadecimal binary strings
const HEX_BINARY_PATTERN: &str = r"^([0-9a-fA-F]{2})*$";

lazy_static::lazy_static! {
    static ref HEX_BINARY_REGEX: Regex = Regex::new(HEX_BINARY_PATTERN).unwrap();
}

/// xs:base64Binary
#[derive(Debug, Clone, Copy)]
pub struct Base64BinaryConverter;

impl XsConverter for Base64BinaryConverter {
    fn check(&self, value: &Value) -> bool {
        matches!(value, Value::Binary(_))
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map(Value::Binary)
            .map_err(|_| Error::Conversion(format!("'{}' is not a valid base64 encoding", text)))
    }
}

/// xs:hexBinary, written in upper case
#[derive(Debug, Clone, Copy)]
pub struct HexBinaryConverter;

impl XsConverter for HexBinaryConverter {
    fn check(&self, value: &Value) -> bool {
        matches!(value, Value::Binary(_))
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        let text = text.trim();
        if !HEX_BINARY_REGEX.is_match(text) {
            return Err(Error::Conversion(format!(
                "'{}' is not a valid hexadecimal encoding",
                text
            )));
        }
        (0..text.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&text[i..i + 2], 16)
                    .map_err(|_| Error::Conversion(format!("invalid hex byte in '{}'", text)))
            })
            .collect::<Result<Vec<u8>>>()
            .map(Value::Binary)
    }

    fn to_text(&self, value: &Value) -> Option<String> {
        match value {
            Value::Binary(bytes) => Some(bytes.iter().map(|b| format!("{:02X}", b)).collect()),
            other => other.to_text(),
        }
    }
}
