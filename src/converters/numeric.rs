//! Numeric converters: integers (with optional bounds), decimal and float

use super::XsConverter;
use crate::error::{Error, Result};
use crate::values::Value;
use rust_decimal::Decimal;
use std::str::FromStr;

/// xs:integer and its sized variants
#[derive(Debug, Clone, Copy)]
pub struct IntegerConverter {
    bounds: Option<(i128, i128)>,
}

impl IntegerConverter {
    /// Integer converter without bounds (xs:integer)
    pub const fn unbounded() -> Self {
        Self { bounds: None }
    }

    /// Integer converter accepting `min <= x <= max` in `check`
    pub const fn bounded(min: i128, max: i128) -> Self {
        Self {
            bounds: Some((min, max)),
        }
    }

    /// Inclusive bounds of the type
    pub fn bounds(&self) -> Option<(i128, i128)> {
        self.bounds
    }
}

impl XsConverter for IntegerConverter {
    fn check(&self, value: &Value) -> bool {
        match (value, self.bounds) {
            (Value::Int(n), Some((min, max))) => (min..=max).contains(n),
            (Value::Int(_), None) => true,
            _ => false,
        }
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        text.trim()
            .parse::<i128>()
            .map(Value::Int)
            .map_err(|_| Error::Conversion(format!("'{}' is not a valid integer value", text)))
    }
}

/// xs:decimal
#[derive(Debug, Clone, Copy)]
pub struct DecimalConverter;

impl XsConverter for DecimalConverter {
    fn check(&self, value: &Value) -> bool {
        matches!(value, Value::Decimal(_))
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        let trimmed = text.trim();
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Value::Decimal)
            .map_err(|_| Error::Conversion(format!("'{}' is not a valid decimal value", text)))
    }
}

/// xs:float and xs:double
#[derive(Debug, Clone, Copy)]
pub struct FloatConverter;

impl XsConverter for FloatConverter {
    fn check(&self, value: &Value) -> bool {
        matches!(value, Value::Float(_))
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        let value = match text.trim() {
            "NaN" => f64::NAN,
            "INF" | "+INF" => f64::INFINITY,
            "-INF" => f64::NEG_INFINITY,
            other => other
                .parse::<f64>()
                .map_err(|_| Error::Conversion(format!("'{}' is not a valid float value", text)))?,
        };
        Ok(Value::Float(value))
    }
}

/// Canonical text of a float: `NaN`, `INF`, `-INF` or the shortest
/// representation that parses back to the same value
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        format!("{:?}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_parse_trims() {
        let c = IntegerConverter::unbounded();
        assert_eq!(c.from_text(" 12 ").unwrap(), Value::Int(12));
        assert_eq!(c.from_text("-7").unwrap(), Value::Int(-7));
        assert!(c.from_text("1.5").is_err());
    }

    #[test]
    fn test_decimal() {
        let c = DecimalConverter;
        let v = c.from_text("12.50").unwrap();
        assert_eq!(c.to_text(&v), Some("12.50".to_string()));
        assert!(c.from_text("1e3").is_ok());
        assert!(c.from_text("twelve").is_err());
    }

    #[test]
    fn test_float_special_values() {
        let c = FloatConverter;
        assert_eq!(c.from_text("INF").unwrap(), Value::Float(f64::INFINITY));
        assert_eq!(c.from_text("-INF").unwrap(), Value::Float(f64::NEG_INFINITY));
        assert!(matches!(c.from_text("NaN").unwrap(), Value::Float(f) if f.is_nan()));
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(-2.5), "-2.5");
    }
}
