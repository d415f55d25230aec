//! XML name validation and field naming conventions
//!
//! This module provides validation for NCNames and QNames and the rules
//! that turn schema names into record field names.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix marking a record field that maps to an XML attribute
pub const ATTRIBUTE_MARKER: char = '_';

/// Field name of the open content (wildcard) template entry
pub const ANY_FIELD: &str = "#any";

/// Field name holding the text content of a property object
pub const PROPERTY_FIELD: &str = "value";

static NON_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Check if a string is a valid XML Name
///
/// Names start with a letter or underscore and continue with letters,
/// digits, `_`, `-`, `.` or `:`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
        }
        _ => false,
    }
}

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    !name.contains(':') && is_valid_name(name)
}

/// Validate an NCName and return an error if invalid
pub fn validate_ncname(name: &str) -> Result<()> {
    if is_valid_ncname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid NCName: '{}'", name)))
    }
}

/// Split a QName into prefix and local name
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some((prefix, local)) = qname.split_once(':') {
        (Some(prefix), local)
    } else {
        (None, qname)
    }
}

/// Record field name for an attribute
pub fn attribute_field(name: &str) -> String {
    format!("{}{}", ATTRIBUTE_MARKER, name)
}

/// Attribute name carried by an attribute field, if it is one
pub fn attribute_name(field: &str) -> Option<&str> {
    field.strip_prefix(ATTRIBUTE_MARKER)
}

/// Normalize an enumeration literal into a constant identifier
///
/// Every character outside `[A-Za-z0-9_]` becomes an underscore and the
/// result is upper-cased: `"in-progress"` becomes `IN_PROGRESS`.
pub fn constant_name(value: &str) -> String {
    NON_IDENTIFIER.replace_all(value, "_").to_uppercase()
}
