//! Resource limits
//!
//! Bounds applied while reading instance and schema documents, following
//! `include`/`import` chains and compiling nested type definitions.

use crate::error::{Error, Result};

/// Resource limits shared by loaders, registries and compilers
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum element nesting of a parsed document
    pub max_depth: usize,

    /// Maximum document size in bytes
    pub max_size: usize,

    /// Maximum number of attributes on one element
    pub max_attributes: usize,

    /// Maximum length of an `include`/`import` chain
    pub max_include_depth: usize,

    /// Maximum nesting of type compilations started from one lookup
    pub max_type_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            max_size: 100 * 1024 * 1024,
            max_attributes: 1000,
            max_include_depth: 100,
            max_type_depth: 256,
        }
    }
}

impl Limits {
    /// Default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Tighter limits for documents from untrusted sources
    pub fn strict() -> Self {
        Self {
            max_depth: 100,
            max_size: 10 * 1024 * 1024,
            max_attributes: 100,
            max_include_depth: 20,
            max_type_depth: 64,
        }
    }

    /// Check the element nesting of a document
    pub fn check_depth(&self, depth: usize) -> Result<()> {
        check("element nesting", depth, self.max_depth)
    }

    /// Check the size of a document in bytes
    pub fn check_size(&self, size: usize) -> Result<()> {
        check("document size", size, self.max_size)
    }

    /// Check the attribute count of one element
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        check("attribute count", count, self.max_attributes)
    }

    /// Check the length of an include/import chain
    pub fn check_include_depth(&self, depth: usize) -> Result<()> {
        check("include depth", depth, self.max_include_depth)
    }

    /// Check the nesting of type compilations
    pub fn check_type_depth(&self, depth: usize) -> Result<()> {
        check("type nesting", depth, self.max_type_depth)
    }
}

fn check(what: &str, value: usize, max: usize) -> Result<()> {
    if value > max {
        return Err(Error::LimitExceeded(format!(
            "{} {} exceeds maximum {}",
            what, value, max
        )));
    }
    Ok(())
}
