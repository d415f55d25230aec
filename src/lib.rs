//! # xsdbind
//!
//! Dynamic typing and marshaling for XML Schema (XSD) documents.
//!
//! Schemas are loaded into a [`SchemaRegistry`] keyed by target namespace.
//! A [`Compiler`] turns named schema types into [`TypeDescriptor`]s on
//! demand, and one generic marshaling engine converts between XML elements
//! and [`Value`]s: complex types become typed [`Record`]s, simple types
//! become bare primitive values.
//!
//! ## Features
//!
//! - Schema registry with `include`/`import` resolution and fragment merging
//! - Lazy, idempotent type compilation with a process-wide cache
//! - Decoding with cardinality enforcement, `xsi:type` polymorphism and
//!   `xsi:nil`
//! - Template-ordered encoding with derived-type annotation
//! - Open content (`xs:any`) through the schema-less object model
//! - Optional structural validation with raise/log/pass policies
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xsdbind::{Compiler, Document, LoadOptions, SchemaRegistry};
//!
//! let mut registry = SchemaRegistry::new();
//! registry.load("people.xsd", &LoadOptions::new())?;
//! let compiler = Compiler::new(Arc::new(registry)).with_namespace("urn:people");
//!
//! let person = compiler.bind("Person")?;
//! let doc = Document::from_string(r#"<p:person xmlns:p="urn:people" id="1">…</p:person>"#)?;
//! let value = person.from_xml(doc.root().unwrap())?;
//! let xml = person.to_xml(&value, Some("person"))?.to_xml_string()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and namespaces
pub mod namespaces;
pub mod names;
pub mod locations;

// Resource loading
pub mod loaders;
pub mod documents;

// Object model
pub mod values;
pub mod dataobjects;
pub mod converters;

// Schemas, compilation, marshaling
pub mod schemas;
pub mod builders;
pub mod marshal;

// Re-exports for convenience
pub use builders::{BaseClass, Compiler, FieldSpec, Flags, Occurs, TypeCache, TypeDescriptor, TypeRef};
pub use converters::Primitive;
pub use dataobjects::Record;
pub use documents::{Document, Element};
pub use error::{Error, Result, ValidationError, ValidationLog};
pub use marshal::{MarshalOptions, Marshaller, TypeHandle};
pub use namespaces::{NamespaceContext, QName};
pub use schemas::{LoadOptions, OnError, SchemaRegistry, SchemaSource};
pub use values::Value;

/// Version of the xsdbind library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
