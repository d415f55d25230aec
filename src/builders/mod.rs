//! Type compiler
//!
//! Walks XSD declarations and produces [`TypeDescriptor`]s, which are
//! published to a [`TypeCache`] shared by every compiler.

mod cache;
mod compiler;
mod templates;

pub use cache::TypeCache;
pub use compiler::Compiler;
pub use templates::{BaseClass, FieldSpec, Flags, Occurs, TypeDescriptor, TypeRef};
