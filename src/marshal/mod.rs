//! Marshaling engine
//!
//! One generic interpreter of [`TypeDescriptor`]s converts between XML
//! elements and [`Value`]s: complex types become typed [`Record`]s, simple
//! types become bare primitive values.
//!
//! [`Record`]: crate::dataobjects::Record

mod construct;
mod decode;
mod encode;

use crate::builders::{Compiler, TypeDescriptor, TypeRef};
use crate::documents::Element;
use crate::error::{Error, Result, ValidationLog};
use crate::namespaces::QName;
use crate::schemas::OnError;
use crate::values::Value;
use std::sync::Arc;

/// Marshaling behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarshalOptions {
    /// Lax mode: recover from cardinality and type mismatches
    pub relax: bool,
    /// Validate documents before decoding them
    pub validate: Option<OnError>,
}

impl MarshalOptions {
    /// Strict options without validation
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable lax mode
    pub fn with_relax(mut self, relax: bool) -> Self {
        self.relax = relax;
        self
    }

    /// Validate documents with the given error policy
    pub fn with_validation(mut self, on_error: OnError) -> Self {
        self.validate = Some(on_error);
        self
    }
}

/// Decoder and encoder bound to a compiler
#[derive(Debug, Clone, Copy)]
pub struct Marshaller<'c> {
    compiler: &'c Compiler,
    options: MarshalOptions,
}

impl<'c> Marshaller<'c> {
    /// Create a marshaller
    pub fn new(compiler: &'c Compiler, options: MarshalOptions) -> Self {
        Self { compiler, options }
    }

    /// Compiler used to look up field types
    pub fn compiler(&self) -> &'c Compiler {
        self.compiler
    }

    /// Active options
    pub fn options(&self) -> MarshalOptions {
        self.options
    }

    /// Run the configured validation on a document element
    pub fn validate(&self, elem: &Element) -> Result<Option<ValidationLog>> {
        match self.options.validate {
            Some(on_error) => self.compiler.registry().validate(elem, on_error),
            None => Ok(None),
        }
    }

    /// Fail with `error` unless lax mode is active
    fn strict(&self, error: Error) -> Result<()> {
        if self.options.relax {
            tracing::debug!(%error, "recovered in lax mode");
            Ok(())
        } else {
            Err(error)
        }
    }
}

/// A compiled type together with a marshaller, as handed out by
/// [`Compiler::bind`]
#[derive(Debug, Clone)]
pub struct TypeHandle<'c> {
    marshaller: Marshaller<'c>,
    descriptor: Arc<TypeDescriptor>,
}

impl<'c> TypeHandle<'c> {
    /// Bind a descriptor to a compiler
    pub fn new(compiler: &'c Compiler, descriptor: Arc<TypeDescriptor>) -> Self {
        Self {
            marshaller: Marshaller::new(compiler, MarshalOptions::default()),
            descriptor,
        }
    }

    /// Replace the marshaling options
    pub fn with_options(mut self, options: MarshalOptions) -> Self {
        self.marshaller.options = options;
        self
    }

    /// Compiled type
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Marshaller used by the handle
    pub fn marshaller(&self) -> &Marshaller<'c> {
        &self.marshaller
    }

    /// Instance built from defaults only
    ///
    /// Simple types give null, except enumerations, which give a record
    /// holding their constants.
    pub fn default_value(&self) -> Result<Value> {
        self.marshaller.construct(&self.descriptor, None)
    }

    /// Instance built from a value: a record of field values, a scalar or
    /// an element
    pub fn from_value(&self, value: impl Into<Value>) -> Result<Value> {
        self.marshaller.construct(&self.descriptor, Some(value.into()))
    }

    /// Decode an element, honoring `xsi:type` and `xsi:nil` on it
    pub fn from_xml(&self, elem: &Element) -> Result<Value> {
        self.from_xml_with_log(elem).map(|(value, _)| value)
    }

    /// Decode an element, also returning the errors recorded by a
    /// non-raising validation policy
    pub fn from_xml_with_log(&self, elem: &Element) -> Result<(Value, Option<ValidationLog>)> {
        let log = self.marshaller.validate(elem)?;
        let declared = TypeRef::Named(self.descriptor.name.clone());
        let value = self.marshaller.convert_element(elem, &declared)?;
        Ok((value, log))
    }

    /// Encode a value as an element named `tag` (default: the type name)
    /// in the type's namespace
    pub fn to_xml(&self, value: &Value, tag: Option<&str>) -> Result<Element> {
        let desc = &self.descriptor;
        let tag = QName::new(
            desc.namespace.as_deref(),
            tag.unwrap_or(&desc.name.local_name),
        );
        let mut node = self
            .marshaller
            .encode_value(desc, value, &tag)?
            .ok_or_else(|| {
                Error::UnknownTypeTarget(format!("a {} value cannot be encoded as {}", value.kind(), desc.name))
            })?;
        if let Some(namespace) = tag.namespace() {
            let preferred = self.marshaller.compiler.registry().prefix_for(namespace);
            node.ensure_prefix(namespace, preferred);
        }
        Ok(node)
    }
}

impl Compiler {
    /// Compile a type and bind it for marshaling
    pub fn bind(&self, name: &str) -> Result<TypeHandle<'_>> {
        let descriptor = self.factory(name)?;
        Ok(TypeHandle::new(self, descriptor))
    }

    /// Marshaller over this compiler
    pub fn marshaller(&self, options: MarshalOptions) -> Marshaller<'_> {
        Marshaller::new(self, options)
    }
}
