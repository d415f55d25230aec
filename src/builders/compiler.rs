//! Recursive-descent compiler from XSD declarations to type descriptors
//!
//! A [`Compiler`] turns qualified type names into [`TypeDescriptor`]s. On a
//! cache miss it takes its lock and runs a [`Builder`] that walks the
//! declaration, compiling every type the declaration depends on along the
//! way. Each type being compiled owns a [`CompileContext`] on the call
//! stack, so nested compilations never see the state of the type that
//! triggered them.
//!
//! Types in progress are tracked by name. Fields referring to a type in
//! progress bind to it by name, which covers self and mutual references.
//! Derivation from a type in progress is a circular definition and fails.

use super::cache::TypeCache;
use super::templates::{BaseClass, FieldSpec, Flags, Occurs, TypeDescriptor, TypeRef};
use crate::converters::Primitive;
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::names::{attribute_field, constant_name, ANY_FIELD};
use crate::namespaces::QName;
use crate::schemas::SchemaRegistry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Facets and annotations accepted without effect
const IGNORED: &[&str] = &[
    "annotation",
    "documentation",
    "appinfo",
    "minInclusive",
    "maxInclusive",
    "minExclusive",
    "maxExclusive",
    "length",
    "minLength",
    "maxLength",
    "pattern",
    "totalDigits",
    "fractionDigits",
    "whiteSpace",
    "unique",
    "key",
    "keyref",
];

/// Compiles schema types on demand
#[derive(Debug)]
pub struct Compiler {
    registry: Arc<SchemaRegistry>,
    cache: Arc<TypeCache>,
    namespace: Option<String>,
    limits: Limits,
    base_class: Option<Arc<dyn BaseClass>>,
    lock: Mutex<()>,
}

impl Compiler {
    /// Create a compiler over a populated registry, using the global cache
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            limits: registry.limits().clone(),
            registry,
            cache: TypeCache::global(),
            namespace: None,
            base_class: None,
            lock: Mutex::new(()),
        }
    }

    /// Namespace of unprefixed type names passed to [`factory`](Self::factory)
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Use another type cache
    pub fn with_cache(mut self, cache: Arc<TypeCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Base type strategy for namespaces without their own
    pub fn with_base_class(mut self, base_class: Arc<dyn BaseClass>) -> Self {
        self.base_class = Some(base_class);
        self
    }

    /// Registry the compiler reads declarations from
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Cache the compiler publishes to
    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    /// Default namespace of unprefixed type names
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Resolve a `prefix:name`, `{uri}name` or plain type name
    pub fn resolve_name(&self, name: &str) -> Result<QName> {
        self.registry
            .namespaces()
            .resolve_in_target(name, self.namespace.as_deref())
    }

    /// Compiled descriptor of the named type
    pub fn factory(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        let qname = self.resolve_name(name)?;
        self.factory_qname(&qname)
    }

    /// Compiled descriptor of a qualified type name
    ///
    /// A cached type is returned without touching the registry.
    pub fn factory_qname(&self, name: &QName) -> Result<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.cache.get(name) {
            return Ok(descriptor);
        }
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Builder::new(self).resolve(name)
    }
}

/// What kind of content the current declaration describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Content {
    /// simpleType, or complexType without a content element
    Plain,
    /// Inside simpleContent
    Simple,
    /// Inside complexContent
    Complex,
}

/// State of one type compilation
struct CompileContext {
    type_name: QName,
    fields: Vec<FieldSpec>,
    /// Base type and whether its fields are inherited
    derived: Option<(Arc<TypeDescriptor>, bool)>,
    restriction: Option<Primitive>,
    enumeration: bool,
    strategy: Option<Arc<dyn BaseClass>>,
    /// Occurrence range given to elements without their own
    occurs: Occurs,
    /// Flags OR'd into element fields
    flags: Flags,
    content: Content,
    attributes_qualified: bool,
    elements_qualified: bool,
}

impl CompileContext {
    fn tns(&self) -> Option<&str> {
        self.type_name.namespace()
    }

    /// Name of an anonymous type declared inside this one
    fn anonymous(&self, name: &str) -> QName {
        QName::new(
            self.type_name.namespace(),
            format!("{}_{}", self.type_name.local_name, name),
        )
    }
}

struct Builder<'c> {
    compiler: &'c Compiler,
    registry: &'c SchemaRegistry,
    /// Types in progress, with whether they declare a simple type
    pending: HashMap<QName, bool>,
    depth: usize,
}

impl<'c> Builder<'c> {
    fn new(compiler: &'c Compiler) -> Self {
        Self {
            compiler,
            registry: &compiler.registry,
            pending: HashMap::new(),
            depth: 0,
        }
    }

    /// Cache, then type declarations, then element declarations as aliases
    fn resolve(&mut self, name: &QName) -> Result<Arc<TypeDescriptor>> {
        if name.is_xsd() {
            return Err(Error::SchemaResolution(format!(
                "{} is a primitive type, not a compiled type",
                name
            )));
        }
        if let Some(descriptor) = self.compiler.cache.get(name) {
            return Ok(descriptor);
        }
        if self.pending.contains_key(name) {
            return Err(Error::SchemaResolution(format!(
                "circular type definition: {}",
                name
            )));
        }
        if let Some(decl) = self.registry.type_decl(name)? {
            return self.compile_type(&decl, name.clone());
        }
        if let Some(decl) = self.registry.element_decl(name)? {
            if let Some(type_name) = decl.attr("type") {
                let target = decl
                    .namespaces
                    .resolve_reference(type_name, name.namespace())?;
                if let Some(primitive) = Primitive::from_qname(&target) {
                    return Ok(self.publish_alias(name, primitive));
                }
                self.enter()?;
                let result = self.resolve(&target);
                self.leave();
                return result;
            }
            return match inline_type(&decl) {
                Some(inline) => self.compile_type(inline, name.clone()),
                None => Ok(self.publish_alias(name, Primitive::AnyType)),
            };
        }
        Err(Error::SchemaResolution(format!("no such type: {}", name)))
    }

    /// Descriptor for a top-level element typed with a primitive
    fn publish_alias(&self, name: &QName, primitive: Primitive) -> Arc<TypeDescriptor> {
        let (fields, simple) = if primitive.is_any() {
            let any = FieldSpec::new(
                ANY_FIELD,
                TypeRef::Primitive(Primitive::AnyType),
                Occurs::new(0, None),
                Flags::ANY,
            );
            (vec![any], None)
        } else {
            (Vec::new(), Some(primitive))
        };
        let descriptor = TypeDescriptor {
            name: name.clone(),
            namespace: name.namespace.clone(),
            fields,
            base_chain: Vec::new(),
            simple,
            enumeration: false,
            strategy: None,
        };
        debug!(type_name = %name, %primitive, "compiled element alias");
        self.compiler.cache.publish(descriptor)
    }

    /// Check whether `name` compiles to a simple type, reading its
    /// declaration instead of compiling it
    fn is_simple_type(&mut self, name: &QName) -> Result<bool> {
        if let Some(simple) = self.pending.get(name) {
            return Ok(*simple);
        }
        if let Some(descriptor) = self.compiler.cache.get(name) {
            return Ok(descriptor.is_simple());
        }
        if let Some(decl) = self.registry.type_decl(name)? {
            return Ok(decl.is_xsd("simpleType"));
        }
        let Some(decl) = self.registry.element_decl(name)? else {
            return Err(Error::SchemaResolution(format!("no such type: {}", name)));
        };
        match decl.attr("type") {
            Some(type_name) => {
                let target = decl
                    .namespaces
                    .resolve_reference(type_name, name.namespace())?;
                if let Some(primitive) = Primitive::from_qname(&target) {
                    return Ok(!primitive.is_any());
                }
                self.enter()?;
                let result = self.is_simple_type(&target);
                self.leave();
                result
            }
            None => Ok(inline_type(&decl).is_some_and(|inline| inline.is_xsd("simpleType"))),
        }
    }

    fn simple_primitive(&mut self, name: &QName) -> Result<Primitive> {
        let descriptor = self.resolve(name)?;
        descriptor
            .simple
            .ok_or_else(|| Error::InvalidSchema(format!("{} is not a simple type", name)))
    }

    fn enter(&mut self) -> Result<()> {
        self.compiler.limits.check_type_depth(self.depth + 1)?;
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Compile a complexType or simpleType declaration under `name`
    fn compile_type(&mut self, node: &Element, name: QName) -> Result<Arc<TypeDescriptor>> {
        self.enter()?;
        let result = self.compile_entered(node, name);
        self.leave();
        result
    }

    fn compile_entered(&mut self, node: &Element, name: QName) -> Result<Arc<TypeDescriptor>> {
        let schema = self.registry.schema_root(name.namespace());
        let form_default = |attr: &str| {
            schema.and_then(|s| s.attr(attr)) == Some("qualified")
        };
        let mut ctx = CompileContext {
            strategy: self
                .registry
                .base_class(&name)
                .or_else(|| self.compiler.base_class.clone()),
            attributes_qualified: form_default("attributeFormDefault"),
            elements_qualified: form_default("elementFormDefault"),
            type_name: name.clone(),
            fields: Vec::new(),
            derived: None,
            restriction: None,
            enumeration: false,
            occurs: Occurs::OPTIONAL,
            flags: Flags::empty(),
            content: Content::Plain,
        };

        self.pending.insert(name.clone(), node.is_xsd("simpleType"));
        let result = self
            .process_children(&mut ctx, node)
            .and_then(|_| self.assemble(ctx));
        self.pending.remove(&name);

        let descriptor = self.compiler.cache.publish(result?);
        debug!(
            type_name = %descriptor.name,
            fields = descriptor.fields.len(),
            simple = descriptor.is_simple(),
            "compiled type"
        );
        Ok(descriptor)
    }

    /// Compile an inline type unless it is already known
    fn compile_anonymous(&mut self, node: &Element, name: QName) -> Result<QName> {
        if !self.pending.contains_key(&name) && !self.compiler.cache.contains(&name) {
            self.compile_type(node, name.clone())?;
        }
        Ok(name)
    }

    fn process_children(&mut self, ctx: &mut CompileContext, node: &Element) -> Result<()> {
        for child in &node.children {
            self.process(ctx, child)?;
        }
        Ok(())
    }

    fn process(&mut self, ctx: &mut CompileContext, node: &Element) -> Result<()> {
        if !node.qname.is_xsd() {
            return Err(Error::InvalidSchema(format!(
                "declaration outside the XML Schema namespace: {}",
                node.qname
            )));
        }
        match node.local_name() {
            "attribute" => self.attribute(ctx, node),
            "attributeGroup" | "group" => self.group(ctx, node),
            "any" => {
                let occurs = Occurs::parse(
                    node.attr("minOccurs"),
                    node.attr("maxOccurs"),
                    Occurs::REQUIRED,
                )?;
                self.any(ctx, occurs);
                Ok(())
            }
            "anyAttribute" => {
                self.any(ctx, Occurs::new(0, None));
                Ok(())
            }
            "element" => self.element(ctx, node),
            "sequence" => {
                let occurs = Occurs::parse(
                    node.attr("minOccurs"),
                    node.attr("maxOccurs"),
                    Occurs::REQUIRED,
                )?;
                self.particles(ctx, node, occurs, Flags::empty())
            }
            "all" => self.particles(ctx, node, Occurs::REQUIRED, Flags::empty()),
            "choice" => {
                let occurs = ctx.occurs;
                self.particles(ctx, node, occurs, Flags::CHOICE)
            }
            "complexContent" => self.content(ctx, node, Content::Complex),
            "simpleContent" => self.content(ctx, node, Content::Simple),
            "complexType" | "simpleType" => self.process_children(ctx, node),
            "restriction" => self.restriction(ctx, node),
            "extension" => self.extension(ctx, node),
            "enumeration" => self.enumeration(ctx, node),
            "list" | "union" => {
                warn!(
                    type_name = %ctx.type_name,
                    construct = node.local_name(),
                    "treating simple type as xs:string"
                );
                ctx.restriction = Some(Primitive::String);
                Ok(())
            }
            tag if IGNORED.contains(&tag) => Ok(()),
            tag => {
                warn!(type_name = %ctx.type_name, construct = tag, "ignoring unsupported schema construct");
                Ok(())
            }
        }
    }

    fn attribute(&mut self, ctx: &mut CompileContext, node: &Element) -> Result<()> {
        if let Some(reference) = node.attr("ref") {
            debug!(type_name = %ctx.type_name, reference, "skipping attribute reference");
            return Ok(());
        }
        let name = node.attr("name").ok_or_else(|| {
            Error::InvalidSchema(format!("unnamed attribute in {}", ctx.type_name))
        })?;
        let occurs = match node.attr("use") {
            Some(value) => Occurs::from_use(value)?,
            None => Occurs::OPTIONAL,
        };
        if occurs.is_prohibited() {
            return Ok(());
        }

        let type_ref = match node.attr("type") {
            Some(type_name) => {
                let qname = node.namespaces.resolve_reference(type_name, ctx.tns())?;
                if let Some(primitive) = Primitive::from_qname(&qname) {
                    TypeRef::Primitive(primitive)
                } else if self.is_simple_type(&qname)? {
                    TypeRef::Named(qname)
                } else {
                    return Err(Error::InvalidSchema(format!(
                        "attribute '{}' of {} has the complex type {}",
                        name, ctx.type_name, qname
                    )));
                }
            }
            None => match node.children.iter().find(|c| c.is_xsd("simpleType")) {
                Some(inline) => TypeRef::Named(self.compile_anonymous(inline, ctx.anonymous(name))?),
                None => TypeRef::Primitive(Primitive::String),
            },
        };

        let qualified = match node.attr("form") {
            Some(form) => form == "qualified",
            None => ctx.attributes_qualified,
        };
        let mut flags = Flags::ATTRIBUTE;
        if qualified {
            flags |= Flags::QUALIFIED;
        }
        let default = node.attr("default").or_else(|| node.attr("fixed"));
        ctx.fields.push(
            FieldSpec::new(attribute_field(name), type_ref, occurs, flags)
                .with_default(default.map(str::to_string)),
        );
        Ok(())
    }

    /// Inline the children of a referenced group or attribute group
    fn group(&mut self, ctx: &mut CompileContext, node: &Element) -> Result<()> {
        let Some(reference) = node.attr("ref") else {
            return Ok(());
        };
        let qname = node.namespaces.resolve_reference(reference, ctx.tns())?;
        let decl = if node.local_name() == "group" {
            self.registry.group_decl(&qname)?
        } else {
            self.registry.attribute_group_decl(&qname)?
        };
        self.enter()?;
        let result = self.process_children(ctx, &decl);
        self.leave();
        result
    }

    fn any(&mut self, ctx: &mut CompileContext, occurs: Occurs) {
        if ctx.fields.iter().any(|f| f.has(Flags::ANY)) {
            return;
        }
        ctx.fields.push(FieldSpec::new(
            ANY_FIELD,
            TypeRef::Primitive(Primitive::AnyType),
            occurs,
            Flags::ANY,
        ));
    }

    fn element(&mut self, ctx: &mut CompileContext, node: &Element) -> Result<()> {
        let referenced = match node.attr("ref") {
            Some(reference) => {
                let qname = node.namespaces.resolve_reference(reference, ctx.tns())?;
                let decl = self
                    .registry
                    .element_decl(&qname)?
                    .ok_or_else(|| Error::SchemaResolution(format!("no such element: {}", qname)))?;
                Some((qname, decl))
            }
            None => None,
        };
        let target: &Element = referenced.as_ref().map(|(_, d)| d.as_ref()).unwrap_or(node);
        let attr = |name: &str| node.attr(name).or_else(|| target.attr(name));

        let name = target.attr("name").ok_or_else(|| {
            Error::InvalidSchema(format!("unnamed element in {}", ctx.type_name))
        })?;
        let occurs = Occurs::parse(node.attr("minOccurs"), node.attr("maxOccurs"), ctx.occurs)?;
        if occurs.is_prohibited() {
            return Ok(());
        }
        let nillable = match attr("nillable") {
            Some(value) => Primitive::Boolean
                .converter()
                .from_text(value)?
                .as_bool()
                .unwrap_or(false),
            None => false,
        };
        let default = attr("default").or_else(|| attr("fixed")).map(str::to_string);
        let decl_tns = match &referenced {
            Some((qname, _)) => qname.namespace(),
            None => ctx.tns(),
        };

        let type_ref = match target.attr("type") {
            Some(type_name) => {
                let qname = target.namespaces.resolve_reference(type_name, decl_tns)?;
                match Primitive::from_qname(&qname) {
                    Some(primitive) => TypeRef::Primitive(primitive),
                    None => TypeRef::Named(qname),
                }
            }
            None => match inline_type(target) {
                Some(inline) => {
                    let anonymous = match &referenced {
                        Some((qname, _)) => qname.clone(),
                        None => ctx.anonymous(name),
                    };
                    TypeRef::Named(self.compile_anonymous(inline, anonymous)?)
                }
                None => TypeRef::Primitive(Primitive::AnyType),
            },
        };

        let qualified = match (&referenced, node.attr("form")) {
            (Some(_), _) => true,
            (None, Some(form)) => form == "qualified",
            (None, None) => ctx.elements_qualified,
        };
        let mut flags = ctx.flags;
        if nillable {
            flags |= Flags::NILLABLE;
        }
        let mut namespace = None;
        if qualified {
            flags |= Flags::QUALIFIED;
            namespace = decl_tns.map(str::to_string);
        }
        ctx.fields.push(
            FieldSpec::new(name, type_ref, occurs, flags)
                .with_default(default)
                .with_namespace(namespace),
        );
        Ok(())
    }

    /// sequence, all and choice: new default occurrence range and flags
    fn particles(
        &mut self,
        ctx: &mut CompileContext,
        node: &Element,
        occurs: Occurs,
        flags: Flags,
    ) -> Result<()> {
        let saved = (ctx.occurs, ctx.flags);
        ctx.occurs = occurs;
        ctx.flags |= flags;
        let result = self.process_children(ctx, node);
        (ctx.occurs, ctx.flags) = saved;
        result
    }

    fn content(&mut self, ctx: &mut CompileContext, node: &Element, content: Content) -> Result<()> {
        let saved = ctx.content;
        ctx.content = content;
        let result = self.process_children(ctx, node);
        ctx.content = saved;
        result
    }

    fn base(&self, ctx: &CompileContext, node: &Element) -> Result<Option<QName>> {
        node.attr("base")
            .map(|base| node.namespaces.resolve_reference(base, ctx.tns()))
            .transpose()
    }

    fn restriction(&mut self, ctx: &mut CompileContext, node: &Element) -> Result<()> {
        let base = self.base(ctx, node)?;
        match (ctx.content, base) {
            (Content::Complex, Some(base)) if !base.is_xsd() => {
                ctx.derived = Some((self.resolve(&base)?, false));
            }
            (Content::Complex, _) => {}
            (Content::Simple, Some(base)) => self.value_base(ctx, base)?,
            (Content::Simple, None) => {}
            (Content::Plain, Some(base)) => {
                let primitive = match Primitive::from_qname(&base) {
                    Some(primitive) => primitive,
                    None => self.simple_primitive(&base)?,
                };
                ctx.restriction = Some(primitive);
            }
            (Content::Plain, None) => {
                // Base given by a nested simpleType
                let inline = node.children.iter().find(|c| c.is_xsd("simpleType"));
                let primitive = match inline {
                    Some(inline) => {
                        let name = self.compile_anonymous(inline, ctx.anonymous("base"))?;
                        self.simple_primitive(&name)?
                    }
                    None => Primitive::String,
                };
                ctx.restriction = Some(primitive);
                for child in node.children.iter().filter(|c| !c.is_xsd("simpleType")) {
                    self.process(ctx, child)?;
                }
                return Ok(());
            }
        }
        self.process_children(ctx, node)
    }

    fn extension(&mut self, ctx: &mut CompileContext, node: &Element) -> Result<()> {
        let base = self.base(ctx, node)?.ok_or_else(|| {
            Error::InvalidSchema(format!("extension without a base in {}", ctx.type_name))
        })?;
        if !(base.is_xsd() && Primitive::from_name(&base.local_name).is_any()) {
            self.value_base(ctx, base)?;
        }
        self.process_children(ctx, node)
    }

    /// Primitive and simple bases become the text content, complex bases
    /// are inherited
    fn value_base(&mut self, ctx: &mut CompileContext, base: QName) -> Result<()> {
        if let Some(primitive) = Primitive::from_qname(&base) {
            ctx.fields
                .push(FieldSpec::property(TypeRef::Primitive(primitive), Flags::empty()));
        } else if self.is_simple_type(&base)? {
            ctx.fields
                .push(FieldSpec::property(TypeRef::Named(base), Flags::empty()));
        } else {
            ctx.derived = Some((self.resolve(&base)?, true));
        }
        Ok(())
    }

    fn enumeration(&mut self, ctx: &mut CompileContext, node: &Element) -> Result<()> {
        if ctx.content == Content::Simple {
            return Ok(());
        }
        let primitive = ctx.restriction.ok_or_else(|| {
            Error::InvalidSchema(format!(
                "enumeration outside of a restriction in {}",
                ctx.type_name
            ))
        })?;
        let value = node.attr("value").unwrap_or_default();
        ctx.enumeration = true;
        ctx.fields.push(
            FieldSpec::new(
                constant_name(value),
                TypeRef::Primitive(primitive),
                Occurs::OPTIONAL,
                Flags::empty(),
            )
            .with_default(Some(value.to_string())),
        );
        Ok(())
    }

    /// Build the descriptor: mark simple-typed fields, flatten the base
    /// chain, check the text content rule
    fn assemble(&mut self, ctx: CompileContext) -> Result<TypeDescriptor> {
        let CompileContext {
            type_name,
            mut fields,
            derived,
            restriction,
            enumeration,
            strategy,
            ..
        } = ctx;

        for field in fields.iter_mut() {
            let simple = match &field.type_ref {
                TypeRef::Named(qname) => self.is_simple_type(qname)?,
                TypeRef::Primitive(_) => false,
            };
            if simple {
                field.flags |= Flags::SIMPLE;
            }
        }

        let mut effective: Vec<FieldSpec> = Vec::new();
        let mut base_chain = Vec::new();
        match &derived {
            Some((base, inherit)) => {
                base_chain.push(base.name.clone());
                base_chain.extend(base.base_chain.iter().cloned());
                if *inherit {
                    effective.extend(base.fields.iter().cloned());
                } else if let Some(strategy) = &strategy {
                    effective.extend(strategy.fields());
                }
            }
            None => {
                if let Some(strategy) = &strategy {
                    effective.extend(strategy.fields());
                }
            }
        }
        for field in fields {
            if effective.iter().any(|f| f.name == field.name) {
                debug!(type_name = %type_name, field = %field.name, "duplicate field name, keeping the first");
                continue;
            }
            effective.push(field);
        }

        let properties = effective.iter().filter(|f| f.has(Flags::PROPERTY)).count();
        if properties > 1 || (properties == 1 && effective.iter().any(|f| f.is_element())) {
            return Err(Error::InvalidSchema(format!(
                "{} mixes text content with child elements",
                type_name
            )));
        }

        Ok(TypeDescriptor {
            namespace: type_name.namespace.clone(),
            name: type_name,
            fields: effective,
            base_chain,
            simple: restriction,
            enumeration,
            strategy,
        })
    }
}

fn inline_type(decl: &Element) -> Option<&Element> {
    decl.children
        .iter()
        .find(|c| c.is_xsd("complexType") || c.is_xsd("simpleType"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;
    use crate::schemas::LoadOptions;

    const HEADER: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:t="urn:t" targetNamespace="urn:t">"#;

    fn compiler(body: &str) -> Compiler {
        let xml = format!("{}{}</xs:schema>", HEADER, body);
        let root = Document::from_string(&xml).unwrap().root.unwrap();
        let mut registry = SchemaRegistry::new();
        registry.load(root, &LoadOptions::new()).unwrap();
        Compiler::new(Arc::new(registry))
            .with_namespace("urn:t")
            .with_cache(Arc::new(TypeCache::new()))
    }

    fn names(descriptor: &TypeDescriptor) -> Vec<&str> {
        descriptor.fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_person_template() {
        let compiler = compiler(
            r#"<xs:complexType name="Person">
                 <xs:sequence>
                   <xs:element name="name" type="xs:string"/>
                   <xs:element name="tag" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
                 </xs:sequence>
                 <xs:attribute name="id" type="xs:int" use="required"/>
               </xs:complexType>"#,
        );
        let person = compiler.factory("Person").unwrap();
        assert_eq!(names(&person), vec!["name", "tag", "_id"]);
        assert_eq!(person.fields[0].occurs, Occurs::REQUIRED);
        assert_eq!(person.fields[1].occurs, Occurs::new(0, None));
        assert!(person.fields[2].has(Flags::ATTRIBUTE));
        assert_eq!(person.fields[2].type_ref, TypeRef::Primitive(Primitive::Int));
        assert!(!person.is_simple());
    }

    #[test]
    fn test_factory_is_idempotent() {
        let compiler = compiler(r#"<xs:complexType name="Empty"/>"#);
        let first = compiler.factory("t:Empty").unwrap();
        let lookups = compiler.registry().lookup_count();
        let second = compiler.factory("{urn:t}Empty").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compiler.registry().lookup_count(), lookups);
    }

    #[test]
    fn test_extension_chain() {
        let compiler = compiler(
            r#"<xs:complexType name="Base">
                 <xs:sequence><xs:element name="a" type="xs:int"/></xs:sequence>
               </xs:complexType>
               <xs:complexType name="Mid">
                 <xs:complexContent><xs:extension base="t:Base">
                   <xs:sequence>
                     <xs:element name="b" type="xs:int"/>
                     <xs:element name="a" type="xs:string"/>
                   </xs:sequence>
                 </xs:extension></xs:complexContent>
               </xs:complexType>
               <xs:complexType name="Leaf">
                 <xs:complexContent><xs:extension base="t:Mid">
                   <xs:attribute name="c" type="xs:string"/>
                 </xs:extension></xs:complexContent>
               </xs:complexType>"#,
        );
        let leaf = compiler.factory("Leaf").unwrap();
        assert_eq!(names(&leaf), vec!["a", "b", "_c"]);
        assert_eq!(leaf.fields[0].type_ref, TypeRef::Primitive(Primitive::Int));
        assert_eq!(
            leaf.base_chain,
            vec![QName::namespaced("urn:t", "Mid"), QName::namespaced("urn:t", "Base")]
        );
        assert!(leaf.is_a(&QName::namespaced("urn:t", "Base")));
    }

    #[test]
    fn test_simple_types_and_enumerations() {
        let compiler = compiler(
            r#"<xs:simpleType name="Small"><xs:restriction base="xs:byte">
                 <xs:maxInclusive value="10"/>
               </xs:restriction></xs:simpleType>
               <xs:simpleType name="Tiny"><xs:restriction base="t:Small"/></xs:simpleType>
               <xs:simpleType name="Status"><xs:restriction base="xs:string">
                 <xs:enumeration value="in-progress"/>
                 <xs:enumeration value="done"/>
               </xs:restriction></xs:simpleType>
               <xs:complexType name="Task">
                 <xs:sequence><xs:element name="status" type="t:Status"/></xs:sequence>
                 <xs:attribute name="size" type="t:Tiny"/>
               </xs:complexType>"#,
        );
        let tiny = compiler.factory("Tiny").unwrap();
        assert_eq!(tiny.simple, Some(Primitive::Byte));

        let status = compiler.factory("Status").unwrap();
        assert!(status.enumeration);
        assert_eq!(names(&status), vec!["IN_PROGRESS", "DONE"]);
        assert_eq!(status.fields[0].default.as_deref(), Some("in-progress"));

        let task = compiler.factory("Task").unwrap();
        assert!(task.fields.iter().all(|f| f.has(Flags::SIMPLE)));
    }

    #[test]
    fn test_value_with_attributes() {
        let compiler = compiler(
            r#"<xs:complexType name="Temperature">
                 <xs:simpleContent><xs:extension base="xs:decimal">
                   <xs:attribute name="unit" type="xs:string" default="C"/>
                 </xs:extension></xs:simpleContent>
               </xs:complexType>"#,
        );
        let temp = compiler.factory("Temperature").unwrap();
        assert_eq!(names(&temp), vec!["value", "_unit"]);
        assert!(temp.fields[0].has(Flags::PROPERTY));
        assert_eq!(temp.fields[1].default.as_deref(), Some("C"));
    }

    #[test]
    fn test_choice_groups_and_wildcards() {
        let compiler = compiler(
            r#"<xs:group name="Contact">
                 <xs:choice>
                   <xs:element name="email" type="xs:string"/>
                   <xs:element name="phone" type="xs:string"/>
                 </xs:choice>
               </xs:group>
               <xs:attributeGroup name="Audit">
                 <xs:attribute name="created" type="xs:dateTime"/>
               </xs:attributeGroup>
               <xs:complexType name="Card">
                 <xs:sequence>
                   <xs:group ref="t:Contact"/>
                   <xs:any minOccurs="0" maxOccurs="unbounded"/>
                 </xs:sequence>
                 <xs:attributeGroup ref="t:Audit"/>
                 <xs:anyAttribute/>
               </xs:complexType>"#,
        );
        let card = compiler.factory("Card").unwrap();
        assert_eq!(names(&card), vec!["email", "phone", ANY_FIELD, "_created"]);
        assert!(card.fields[0].has(Flags::CHOICE));
        assert!(card.has_open_content());
        assert!(!card.fields[3].has(Flags::CHOICE));
    }

    #[test]
    fn test_anonymous_types_and_element_aliases() {
        let compiler = compiler(
            r#"<xs:element name="order">
                 <xs:complexType><xs:sequence>
                   <xs:element name="line" maxOccurs="unbounded">
                     <xs:complexType><xs:attribute name="sku" type="xs:string"/></xs:complexType>
                   </xs:element>
                 </xs:sequence></xs:complexType>
               </xs:element>
               <xs:element name="count" type="xs:int"/>"#,
        );
        let order = compiler.factory("order").unwrap();
        assert_eq!(
            order.fields[0].type_ref,
            TypeRef::Named(QName::namespaced("urn:t", "order_line"))
        );
        assert!(compiler
            .cache()
            .contains(&QName::namespaced("urn:t", "order_line")));
        assert_eq!(compiler.factory("count").unwrap().simple, Some(Primitive::Int));
    }

    #[test]
    fn test_self_reference() {
        let compiler = compiler(
            r#"<xs:complexType name="Node">
                 <xs:sequence>
                   <xs:element name="child" type="t:Node" minOccurs="0" maxOccurs="unbounded"/>
                 </xs:sequence>
               </xs:complexType>"#,
        );
        let node = compiler.factory("Node").unwrap();
        assert_eq!(
            node.fields[0].type_ref,
            TypeRef::Named(QName::namespaced("urn:t", "Node"))
        );
        assert!(!node.fields[0].has(Flags::SIMPLE));
    }

    #[test]
    fn test_circular_extension_fails() {
        let compiler = compiler(
            r#"<xs:complexType name="A">
                 <xs:complexContent><xs:extension base="t:B"/></xs:complexContent>
               </xs:complexType>
               <xs:complexType name="B">
                 <xs:complexContent><xs:extension base="t:A"/></xs:complexContent>
               </xs:complexType>"#,
        );
        let err = compiler.factory("A").unwrap_err();
        assert!(err.to_string().contains("circular type definition"));
    }

    #[test]
    fn test_base_containing_derived_type() {
        let body = r#"<xs:complexType name="Shape">
                 <xs:sequence>
                   <xs:element name="label" type="xs:string"/>
                   <xs:element name="part" type="t:Circle" minOccurs="0" maxOccurs="unbounded"/>
                 </xs:sequence>
               </xs:complexType>
               <xs:complexType name="Circle">
                 <xs:complexContent>
                   <xs:extension base="t:Shape">
                     <xs:sequence><xs:element name="r" type="xs:double"/></xs:sequence>
                   </xs:extension>
                 </xs:complexContent>
               </xs:complexType>"#;
        let circle = QName::namespaced("urn:t", "Circle");

        let base_first = compiler(body);
        let shape = base_first.factory("Shape").unwrap();
        assert_eq!(names(&shape), vec!["label", "part"]);
        assert!(!shape.fields[1].has(Flags::SIMPLE));
        let derived = base_first.factory_qname(&circle).unwrap();
        assert_eq!(names(&derived), vec!["label", "part", "r"]);
        assert!(derived.is_a(&shape.name));

        let derived_first = compiler(body);
        let derived = derived_first.factory_qname(&circle).unwrap();
        assert_eq!(names(&derived), vec!["label", "part", "r"]);
        assert_eq!(names(&derived_first.factory("Shape").unwrap()), vec!["label", "part"]);
    }

    #[test]
    fn test_schema_errors() {
        let compiler = compiler(
            r#"<xs:complexType name="Complex"/>
               <xs:complexType name="BadAttr">
                 <xs:attribute name="x" type="t:Complex"/>
               </xs:complexType>
               <xs:complexType name="Foreign" xmlns:f="urn:f">
                 <f:element name="x"/>
               </xs:complexType>
               <xs:complexType name="Mixed">
                 <xs:simpleContent><xs:extension base="xs:string"/></xs:simpleContent>
                 <xs:sequence><xs:element name="x" type="xs:string"/></xs:sequence>
               </xs:complexType>"#,
        );
        assert!(matches!(compiler.factory("BadAttr"), Err(Error::InvalidSchema(_))));
        assert!(matches!(compiler.factory("Foreign"), Err(Error::InvalidSchema(_))));
        assert!(matches!(compiler.factory("Mixed"), Err(Error::InvalidSchema(_))));
        assert!(matches!(compiler.factory("Missing"), Err(Error::SchemaResolution(_))));
    }

    #[derive(Debug)]
    struct Tracked;

    impl BaseClass for Tracked {
        fn name(&self) -> &str {
            "Tracked"
        }

        fn fields(&self) -> Vec<FieldSpec> {
            vec![FieldSpec::new(
                "_revision",
                TypeRef::Primitive(Primitive::Int),
                Occurs::OPTIONAL,
                Flags::ATTRIBUTE,
            )]
        }
    }

    #[test]
    fn test_base_class_strategy() {
        let compiler = compiler(
            r#"<xs:complexType name="Doc">
                 <xs:sequence><xs:element name="title" type="xs:string"/></xs:sequence>
               </xs:complexType>"#,
        )
        .with_base_class(Arc::new(Tracked));
        let doc = compiler.factory("Doc").unwrap();
        assert_eq!(names(&doc), vec!["_revision", "title"]);
        assert!(doc.dump().contains("\"Tracked\""));
    }
}
