//! Schema registry tests over schema files on disk
//!
//! Documents are written to a temporary directory so that `include` and
//! `import` locations are resolved the way they are for real schema sets.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use xsdbind::{
    Compiler, Document, Error, LoadOptions, QName, Record, SchemaRegistry, TypeCache, Value,
};

const MAIN: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    xmlns:o="urn:orders" xmlns:c="urn:common" targetNamespace="urn:orders">
  <xs:include schemaLocation="parts/lines.xsd"/>
  <xs:import namespace="urn:common" schemaLocation="common/money.xsd"/>
  <xs:element name="order" type="o:Order"/>
  <xs:complexType name="Order">
    <xs:sequence>
      <xs:element name="line" type="o:Line" maxOccurs="unbounded"/>
      <xs:element name="total" type="c:Money"/>
    </xs:sequence>
    <xs:attribute name="number" type="xs:string" use="required"/>
  </xs:complexType>
</xs:schema>"#;

const LINES: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    xmlns:o="urn:orders" xmlns:c="urn:common" targetNamespace="urn:orders">
  <xs:include schemaLocation="../parts/lines.xsd"/>
  <xs:complexType name="Line">
    <xs:sequence>
      <xs:element name="sku" type="xs:string"/>
      <xs:element name="quantity" type="xs:unsignedShort"/>
      <xs:element name="price" type="c:Money"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

const MONEY: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    xmlns:c="urn:common" targetNamespace="urn:common">
  <xs:complexType name="Money">
    <xs:simpleContent>
      <xs:extension base="xs:decimal">
        <xs:attribute name="currency" type="xs:string" default="EUR"/>
      </xs:extension>
    </xs:simpleContent>
  </xs:complexType>
</xs:schema>"#;

const ORDER: &str = r#"<o:order xmlns:o="urn:orders" number="A-17">
  <line><sku>X1</sku><quantity>2</quantity><price>9.95</price></line>
  <line><sku>Y2</sku><quantity>1</quantity><price currency="USD">20</price></line>
  <total>39.90</total>
</o:order>"#;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn schema_set() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "orders.xsd", MAIN);
    write(dir.path(), "parts/lines.xsd", LINES);
    write(dir.path(), "common/money.xsd", MONEY);
    dir
}

fn load(dir: &TempDir) -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    let main = dir.path().join("orders.xsd");
    let namespace = registry.load(main.as_path(), &LoadOptions::new()).unwrap();
    assert_eq!(namespace.as_deref(), Some("urn:orders"));
    registry
}

#[test]
fn test_include_and_import() {
    let dir = schema_set();
    let registry = load(&dir);

    assert!(registry.contains(Some("urn:orders")));
    assert!(registry.contains(Some("urn:common")));
    assert!(registry
        .type_decl(&QName::namespaced("urn:orders", "Line"))
        .unwrap()
        .is_some());
    assert!(registry
        .type_decl(&QName::namespaced("urn:common", "Money"))
        .unwrap()
        .is_some());
    assert_eq!(registry.prefix_for("urn:common"), Some("c"));
}

#[test]
fn test_relative_path_context() {
    let dir = schema_set();
    let mut registry = SchemaRegistry::new();
    let options = LoadOptions::new().with_path_context(format!("{}/", dir.path().display()));
    registry.load("orders.xsd", &options).unwrap();
    assert!(registry.contains(Some("urn:common")));
}

#[test]
fn test_missing_schema_file() {
    let dir = TempDir::new().unwrap();
    let mut registry = SchemaRegistry::new();
    let missing = dir.path().join("nope.xsd");
    let result = registry.load(missing.as_path(), &LoadOptions::new());
    assert!(result.is_err());
}

#[test]
fn test_decode_across_namespaces() {
    let dir = schema_set();
    let compiler = Compiler::new(Arc::new(load(&dir)))
        .with_namespace("urn:orders")
        .with_cache(Arc::new(TypeCache::new()));
    let handle = compiler.bind("order").unwrap();
    let order = handle
        .from_xml(&Document::from_string(ORDER).unwrap().root.unwrap())
        .unwrap();
    let order = order.as_record().unwrap();

    assert_eq!(order["_number"], Value::from("A-17"));
    let lines = order["line"].as_list().unwrap();
    assert_eq!(lines.len(), 2);

    let first = lines[0].as_record().unwrap();
    assert_eq!(first["quantity"], Value::Int(2));
    let price = first["price"].as_record().unwrap();
    assert_eq!(price.type_name(), Some(&QName::namespaced("urn:common", "Money")));
    assert_eq!(price["_currency"], Value::from("EUR"));

    let second = lines[1].as_record().unwrap();
    assert_eq!(second["price"].as_record().unwrap()["_currency"], Value::from("USD"));

    let total = order["total"].as_record().unwrap();
    assert_eq!(total["value"], Value::Decimal("39.90".parse().unwrap()));
}

#[test]
fn test_fragment_merge() {
    let dir = schema_set();
    let mut registry = load(&dir);
    let fragment = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        targetNamespace="urn:orders">
      <xs:complexType name="Invoice">
        <xs:sequence><xs:element name="ref" type="xs:string"/></xs:sequence>
      </xs:complexType>
    </xs:schema>"#;
    let root = Document::from_string(fragment).unwrap().root.unwrap();

    // Without the fragment flag an already loaded namespace is kept
    registry.load(root.clone(), &LoadOptions::new()).unwrap();
    let invoice = QName::namespaced("urn:orders", "Invoice");
    assert!(registry.type_decl(&invoice).unwrap().is_none());

    registry
        .load(root, &LoadOptions::new().with_fragment(true))
        .unwrap();
    assert!(registry.type_decl(&invoice).unwrap().is_some());
    assert!(registry
        .type_decl(&QName::namespaced("urn:orders", "Order"))
        .unwrap()
        .is_some());

    let compiler = Compiler::new(Arc::new(registry))
        .with_namespace("urn:orders")
        .with_cache(Arc::new(TypeCache::new()));
    let invoice = compiler
        .bind("Invoice")
        .unwrap()
        .from_value(Record::from_pairs([("ref", "INV-1")]))
        .unwrap();
    assert_eq!(invoice.as_record().unwrap()["ref"], Value::from("INV-1"));
}

#[test]
fn test_unknown_names() {
    let dir = schema_set();
    let compiler = Compiler::new(Arc::new(load(&dir)))
        .with_namespace("urn:orders")
        .with_cache(Arc::new(TypeCache::new()));
    assert!(matches!(compiler.factory("Nothing"), Err(Error::SchemaResolution(_))));
    assert!(matches!(
        compiler.factory("{urn:elsewhere}Order"),
        Err(Error::SchemaResolution(_))
    ));
    assert!(compiler.factory("zz:Order").is_err());
}
