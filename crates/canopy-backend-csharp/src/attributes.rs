//! Attribute extractors for C# constructs.
//!
//! Each extractor is a pure function from a syntax node to an attribute
//! map, registered once per kind in [`csharp_attribute_table`].

use canopy_core::{AttributeTable, Attributes, SyntaxNode};
use serde_json::{json, Value};

const NAME_KINDS: &[&str] = &[
    "identifier",
    "qualified_name",
    "generic_name",
    "alias_qualified_name",
];

const NON_TYPE_KINDS: &[&str] = &["attribute_list", "modifier", "parameter_modifier", "comment"];

/// Builds the dispatch table for every supported C# construct.
pub fn csharp_attribute_table() -> AttributeTable {
    AttributeTable::new()
        .with("compilation_unit", compilation_unit)
        .with("namespace_declaration", namespace)
        .with("file_scoped_namespace_declaration", namespace)
        .with("using_directive", using_directive)
        .with("class_declaration", type_declaration)
        .with("struct_declaration", type_declaration)
        .with("interface_declaration", type_declaration)
        .with("record_declaration", type_declaration)
        .with("record_struct_declaration", type_declaration)
        .with("enum_declaration", type_declaration)
        .with("method_declaration", method)
        .with("local_function_statement", method)
        .with("constructor_declaration", constructor)
        .with("destructor_declaration", constructor)
        .with("property_declaration", property)
        .with("indexer_declaration", property)
        .with("field_declaration", field)
        .with("event_field_declaration", field)
        .with("event_declaration", event)
        .with("delegate_declaration", delegate)
        .with("enum_member_declaration", enum_member)
        .with("parameter", parameter)
        .with("attribute", attribute)
        .with("invocation_expression", invocation)
}

fn text(node: &SyntaxNode, source: &str) -> String {
    node.text(source).trim().to_string()
}

fn field_text(node: &SyntaxNode, source: &str, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|field| node.child_by_field(field))
        .map(|child| text(child, source))
}

fn name_node(node: &SyntaxNode) -> Option<&SyntaxNode> {
    node.child_by_field("name")
        .or_else(|| node.first_child_of_kinds(NAME_KINDS))
}

fn name_of(node: &SyntaxNode, source: &str) -> Option<String> {
    name_node(node).map(|child| text(child, source))
}

fn modifiers(node: &SyntaxNode, source: &str) -> Vec<String> {
    node.children_of_kind("modifier")
        .map(|child| text(child, source))
        .collect()
}

/// Declared type of a member: the `type`/`returns` field, or the first
/// named child before the name that is not an attribute or modifier.
fn declared_type(node: &SyntaxNode, source: &str) -> Option<String> {
    if let Some(found) = field_text(node, source, &["type", "returns"]) {
        return Some(found);
    }
    let name_start = name_node(node).map(|name| name.span.start)?;
    node.children
        .iter()
        .take_while(|child| child.span.start < name_start)
        .filter(|child| !NON_TYPE_KINDS.contains(&child.kind_tag.as_str()))
        .last()
        .map(|child| text(child, source))
}

fn parameters(node: &SyntaxNode, source: &str) -> Value {
    let Some(list) = node
        .child_by_field("parameters")
        .or_else(|| node.first_child_of_kinds(&["parameter_list"]))
    else {
        return Value::Array(Vec::new());
    };
    list.children_of_kind("parameter")
        .map(|param| {
            json!({
                "name": name_of(param, source),
                "type": declared_type(param, source),
            })
        })
        .collect()
}

fn insert(attrs: &mut Attributes, key: &str, value: impl Into<Value>) {
    attrs.insert(key.to_string(), value.into());
}

fn insert_opt(attrs: &mut Attributes, key: &str, value: Option<String>) {
    if let Some(value) = value {
        attrs.insert(key.to_string(), Value::String(value));
    }
}

fn with_modifiers(attrs: &mut Attributes, node: &SyntaxNode, source: &str) {
    let mods = modifiers(node, source);
    insert(attrs, "isStatic", mods.iter().any(|m| m == "static"));
    insert(attrs, "modifiers", mods);
}

fn compilation_unit(node: &SyntaxNode, _source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    insert(&mut attrs, "usingCount", node.children_of_kind("using_directive").count());
    insert(
        &mut attrs,
        "hasFileScopedNamespace",
        node.children_of_kind("file_scoped_namespace_declaration").next().is_some(),
    );
    attrs
}

fn namespace(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", name_of(node, source));
    insert(
        &mut attrs,
        "fileScoped",
        node.kind_tag == "file_scoped_namespace_declaration",
    );
    attrs
}

fn using_directive(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    let raw = text(node, source);
    let mut body = raw.trim_end_matches(';').trim();
    let is_global = body.starts_with("global ");
    body = body.trim_start_matches("global").trim_start();
    body = body.trim_start_matches("using").trim_start();
    let is_static = body.starts_with("static ");
    body = body.trim_start_matches("static").trim_start();

    match body.split_once('=') {
        Some((alias, target)) => {
            insert(&mut attrs, "name", target.trim());
            insert(&mut attrs, "alias", alias.trim());
        }
        None => insert(&mut attrs, "name", body),
    }
    insert(&mut attrs, "isStatic", is_static);
    insert(&mut attrs, "isGlobal", is_global);
    attrs
}

fn type_declaration(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", name_of(node, source));
    with_modifiers(&mut attrs, node, source);

    let base_types: Vec<String> = node
        .children_of_kind("base_list")
        .flat_map(|list| list.children.iter())
        .filter(|child| child.kind_tag != "argument_list")
        .map(|child| text(child, source))
        .collect();
    insert(&mut attrs, "baseTypes", base_types);

    if let Some(params) = node.first_child_of_kinds(&["type_parameter_list"]) {
        let names: Vec<String> = params
            .children_of_kind("type_parameter")
            .map(|param| text(param, source))
            .collect();
        insert(&mut attrs, "typeParameters", names);
    }

    let members = node
        .child_by_field("body")
        .or_else(|| node.first_child_of_kinds(&["declaration_list", "enum_member_declaration_list"]))
        .map(|body| body.children.iter().filter(|c| c.kind_tag != "comment").count())
        .unwrap_or(0);
    insert(&mut attrs, "memberCount", members);
    attrs
}

fn method(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", name_of(node, source));
    insert_opt(&mut attrs, "returnType", declared_type(node, source));
    with_modifiers(&mut attrs, node, source);
    insert(
        &mut attrs,
        "isAsync",
        modifiers(node, source).iter().any(|m| m == "async"),
    );
    insert(&mut attrs, "parameters", parameters(node, source));
    insert(
        &mut attrs,
        "hasBody",
        node.first_child_of_kinds(&["block", "arrow_expression_clause"]).is_some(),
    );
    insert(
        &mut attrs,
        "isExpressionBodied",
        node.first_child_of_kinds(&["arrow_expression_clause"]).is_some(),
    );
    attrs
}

fn constructor(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", name_of(node, source));
    with_modifiers(&mut attrs, node, source);
    insert(&mut attrs, "parameters", parameters(node, source));
    attrs
}

fn property(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    if node.kind_tag == "indexer_declaration" {
        insert(&mut attrs, "name", "this");
    } else {
        insert_opt(&mut attrs, "name", name_of(node, source));
    }
    insert_opt(&mut attrs, "type", declared_type(node, source));
    with_modifiers(&mut attrs, node, source);

    let accessors: Vec<String> = node
        .children_of_kind("accessor_list")
        .flat_map(|list| list.children_of_kind("accessor_declaration"))
        .filter_map(|accessor| {
            accessor
                .text(source)
                .split(|c: char| !c.is_alphanumeric())
                .find(|word| matches!(*word, "get" | "set" | "init" | "add" | "remove"))
                .map(str::to_string)
        })
        .collect();
    insert(&mut attrs, "accessors", accessors);
    attrs
}

fn field(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    with_modifiers(&mut attrs, node, source);
    if let Some(declaration) = node.first_child_of_kinds(&["variable_declaration"]) {
        let declared = field_text(declaration, source, &["type"]).or_else(|| {
            declaration
                .children
                .iter()
                .find(|child| child.kind_tag != "variable_declarator")
                .map(|child| text(child, source))
        });
        insert_opt(&mut attrs, "type", declared);
        let names: Vec<String> = declaration
            .children_of_kind("variable_declarator")
            .filter_map(|declarator| name_of(declarator, source))
            .collect();
        insert(&mut attrs, "names", names);
    }
    insert(&mut attrs, "isEvent", node.kind_tag == "event_field_declaration");
    attrs
}

fn event(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", name_of(node, source));
    insert_opt(&mut attrs, "type", declared_type(node, source));
    with_modifiers(&mut attrs, node, source);
    attrs
}

fn delegate(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", name_of(node, source));
    insert_opt(&mut attrs, "returnType", declared_type(node, source));
    with_modifiers(&mut attrs, node, source);
    insert(&mut attrs, "parameters", parameters(node, source));
    attrs
}

fn enum_member(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    let name = name_node(node);
    insert_opt(&mut attrs, "name", name.map(|n| text(n, source)));
    let value = node.child_by_field("value").or_else(|| {
        let name_end = name?.span.end;
        node.children.iter().find(|child| child.span.start > name_end)
    });
    insert_opt(&mut attrs, "value", value.map(|v| text(v, source)));
    attrs
}

fn parameter(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", name_of(node, source));
    insert_opt(&mut attrs, "type", declared_type(node, source));
    attrs
}

fn attribute(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", name_of(node, source));
    let arguments = node
        .first_child_of_kinds(&["attribute_argument_list"])
        .map(|list| list.children_of_kind("attribute_argument").count())
        .unwrap_or(0);
    insert(&mut attrs, "argumentCount", arguments);
    attrs
}

fn invocation(node: &SyntaxNode, source: &str) -> Attributes {
    let mut attrs = Attributes::new();
    let target = node
        .child_by_field("function")
        .or_else(|| node.children.first());
    insert_opt(&mut attrs, "target", target.map(|t| text(t, source)));
    let arguments = node
        .child_by_field("arguments")
        .or_else(|| node.first_child_of_kinds(&["argument_list"]))
        .map(|list| list.children_of_kind("argument").count())
        .unwrap_or(0);
    insert(&mut attrs, "argumentCount", arguments);
    attrs
}
