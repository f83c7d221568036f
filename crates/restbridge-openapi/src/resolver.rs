//! `$ref` inlining and `allOf` merging over the raw document.
//!
//! Components are addressed by JSON pointer into the flat document; no
//! cyclic data structure is ever produced. Each traversal carries a visited
//! set of pointers: re-entering a pointer already on the current path means
//! a reference cycle, and the node is replaced by an empty schema at that
//! point.
//!
//! `allOf` collapses into a single object schema by merging property maps
//! left to right and unioning `required`. `oneOf`, `anyOf` and `not` keep
//! their combinator structure; only references inside them are inlined.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::{OpenApiError, Result};

/// Inline every `#/components/**` reference reachable from `node`,
/// resolving against `doc`.
pub fn resolve(doc: &Value, node: &Value) -> Result<Value> {
    let mut visited = HashSet::new();
    inline(doc, node, &mut visited)
}

fn inline(doc: &Value, node: &Value, visited: &mut HashSet<String>) -> Result<Value> {
    match node {
        Value::Object(object) => {
            if let Some(Value::String(reference)) = object.get("$ref") {
                return inline_ref(doc, reference, visited);
            }
            if let Some(Value::Array(subschemas)) = object.get("allOf") {
                return merge_all_of(doc, object, subschemas, visited);
            }
            let mut out = Map::with_capacity(object.len());
            for (key, value) in object {
                out.insert(key.clone(), inline(doc, value, visited)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| inline(doc, item, visited))
                .collect::<Result<_>>()?,
        )),
        other => Ok(other.clone()),
    }
}

fn inline_ref(doc: &Value, reference: &str, visited: &mut HashSet<String>) -> Result<Value> {
    let pointer = reference.strip_prefix('#').ok_or_else(|| {
        OpenApiError::SpecShape(format!("external $ref {reference:?} is not supported"))
    })?;
    if !pointer.starts_with("/components/") {
        return Err(OpenApiError::SpecShape(format!(
            "$ref {reference:?} does not point into #/components"
        )));
    }
    if visited.contains(pointer) {
        // Cycle: break with an empty schema.
        return Ok(Value::Object(Map::new()));
    }
    let target = doc.pointer(pointer).ok_or_else(|| {
        OpenApiError::SpecShape(format!("unresolvable $ref {reference:?}"))
    })?;

    visited.insert(pointer.to_string());
    let resolved = inline(doc, target, visited);
    visited.remove(pointer);
    resolved
}

fn merge_all_of(
    doc: &Value,
    object: &Map<String, Value>,
    subschemas: &[Value],
    visited: &mut HashSet<String>,
) -> Result<Value> {
    // Siblings of allOf form the base; subschemas merge over it in order.
    let mut merged = Map::with_capacity(object.len());
    for (key, value) in object {
        if key != "allOf" {
            merged.insert(key.clone(), inline(doc, value, visited)?);
        }
    }
    for subschema in subschemas {
        let resolved = inline(doc, subschema, visited)?;
        if let Value::Object(resolved) = resolved {
            merge_into(&mut merged, resolved);
        }
    }
    Ok(Value::Object(merged))
}

fn merge_into(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (key.as_str(), target.get_mut(&key), value) {
            ("properties", Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (name, schema) in incoming {
                    existing.insert(name, schema);
                }
            }
            ("required", Some(Value::Array(existing)), Value::Array(incoming)) => {
                for entry in incoming {
                    if !existing.contains(&entry) {
                        existing.push(entry);
                    }
                }
            }
            (_, _, value) => {
                target.insert(key, value);
            }
        }
    }
}
