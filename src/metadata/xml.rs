// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! XML document to nested mapping conversion.
//!
//! Produces the same shape the collator expects from OME-XML:
//! - attributes become `@name` keys with string values
//! - a leaf element with no attributes becomes its text (or `null` if empty)
//! - text of an element that also has attributes or children is kept under `#text`
//! - repeated child elements with the same name become an array
//!
//! Namespace prefixes are dropped; only local names are used as keys.

use serde_json::{Map, Value};

use crate::core::{Result, ToileError};

/// Parse an XML document into a mapping keyed by its root element name.
pub fn parse_document(text: &str) -> Result<Map<String, Value>> {
    let doc = roxmltree::Document::parse(text).map_err(|e| ToileError::metadata(e.to_string()))?;
    let root = doc.root_element();

    let mut map = Map::new();
    map.insert(root.tag_name().name().to_string(), element_to_value(root));
    Ok(map)
}

fn element_to_value(node: roxmltree::Node<'_, '_>) -> Value {
    let mut map = Map::new();

    for attr in node.attributes() {
        map.insert(
            format!("@{}", attr.name()),
            Value::String(attr.value().to_string()),
        );
    }

    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            let name = child.tag_name().name().to_string();
            let value = element_to_value(child);
            // Element values are never arrays, so an existing array means a repeat.
            match map.get_mut(&name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(name, value);
                }
            }
        } else if child.is_text() {
            if let Some(t) = child.text() {
                text.push_str(t);
            }
        }
    }

    let text = text.trim();
    if map.is_empty() {
        if text.is_empty() {
            Value::Null
        } else {
            Value::String(text.to_string())
        }
    } else {
        if !text.is_empty() {
            map.insert("#text".to_string(), Value::String(text.to_string()));
        }
        Value::Object(map)
    }
}
