// SPDX-License-Identifier: MIT

//! The one JSON contract manifest-properties and queue-input payloads are
//! canonicalized through: camelCase keys, nulls omitted, a bounded nesting
//! depth, and no injected `$id`/`$ref`/`$values` artifacts.
//!
//! Typed wire DTOs get most of this for free from
//! `#[serde(rename_all = "camelCase")]` and `skip_serializing_if`. This
//! module exists for the one place that doesn't: the opaque
//! `serde_json::Value` a caller hands in as a manifest's
//! `input_properties` or a queued item's `input`, which has no `#[serde]`
//! attributes of its own to lean on.

use serde_json::{Map, Value};
use thiserror::Error;

/// Values nested deeper than this are rejected rather than silently
/// truncated or flattened.
pub const MAX_DEPTH: usize = 8;

const DISALLOWED_KEYS: [&str; 3] = ["$id", "$ref", "$values"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("value nests deeper than the maximum of {MAX_DEPTH}")]
    TooDeep,
}

/// Canonicalize `value` for the wire: recursively drop `null` fields,
/// rename object keys to camelCase, and strip any `$id`/`$ref`/`$values`
/// key a caller's JSON happened to include (this contract never injects
/// or preserves reference-cycle artifacts).
pub fn canonicalize(value: &Value) -> Result<Value, ContractError> {
    canonicalize_at_depth(value, 0)
}

fn canonicalize_at_depth(value: &Value, depth: usize) -> Result<Value, ContractError> {
    if depth > MAX_DEPTH {
        return Err(ContractError::TooDeep);
    }
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, v) in map {
                if v.is_null() || DISALLOWED_KEYS.contains(&key.as_str()) {
                    continue;
                }
                out.insert(to_camel_case(key), canonicalize_at_depth(v, depth + 1)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(canonicalize_at_depth(item, depth + 1)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

/// `snake_case` or `kebab-case` to `camelCase`. Keys already in camelCase
/// (or with no separators) pass through unchanged.
fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut capitalize_next = false;
    for ch in key.chars() {
        if ch == '_' || ch == '-' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
