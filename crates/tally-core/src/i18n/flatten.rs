//! Conversion between nested message trees and flat key paths

use serde_json::{Map, Value};

/// Path of object keys from the root to a leaf
pub type KeyPath = Vec<String>;

/// Dotted form of a key path, e.g. `dashboard.totals.income`
pub fn dotted(path: &[String]) -> String {
    path.join(".")
}

/// Every leaf of `value` with its key path
///
/// Objects are descended into; anything else (strings, numbers, arrays, null)
/// is a leaf. An empty object is kept as a leaf so the shape survives a round
/// trip through `unflatten`.
pub fn flatten(value: &Value) -> Vec<(KeyPath, Value)> {
    let mut leaves = Vec::new();
    flatten_into(value, &mut Vec::new(), &mut leaves);
    leaves
}

fn flatten_into(value: &Value, prefix: &mut KeyPath, leaves: &mut Vec<(KeyPath, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                prefix.push(key.clone());
                flatten_into(child, prefix, leaves);
                prefix.pop();
            }
        }
        leaf => leaves.push((prefix.clone(), leaf.clone())),
    }
}

/// Rebuild a nested object from key paths
pub fn unflatten<I>(leaves: I) -> Value
where
    I: IntoIterator<Item = (KeyPath, Value)>,
{
    let mut root = Value::Object(Map::new());
    for (path, value) in leaves {
        insert_at(&mut root, &path, value);
    }
    root
}

fn insert_at(node: &mut Value, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map
            .entry(first.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        insert_at(child, rest, value);
    }
}
