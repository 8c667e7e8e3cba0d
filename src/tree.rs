//! Convert between flat dotted keys and nested [`Value`] maps.
//!
//! `("database.url", "pg://")` becomes `{database = {url = "pg://"}}` and
//! back. Values stay strings on the way in: typing happens when the tree is
//! bound.

use indexmap::IndexMap;

use crate::value::Value;

/// Regroup dotted-key pairs into a nested map.
///
/// If a key is both a leaf and a prefix of other keys (`a = 1` and
/// `a.b = 2`), the nested keys win and the leaf is dropped.
pub fn unflatten<'a, I>(pairs: I) -> Value
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut table = IndexMap::new();
    for (dotted_key, value) in pairs {
        set_nested(&mut table, dotted_key, Value::Str(value));
    }
    Value::Map(table)
}

fn set_nested(table: &mut IndexMap<String, Value>, dotted_key: &str, value: Value) {
    let (parents, leaf) = match dotted_key.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, dotted_key),
    };
    let mut current = table;

    for segment in parents.into_iter().flat_map(|p| p.split('.')) {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Map(IndexMap::new()));
        if !matches!(entry, Value::Map(_)) {
            tracing::debug!(key = dotted_key, segment, "nested keys replace a leaf value");
            *entry = Value::Map(IndexMap::new());
        }
        let Value::Map(next) = entry else {
            return;
        };
        current = next;
    }

    if matches!(current.get(leaf), Some(Value::Map(_))) {
        tracing::debug!(key = dotted_key, "leaf value shadowed by nested keys");
        return;
    }
    current.insert(leaf.to_string(), value);
}

/// Flatten a nested map into dotted-key pairs, depth first in map order.
/// Non-map leaves are written with [`Value::to_property`].
pub fn flatten(value: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    collect(value, "", &mut out);
    out
}

fn collect(value: &Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        Value::Map(map) => {
            for (key, child) in map {
                let dotted = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect(child, &dotted, out);
            }
        }
        leaf if !prefix.is_empty() => out.push((prefix.to_string(), leaf.to_property())),
        _ => {}
    }
}
