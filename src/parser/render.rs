use std::fmt::Write as _;

use crate::store::PropertyStore;
use crate::types::Format;

use super::properties;

/// Write `store` back out in the given dialect.
///
/// Nested dialects regroup dotted keys into scopes. Keys are visited in
/// store order, so a scope reopens when its keys are not contiguous.
pub fn render(store: &PropertyStore, format: Format) -> String {
    match format {
        Format::Properties => store
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}\n",
                    properties::escape(k, true),
                    properties::escape(v, false)
                )
            })
            .collect(),
        Format::Hocon => nested(store, &HOCON),
        Format::Json => nested(store, &JSON),
        Format::Yaml => nested(store, &YAML),
    }
}

struct Style {
    open: fn(&str) -> String,
    close: Option<&'static str>,
    leaf: fn(&str, &str) -> String,
    wrap: bool,
}

const HOCON: Style = Style {
    open: hocon_open,
    close: Some("}"),
    leaf: hocon_leaf,
    wrap: false,
};

const JSON: Style = Style {
    open: json_open,
    close: Some("}"),
    leaf: json_leaf,
    wrap: true,
};

const YAML: Style = Style {
    open: yaml_open,
    close: None,
    leaf: yaml_leaf,
    wrap: false,
};

fn hocon_open(key: &str) -> String {
    format!("{} {{", hocon_key(key))
}

fn hocon_leaf(key: &str, value: &str) -> String {
    format!("{} = {}", hocon_key(key), quote(value))
}

fn json_open(key: &str) -> String {
    format!("{} : {{", quote(key))
}

fn json_leaf(key: &str, value: &str) -> String {
    format!("{} : {},", quote(key), quote(value))
}

fn yaml_open(key: &str) -> String {
    format!("{key}:")
}

fn yaml_leaf(key: &str, value: &str) -> String {
    format!("{key}: {value}")
}

fn nested(store: &PropertyStore, style: &Style) -> String {
    let mut out = String::new();
    let base = usize::from(style.wrap);
    if style.wrap {
        out.push_str("{\n");
    }
    let mut open: Vec<&str> = Vec::new();

    for (key, value) in store.iter() {
        let segments: Vec<&str> = key.split('.').collect();
        let Some((leaf, scopes)) = segments.split_last() else {
            continue;
        };

        let shared = open
            .iter()
            .zip(scopes)
            .take_while(|(a, b)| a == b)
            .count();
        while open.len() > shared {
            open.pop();
            if let Some(close) = style.close {
                let _ = writeln!(out, "{}{close}", indent(base + open.len()));
            }
        }
        for &scope in &scopes[shared..] {
            let _ = writeln!(out, "{}{}", indent(base + open.len()), (style.open)(scope));
            open.push(scope);
        }
        let _ = writeln!(out, "{}{}", indent(base + open.len()), (style.leaf)(leaf, value));
    }

    while !open.is_empty() {
        open.pop();
        if let Some(close) = style.close {
            let _ = writeln!(out, "{}{close}", indent(base + open.len()));
        }
    }
    if style.wrap {
        out.push_str("}\n");
    }
    out
}

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

fn quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn hocon_key(segment: &str) -> String {
    if !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        segment.to_string()
    } else {
        quote(segment)
    }
}
