use std::fmt::Write as _;

use crate::value::Value;

/// JSON text with no whitespace.
pub fn compact(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, false, 0);
    out
}

/// JSON text indented by two spaces per level.
pub fn pretty(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, true, 0);
    out
}

fn write_value(out: &mut String, value: &Value, pretty: bool, level: usize) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => write_float(out, *f),
        Value::Str(s) => write_string(out, s),
        Value::List(items) => write_container(
            out,
            ('[', ']'),
            items.iter().map(|item| (None, item)),
            pretty,
            level,
        ),
        Value::Map(map) => write_container(
            out,
            ('{', '}'),
            map.iter().map(|(k, v)| (Some(k.as_str()), v)),
            pretty,
            level,
        ),
    }
}

fn write_container<'v>(
    out: &mut String,
    (open, close): (char, char),
    entries: impl ExactSizeIterator<Item = (Option<&'v str>, &'v Value)>,
    pretty: bool,
    level: usize,
) {
    out.push(open);
    if entries.len() == 0 {
        out.push(close);
        return;
    }
    for (i, (key, value)) in entries.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if pretty {
            newline(out, level + 1);
        }
        if let Some(key) = key {
            write_string(out, key);
            out.push(':');
            if pretty {
                out.push(' ');
            }
        }
        write_value(out, value, pretty, level + 1);
    }
    if pretty {
        newline(out, level);
    }
    out.push(close);
}

fn newline(out: &mut String, level: usize) {
    out.push('\n');
    for _ in 0..level {
        out.push_str("  ");
    }
}

/// Integral floats keep a `.0` so they read back as floats. NaN and the
/// infinities have no JSON form and are written as `null`.
fn write_float(out: &mut String, f: f64) {
    if !f.is_finite() {
        out.push_str("null");
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        let _ = write!(out, "{f:.1}");
    } else {
        let _ = write!(out, "{f}");
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;

    fn sample() -> Value {
        let mut map = IndexMap::new();
        map.insert("name".to_string(), Value::from("a\"b\nc"));
        map.insert("ratio".to_string(), Value::Float(2.0));
        map.insert("count".to_string(), Value::Int(25002));
        map.insert("on".to_string(), Value::Bool(false));
        map.insert("none".to_string(), Value::Null);
        map.insert(
            "list".to_string(),
            Value::List(vec![Value::Int(1), Value::Float(0.5)]),
        );
        map.insert("empty".to_string(), Value::Map(IndexMap::new()));
        Value::Map(map)
    }

    #[test]
    fn compact_output() {
        assert_eq!(
            compact(&sample()),
            r#"{"name":"a\"b\nc","ratio":2.0,"count":25002,"on":false,"none":null,"list":[1,0.5],"empty":{}}"#
        );
    }

    #[test]
    fn pretty_output() {
        assert_eq!(
            pretty(&sample()),
            r#"{
  "name": "a\"b\nc",
  "ratio": 2.0,
  "count": 25002,
  "on": false,
  "none": null,
  "list": [
    1,
    0.5
  ],
  "empty": {}
}"#
        );
    }

    #[test]
    fn output_is_valid_json() {
        let parsed: serde_json::Value = serde_json::from_str(&compact(&sample())).unwrap();
        assert_eq!(parsed["name"], "a\"b\nc");
        assert_eq!(parsed["count"], 25002);
        let parsed: serde_json::Value = serde_json::from_str(&pretty(&sample())).unwrap();
        assert_eq!(parsed["list"][1], 0.5);
    }

    #[test]
    fn control_characters_and_non_finite_floats() {
        assert_eq!(compact(&Value::from("\u{1}")), "\"\\u0001\"");
        assert_eq!(compact(&Value::Float(f64::NAN)), "null");
        assert_eq!(compact(&Value::List(Vec::new())), "[]");
    }
}
