//! JSON rendering of evaluation results.
//!
//! Output is deterministic: object keys are emitted in sorted order and
//! numbers keep their integer/float distinction. Results are expected to be
//! fully resolved before printing; `undefined`, an unresolved flow, and the
//! omit sentinel have no JSON spelling and render as `null`.
//!
//! # Examples
//!
//! ```
//! use rill_lang::Value;
//! use rill_lang::output::{to_json, to_json_pretty};
//!
//! assert_eq!(to_json(&Value::Integer(42)), "42");
//! assert_eq!(to_json_pretty(&Value::Integer(42)), "42");
//! ```

use std::collections::HashMap;

use crate::value::Value;

/// Renders a value as compact JSON: no whitespace, sorted object keys.
///
/// # Examples
///
/// ```
/// use rill_lang::Value;
/// use rill_lang::output::to_json;
/// use std::collections::HashMap;
///
/// let mut obj = HashMap::new();
/// obj.insert("name".to_string(), Value::String("Alice".to_string()));
/// obj.insert("age".to_string(), Value::Integer(30));
///
/// assert_eq!(to_json(&Value::Object(obj)), r#"{"age":30,"name":"Alice"}"#);
/// ```
pub fn to_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, None, 0);
    out
}

/// Renders a value as pretty-printed JSON with two-space indentation and
/// sorted object keys.
pub fn to_json_pretty(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, Some("  "), 0);
    out
}

fn write_value(out: &mut String, value: &Value, indent: Option<&str>, depth: usize) {
    match value {
        Value::Null | Value::Undefined | Value::Flow(_) | Value::Omit => out.push_str("null"),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(n) => out.push_str(&n.to_string()),
        Value::Float(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => write_array(out, items, indent, depth),
        Value::Object(map) => write_object(out, map, indent, depth),
    }
}

fn write_array(out: &mut String, items: &[Value], indent: Option<&str>, depth: usize) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        break_line(out, indent, depth + 1);
        write_value(out, item, indent, depth + 1);
    }
    break_line(out, indent, depth);
    out.push(']');
}

fn write_object(out: &mut String, map: &HashMap<String, Value>, indent: Option<&str>, depth: usize) {
    if map.is_empty() {
        out.push_str("{}");
        return;
    }
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by_key(|(key, _)| key.as_str());
    out.push('{');
    for (i, (key, item)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        break_line(out, indent, depth + 1);
        write_string(out, key);
        out.push(':');
        if indent.is_some() {
            out.push(' ');
        }
        write_value(out, item, indent, depth + 1);
    }
    break_line(out, indent, depth);
    out.push('}');
}

fn break_line(out: &mut String, indent: Option<&str>, depth: usize) {
    if let Some(unit) = indent {
        out.push('\n');
        for _ in 0..depth {
            out.push_str(unit);
        }
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
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_strings() {
        assert_eq!(
            to_json(&Value::String("a\"b\\c\nd".to_string())),
            r#""a\"b\\c\nd""#
        );
        assert_eq!(
            to_json(&Value::String("\u{0007}".to_string())),
            "\"\\u0007\""
        );
    }

    #[test]
    fn pretty_prints_nested_values() {
        let mut inner = HashMap::new();
        inner.insert("b".to_string(), Value::Integer(1));
        inner.insert("a".to_string(), Value::Array(vec![Value::Null]));
        let value = Value::Object(inner);
        assert_eq!(
            to_json_pretty(&value),
            "{\n  \"a\": [\n    null\n  ],\n  \"b\": 1\n}"
        );
        assert_eq!(to_json(&value), r#"{"a":[null],"b":1}"#);
    }

    #[test]
    fn undefined_has_no_json_spelling() {
        assert_eq!(to_json(&Value::Undefined), "null");
    }
}
