//! Rendering an event payload for one hook.
//!
//! The payload is scoped first (summary only unless the hook asks for
//! details, then cut down to the hook's permitted top-level keys), then
//! encoded in the hook's data type.

use std::fmt::Write as _;

use serde_json::{Map, Value};
use simgate_types::EventData;

use crate::hook::{DataType, WebHook};

/// The payload `hook` is allowed to see.
pub fn scope(hook: &WebHook, data: &EventData) -> Value {
    let full = if hook.details {
        data.merged()
    } else {
        data.summary.clone()
    };
    match full {
        Value::Object(fields) if !hook.permits("*") => Value::Object(
            fields
                .into_iter()
                .filter(|(key, _value)| hook.permits(key))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Encode `payload` as a request body.
pub fn encode(data_type: DataType, payload: &Value) -> Result<String, serde_json::Error> {
    match data_type {
        DataType::Json => serde_json::to_string(payload),
        DataType::Form => {
            let json = serde_json::to_string(payload)?;
            Ok(format!("body={}", urlencoding::encode(&json)))
        }
        DataType::Xml => Ok(to_xml(payload)),
    }
}

/// Render `payload` as XML under a `<data>` root.
///
/// Object keys become element names (characters illegal in a name are
/// replaced by `_`); array items repeat the enclosing element; `null`
/// renders as an empty element.
pub fn to_xml(payload: &Value) -> String {
    let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    match payload {
        Value::Array(items) => {
            out.push_str("<data>");
            for item in items {
                write_element(&mut out, "item", item);
            }
            out.push_str("</data>");
        }
        other => write_element(&mut out, "data", other),
    }
    out
}

fn write_element(out: &mut String, name: &str, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                write_element(out, name, item);
            }
        }
        Value::Object(fields) => {
            let _ = write!(out, "<{name}>");
            for (key, field) in fields {
                write_element(out, &element_name(key), field);
            }
            let _ = write!(out, "</{name}>");
        }
        Value::Null => {
            let _ = write!(out, "<{name}/>");
        }
        Value::String(text) => {
            let _ = write!(out, "<{name}>");
            escape_into(out, text);
            let _ = write!(out, "</{name}>");
        }
        scalar @ (Value::Bool(_) | Value::Number(_)) => {
            let _ = write!(out, "<{name}>{scalar}</{name}>");
        }
    }
}

fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|first| first.is_alphabetic() || first == '_');
    if !starts_ok {
        name.insert(0, '_');
    }
    name
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn join() -> EventData {
        EventData::new(json!({ "player": { "name": "Alice" }, "world": "overworld" }))
            .with_details(json!({ "address": "10.0.0.1" }))
    }

    #[test]
    fn summary_only_without_details() {
        let mut hook = WebHook::new("http://x");
        hook.details = false;
        assert_eq!(
            scope(&hook, &join()),
            json!({ "player": { "name": "Alice" }, "world": "overworld" })
        );
        hook.details = true;
        assert_eq!(scope(&hook, &join())["address"], "10.0.0.1");
    }

    #[test]
    fn permissions_limit_top_level_keys() {
        let mut hook = WebHook::new("http://x");
        hook.permissions = vec![String::from("player")];
        assert_eq!(scope(&hook, &join()), json!({ "player": { "name": "Alice" } }));
    }

    #[test]
    fn form_body_is_url_encoded_json() {
        let body = encode(DataType::Form, &json!({ "a": "b c" })).unwrap();
        assert_eq!(body, "body=%7B%22a%22%3A%22b%20c%22%7D");
    }

    #[test]
    fn xml_has_data_root() {
        let xml = to_xml(&json!({
            "player": { "name": "A&B" },
            "tags": ["x", "y"],
            "level": 3,
            "1st": null
        }));
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><data><_1st/><level>3</level>\
             <player><name>A&amp;B</name></player><tags>x</tags><tags>y</tags></data>"
        );
    }

    #[test]
    fn xml_wraps_top_level_arrays() {
        assert_eq!(
            to_xml(&json!([1, 2])),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><data><item>1</item><item>2</item></data>"
        );
    }
}
