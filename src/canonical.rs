/// Canonical serialization for signable documents.
///
/// A signed document must serialize to the same bytes in every client
/// implementation, or signatures stop round-tripping. The rules:
///
/// - JSON rendering with object keys sorted recursively.
/// - Keys compare by UTF-16 code units, matching JavaScript's default
///   string sort. This differs from Rust's code-point order for
///   supplementary-plane characters, so the comparison is explicit here.
/// - Object members whose value is null are omitted. Arrays keep their
///   order and their nulls.
/// - No whitespace anywhere in the output.
use std::cmp::Ordering;

use serde_json::{json, Value};

use crate::types::{Meta, RecordData};

/// A document that has a canonical byte form suitable for signing.
pub trait Signable {
    fn to_signable(&self) -> String;
}

impl Signable for Value {
    fn to_signable(&self) -> String {
        canonical_json(self)
    }
}

/// A raw string whose canonical form is itself, with no JSON quoting.
///
/// Used when verifying service signatures over bare key material.
pub struct SignedString(pub String);

impl Signable for SignedString {
    fn to_signable(&self) -> String {
        self.0.clone()
    }
}

/// The signable pairing of a record's client-controlled meta fields and its
/// plaintext data: `canonical(meta) || canonical(data)`, no separator.
///
/// Server-assigned meta fields (record id, timestamps, version) are
/// excluded; they change without the writer's involvement.
pub struct RecordInfo {
    client_meta: Value,
    data: Value,
}

impl RecordInfo {
    pub fn new(meta: &Meta, data: &RecordData) -> Self {
        Self {
            client_meta: json!({
                "plain": meta.plain,
                "type": meta.record_type,
                "user_id": meta.user_id,
                "writer_id": meta.writer_id,
            }),
            data: json!(data),
        }
    }
}

impl Signable for RecordInfo {
    fn to_signable(&self) -> String {
        let mut out = canonical_json(&self.client_meta);
        out.push_str(&canonical_json(&self.data));
        out
    }
}

/// Render a JSON value in canonical form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&str> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k.as_str())
                .collect();
            keys.sort_by(|a, b| utf16_cmp(a, b));

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, &Value::String((*key).to_string()));
                out.push(':');
                write_value(out, &map[*key]);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        // Leaves (strings, numbers, booleans, null) already render
        // compactly and deterministically.
        leaf => out.push_str(&leaf.to_string()),
    }
}

/// Compare two strings by UTF-16 code units.
fn utf16_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[test]
    fn test_sorted_nested_document_with_emoji_keys() {
        let data = json!({
            "k1": "val1",
            "k3": "val2",
            "k2": "val3",
            "AAA": "val4",
            "k4": {"k3": "val1", "k2": "val2", "😐": "val3", "k1": "val4"},
            "😐": "val5",
        });

        assert_eq!(
            canonical_json(&data),
            r#"{"AAA":"val4","k1":"val1","k2":"val3","k3":"val2","k4":{"k1":"val4","k2":"val2","k3":"val1","😐":"val3"},"😐":"val5"}"#
        );
    }

    #[test]
    fn test_key_order_permutation_is_invariant() {
        let a = json!({"x": 1, "y": {"b": 2, "a": 3}, "z": [1, 2]});
        let b = json!({"z": [1, 2], "y": {"a": 3, "b": 2}, "x": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_distinct_leaves_give_distinct_bytes() {
        let a = json!({"k": "v1"});
        let b = json!({"k": "v2"});
        assert_ne!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_null_members_omitted_array_nulls_kept() {
        let doc = json!({"a": null, "b": 1, "c": [null, 2]});
        assert_eq!(canonical_json(&doc), r#"{"b":1,"c":[null,2]}"#);
    }

    #[test]
    fn test_no_whitespace() {
        let doc = json!({"a": [1, 2, 3], "b": {"c": "d e"}});
        let rendered = canonical_json(&doc);
        let inside_strings: String = rendered.replace("\"d e\"", "\"d-e\"");
        assert!(!inside_strings.contains(' '));
        assert!(!rendered.contains('\n'));
    }

    #[test]
    fn test_utf16_order_differs_from_code_point_order() {
        // U+E000 is a single code unit (0xE000); 😐 (U+1F610) encodes with
        // lead surrogate 0xD83D. JavaScript sorts the emoji first, so we
        // must too, even though its code point is larger.
        let doc = json!({"\u{e000}": 1, "😐": 2});
        assert_eq!(canonical_json(&doc), "{\"😐\":2,\"\u{e000}\":1}");
    }

    #[test]
    fn test_string_escaping_matches_json_stringify() {
        let doc = json!({"k": "line\nbreak \"quoted\" \u{0007}"});
        assert_eq!(
            canonical_json(&doc),
            r#"{"k":"line\nbreak \"quoted\" \u0007"}"#
        );
    }

    #[test]
    fn test_signed_string_is_verbatim() {
        let s = SignedString("exactly-these-bytes".to_string());
        assert_eq!(s.to_signable(), "exactly-these-bytes");
    }

    #[test]
    fn test_record_info_concatenation_excludes_server_fields() {
        let writer = Uuid::new_v4();
        let mut meta = Meta::new(writer, writer, "test_record");
        meta.record_id = Some(Uuid::new_v4());
        meta.version = Some("opaque-token".to_string());

        let mut data: RecordData = HashMap::new();
        data.insert("now".to_string(), "2017-01-02T03:04:05Z".to_string());

        let signable = RecordInfo::new(&meta, &data).to_signable();

        assert!(signable.starts_with('{'));
        assert!(signable.contains(r#""writer_id""#));
        assert!(signable.ends_with(r#"{"now":"2017-01-02T03:04:05Z"}"#));
        assert!(!signable.contains("opaque-token"));
        assert!(!signable.contains("record_id"));
    }

    #[test]
    fn test_record_info_differs_when_any_field_differs() {
        let writer = Uuid::new_v4();
        let meta = Meta::new(writer, writer, "test_record");
        let mut data: RecordData = HashMap::new();
        data.insert("k".to_string(), "v".to_string());

        let base = RecordInfo::new(&meta, &data).to_signable();

        let mut other_meta = meta.clone();
        other_meta.record_type = "other_type".to_string();
        assert_ne!(base, RecordInfo::new(&other_meta, &data).to_signable());

        let mut other_data = data.clone();
        other_data.insert("k2".to_string(), "v2".to_string());
        assert_ne!(base, RecordInfo::new(&meta, &other_data).to_signable());
    }
}
