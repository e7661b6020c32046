//! Deterministic JSON-to-text flattening.
//!
//! A file's JSON value becomes one flattened record per logical document:
//! a top-level object yields a single record, a top-level array yields one
//! record per element in array order. Each record is a single line of
//! `key: value` segments joined by `" | "`, with nested objects addressed by
//! dotted paths and arrays by `key[index]`.

use serde_json::{Map, Value};
use thiserror::Error;

/// Separator placed between `key: value` segments of one record.
pub const SEGMENT_SEPARATOR: &str = " | ";

/// Errors produced while flattening a parsed JSON document.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// The file's top-level value was neither an object nor an array.
    #[error("unsupported top-level JSON value: expected object or array, got {0}")]
    UnsupportedTopLevel(&'static str),
}

/// One flattened document ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedRecord {
    /// Single-line flattened representation of the document.
    pub text: String,
    /// Name of the file the document came from.
    pub source_file: String,
    /// Zero-based position of the document within its source file.
    pub record_id: usize,
}

impl FlattenedRecord {
    /// Corpus-wide unique identifier composed from file name and position.
    pub fn entry_id(&self) -> String {
        format!("{}::{}", self.source_file, self.record_id)
    }
}

/// Flattened records extracted from one file.
#[derive(Debug, Default)]
pub struct FileRecords {
    /// Records in document order.
    pub records: Vec<FlattenedRecord>,
    /// Array elements skipped because they were not JSON objects.
    pub skipped_elements: usize,
}

/// Flatten a parsed JSON file into records.
///
/// Non-object elements inside a top-level array are skipped with a warning
/// while the surrounding file continues to index; their positions still count
/// toward `record_id` so ids stay stable when a file is partially valid.
pub fn flatten_file(source_file: &str, value: &Value) -> Result<FileRecords, FlattenError> {
    match value {
        Value::Object(map) => Ok(FileRecords {
            records: vec![FlattenedRecord {
                text: flatten_object(map),
                source_file: source_file.to_string(),
                record_id: 0,
            }],
            skipped_elements: 0,
        }),
        Value::Array(elements) => {
            let mut out = FileRecords::default();
            for (index, element) in elements.iter().enumerate() {
                match element {
                    Value::Object(map) => out.records.push(FlattenedRecord {
                        text: flatten_object(map),
                        source_file: source_file.to_string(),
                        record_id: index,
                    }),
                    other => {
                        tracing::warn!(
                            source_file,
                            index,
                            kind = value_kind(other),
                            "Skipping non-object array element"
                        );
                        out.skipped_elements += 1;
                    }
                }
            }
            Ok(out)
        }
        other => Err(FlattenError::UnsupportedTopLevel(value_kind(other))),
    }
}

/// Flatten one JSON object into a single-line `key: value` string.
///
/// Keys are visited in document order; nested objects extend the path with
/// `.child`, arrays with `[index]`. Scalars are stringified as-is (strings
/// raw, everything else as its JSON literal).
pub fn flatten_object(map: &Map<String, Value>) -> String {
    let mut segments = Vec::new();
    for (key, child) in map {
        walk(child, key, &mut segments);
    }
    single_line(&segments.join(SEGMENT_SEPARATOR))
}

fn walk(value: &Value, path: &str, segments: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, &format!("{path}.{key}"), segments);
            }
        }
        Value::Array(elements) => {
            for (index, child) in elements.iter().enumerate() {
                walk(child, &format!("{path}[{index}]"), segments);
            }
        }
        scalar => segments.push(format!("{path}: {}", scalar_text(scalar))),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn single_line(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;
    for ch in text.chars() {
        if matches!(ch, '\n' | '\r' | '\t') {
            if !in_break {
                out.push(' ');
            }
            in_break = true;
        } else {
            out.push(ch);
            in_break = false;
        }
    }
    out
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flatten_value(value: &Value) -> String {
        flatten_object(value.as_object().expect("object fixture"))
    }

    #[test]
    fn object_with_array_matches_expected_layout() {
        let value = json!({"name": "Acme", "tags": ["x", "y"]});
        assert_eq!(flatten_value(&value), "name: Acme | tags[0]: x | tags[1]: y");
    }

    #[test]
    fn nested_objects_use_dotted_paths() {
        let value = json!({
            "company": {"name": "Acme", "address": {"city": "Lyon"}},
            "active": true
        });
        assert_eq!(
            flatten_value(&value),
            "company.name: Acme | company.address.city: Lyon | active: true"
        );
    }

    #[test]
    fn objects_inside_arrays_combine_index_and_path() {
        let value = json!({"employees": [{"name": "Ada"}, {"name": "Grace"}]});
        assert_eq!(
            flatten_value(&value),
            "employees[0].name: Ada | employees[1].name: Grace"
        );
    }

    #[test]
    fn nested_arrays_stack_indexes() {
        let value = json!({"grid": [[1, 2], [3]]});
        assert_eq!(
            flatten_value(&value),
            "grid[0][0]: 1 | grid[0][1]: 2 | grid[1][0]: 3"
        );
    }

    #[test]
    fn null_and_numbers_render_as_json_literals() {
        let value = json!({"count": 7, "ratio": 0.5, "missing": null});
        assert_eq!(
            flatten_value(&value),
            "count: 7 | ratio: 0.5 | missing: null"
        );
    }

    #[test]
    fn key_order_follows_document_order() {
        let value: Value = serde_json::from_str(r#"{"zeta": 1, "alpha": 2}"#).expect("valid json");
        assert_eq!(flatten_value(&value), "zeta: 1 | alpha: 2");
    }

    #[test]
    fn embedded_newlines_are_replaced() {
        let value = json!({"note": "line one\nline two\r\nline three"});
        let text = flatten_value(&value);
        assert!(!text.contains('\n'));
        assert!(!text.contains('\r'));
        assert_eq!(text, "note: line one line two line three");
    }

    #[test]
    fn whitespace_breaks_collapse_to_one_space() {
        let value = json!({"note": "a\tb", "more": "c\n\n\t\rd"});
        assert_eq!(flatten_value(&value), "note: a b | more: c d");
    }

    #[test]
    fn flattening_is_deterministic() {
        let value = json!({"a": [1, {"b": "c"}], "d": {"e": null}});
        assert_eq!(flatten_value(&value), flatten_value(&value));
    }

    #[test]
    fn top_level_object_yields_single_record() {
        let value = json!({"company_name": "Acme", "industry": "Tech"});
        let result = flatten_file("b.json", &value).expect("object flattens");
        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.record_id, 0);
        assert_eq!(record.text, "company_name: Acme | industry: Tech");
        assert_eq!(record.entry_id(), "b.json::0");
    }

    #[test]
    fn top_level_array_yields_record_per_element() {
        let value = json!([{"name": "Acme", "tags": ["x", "y"]}]);
        let result = flatten_file("a.json", &value).expect("array flattens");
        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.text, "name: Acme | tags[0]: x | tags[1]: y");
        assert_eq!(record.record_id, 0);
        assert_eq!(record.entry_id(), "a.json::0");
    }

    #[test]
    fn array_record_ids_match_positions() {
        let value = json!([{"n": 1}, {"n": 2}, {"n": 3}]);
        let result = flatten_file("data.json", &value).expect("array flattens");
        let ids: Vec<usize> = result.records.iter().map(|r| r.record_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn non_object_array_elements_are_skipped_but_counted() {
        let value = json!([{"n": 1}, "stray", {"n": 3}]);
        let result = flatten_file("mixed.json", &value).expect("array flattens");
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.skipped_elements, 1);
        // Positions are preserved so ids stay stable around skipped elements.
        assert_eq!(result.records[0].record_id, 0);
        assert_eq!(result.records[1].record_id, 2);
    }

    #[test]
    fn scalar_top_level_is_rejected() {
        let result = flatten_file("bad.json", &json!(42));
        assert!(matches!(
            result,
            Err(FlattenError::UnsupportedTopLevel("number"))
        ));
    }

    #[test]
    fn null_top_level_is_rejected() {
        let result = flatten_file("bad.json", &Value::Null);
        assert!(matches!(
            result,
            Err(FlattenError::UnsupportedTopLevel("null"))
        ));
    }
}
