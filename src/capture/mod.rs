//! Result projection: pick the requested parts out of a function result.
//!
//! parse_capture_list -> Vec<CaptureSpec>
//! project(raw, specs) -> Map
//!
//! A specifier is either a top-level parameter name (`STATUS`) or one column
//! of a table parameter (`ITAB[FIELD]`). Lookups that miss never fail; they
//! just produce no entry.

use serde_json::{Map, Value};
use std::fmt;

/// Row key consulted when a table row lacks the requested column.
pub const WORK_AREA_FIELD: &str = "WA";

/// A parsed capture specifier. The raw text is kept as the output key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSpec {
    /// Whole top-level parameter.
    Field(String),
    /// One column of every row of a table parameter.
    Column {
        raw: String,
        table: String,
        field: String,
    },
}

impl CaptureSpec {
    /// `T[F]` when the text holds a `[` and ends with `]`; otherwise a plain name.
    pub fn parse(raw: &str) -> Self {
        if raw.ends_with(']')
            && let Some((table, rest)) = raw.split_once('[')
            && let Some(field) = rest.strip_suffix(']')
        {
            return CaptureSpec::Column {
                raw: raw.to_string(),
                table: table.to_string(),
                field: field.to_string(),
            };
        }
        CaptureSpec::Field(raw.to_string())
    }

    /// Output key: the specifier exactly as the caller wrote it.
    pub fn key(&self) -> &str {
        match self {
            CaptureSpec::Field(name) => name,
            CaptureSpec::Column { raw, .. } => raw,
        }
    }

    /// Evaluate against a raw result. `None` means "no entry".
    pub fn extract(&self, raw: &Map<String, Value>) -> Option<Value> {
        match self {
            CaptureSpec::Field(name) => raw.get(name).cloned(),
            CaptureSpec::Column { table, field, .. } => {
                let rows = raw.get(table)?.as_array()?;
                let column = rows
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|row| row.get(field).or_else(|| row.get(WORK_AREA_FIELD)))
                    .cloned()
                    .collect();
                Some(Value::Array(column))
            }
        }
    }
}

impl fmt::Display for CaptureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Parse capture strings, dropping repeats while keeping first-seen order.
pub fn parse_capture_list<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<CaptureSpec> {
    let mut specs: Vec<CaptureSpec> = Vec::new();
    for item in items {
        if specs.iter().any(|s| s.key() == item) {
            continue;
        }
        specs.push(CaptureSpec::parse(item));
    }
    specs
}

/// Project `raw` through `specs`. No specifiers means the whole result.
pub fn project(raw: &Map<String, Value>, specs: &[CaptureSpec]) -> Map<String, Value> {
    if specs.is_empty() {
        return raw.clone();
    }
    let mut captured = Map::new();
    for spec in specs {
        if let Some(value) = spec.extract(raw) {
            captured.insert(spec.key().to_string(), value);
        }
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn specs(items: &[&str]) -> Vec<CaptureSpec> {
        parse_capture_list(items.iter().copied())
    }

    #[test]
    fn parse_plain_and_column() {
        assert_eq!(CaptureSpec::parse("STATUS"), CaptureSpec::Field("STATUS".into()));
        assert_eq!(
            CaptureSpec::parse("ITAB[FIELD]"),
            CaptureSpec::Column {
                raw: "ITAB[FIELD]".into(),
                table: "ITAB".into(),
                field: "FIELD".into(),
            }
        );
    }

    #[test]
    fn parse_splits_on_first_bracket() {
        let spec = CaptureSpec::parse("T[A[B]]");
        assert_eq!(
            spec,
            CaptureSpec::Column {
                raw: "T[A[B]]".into(),
                table: "T".into(),
                field: "A[B]".into(),
            }
        );
    }

    #[test]
    fn parse_unterminated_bracket_is_plain() {
        assert_eq!(CaptureSpec::parse("T[F"), CaptureSpec::Field("T[F".into()));
        assert_eq!(CaptureSpec::parse("T]"), CaptureSpec::Field("T]".into()));
    }

    #[test]
    fn empty_specs_return_everything() {
        let raw = obj(json!({"A": 1, "T": [{"X": "y"}], "S": {"K": "v"}}));
        assert_eq!(project(&raw, &[]), raw);
    }

    #[test]
    fn work_area_fallback_scenario() {
        let raw = obj(json!({
            "ITAB": [{"WA": "x"}, {"FIELD": "y"}],
            "STATUS": "OK"
        }));
        let out = project(&raw, &specs(&["ITAB[FIELD]", "STATUS"]));
        assert_eq!(
            Value::Object(out),
            json!({"ITAB[FIELD]": ["x", "y"], "STATUS": "OK"})
        );
    }

    #[test]
    fn missing_plain_key_yields_empty_output() {
        let raw = obj(json!({"STATUS": "OK"}));
        assert!(project(&raw, &specs(&["MISSING"])).is_empty());
    }

    #[test]
    fn column_of_absent_or_non_table_yields_nothing() {
        let raw = obj(json!({"S": {"F": 1}, "N": "scalar"}));
        let out = project(&raw, &specs(&["T[F]", "S[F]", "N[F]"]));
        assert!(out.is_empty());
    }

    #[test]
    fn rows_without_field_or_work_area_are_skipped() {
        let raw = obj(json!({
            "T": [{"F": 1}, {"OTHER": 2}, "not a row", {"WA": 3}, {"F": null}]
        }));
        let out = project(&raw, &specs(&["T[F]"]));
        assert_eq!(out.get("T[F]"), Some(&json!([1, 3, null])));
    }

    #[test]
    fn present_field_wins_over_work_area() {
        let raw = obj(json!({"T": [{"F": "", "WA": "fallback"}]}));
        let out = project(&raw, &specs(&["T[F]"]));
        assert_eq!(out.get("T[F]"), Some(&json!([""])));
    }

    #[test]
    fn table_with_no_matching_rows_yields_empty_column() {
        let raw = obj(json!({"T": [{"A": 1}]}));
        let out = project(&raw, &specs(&["T[F]"]));
        assert_eq!(out.get("T[F]"), Some(&json!([])));
    }

    #[test]
    fn independent_columns_over_same_table() {
        let raw = obj(json!({"T": [{"F": 1, "G": "a"}, {"F": 2, "G": "b"}]}));
        let out = project(&raw, &specs(&["T[F]", "T[G]", "T"]));
        assert_eq!(
            Value::Object(out),
            json!({"T[F]": [1, 2], "T[G]": ["a", "b"], "T": [{"F": 1, "G": "a"}, {"F": 2, "G": "b"}]})
        );
    }

    #[test]
    fn output_follows_specifier_order() {
        let raw = obj(json!({"A": 1, "B": 2, "C": 3}));
        let out = project(&raw, &specs(&["C", "A"]));
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["C", "A"]);
    }

    #[test]
    fn duplicates_collapse() {
        let list = specs(&["A", "T[F]", "A", "T[F]"]);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].to_string(), "A");
        assert_eq!(list[1].to_string(), "T[F]");
    }
}
