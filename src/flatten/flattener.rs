use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::flatten::naming::SheetNamer;
use crate::flatten::types::{CellValue, Flattened, FlattenConfig, Row, Sheet};

/// The core flattener that lifts nested JSON into linked sheets
pub struct JsonFlattener {
    config: FlattenConfig,
}

impl JsonFlattener {
    pub fn new(config: FlattenConfig) -> Self {
        JsonFlattener { config }
    }

    /// Parse JSON text and flatten it
    pub fn flatten_str(&self, text: &str) -> Result<Flattened> {
        let value: Value = serde_json::from_str(text)?;
        self.flatten_value(value)
    }

    /// Flatten a JSON value into Main rows plus auxiliary sheets.
    ///
    /// The input must be a single object (one Main row) or a sequence of
    /// objects (one Main row each, concatenated in order). Anything else
    /// is a shape error.
    pub fn flatten_value(&self, value: Value) -> Result<Flattened> {
        let records = match value {
            Value::Object(obj) => vec![obj],
            Value::Array(items) => {
                let mut records = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(obj) => records.push(obj),
                        other => {
                            return Err(Error::Shape {
                                found: json_type_name(&other),
                            })
                        }
                    }
                }
                records
            }
            other => {
                return Err(Error::Shape {
                    found: json_type_name(&other),
                })
            }
        };

        let mut namer = SheetNamer::new(self.config.naming, &self.config.separator);
        let mut sheets = Vec::new();

        let main = records
            .into_iter()
            .map(|obj| self.flatten_object(obj, "", 0, &mut namer, &mut sheets))
            .collect();

        Ok(Flattened { main, sheets })
    }

    /// Flatten one object into a row, lifting nested structures into
    /// sheets appended to the accumulator. Sheets appear in pre-order:
    /// each sheet is registered before anything discovered inside it.
    fn flatten_object(
        &self,
        obj: Map<String, Value>,
        parent: &str,
        depth: usize,
        namer: &mut SheetNamer,
        sheets: &mut Vec<Sheet>,
    ) -> Row {
        let mut row = Row::new();

        for (key, value) in obj {
            if self.keep_inline(&key) {
                row.insert(key, CellValue::Scalar(value));
                continue;
            }

            match value {
                Value::Object(nested) if depth < self.config.max_depth => {
                    let name = namer.assign(parent, &key);
                    let idx = sheets.len();
                    sheets.push(Sheet::new(name.clone()));
                    let nested_row =
                        self.flatten_object(nested, &name, depth + 1, namer, sheets);
                    sheets[idx].rows.push(nested_row);
                    row.insert(key, CellValue::SheetRef(name));
                }
                Value::Array(items)
                    if depth < self.config.max_depth && all_objects(&items) =>
                {
                    let name = namer.assign(parent, &key);
                    let idx = sheets.len();
                    sheets.push(Sheet::new(name.clone()));
                    let mut rows = Vec::with_capacity(items.len());
                    for item in items {
                        if let Value::Object(nested) = item {
                            rows.push(self.flatten_object(
                                nested,
                                &name,
                                depth + 1,
                                namer,
                                sheets,
                            ));
                        }
                    }
                    sheets[idx].rows = rows;
                    row.insert(key, CellValue::SheetRef(name));
                }
                // Scalars, mixed/scalar arrays, and structures past the
                // depth cap stay inline
                other => {
                    row.insert(key, CellValue::Scalar(other));
                }
            }
        }

        row
    }

    fn keep_inline(&self, key: &str) -> bool {
        self.config.inline_fields.iter().any(|f| f == key)
    }
}

/// A sequence is lifted into a sheet only when every element is an object.
/// An empty sequence qualifies and registers an empty sheet, keeping its
/// reference resolvable.
fn all_objects(items: &[Value]) -> bool {
    items.iter().all(|v| v.is_object())
}

fn json_type_name(value: &Value) -> &'static str {
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

    fn flatten(value: Value) -> Flattened {
        JsonFlattener::new(FlattenConfig::default())
            .flatten_value(value)
            .unwrap()
    }

    #[test]
    fn test_simple_object() {
        let result = flatten(json!({"a": 1, "b": "x"}));

        assert_eq!(result.main.len(), 1);
        assert!(result.sheets.is_empty());
        let row = &result.main[0];
        assert_eq!(
            row.keys().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(row["a"], CellValue::Scalar(json!(1)));
        assert_eq!(row["b"], CellValue::Scalar(json!("x")));
    }

    #[test]
    fn test_nested_object_lifts_to_own_sheet() {
        let result = flatten(json!({
            "title": "R1",
            "issuer": {"name": "X", "tel": "123"}
        }));

        let row = &result.main[0];
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["title", "issuer"]);
        assert_eq!(row["issuer"], CellValue::SheetRef("issuer".to_string()));

        let issuer = result.sheet("issuer").unwrap();
        assert_eq!(issuer.rows.len(), 1);
        assert_eq!(issuer.rows[0]["name"], CellValue::Scalar(json!("X")));
        assert_eq!(issuer.rows[0]["tel"], CellValue::Scalar(json!("123")));
    }

    #[test]
    fn test_list_of_objects_lifts_to_multi_row_sheet() {
        let result = flatten(json!({
            "items": [
                {"sku": "A", "qty": 2},
                {"sku": "B", "qty": 1}
            ]
        }));

        assert_eq!(result.main[0]["items"], CellValue::SheetRef("items".to_string()));
        let items = result.sheet("items").unwrap();
        assert_eq!(items.rows.len(), 2);
        assert_eq!(items.rows[0]["sku"], CellValue::Scalar(json!("A")));
        assert_eq!(items.rows[1]["qty"], CellValue::Scalar(json!(1)));
    }

    #[test]
    fn test_top_level_sequence_concatenates_into_main() {
        let result = flatten(json!([
            {"name": "John", "age": 30},
            {"name": "Anna", "age": 22}
        ]));

        assert_eq!(result.main.len(), 2);
        assert!(result.sheets.is_empty());
        assert_eq!(result.main[1]["name"], CellValue::Scalar(json!("Anna")));
    }

    #[test]
    fn test_nesting_flattens_transitively() {
        let result = flatten(json!({"a": {"b": {"c": 1}}}));

        assert_eq!(result.sheet_names(), vec!["a", "a_b"]);
        let a = result.sheet("a").unwrap();
        assert_eq!(a.rows[0]["b"], CellValue::SheetRef("a_b".to_string()));
        let a_b = result.sheet("a_b").unwrap();
        assert_eq!(a_b.rows[0]["c"], CellValue::Scalar(json!(1)));
    }

    #[test]
    fn test_nested_sheet_rows_recurse_inside_arrays() {
        let result = flatten(json!({
            "items": [
                {"sku": "A", "origin": {"country": "JP"}}
            ]
        }));

        assert_eq!(result.sheet_names(), vec!["items", "items_origin"]);
        let items = result.sheet("items").unwrap();
        assert_eq!(
            items.rows[0]["origin"],
            CellValue::SheetRef("items_origin".to_string())
        );
        let origin = result.sheet("items_origin").unwrap();
        assert_eq!(origin.rows[0]["country"], CellValue::Scalar(json!("JP")));
    }

    #[test]
    fn test_sibling_nested_objects_get_distinct_sheets() {
        let result = flatten(json!({
            "items": [
                {"sku": "A", "bank": {"no": "111"}},
                {"sku": "B", "bank": {"no": "222"}}
            ]
        }));

        assert_eq!(
            result.sheet_names(),
            vec!["items", "items_bank", "items_bank_2"]
        );
        let items = result.sheet("items").unwrap();
        assert_eq!(
            items.rows[0]["bank"],
            CellValue::SheetRef("items_bank".to_string())
        );
        assert_eq!(
            items.rows[1]["bank"],
            CellValue::SheetRef("items_bank_2".to_string())
        );
        assert_eq!(
            result.sheet("items_bank_2").unwrap().rows[0]["no"],
            CellValue::Scalar(json!("222"))
        );
    }

    #[test]
    fn test_scalar_array_stays_inline() {
        let result = flatten(json!({"tags": ["rust", "json"]}));

        assert!(result.sheets.is_empty());
        assert_eq!(
            result.main[0]["tags"],
            CellValue::Scalar(json!(["rust", "json"]))
        );
    }

    #[test]
    fn test_mixed_array_stays_inline() {
        let result = flatten(json!({"mixed": [{"a": 1}, "b"]}));

        assert!(result.sheets.is_empty());
        assert!(result.main[0]["mixed"].as_scalar().is_some());
    }

    #[test]
    fn test_empty_object_registers_sheet() {
        let result = flatten(json!({"extra": {}}));

        assert_eq!(result.main[0]["extra"], CellValue::SheetRef("extra".to_string()));
        let extra = result.sheet("extra").unwrap();
        assert_eq!(extra.rows.len(), 1);
        assert!(extra.rows[0].is_empty());
    }

    #[test]
    fn test_empty_array_registers_sheet() {
        let result = flatten(json!({"items": []}));

        assert_eq!(result.main[0]["items"], CellValue::SheetRef("items".to_string()));
        assert!(result.sheet("items").unwrap().rows.is_empty());
    }

    #[test]
    fn test_scalar_top_level_rejected() {
        let err = JsonFlattener::new(FlattenConfig::default())
            .flatten_value(json!(42))
            .unwrap_err();
        assert!(matches!(err, Error::Shape { found: "number" }));
    }

    #[test]
    fn test_sequence_of_scalars_rejected() {
        let err = JsonFlattener::new(FlattenConfig::default())
            .flatten_value(json!(["a", "b"]))
            .unwrap_err();
        assert!(matches!(err, Error::Shape { found: "string" }));
    }

    #[test]
    fn test_malformed_text_rejected() {
        let err = JsonFlattener::new(FlattenConfig::default())
            .flatten_str("{not json")
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_inline_fields_are_never_lifted() {
        let config = FlattenConfig {
            inline_fields: vec!["issuer".to_string()],
            ..FlattenConfig::default()
        };
        let result = JsonFlattener::new(config)
            .flatten_value(json!({"issuer": {"name": "X"}}))
            .unwrap();

        assert!(result.sheets.is_empty());
        assert!(result.main[0]["issuer"].as_scalar().is_some());
    }

    #[test]
    fn test_depth_cap_keeps_structure_inline() {
        let config = FlattenConfig {
            max_depth: 1,
            ..FlattenConfig::default()
        };
        let result = JsonFlattener::new(config)
            .flatten_value(json!({"a": {"b": {"c": 1}}}))
            .unwrap();

        assert_eq!(result.sheet_names(), vec!["a"]);
        // The structure past the cap is kept inline, nothing is dropped
        assert_eq!(
            result.sheet("a").unwrap().rows[0]["b"],
            CellValue::Scalar(json!({"c": 1}))
        );
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let input = json!({
            "title": "R1",
            "issuer": {"name": "X"},
            "items": [{"sku": "A"}, {"sku": "B"}]
        });

        let first = flatten(input.clone());
        let second = flatten(input);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_scalar_leaf_is_lost() {
        fn count_leaves(value: &Value) -> usize {
            match value {
                Value::Object(map) => map.values().map(count_leaves).sum(),
                Value::Array(items) => items.iter().map(count_leaves).sum(),
                _ => 1,
            }
        }

        let input = json!({
            "title": "R1",
            "total": 550000,
            "issuer": {"name": "X", "tel": "123"},
            "items": [
                {"sku": "A", "qty": 2},
                {"sku": "B", "qty": 1}
            ]
        });
        let expected = count_leaves(&input);

        let result = flatten(input);
        let mut found = 0;
        let all_rows = result
            .main
            .iter()
            .chain(result.sheets.iter().flat_map(|s| s.rows.iter()));
        for row in all_rows {
            for cell in row.values() {
                if let Some(v) = cell.as_scalar() {
                    found += count_leaves(v);
                }
            }
        }
        assert_eq!(found, expected);
    }
}
