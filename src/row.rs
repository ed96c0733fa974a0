//! The row data model: a dot-path-addressable mapping from field name to [`CellValue`].

use serde_json::{Map, Value};

use crate::value::CellValue;

/// Stable row identifier. Either derived by a caller-supplied extractor or equal to the
/// insertion index when the data source has no mutation support.
pub type RowId = i64;

/// One row of grid data.
///
/// Internally a row is a JSON object; field paths like `"address.city"` navigate into nested
/// objects the same way a JSON pointer would, which gives the dot-notation semantics "for free"
/// from `serde_json`'s `Value::Object` rather than hand-rolling a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RowId,
    data: Value,
}

impl Row {
    pub fn new(id: RowId, data: Value) -> Self {
        let data = if data.is_object() { data } else { Value::Object(Map::new()) };
        Self { id, data }
    }

    pub fn empty(id: RowId) -> Self {
        Self::new(id, Value::Object(Map::new()))
    }

    /// Reads the value at a dot-separated field path, returning `CellValue::Null` for any
    /// missing intermediate segment.
    pub fn get_field(&self, path: &str) -> CellValue {
        let mut cursor = &self.data;
        for segment in path.split('.') {
            match cursor.get(segment) {
                Some(next) => cursor = next,
                None => return CellValue::Null,
            }
        }
        json_to_value(cursor)
    }

    /// Writes a value at a dot-separated field path, creating intermediate object maps as
    /// needed.
    pub fn set_field(&mut self, path: &str, value: CellValue) {
        let segments: Vec<&str> = path.split('.').collect();
        let mut cursor = &mut self.data;
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        for segment in &segments[..segments.len() - 1] {
            let map = cursor.as_object_mut().expect("cursor coerced to object above");
            let entry = map
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            cursor = entry;
        }
        let map = cursor.as_object_mut().expect("cursor coerced to object above");
        let last = segments[segments.len() - 1];
        map.insert(last.to_string(), value_to_json(&value));
    }

    /// Applies a partial patch: every key in `patch` is written via [`Row::set_field`].
    pub fn apply_patch(&mut self, patch: &[(String, CellValue)]) {
        for (field, value) in patch {
            self.set_field(field, value.clone());
        }
    }
}

pub fn value_to_json(value: &CellValue) -> Value {
    match value {
        CellValue::Null => Value::Null,
        CellValue::Bool(b) => Value::Bool(*b),
        CellValue::Int(i) => Value::from(*i),
        CellValue::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        CellValue::Instant(t) => Value::String(t.to_rfc3339()),
        CellValue::Text(s) => Value::String(s.clone()),
        CellValue::Object(v) => v.clone(),
        CellValue::Sequence(items) => Value::Array(items.iter().map(value_to_json).collect()),
    }
}

pub fn json_to_value(json: &Value) -> CellValue {
    match json {
        Value::Null => CellValue::Null,
        Value::Bool(b) => CellValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Int(i)
            } else {
                CellValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => CellValue::Text(s.clone()),
        Value::Array(items) => CellValue::Sequence(items.iter().map(json_to_value).collect()),
        Value::Object(_) => CellValue::Object(json.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dot_path_reads_nested_field() {
        let row = Row::new(1, json!({"address": {"city": "Porto"}}));
        assert_eq!(row.get_field("address.city"), CellValue::Text("Porto".into()));
    }

    #[test]
    fn missing_intermediate_reads_as_null() {
        let row = Row::new(1, json!({"address": {}}));
        assert_eq!(row.get_field("address.zip.code"), CellValue::Null);
    }

    #[test]
    fn write_creates_intermediate_objects() {
        let mut row = Row::empty(1);
        row.set_field("address.city", CellValue::Text("Lagos".into()));
        assert_eq!(row.get_field("address.city"), CellValue::Text("Lagos".into()));
    }
}
