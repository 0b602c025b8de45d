//! Result rows

use crate::value::{FromValue, Value};
use crate::{Error, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::ops::Index;
use std::sync::Arc;

/// One fetched row: column names from the cursor description plus the values
///
/// Rows of the same result share their column list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from column names and a fetched tuple
    ///
    /// A tuple longer than the column list keeps only the named values; a
    /// shorter one is padded with `NULL`.
    pub fn new(columns: Arc<[String]>, mut values: Vec<Value>) -> Self {
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    /// Column names in result order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in result order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the named column
    ///
    /// When several columns share the name (`select a.id, b.id`), the last
    /// one wins.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.position(column).and_then(|i| self.values.get(i))
    }

    /// Value at a column position
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Typed value of the named column
    pub fn get_as<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self
            .get(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))?;
        T::from_value(value.clone())
    }

    /// Whether the row has the named column
    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// `(column, value)` pairs in result order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Consume the row, returning its values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// JSON object keyed by column name
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().rposition(|c| c == column)
    }
}

impl Index<&str> for Row {
    type Output = Value;

    fn index(&self, column: &str) -> &Value {
        match self.get(column) {
            Some(v) => v,
            None => panic!("row has no column named `{}`", column),
        }
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        Row::new(columns, vec![Value::Int(1), Value::Text("alice".into())])
    }

    #[test]
    fn test_name_and_index_access_agree() {
        let row = sample();
        assert_eq!(row["id"], Value::Int(1));
        assert_eq!(row[0], row["id"]);
        assert_eq!(row.get("name"), row.get_index(1));
        assert_eq!(row.get("missing"), None);
        assert!(row.contains("name"));
    }

    #[test]
    fn test_typed_access() {
        let row = sample();
        assert_eq!(row.get_as::<i64>("id").unwrap(), 1);
        assert_eq!(row.get_as::<String>("name").unwrap(), "alice");
        assert!(matches!(
            row.get_as::<i64>("email"),
            Err(Error::ColumnNotFound(c)) if c == "email"
        ));
    }

    #[test]
    #[should_panic(expected = "no column named `email`")]
    fn test_index_missing_column_panics() {
        let _ = &sample()["email"];
    }

    #[test]
    fn test_extra_values_are_dropped() {
        let columns: Arc<[String]> = vec!["a".to_string()].into();
        let row = Row::new(columns, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn test_serialize_as_object() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "name": "alice"}));
        assert_eq!(sample().to_json(), json);
    }

    #[test]
    fn test_short_tuple_is_padded_with_null() {
        let columns: Arc<[String]> = vec!["a".to_string(), "b".to_string()].into();
        let row = Row::new(columns, vec![Value::Int(1)]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("a"), Some(&Value::Int(1)));
        assert_eq!(row.get("b"), Some(&Value::Null));
        assert_eq!(row.get_as::<Option<i64>>("b").unwrap(), None);
    }

    #[test]
    fn test_duplicate_column_last_wins() {
        let columns: Arc<[String]> = vec!["id".to_string(), "id".to_string()].into();
        let row = Row::new(columns, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(row["id"], Value::Int(2));
        assert_eq!(row.get_index(0), Some(&Value::Int(1)));
        assert_eq!(row.to_json(), serde_json::json!({"id": 2}));
    }
}
