//! In-memory tabular dataset.
//!
//! The wire format matches the upstream dashboard contract: a JSON array of
//! row objects (`orient="records"`), one object per row. Internally the
//! table is row-major with an ordered column header; every row has exactly
//! one cell per column.

use serde_json::{Map, Value as Json};
use thiserror::Error;

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Converts a scalar JSON value. `None` for nested arrays/objects and
    /// numbers outside the supported range.
    pub fn from_scalar_json(value: &Json) -> Option<Cell> {
        Cell::from_json(value).ok()
    }

    fn from_json(value: &Json) -> Result<Cell, ()> {
        match value {
            Json::Null => Ok(Cell::Null),
            Json::Bool(b) => Ok(Cell::Bool(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Cell::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Cell::Float(f))
                } else {
                    Err(())
                }
            }
            Json::String(s) => Ok(Cell::Str(s.clone())),
            // Nested structures are not tabular data
            Json::Array(_) | Json::Object(_) => Err(()),
        }
    }

    fn to_json(&self) -> Json {
        match self {
            Cell::Null => Json::Null,
            Cell::Bool(b) => Json::Bool(*b),
            Cell::Int(i) => Json::from(*i),
            // JSON has no NaN/Inf; degrade to null like the upstream
            // serializer did for NaN
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Cell::Str(s) => Json::String(s.clone()),
        }
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("dataset must be a JSON array of row objects")]
    NotRecords,
    #[error("row {row} is not a JSON object")]
    RowNotObject { row: usize },
    #[error("row {row}, column '{column}': unsupported cell value (nested arrays/objects are not tabular)")]
    UnsupportedCell { row: usize, column: String },
}

/// Row-major table with an ordered column header.
///
/// Invariant: `rows[i].len() == columns.len()` for every row.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Builds a table from column vectors. Columns must be equal length.
    /// Intended for construction in code; the wire path is [`from_records`].
    ///
    /// [`from_records`]: Table::from_records
    pub fn from_columns(columns: Vec<(&str, Vec<Cell>)>) -> Self {
        let names: Vec<String> = columns.iter().map(|(n, _)| n.to_string()).collect();
        let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let mut rows = vec![Vec::with_capacity(names.len()); n_rows];
        for (_, cells) in columns {
            assert_eq!(cells.len(), n_rows, "column length mismatch");
            for (row, cell) in rows.iter_mut().zip(cells) {
                row.push(cell);
            }
        }
        Self {
            columns: names,
            rows,
        }
    }

    /// Deserializes the records-oriented wire format.
    ///
    /// The header is the union of keys across all row objects, in first-seen
    /// order; keys absent from a given row become null cells.
    pub fn from_records(value: &Json) -> Result<Self, TableError> {
        let records = value.as_array().ok_or(TableError::NotRecords)?;

        let mut columns: Vec<String> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let object = record
                .as_object()
                .ok_or(TableError::RowNotObject { row: i })?;
            for key in object.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let object = record.as_object().expect("validated above");
            let mut row = Vec::with_capacity(columns.len());
            for column in &columns {
                let cell = match object.get(column) {
                    Some(v) => Cell::from_json(v).map_err(|_| TableError::UnsupportedCell {
                        row: i,
                        column: column.clone(),
                    })?,
                    None => Cell::Null,
                };
                row.push(cell);
            }
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Serializes back to the records-oriented wire format.
    pub fn to_records(&self) -> Json {
        let records: Vec<Json> = self
            .rows
            .iter()
            .map(|row| {
                let mut object = Map::with_capacity(self.columns.len());
                for (column, cell) in self.columns.iter().zip(row) {
                    object.insert(column.clone(), cell.to_json());
                }
                Json::Object(object)
            })
            .collect();
        Json::Array(records)
    }

    // ── Accessors ─────────────────────────────────────────

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Total number of cells; the unit of the memory and output budgets.
    pub fn cell_count(&self) -> usize {
        self.rows.len() * self.columns.len()
    }

    /// Clones the values of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> Vec<Cell> {
        self.rows.iter().map(|row| row[index].clone()).collect()
    }

    // ── Mutators used by the workbench frame ops ──────────

    pub fn set_column_name(&mut self, index: usize, name: String) {
        self.columns[index] = name;
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Vec<Cell>> {
        &mut self.rows
    }

    /// Replaces the cells of one column. Length must match the row count.
    pub fn replace_column(&mut self, index: usize, cells: Vec<Cell>) {
        assert_eq!(cells.len(), self.rows.len(), "column length mismatch");
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row[index] = cell;
        }
    }

    /// Appends a new column. Length must match the row count.
    pub fn append_column(&mut self, name: String, cells: Vec<Cell>) {
        assert_eq!(cells.len(), self.rows.len(), "column length mismatch");
        self.columns.push(name);
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
    }

    /// Removes a column from the header and every row.
    pub fn remove_column(&mut self, index: usize) {
        self.columns.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
    }

    /// Keeps only the columns at `indices`, in the given order.
    pub fn project(&mut self, indices: &[usize]) {
        self.columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = indices.iter().map(|&i| row[i].clone()).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_records_basic() {
        let table = Table::from_records(&json!([
            {"age": 1, "name": "ada"},
            {"age": 2, "name": "bob"},
        ]))
        .unwrap();
        assert_eq!(table.columns(), &["age".to_string(), "name".to_string()]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.rows()[0][0], Cell::Int(1));
        assert_eq!(table.rows()[1][1], Cell::Str("bob".into()));
    }

    #[test]
    fn test_from_records_union_of_keys() {
        let table = Table::from_records(&json!([
            {"a": 1},
            {"b": "x"},
        ]))
        .unwrap();
        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()]);
        // Missing keys become nulls
        assert_eq!(table.rows()[0][1], Cell::Null);
        assert_eq!(table.rows()[1][0], Cell::Null);
    }

    #[test]
    fn test_from_records_rejects_non_array() {
        assert!(matches!(
            Table::from_records(&json!({"a": 1})),
            Err(TableError::NotRecords)
        ));
    }

    #[test]
    fn test_from_records_rejects_non_object_row() {
        assert!(matches!(
            Table::from_records(&json!([1, 2])),
            Err(TableError::RowNotObject { row: 0 })
        ));
    }

    #[test]
    fn test_from_records_rejects_nested_values() {
        let err = Table::from_records(&json!([{"a": [1, 2]}])).unwrap_err();
        assert!(matches!(err, TableError::UnsupportedCell { row: 0, .. }));
    }

    #[test]
    fn test_round_trip() {
        let source = json!([
            {"age": 1, "name": "ada", "score": 1.5, "active": true, "note": null},
            {"age": 2, "name": "bob", "score": 2.5, "active": false, "note": "x"},
        ]);
        let table = Table::from_records(&source).unwrap();
        assert_eq!(table.to_records(), source);
    }

    #[test]
    fn test_nan_serializes_as_null() {
        let table = Table::from_columns(vec![("x", vec![Cell::Float(f64::NAN)])]);
        assert_eq!(table.to_records(), json!([{"x": null}]));
    }

    #[test]
    fn test_from_columns_and_projection() {
        let mut table = Table::from_columns(vec![
            ("a", vec![Cell::Int(1), Cell::Int(2)]),
            ("b", vec![Cell::Str("x".into()), Cell::Str("y".into())]),
            ("c", vec![Cell::Null, Cell::Bool(true)]),
        ]);
        assert_eq!(table.cell_count(), 6);

        table.project(&[2, 0]);
        assert_eq!(table.columns(), &["c".to_string(), "a".to_string()]);
        assert_eq!(table.rows()[1], vec![Cell::Bool(true), Cell::Int(2)]);
    }

    #[test]
    fn test_remove_and_replace_column() {
        let mut table = Table::from_columns(vec![
            ("a", vec![Cell::Int(1)]),
            ("b", vec![Cell::Int(2)]),
        ]);
        table.replace_column(0, vec![Cell::Int(9)]);
        assert_eq!(table.rows()[0][0], Cell::Int(9));

        table.remove_column(1);
        assert_eq!(table.columns(), &["a".to_string()]);
        assert_eq!(table.rows()[0].len(), 1);
    }
}
