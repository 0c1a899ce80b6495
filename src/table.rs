//! Column-oriented table built from enriched records.
//!
//! Every column holds one optional cell per row; `None` is a null cell.
//! All columns of a [`Table`] have the same length.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::records::Record;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Bool(Vec<Option<bool>>),
}

/// Hashable view of one cell, used for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CellKey<'a> {
    Null,
    Num(u64),
    Text(&'a str),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn boolean(name: impl Into<String>, values: Vec<Option<bool>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Bool(values),
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, row: usize) -> bool {
        match &self.data {
            ColumnData::Numeric(v) => v[row].is_none(),
            ColumnData::Text(v) => v[row].is_none(),
            ColumnData::Bool(v) => v[row].is_none(),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn cell_key(&self, row: usize) -> CellKey<'_> {
        match &self.data {
            ColumnData::Numeric(v) => match v[row] {
                // -0.0 and 0.0 compare equal
                Some(x) if x == 0.0 => CellKey::Num(0f64.to_bits()),
                Some(x) => CellKey::Num(x.to_bits()),
                None => CellKey::Null,
            },
            ColumnData::Text(v) => v[row].as_deref().map_or(CellKey::Null, CellKey::Text),
            ColumnData::Bool(v) => v[row].map_or(CellKey::Null, CellKey::Bool),
        }
    }

    /// Renders a cell for CSV output; nulls become an empty string.
    pub fn display(&self, row: usize) -> String {
        match &self.data {
            ColumnData::Numeric(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
            ColumnData::Text(v) => v[row].clone().unwrap_or_default(),
            ColumnData::Bool(v) => v[row].map(|b| b.to_string()).unwrap_or_default(),
        }
    }

    fn retain(&mut self, keep: &[bool]) {
        fn filter<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut i = 0;
            values.retain(|_| {
                let k = keep[i];
                i += 1;
                k
            });
        }
        match &mut self.data {
            ColumnData::Numeric(v) => filter(v, keep),
            ColumnData::Text(v) => filter(v, keep),
            ColumnData::Bool(v) => filter(v, keep),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    /// Kept apart from the columns so a table of field-less records still
    /// has one row per record.
    rows: usize,
}

impl Table {
    /// # Errors
    ///
    /// Returns [`PipelineError::RaggedTable`] if the columns differ in length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(PipelineError::RaggedTable {
                    column: bad.name.clone(),
                    expected,
                    actual: bad.len(),
                });
            }
        }
        let rows = columns.first().map_or(0, Column::len);
        Ok(Self { columns, rows })
    }

    /// Tabulates records, one row each, one column per field name in order of
    /// first appearance. A column is numeric when every non-null value is a
    /// number, boolean when every one is a bool, text otherwise.
    pub fn from_records(records: &[Record]) -> Self {
        let flat: Vec<Value> = records.iter().map(Record::to_value).collect();

        let mut names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for obj in flat.iter().filter_map(Value::as_object) {
            for key in obj.keys() {
                if seen.insert(key.clone()) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let cells: Vec<Option<&Value>> = flat
                    .iter()
                    .map(|v| v.get(&name).filter(|v| !v.is_null()))
                    .collect();
                infer_column(name, &cells)
            })
            .collect();

        Self {
            columns,
            rows: records.len(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Total number of cells.
    pub fn size(&self) -> usize {
        self.row_count() * self.column_count()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Mutable access for in-place cell edits; callers must keep lengths equal.
    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Adds a column, replacing any existing column with the same name.
    /// The first column added to an empty table sets its row count.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        let actual = column.len();
        if self.columns.is_empty() && self.rows == 0 {
            self.rows = actual;
        } else if actual != self.rows {
            return Err(PipelineError::RaggedTable {
                column: column.name,
                expected: self.rows,
                actual,
            });
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// The column rows are identified by: `code` if present, else the first.
    pub fn identity_column(&self) -> Option<&str> {
        self.column("code")
            .or_else(|| self.columns.first())
            .map(|c| c.name.as_str())
    }

    /// Keeps the rows whose flag is `true`. `keep` must have one flag per row.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.rows);
        for column in &mut self.columns {
            column.retain(keep);
        }
        self.rows = keep.iter().filter(|k| **k).count();
    }

    /// Flags rows that repeat an earlier row on the `subset` columns; the
    /// first occurrence is never flagged. Nulls compare equal to each other.
    /// Unknown column names are ignored.
    pub fn duplicated(&self, subset: &[&str]) -> Vec<bool> {
        let cols: Vec<&Column> = subset.iter().filter_map(|n| self.column(n)).collect();
        if cols.is_empty() {
            return vec![false; self.row_count()];
        }

        let mut seen = HashSet::new();
        (0..self.row_count())
            .map(|row| {
                let key: Vec<CellKey<'_>> = cols.iter().map(|c| c.cell_key(row)).collect();
                !seen.insert(key)
            })
            .collect()
    }
}

fn infer_column(name: String, cells: &[Option<&Value>]) -> Column {
    let present = || cells.iter().flatten();
    let any_present = present().next().is_some();

    if any_present && present().all(|v| v.is_number()) {
        Column::numeric(name, cells.iter().map(|c| c.and_then(Value::as_f64)).collect())
    } else if any_present && present().all(|v| v.is_boolean()) {
        Column::boolean(name, cells.iter().map(|c| c.and_then(Value::as_bool)).collect())
    } else {
        let values = cells
            .iter()
            .map(|c| {
                c.map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            })
            .collect();
        Column::text(name, values)
    }
}
