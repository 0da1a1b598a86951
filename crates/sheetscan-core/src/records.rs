//! Per-sheet tables keyed by sheet code.
//!
//! Answer tables hold one recognized answer string per question; score tables
//! have the same shape with integer points. Rows are kept sorted by code.

use crate::io::{read_json, write_json_pretty, JsonIoError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("row `{code}` has {got} values, table has {expected} columns")]
    RowWidth {
        code: String,
        expected: usize,
        got: usize,
    },
    #[error("duplicate row `{0}`")]
    DuplicateRow(String),
}

/// Table with named columns and one row per sheet code.
///
/// Deserialized tables are checked row by row like [`CodeTable::insert_row`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "TableDocument<T>",
    bound(deserialize = "T: DeserializeOwned")
)]
pub struct CodeTable<T> {
    pub columns: Vec<String>,
    pub rows: BTreeMap<String, Vec<T>>,
}

/// Table as stored on disk, before row validation.
#[derive(Deserialize)]
struct TableDocument<T> {
    columns: Vec<String>,
    #[serde(default = "BTreeMap::new")]
    rows: BTreeMap<String, Vec<T>>,
}

impl<T> TryFrom<TableDocument<T>> for CodeTable<T> {
    type Error = TableError;

    fn try_from(doc: TableDocument<T>) -> Result<Self, Self::Error> {
        let mut table = CodeTable::new(doc.columns);
        for (code, values) in doc.rows {
            table.insert_row(code, values)?;
        }
        Ok(table)
    }
}

/// Sheet code → recognized answer per question.
pub type AnswerTable = CodeTable<String>;

/// Sheet code → points per question; `None` where scoring was halted.
pub type ScoreTable = CodeTable<Option<u32>>;

impl<T> CodeTable<T> {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// Add a row; the row must have one value per column and a new code.
    pub fn insert_row(&mut self, code: impl Into<String>, values: Vec<T>) -> Result<(), TableError> {
        let code = code.into();
        if values.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                code,
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        if self.rows.contains_key(&code) {
            return Err(TableError::DuplicateRow(code));
        }
        self.rows.insert(code, values);
        Ok(())
    }

    pub fn row(&self, code: &str) -> Option<&[T]> {
        self.rows.get(code).map(Vec::as_slice)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at (`code`, `column`).
    pub fn get(&self, code: &str, column: &str) -> Option<&T> {
        let idx = self.column_index(column)?;
        self.rows.get(code)?.get(idx)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: Serialize + DeserializeOwned> CodeTable<T> {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, JsonIoError> {
        read_json(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), JsonIoError> {
        write_json_pretty(path, self)
    }
}
