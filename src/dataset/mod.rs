//! Cleaned tabular dataset abstraction.
//!
//! The pipeline only performs column subsetting and row subsampling on a
//! table that is already cleaned and labeled; parsing and cleaning live in
//! the loader collaborator.

pub mod fragment;
pub mod loader;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use fragment::{Fragment, FragmentBuilder};

/// One cell of a cleaned table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }
}

/// One labeled row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
    pub class: String,
}

/// An in-memory cleaned, labeled table. Attribute indices used throughout
/// the crate are 1-based: attribute `i` is column `i - 1` here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    attributes: Vec<String>,
    label: String,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: String, attributes: Vec<String>, label: String, rows: Vec<Row>) -> Result<Self> {
        if attributes.is_empty() {
            return Err(Error::Dataset("table has no attribute columns".into()));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.values.len() != attributes.len() {
                return Err(Error::Dataset(format!(
                    "row {i} has {} values, expected {}",
                    row.values.len(),
                    attributes.len()
                )));
            }
        }
        Ok(Self {
            name,
            attributes,
            label,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of attributes, i.e. the size of the partition universe.
    pub fn attribute_count(&self) -> u32 {
        self.attributes.len() as u32
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attributes
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Distinct class labels in ascending order.
    pub fn classes(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.rows.iter().map(|r| r.class.as_str()).collect();
        set.into_iter().map(String::from).collect()
    }

    /// Copy of this table restricted to the given 1-based attribute indices
    /// and the given row positions.
    pub(crate) fn restrict(&self, attribute_indices: &[u32], row_positions: &[usize]) -> Table {
        let columns: Vec<usize> = attribute_indices.iter().map(|&a| (a - 1) as usize).collect();
        let attributes = columns.iter().map(|&c| self.attributes[c].clone()).collect();
        let rows = row_positions
            .iter()
            .map(|&r| {
                let source = &self.rows[r];
                Row {
                    values: columns.iter().map(|&c| source.values[c].clone()).collect(),
                    class: source.class.clone(),
                }
            })
            .collect();
        Table {
            name: self.name.clone(),
            attributes,
            label: self.label.clone(),
            rows,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Small numeric two-class table used across unit tests.
    pub fn sample_table(rows: usize) -> Table {
        let data = (0..rows)
            .map(|i| {
                let x = i as f64;
                Row {
                    values: vec![
                        Value::Number(x),
                        Value::Number(x * 2.0),
                        Value::Number(100.0 - x),
                    ],
                    class: if i % 2 == 0 { "even" } else { "odd" }.to_string(),
                }
            })
            .collect();
        Table::new(
            "sample".into(),
            vec!["a".into(), "b".into(), "c".into()],
            "parity".into(),
            data,
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_rows() {
        let result = Table::new(
            "bad".into(),
            vec!["a".into(), "b".into()],
            "y".into(),
            vec![Row {
                values: vec![Value::Number(1.0)],
                class: "x".into(),
            }],
        );
        assert!(result.is_err());
    }

    #[test]
    fn classes_are_sorted_and_distinct() {
        let table = testing::sample_table(6);
        assert_eq!(table.classes(), vec!["even".to_string(), "odd".to_string()]);
    }

    #[test]
    fn restrict_selects_columns_and_rows() {
        let table = testing::sample_table(4);
        let reduced = table.restrict(&[1, 3], &[0, 2]);
        assert_eq!(reduced.attribute_names(), &["a".to_string(), "c".to_string()]);
        assert_eq!(reduced.row_count(), 2);
        assert_eq!(reduced.rows()[1].values[1], Value::Number(98.0));
    }
}
