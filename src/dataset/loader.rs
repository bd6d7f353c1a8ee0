//! CSV loader for cleaned, labeled tables.
//!
//! The loader expects already-clean input: a header row, one label column
//! (named, or the last column by default), and no missing fields. Imputation
//! and duplicate resolution are upstream concerns.

use crate::dataset::{Row, Table, Value};
use crate::error::{Error, Result};
use std::path::Path;
use tracing::info;

/// Load a table from a CSV file. `label` selects the class column by name;
/// `None` uses the last column.
pub fn load_csv(path: &Path, label: Option<&str>) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::Dataset(format!("cannot open {}: {e}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::Dataset(format!("cannot read header row: {e}")))?
        .iter()
        .map(String::from)
        .collect();
    if headers.len() < 2 {
        return Err(Error::Dataset(
            "need at least one attribute column and one label column".into(),
        ));
    }

    let label_index = match label {
        Some(name) => headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::Dataset(format!("label column {name:?} not found")))?,
        None => headers.len() - 1,
    };
    let label_name = headers[label_index].clone();
    let attributes: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != label_index)
        .map(|(_, h)| h.clone())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| Error::Dataset(format!("row {}: {e}", line + 1)))?;
        if record.len() != headers.len() {
            return Err(Error::Dataset(format!(
                "row {} has {} fields, expected {}",
                line + 1,
                record.len(),
                headers.len()
            )));
        }
        let mut values = Vec::with_capacity(attributes.len());
        let mut class = String::new();
        for (i, field) in record.iter().enumerate() {
            if field.is_empty() {
                return Err(Error::Dataset(format!(
                    "row {} column {:?} is empty; input must be cleaned first",
                    line + 1,
                    headers[i]
                )));
            }
            if i == label_index {
                class = field.to_string();
            } else {
                values.push(parse_value(field));
            }
        }
        rows.push(Row { values, class });
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".into());
    let table = Table::new(name, attributes, label_name, rows)?;
    info!(
        rows = table.row_count(),
        attributes = table.attribute_count(),
        classes = table.classes().len(),
        "loaded dataset {}",
        path.display()
    );
    Ok(table)
}

fn parse_value(field: &str) -> Value {
    match field.parse::<f64>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::Text(field.to_string()),
    }
}
