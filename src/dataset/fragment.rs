//! Fragment derivation: one partition's column/row-reduced view of the
//! source table.

use crate::dataset::Table;
use crate::error::{Error, Result};
use crate::partition::ordered::Partition;
use rand::seq::index;
use std::sync::Arc;

/// A partition paired with its reduced copy of the dataset. Owned by the
/// learning job that consumes it and discarded afterwards.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub partition: Partition,
    pub table: Table,
}

/// Builds fragments from a shared source table.
///
/// `horizontal_expense` in `(0, 1]` caps the fraction of rows each fragment
/// keeps; rows are sampled without replacement, independently per fragment.
pub struct FragmentBuilder {
    source: Arc<Table>,
    horizontal_expense: f64,
}

impl FragmentBuilder {
    pub fn new(source: Arc<Table>, horizontal_expense: f64) -> Result<Self> {
        if !(horizontal_expense > 0.0 && horizontal_expense <= 1.0) {
            return Err(Error::Config(format!(
                "horizontal expense must be in (0, 1], got {horizontal_expense}"
            )));
        }
        Ok(Self {
            source,
            horizontal_expense,
        })
    }

    pub fn build(&self, partition: &Partition) -> Result<Fragment> {
        let universe = self.source.attribute_count();
        if let Some(&max) = partition.attributes().last() {
            if max > universe {
                return Err(Error::Dataset(format!(
                    "partition {partition} references attribute {max} outside 1..={universe}"
                )));
            }
        }
        let rows = self.select_rows();
        let table = self.source.restrict(partition.attributes(), &rows);
        Ok(Fragment {
            partition: partition.clone(),
            table,
        })
    }

    fn select_rows(&self) -> Vec<usize> {
        let total = self.source.row_count();
        if self.horizontal_expense >= 1.0 {
            return (0..total).collect();
        }
        let keep = ((total as f64) * self.horizontal_expense).floor().max(1.0) as usize;
        let mut rng = rand::rng();
        let mut picked: Vec<usize> = index::sample(&mut rng, total, keep.min(total)).into_vec();
        picked.sort_unstable();
        picked
    }
}
