//! Nearest-centroid learner over the numeric attributes of a fragment.

use crate::classify::{Learner, Model};
use crate::dataset::{Table, Value};
use crate::error::Result;

/// Scores a row by its negated Euclidean distance to each class centroid.
/// Text attributes are ignored; a fragment with no numeric attributes falls
/// back to class priors.
#[derive(Debug, Default)]
pub struct NearestCentroid;

impl Learner for NearestCentroid {
    fn name(&self) -> &str {
        "centroid"
    }

    fn fit(&self, table: &Table, classes: &[String]) -> Result<Box<dyn Model>> {
        let numeric_columns: Vec<usize> = (0..table.attribute_count() as usize)
            .filter(|&c| {
                table
                    .rows()
                    .iter()
                    .all(|r| matches!(r.values[c], Value::Number(_)))
            })
            .collect();

        let total = table.row_count().max(1) as f64;
        let mut centroids = Vec::with_capacity(classes.len());
        let mut priors = Vec::with_capacity(classes.len());
        for class in classes {
            let members: Vec<_> = table.rows().iter().filter(|r| &r.class == class).collect();
            priors.push(members.len() as f64 / total);
            if members.is_empty() {
                centroids.push(None);
                continue;
            }
            let centroid = numeric_columns
                .iter()
                .map(|&c| {
                    members
                        .iter()
                        .map(|r| r.values[c].as_number().unwrap_or(0.0))
                        .sum::<f64>()
                        / members.len() as f64
                })
                .collect();
            centroids.push(Some(centroid));
        }

        Ok(Box::new(CentroidModel {
            numeric_columns,
            centroids,
            priors,
        }))
    }
}

struct CentroidModel {
    numeric_columns: Vec<usize>,
    centroids: Vec<Option<Vec<f64>>>,
    priors: Vec<f64>,
}

impl Model for CentroidModel {
    fn scores(&self, values: &[Value]) -> Vec<f64> {
        if self.numeric_columns.is_empty() {
            return self.priors.clone();
        }
        let point: Vec<f64> = self
            .numeric_columns
            .iter()
            .map(|&c| values[c].as_number().unwrap_or(0.0))
            .collect();
        self.centroids
            .iter()
            .map(|centroid| match centroid {
                Some(centroid) => {
                    let dist_sq: f64 = centroid
                        .iter()
                        .zip(&point)
                        .map(|(c, p)| (c - p) * (c - p))
                        .sum();
                    -dist_sq.sqrt()
                }
                // Class absent from this training fold; never the argmax.
                None => f64::NEG_INFINITY,
            })
            .collect()
    }
}
