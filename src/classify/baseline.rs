//! Majority-class baseline learner.

use crate::classify::{Learner, Model};
use crate::dataset::{Table, Value};
use crate::error::Result;

/// Predicts class priors regardless of the row contents. Useful as a floor
/// for utility comparisons and as a cheap pipeline exerciser.
#[derive(Debug, Default)]
pub struct MajorityClass;

impl Learner for MajorityClass {
    fn name(&self) -> &str {
        "majority"
    }

    fn fit(&self, table: &Table, classes: &[String]) -> Result<Box<dyn Model>> {
        let total = table.row_count().max(1) as f64;
        let priors = classes
            .iter()
            .map(|class| {
                table.rows().iter().filter(|r| &r.class == class).count() as f64 / total
            })
            .collect();
        Ok(Box::new(PriorModel { priors }))
    }
}

struct PriorModel {
    priors: Vec<f64>,
}

impl Model for PriorModel {
    fn scores(&self, _values: &[Value]) -> Vec<f64> {
        self.priors.clone()
    }
}
