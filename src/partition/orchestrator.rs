//! Generator selection and partition-set production for one plan.

use crate::error::{Error, Result};
use crate::partition::dictionary::DictionaryGenerator;
use crate::partition::ordered::Partition;
use crate::partition::random::RandomSession;
use crate::partition::trim;
use crate::plan::{GenerationMode, PartitionPlan};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Random sampling only pays off when most of the space is skipped.
const RANDOM_MODE_MAX_EXPENSE: f64 = 0.95;
/// And when the space is too large to enumerate cheaply.
const RANDOM_MODE_MIN_TARGET: u128 = 100_000;

/// Exact binomial coefficient with checked arithmetic; `None` on overflow.
pub fn binomial(n: u64, k: u64) -> Option<u128> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc.checked_mul((n - i) as u128)?;
        acc /= (i + 1) as u128;
    }
    Some(acc)
}

/// Result of one generation run: the partitions plus the mode that actually
/// produced them (the plan may request random and still get dictionary).
pub struct GeneratedPartitions {
    pub partitions: BTreeSet<Partition>,
    pub mode: GenerationMode,
}

/// Chooses between dictionary and random generation for a validated plan.
pub struct PartitionOrchestrator {
    plan: PartitionPlan,
}

impl PartitionOrchestrator {
    pub fn new(plan: PartitionPlan) -> Result<Self> {
        plan.validate()?;
        Ok(Self { plan })
    }

    /// Total target count `ceil(C(n,k) * expense)`.
    pub fn target(&self) -> Result<u128> {
        let space = binomial(self.plan.attribute_count as u64, self.plan.partition_size as u64)
            .ok_or_else(|| {
                Error::Config(format!(
                    "C({},{}) overflows the supported combination count",
                    self.plan.attribute_count, self.plan.partition_size
                ))
            })?;
        let target = (space as f64 * self.plan.expense).ceil() as u128;
        if target > usize::MAX as u128 {
            return Err(Error::Config(format!(
                "target partition count {target} exceeds what this platform can hold"
            )));
        }
        Ok(target)
    }

    /// Which generator the heuristic selects for this plan.
    pub fn effective_mode(&self) -> Result<GenerationMode> {
        let target = self.target()?;
        let mode = if self.plan.mode == GenerationMode::Random
            && self.plan.expense < RANDOM_MODE_MAX_EXPENSE
            && target > RANDOM_MODE_MIN_TARGET
        {
            GenerationMode::Random
        } else {
            GenerationMode::Dictionary
        };
        debug!(?mode, target, "selected generation mode");
        Ok(mode)
    }

    /// Generate the partition set, optionally seeded with partitions
    /// recovered from a checkpoint (random mode only).
    pub async fn generate(&self, seed: BTreeSet<Partition>) -> Result<GeneratedPartitions> {
        let mode = self.effective_mode()?;
        let target = self.target()? as usize;
        let partitions = match mode {
            GenerationMode::Random => {
                let session = RandomSession::new(
                    self.plan.attribute_count,
                    self.plan.partition_size,
                    target,
                    self.plan.privacy_exceptions.clone(),
                )
                .with_seed(seed);
                session.generate().await?
            }
            GenerationMode::Dictionary => {
                let generator = DictionaryGenerator::new(
                    self.plan.attribute_count,
                    self.plan.partition_size,
                    self.plan.privacy_exceptions.clone(),
                );
                let full = generator.generate().await?;
                trim::trim(full, self.plan.expense, &self.plan.utility_exceptions)?
            }
        };
        info!(
            generated = partitions.len(),
            ?mode,
            "partition generation complete"
        );
        Ok(GeneratedPartitions { partitions, mode })
    }
}
