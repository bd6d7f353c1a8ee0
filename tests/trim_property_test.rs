//! Property tests pinning the budget-trimming arithmetic.

use partwise::partition::trim::trim;
use partwise::partition::{ExceptionSet, Partition};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// All pairs over `1..=n`, as a stand-in for a generated set.
fn pairs(n: u32) -> BTreeSet<Partition> {
    let mut out = BTreeSet::new();
    for a in 1..=n {
        for b in a + 1..=n {
            out.insert(Partition::new(vec![a, b]).unwrap());
        }
    }
    out
}

proptest! {
    // The trimmed set has exactly floor(S * e) elements whenever that floor
    // is positive, regardless of the utility exceptions in play.
    #[test]
    fn trimmed_size_is_exactly_floor(
        n in 4u32..12,
        expense in 0.05f64..=1.0,
        utility_attr in 1u32..4,
    ) {
        let set = pairs(n);
        let size = set.len();
        let target = (size as f64 * expense).floor() as usize;
        let utility = ExceptionSet::new(vec![Partition::new(vec![utility_attr]).unwrap()]);

        let result = trim(set, expense, &utility);
        if target == 0 {
            prop_assert!(result.is_err());
        } else {
            let trimmed = result.unwrap();
            prop_assert_eq!(trimmed.len(), target);
        }
    }

    // Must-keep partitions survive whenever they fit within the budget.
    #[test]
    fn must_keep_survives_when_it_fits(
        n in 5u32..12,
        expense in 0.3f64..=1.0,
    ) {
        let set = pairs(n);
        let size = set.len();
        let target = (size as f64 * expense).floor() as usize;
        let utility = ExceptionSet::new(vec![Partition::new(vec![1]).unwrap()]);
        let must_keep_count = (n - 1) as usize;
        prop_assume!(target >= must_keep_count);

        let trimmed = trim(set, expense, &utility).unwrap();
        for b in 2..=n {
            prop_assert!(
                trimmed.contains(&Partition::new(vec![1, b]).unwrap()),
                "must-keep {{1,{}}} was trimmed", b
            );
        }
    }

    // When must-keep alone exceeds the budget, the result contains only
    // must-keep partitions.
    #[test]
    fn oversized_must_keep_discards_remainder(
        n in 6u32..12,
    ) {
        let set = pairs(n);
        let size = set.len();
        // Budget below the number of pairs containing attribute 1.
        let expense = ((n - 2) as f64 / size as f64).max(0.01);
        let target = (size as f64 * expense).floor() as usize;
        prop_assume!(target > 0 && target < (n - 1) as usize);
        let utility = ExceptionSet::new(vec![Partition::new(vec![1]).unwrap()]);

        let trimmed = trim(set, expense, &utility).unwrap();
        prop_assert_eq!(trimmed.len(), target);
        for part in &trimmed {
            prop_assert!(part.contains(1), "{} is not a must-keep partition", part);
        }
    }
}
