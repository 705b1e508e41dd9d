//! Random train/test/validation partitioning of a generated dataset.
use crate::{config::SplitConfig, Result};
use qu::ick_use::*;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
pub struct Split<T> {
    pub train: Vec<T>,
    pub test: Vec<T>,
    pub val: Vec<T>,
}

impl<T> Split<T> {
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len() + self.val.len()
    }
}

/// Shuffle `records`, keep `size` of them (all if `None`), then split them by the configured
/// fractions.
///
/// The held-out part is rounded up, so small samples still get test and validation records. The
/// same seed always gives the same split.
pub fn split_train_test_val<T>(
    mut records: Vec<T>,
    size: Option<usize>,
    config: &SplitConfig,
) -> Result<Split<T>> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    records.shuffle(&mut rng);
    if let Some(size) = size {
        if size > records.len() {
            event!(
                Level::WARN,
                "asked for {} records but only {} are available, using all of them",
                size,
                records.len()
            );
        }
        records.truncate(size);
    }

    let n = records.len();
    let held_out = share(n, 1. - config.train);
    let val = share(held_out, config.validation() / (1. - config.train));

    let mut rest = records.split_off(n - held_out);
    let val_records = rest.split_off(held_out - val);
    event!(
        Level::INFO,
        "split {} records into {} train, {} test, {} validation",
        n,
        records.len(),
        rest.len(),
        val_records.len()
    );
    Ok(Split {
        train: records,
        test: rest,
        val: val_records,
    })
}

/// `fraction` of `n`, rounded up, ignoring float noise just above a whole number.
fn share(n: usize, fraction: f64) -> usize {
    let raw = (n as f64 * fraction - 1e-9).ceil().max(0.) as usize;
    raw.min(n)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn ratios() {
        let records: Vec<i32> = (0..100).collect();
        let split = split_train_test_val(records, None, &SplitConfig::default()).unwrap();
        assert_eq!(split.train.len(), 80);
        assert_eq!(split.test.len(), 10);
        assert_eq!(split.val.len(), 10);

        let all: BTreeSet<i32> = split
            .train
            .iter()
            .chain(&split.test)
            .chain(&split.val)
            .copied()
            .collect();
        assert_eq!(all.len(), 100);
    }

    #[test]
    fn sample_size() {
        let records: Vec<i32> = (0..100).collect();
        let split = split_train_test_val(records, Some(10), &SplitConfig::default()).unwrap();
        assert_eq!(split.len(), 10);
        assert_eq!(split.train.len(), 8);
        assert_eq!(split.test.len(), 1);
        assert_eq!(split.val.len(), 1);

        let split =
            split_train_test_val((0..5).collect::<Vec<i32>>(), Some(50), &SplitConfig::default())
                .unwrap();
        assert_eq!(split.len(), 5);
    }

    #[test]
    fn seeded() {
        let config = SplitConfig::default();
        let a = split_train_test_val((0..50).collect::<Vec<i32>>(), None, &config).unwrap();
        let b = split_train_test_val((0..50).collect::<Vec<i32>>(), None, &config).unwrap();
        assert_eq!(a, b);

        let other = SplitConfig {
            seed: 2,
            ..SplitConfig::default()
        };
        let c = split_train_test_val((0..50).collect::<Vec<i32>>(), None, &other).unwrap();
        assert_ne!(a.train, c.train);
    }

    #[test]
    fn empty() {
        let split = split_train_test_val(Vec::<i32>::new(), None, &SplitConfig::default()).unwrap();
        assert_eq!(split.len(), 0);
    }
}
