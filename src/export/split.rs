//! Train/validation partitioning.

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// Which output a shuffled example lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Partition {
    Training,
    Validation,
}

/// Number of training examples: `floor((1 - validation_split) * total)`.
///
/// `validation_split` is expected in `[0, 1]`; values outside are clamped.
pub fn train_size(total: usize, validation_split: f64) -> usize {
    let fraction = (1.0 - validation_split).clamp(0.0, 1.0);
    // The product is computed in f64 and can land a hair under an integer
    // (e.g. 0.7 * 10 = 6.999...), so round to 9 decimals before flooring.
    let exact = fraction * total as f64;
    let snapped = (exact * 1e9).round() / 1e9;
    (snapped.floor() as usize).min(total)
}

/// Partition for the example at 0-based `position` in shuffled order.
///
/// Positions `0..train_size` are training; `train_size..` are validation.
pub fn partition_for(position: usize, train_size: usize) -> Partition {
    if position < train_size {
        Partition::Training
    } else {
        Partition::Validation
    }
}

/// Shuffles `items` in place with a uniform permutation seeded by `seed`.
///
/// The same seed over the same input order always yields the same
/// permutation, so train/validation membership can be reproduced.
pub fn shuffle_seeded<T>(items: &mut [T], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_size_floors_the_training_fraction() {
        assert_eq!(train_size(10, 0.2), 8);
        assert_eq!(train_size(10, 0.3), 7);
        assert_eq!(train_size(10, 0.25), 7);
        assert_eq!(train_size(3, 0.5), 1);
        assert_eq!(train_size(10, 0.0), 10);
        assert_eq!(train_size(10, 1.0), 0);
        assert_eq!(train_size(0, 0.2), 0);
    }

    #[test]
    fn boundary_sends_train_size_itself_to_validation() {
        assert_eq!(partition_for(7, 8), Partition::Training);
        assert_eq!(partition_for(8, 8), Partition::Validation);
        assert_eq!(partition_for(0, 0), Partition::Validation);
    }

    #[test]
    fn seeded_shuffle_is_reproducible_and_a_permutation() {
        let mut a: Vec<u32> = (0..50).collect();
        let mut b = a.clone();
        shuffle_seeded(&mut a, 7);
        shuffle_seeded(&mut b, 7);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(a, sorted);
    }
}
