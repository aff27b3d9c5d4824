use rand::{Rng, SeedableRng, rngs::StdRng};

/// Derives `n` independent seeds out of `seed`.
///
/// Equal inputs always give the same seeds, the `i`th seed only depends on `seed` and `i`.
pub fn split(seed: u64, n: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random()).collect()
}

/// Fixed size `split`, yields the same seeds as `split(seed, N)`.
pub fn split_n<const N: usize>(seed: u64) -> [u64; N] {
    let mut rng = StdRng::seed_from_u64(seed);
    std::array::from_fn(|_| rng.random())
}

/// Mixes `data` into `seed`, used to give every round of a worker its own seed.
pub fn fold_in(seed: u64, data: u64) -> u64 {
    let mut rng = StdRng::seed_from_u64(seed ^ data.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    rng.random()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn split_is_deterministic_and_distinct() {
        let a = split(42, 16);
        assert_eq!(a, split(42, 16));
        assert_eq!(a.iter().collect::<HashSet<_>>().len(), 16);
        assert_ne!(a, split(43, 16));
    }

    #[test]
    fn split_prefixes_agree() {
        assert_eq!(split(7, 3), split(7, 5)[..3]);
    }

    #[test]
    fn fixed_size_split_matches() {
        let seeds: [u64; 4] = split_n(9);
        assert_eq!(seeds[..], split(9, 4)[..]);
    }

    #[test]
    fn fold_in_separates_rounds() {
        let rounds: HashSet<_> = (0..32).map(|round| fold_in(1, round)).collect();
        assert_eq!(rounds.len(), 32);
        assert_eq!(fold_in(1, 5), fold_in(1, 5));
    }
}
