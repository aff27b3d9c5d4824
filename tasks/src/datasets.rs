use std::{fmt, sync::Arc};

use rand::{Rng, SeedableRng, rngs::StdRng};

/// One split of a dataset, a deterministic function from a seed to a batch.
pub struct Split<B> {
    sampler: Arc<dyn Fn(u64) -> B + Send + Sync>,
}

impl<B> Clone for Split<B> {
    fn clone(&self) -> Self {
        Self {
            sampler: Arc::clone(&self.sampler),
        }
    }
}

impl<B> fmt::Debug for Split<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Split")
    }
}

impl<B> Split<B> {
    /// Creates a new `Split`.
    ///
    /// # Arguments
    /// * `sampler` - Builds a batch out of a seed, equal seeds must give equal batches.
    pub fn new<F>(sampler: F) -> Self
    where
        F: Fn(u64) -> B + Send + Sync + 'static,
    {
        Self {
            sampler: Arc::new(sampler),
        }
    }

    pub fn sample(&self, seed: u64) -> B {
        (self.sampler)(seed)
    }

    /// An infinite lazy sequence of batches.
    ///
    /// # Arguments
    /// * `seed` - The seed of the whole sequence.
    pub fn iter(&self, seed: u64) -> impl Iterator<Item = B> + '_ {
        let mut rng = StdRng::seed_from_u64(seed);
        std::iter::repeat_with(move || self.sample(rng.random()))
    }
}

/// The splits a task trains and evaluates on.
#[derive(Debug, Clone)]
pub struct Datasets<B> {
    pub train: Split<B>,
    pub test: Split<B>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iter_is_infinite_and_reproducible() {
        let split = Split::new(|seed| seed % 1000);

        let a: Vec<_> = split.iter(3).take(50).collect();
        let b: Vec<_> = split.iter(3).take(50).collect();
        let c: Vec<_> = split.iter(4).take(50).collect();

        assert_eq!(a.len(), 50);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
