//! Randomised reviewer selection.
//!
//! The selector is stateless apart from its random source: it permutes the
//! candidate pool uniformly and keeps a prefix. The random source is owned
//! by the selector instance and serialised behind a mutex, so one selector
//! can be shared by every concurrent request.

use std::sync::{Mutex, PoisonError};

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use super::UserId;

/// Picks reviewers from a candidate pool.
#[cfg_attr(test, mockall::automock)]
pub trait ReviewerSelector: Send + Sync {
    /// Return up to `count` distinct ids drawn from `candidates`.
    ///
    /// Returns an empty vector when `count` is zero or `candidates` is empty.
    /// Implementations must not assume anything about the order of
    /// `candidates` and must not mutate it.
    fn select(&self, candidates: &[UserId], count: usize) -> Vec<UserId>;
}

/// Uniform random selector backed by a seedable ChaCha stream.
///
/// # Examples
/// ```
/// use backend::domain::{RandomReviewerSelector, ReviewerSelector, UserId};
///
/// let pool: Vec<UserId> = ["u2", "u3", "u4"]
///     .into_iter()
///     .map(|id| UserId::new(id).expect("valid id"))
///     .collect();
///
/// let first = RandomReviewerSelector::with_seed(7).select(&pool, 2);
/// let second = RandomReviewerSelector::with_seed(7).select(&pool, 2);
/// assert_eq!(first, second);
/// assert_eq!(first.len(), 2);
/// ```
#[derive(Debug)]
pub struct RandomReviewerSelector {
    rng: Mutex<ChaCha8Rng>,
}

impl RandomReviewerSelector {
    /// Selector seeded from the thread-local entropy source.
    #[must_use]
    pub fn new() -> Self {
        Self::from_rng(ChaCha8Rng::from_rng(&mut rand::rng()))
    }

    /// Selector with a fixed seed; identical seeds yield identical picks.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    fn from_rng(rng: ChaCha8Rng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl Default for RandomReviewerSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewerSelector for RandomReviewerSelector {
    fn select(&self, candidates: &[UserId], count: usize) -> Vec<UserId> {
        if count == 0 || candidates.is_empty() {
            return Vec::new();
        }

        let mut shuffled = candidates.to_vec();
        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            shuffled.shuffle(&mut *rng);
        }
        shuffled.truncate(count.min(candidates.len()));
        shuffled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use rstest::{fixture, rstest};

    #[fixture]
    fn pool() -> Vec<UserId> {
        ["u1", "u2", "u3", "u4", "u5"]
            .into_iter()
            .map(|raw| UserId::new(raw).expect("valid id"))
            .collect()
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(5, 5)]
    #[case(9, 5)]
    fn returns_min_of_count_and_pool(
        pool: Vec<UserId>,
        #[case] count: usize,
        #[case] expected: usize,
    ) {
        let selector = RandomReviewerSelector::with_seed(42);
        let picked = selector.select(&pool, count);

        assert_eq!(picked.len(), expected);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), picked.len());
        assert!(picked.iter().all(|id| pool.contains(id)));
    }

    #[rstest]
    fn empty_pool_yields_nothing() {
        let selector = RandomReviewerSelector::with_seed(1);
        assert!(selector.select(&[], 2).is_empty());
    }

    #[rstest]
    fn same_seed_same_sequence(pool: Vec<UserId>) {
        let left = RandomReviewerSelector::with_seed(2024);
        let right = RandomReviewerSelector::with_seed(2024);

        for _ in 0..10 {
            assert_eq!(left.select(&pool, 2), right.select(&pool, 2));
        }
    }

    #[rstest]
    fn does_not_mutate_candidates(pool: Vec<UserId>) {
        let snapshot = pool.clone();
        let _picked = RandomReviewerSelector::with_seed(3).select(&pool, 3);
        assert_eq!(pool, snapshot);
    }

    #[rstest]
    fn every_candidate_is_eventually_picked(pool: Vec<UserId>) {
        let selector = RandomReviewerSelector::with_seed(99);
        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.extend(selector.select(&pool, 1));
        }
        assert_eq!(seen.len(), pool.len());
    }

    #[rstest]
    fn shared_selector_is_safe_across_threads(pool: Vec<UserId>) {
        let selector = Arc::new(RandomReviewerSelector::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let selector = Arc::clone(&selector);
                let pool = pool.clone();
                std::thread::spawn(move || selector.select(&pool, 2))
            })
            .collect();

        for handle in handles {
            let picked = handle.join().expect("thread completes");
            assert_eq!(picked.len(), 2);
            assert_ne!(picked.first(), picked.get(1));
        }
    }
}
