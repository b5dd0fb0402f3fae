//! The partitioner's single deterministic RNG stream, threaded as an
//! explicit value through recursive calls rather than held as process-
//! global state, per spec §9's "pure-value state" guidance.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The original source's fixed seed, kept verbatim for cross-run
/// reproducibility (spec §4.G's "Random seed is fixed for
/// reproducibility").
pub const FIXED_SEED: u64 = 17_032_025;

pub struct LeidenRng(ChaCha8Rng);

impl LeidenRng {
    pub fn seeded() -> Self {
        LeidenRng(ChaCha8Rng::seed_from_u64(FIXED_SEED))
    }

    pub fn from_seed(seed: u64) -> Self {
        LeidenRng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn shuffled(&mut self, mut items: Vec<usize>) -> Vec<usize> {
        items.shuffle(&mut self.0);
        items
    }

    pub fn gen_f64(&mut self) -> f64 {
        self.0.gen::<f64>()
    }

    /// Samples an index in `weights` with probability proportional to
    /// its weight. Returns `None` if every weight is zero.
    pub fn weighted_choice(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return None;
        }
        let mut target = self.gen_f64() * total;
        for (i, &w) in weights.iter().enumerate() {
            target -= w;
            if target <= 0.0 {
                return Some(i);
            }
        }
        Some(weights.len() - 1)
    }
}
