//! Node selection for the executor pool.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Picks the node a request is sent to.
pub trait NodeSelector: Send + Sync {
    /// Returns an index in `[1, pool_size]`.
    fn pick(&self, pool_size: usize) -> usize;
}

/// Uniform choice with replacement, so a retry can land on the same node.
pub struct RandomSelector {
    rng: Mutex<StdRng>,
}

impl RandomSelector {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl NodeSelector for RandomSelector {
    fn pick(&self, pool_size: usize) -> usize {
        let pool_size = pool_size.max(1);
        // A poisoned lock only means another picker panicked mid-draw.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(1..=pool_size)
    }
}
