//! Simulated transport loss
//!
//! The receiver consults a [`LossModel`] once per bundled message before any
//! reliability logic runs, which exercises the retransmission path without
//! depending on real network conditions.
//!
//! [`LossSimulator`] draws one uniform sample per evaluation from a ChaCha8
//! generator. Given the same seed and the same sequence of evaluations, the
//! drop decisions are identical from run to run.

use crate::sequence::SeqNumber;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Default probability of discarding a message
pub const DEFAULT_LOSS_PROBABILITY: f64 = 0.3;

/// Decides whether an inbound message is lost before processing
pub trait LossModel: Send {
    /// Returns true if the message should be discarded
    fn should_drop(&mut self, seq: SeqNumber) -> bool;
}

impl<F> LossModel for F
where
    F: FnMut(SeqNumber) -> bool + Send,
{
    fn should_drop(&mut self, seq: SeqNumber) -> bool {
        self(seq)
    }
}

/// Loss model that never drops anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoss;

impl LossModel for NoLoss {
    fn should_drop(&mut self, _seq: SeqNumber) -> bool {
        false
    }
}

/// Bernoulli loss with a fixed probability
pub struct LossSimulator {
    probability: f64,
    seed: u64,
    rng: ChaCha8Rng,
}

impl LossSimulator {
    /// Create a simulator seeded from system randomness
    ///
    /// # Panics
    /// Panics if `probability` is outside `[0.0, 1.0]`
    pub fn new(probability: f64) -> Self {
        Self::with_seed(probability, rand::random())
    }

    /// Create a reproducible simulator
    ///
    /// # Panics
    /// Panics if `probability` is outside `[0.0, 1.0]`
    pub fn with_seed(probability: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "Loss probability {} outside [0, 1]",
            probability
        );
        LossSimulator {
            probability,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Seed the generator was created with
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl LossModel for LossSimulator {
    fn should_drop(&mut self, _seq: SeqNumber) -> bool {
        self.rng.gen::<f64>() < self.probability
    }
}
