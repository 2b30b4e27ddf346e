//! Outcome resolution for admitted requests

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use turnstile_common::Outcome;

/// Source of outcomes for admitted requests.
///
/// The production resolver draws from a weighted distribution; tests swap in
/// a deterministic implementation. Resolvers must not touch shared state.
pub trait OutcomeResolver: Send + Sync {
    fn resolve(&self) -> Outcome;
}

/// Candidate population: 5x Ok, 5x Accepted, 1x BadRequest, 1x ServerError,
/// giving ~42/42/8/8 percent over a uniform draw.
const POPULATION: [Outcome; 12] = [
    Outcome::Ok,
    Outcome::Ok,
    Outcome::Ok,
    Outcome::Ok,
    Outcome::Ok,
    Outcome::Accepted,
    Outcome::Accepted,
    Outcome::Accepted,
    Outcome::Accepted,
    Outcome::Accepted,
    Outcome::BadRequest,
    Outcome::ServerError,
];

/// Weighted random resolver over the fixed candidate population
#[derive(Debug)]
pub struct WeightedResolver {
    rng: Mutex<StdRng>,
}

impl WeightedResolver {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeded variant for reproducible draws
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for WeightedResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeResolver for WeightedResolver {
    fn resolve(&self) -> Outcome {
        let mut rng = self.rng.lock();
        POPULATION[rng.gen_range(0..POPULATION.len())]
    }
}

/// Deterministic resolver cycling through a fixed sequence
#[cfg(test)]
pub(crate) struct SequenceResolver {
    sequence: Vec<Outcome>,
    next: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl SequenceResolver {
    pub(crate) fn new(sequence: Vec<Outcome>) -> Self {
        assert!(!sequence.is_empty());
        Self {
            sequence,
            next: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
impl OutcomeResolver for SequenceResolver {
    fn resolve(&self) -> Outcome {
        let i = self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.sequence[i % self.sequence.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_composition() {
        let ok = POPULATION.iter().filter(|o| **o == Outcome::Ok).count();
        let accepted = POPULATION
            .iter()
            .filter(|o| **o == Outcome::Accepted)
            .count();
        let bad = POPULATION
            .iter()
            .filter(|o| **o == Outcome::BadRequest)
            .count();
        let server = POPULATION
            .iter()
            .filter(|o| **o == Outcome::ServerError)
            .count();

        assert_eq!(ok, 5);
        assert_eq!(accepted, 5);
        assert_eq!(bad, 1);
        assert_eq!(server, 1);
        assert_eq!(POPULATION.len(), 12);
    }

    #[test]
    fn test_seeded_draws_match_population_proportions() {
        let resolver = WeightedResolver::with_seed(42);
        let draws = 12_000;
        let mut counts = std::collections::HashMap::new();
        for _ in 0..draws {
            *counts.entry(resolver.resolve()).or_insert(0u32) += 1;
        }

        // Uniform over the 12-element population: expect 5/12, 5/12, 1/12, 1/12.
        let ok = counts[&Outcome::Ok] as f64 / draws as f64;
        let accepted = counts[&Outcome::Accepted] as f64 / draws as f64;
        let bad = counts[&Outcome::BadRequest] as f64 / draws as f64;
        let server = counts[&Outcome::ServerError] as f64 / draws as f64;

        assert!((ok - 5.0 / 12.0).abs() < 0.02, "ok share {}", ok);
        assert!((accepted - 5.0 / 12.0).abs() < 0.02);
        assert!((bad - 1.0 / 12.0).abs() < 0.01);
        assert!((server - 1.0 / 12.0).abs() < 0.01);
    }

    #[test]
    fn test_same_seed_same_draws() {
        let a = WeightedResolver::with_seed(7);
        let b = WeightedResolver::with_seed(7);
        for _ in 0..100 {
            assert_eq!(a.resolve(), b.resolve());
        }
    }

    #[test]
    fn test_sequence_resolver_cycles() {
        let resolver = SequenceResolver::new(vec![Outcome::Ok, Outcome::BadRequest]);
        assert_eq!(resolver.resolve(), Outcome::Ok);
        assert_eq!(resolver.resolve(), Outcome::BadRequest);
        assert_eq!(resolver.resolve(), Outcome::Ok);
    }
}
