use serde::{Deserialize, Serialize};

use crate::matching::normalize::normalize_address;
use crate::matching::similarity::similarity;

pub const DEFAULT_ADDRESS_THRESHOLD: u8 = 90;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressCandidate<I> {
    pub id: I,
    pub address: String,
}

impl<I> AddressCandidate<I> {
    pub fn new(id: I, address: impl Into<String>) -> Self {
        Self { id, address: address.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoredCandidate<I> {
    pub id: I,
    pub score: u8,
}

/// Picks the closest candidate address, accepting it only above a fixed score.
///
/// The acceptance bar is absolute so that a batch of uniformly poor candidates never
/// yields a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandidateResolver {
    threshold: u8,
}

impl Default for CandidateResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS_THRESHOLD)
    }
}

impl CandidateResolver {
    pub fn new(threshold: u8) -> Self {
        Self { threshold: threshold.min(100) }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Highest-scoring candidate regardless of the threshold. Ties keep the candidate seen
    /// first.
    pub fn best_match<I: Clone>(
        &self,
        query_address: &str,
        candidates: &[AddressCandidate<I>],
    ) -> Option<ScoredCandidate<I>> {
        let query = normalize_address(query_address);
        let mut best: Option<ScoredCandidate<I>> = None;

        for candidate in candidates {
            let score = similarity(&query, &normalize_address(&candidate.address));
            let better = best.as_ref().map(|current| score > current.score).unwrap_or(true);
            if better {
                best = Some(ScoredCandidate { id: candidate.id.clone(), score });
            }
        }

        best
    }

    pub fn resolve<I: Clone>(
        &self,
        query_address: &str,
        candidates: &[AddressCandidate<I>],
    ) -> Option<I> {
        self.best_match(query_address, candidates)
            .filter(|best| best.score >= self.threshold)
            .map(|best| best.id)
    }
}
