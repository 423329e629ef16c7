//! Address matching: canonicalisation, scoring and candidate selection.

pub mod normalize;
pub mod resolver;
pub mod similarity;

pub use normalize::normalize_address;
pub use resolver::{AddressCandidate, CandidateResolver, ScoredCandidate, DEFAULT_ADDRESS_THRESHOLD};
pub use similarity::{address_similarity, similarity};
