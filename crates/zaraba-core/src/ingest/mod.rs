mod candidate;
mod normalize;

pub use candidate::{Candidate, RawCandidate, SourceTag};
pub use normalize::{identity_hash, normalize_candidate, normalize_url, NormalizedCandidate};
