//! Classifier adapters.
//!
//! `PatternClassifier` is the deterministic fallback: token-overlap
//! scoring against the flow's intent examples plus type-tagged slot
//! extraction. `RemoteClassifier` calls an external service and falls
//! back to the pattern classifier on any failure.

mod pattern;
mod remote;

pub use pattern::PatternClassifier;
pub use remote::RemoteClassifier;
