//! Companion matching
//!
//! - `scorer`: pure compatibility scoring and eligibility
//! - `pipeline`: the profile-write handler that maintains suggestion sets

pub mod pipeline;
pub mod scorer;

pub use pipeline::{suggestions_path, MatchingConfig, SuggestionPipeline};
pub use scorer::{compatibility_score, is_eligible, GriefStage};
