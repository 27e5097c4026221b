//! Cloze ("story gap") exercise generation.
//!
//! A request flows through normalization, prompt building, the oracle call,
//! lenient parsing and the validators; [`StoryGapPipeline`] owns the retry
//! loop around all of them.

pub mod challenge;
pub mod client;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod request;
pub mod text;
pub mod types;
pub mod validate;

pub use challenge::{AmbiguityReport, AmbiguityVerifier, ModelAmbiguityVerifier};
pub use client::GenerationClient;
pub use orchestrator::{PipelineOptions, StoryGapPipeline};
pub use request::StoryGapRequest;
pub use types::{Difficulty, Exercise, GapMeta, Reject, WordSet};
pub use validate::{ValidationResult, validate_exercise};
