//! Extraction service adapters
//!
//! The memory store only talks to the [`Extractor`] trait. Two
//! implementations ship with the crate: a hosted chat-completions model and an
//! offline keyword heuristic.

mod keyword;
mod llm;
mod prompt;

pub use keyword::KeywordExtractor;
pub use llm::LlmExtractor;
pub use prompt::{
    build_full_prompt, build_incremental_prompt, parse_fact_bundle, parse_incremental_update,
    EXTRACTION_SYSTEM_PROMPT,
};

use crate::memory::{FactBundle, FactSet, IncrementalUpdate};
use crate::Result;
use async_trait::async_trait;

/// Turns conversation text into structured facts.
///
/// Implementations may be non-deterministic. Every failure should surface as
/// [`crate::EchoNoteError::ExtractionFailed`].
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract every fact from the full transcript
    async fn extract(&self, transcript: &str) -> Result<FactBundle>;

    /// Report only what is attributable to `delta`, given the facts already known
    async fn extract_incremental(&self, delta: &str, existing: &FactSet)
        -> Result<IncrementalUpdate>;
}
