//! EchoNote - conversational note-taking memory
//!
//! Listens to a growing conversation transcript and keeps an evolving set of
//! extracted facts:
//! - Tasks, appointments, locations and deadlines extracted by an LLM
//! - Incremental merges that only send the unprocessed transcript suffix
//! - Completion, cancellation and resolution detected from later speech

pub mod config;
pub mod extraction;
pub mod memory;
pub mod render;

pub use config::ExtractorConfig;
pub use extraction::{Extractor, KeywordExtractor, LlmExtractor};
pub use memory::{
    Appointment, Deadline, FactBundle, FactKind, FactSet, FactUpdate, IncrementalUpdate,
    Location, MemoryStore, MergeReport, Priority, ProcessOutcome, Task,
};

use std::path::PathBuf;

/// Configuration for an EchoNote session
#[derive(Debug, Clone)]
pub struct EchoNoteConfig {
    /// Directory holding config.toml
    pub home: PathBuf,

    /// Path to the extractor config file
    pub config_file: PathBuf,

    /// Use the offline keyword extractor instead of the hosted model
    pub offline: bool,

    /// Print the fact set as JSON instead of the text view
    pub json_output: bool,

    /// Whether to show verbose output including merge reports
    pub verbose: bool,
}

impl EchoNoteConfig {
    pub fn new(home: PathBuf) -> Self {
        let config_file = home.join("config.toml");
        Self {
            home,
            config_file,
            offline: false,
            json_output: false,
            verbose: false,
        }
    }

    pub fn with_config_file(mut self, path: PathBuf) -> Self {
        self.config_file = path;
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_json_output(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Result type for EchoNote operations
pub type Result<T> = std::result::Result<T, EchoNoteError>;

/// Errors that can occur in EchoNote
#[derive(Debug, thiserror::Error)]
pub enum EchoNoteError {
    /// Network failure, non-success response, or schema-violating payload.
    /// Fact set and cursor are left unchanged.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Another transcript is still being processed")]
    Busy,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
