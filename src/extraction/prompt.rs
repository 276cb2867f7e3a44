//! Prompts for the extraction model and parsing of its replies.
//!
//! Replies are validated against the fact schema here, at the boundary, so
//! the memory store only ever sees well-formed records.

use crate::memory::{FactBundle, FactSet, IncrementalUpdate};
use crate::{EchoNoteError, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use tracing::debug;

/// System prompt shared by full and incremental extraction
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are EchoNote, an assistant that listens to conversations and keeps track of what the speaker needs to remember.

Extract the following kinds of facts:
- tasks: {"description": string, "priority": "low"|"medium"|"high", "deadline": string (optional), "context": string, "completed": false}
- appointments: {"title": string, "date": string, "time": string (optional), "location": string (optional), "participants": [string] (optional), "cancelled": false}
- locations: {"name": string, "context": string, "actionRequired": boolean}
- deadlines: {"item": string, "date": string, "urgency": "low"|"medium"|"high", "resolved": false}

Keep dates as the speaker said them (e.g. "tomorrow", "next Friday").
Output a single JSON object only, no explanation."#;

const FULL_TEMPLATE: &str = r#"Extract all tasks, appointments, locations and deadlines from this transcript.

Respond with:
{"tasks": [...], "appointments": [...], "locations": [...], "deadlines": [...], "summary": "one or two sentence summary"}

Transcript:
{transcript}"#;

const INCREMENTAL_TEMPLATE: &str = r#"These facts are already known:
{existing}

New transcript text:
{delta}

Report ONLY what the new text adds or changes. Respond with:
{"newTasks": [...], "newAppointments": [...], "newLocations": [...], "newDeadlines": [...],
 "completedTasks": ["short fragment of a known task description"],
 "cancelledAppointments": ["short fragment of a known appointment title"],
 "purchasedItems": ["item that was bought"],
 "resolvedDeadlines": ["short fragment of a known deadline item"],
 "updates": [{"type": "task"|"appointment"|"location"|"deadline", "originalItem": "text of the known fact", "updatedItem": "replacement text", "changeDescription": "what changed"}],
 "summary": "updated summary of the whole conversation"}

Do not repeat facts that are already known. Use empty arrays when nothing applies."#;

/// Build the user prompt for a full extraction
pub fn build_full_prompt(transcript: &str) -> String {
    FULL_TEMPLATE.replace("{transcript}", transcript)
}

/// Build the user prompt for an incremental extraction
pub fn build_incremental_prompt(delta: &str, existing: &FactSet) -> Result<String> {
    let existing_json = serde_json::to_string_pretty(existing)?;
    Ok(INCREMENTAL_TEMPLATE
        .replace("{existing}", &existing_json)
        .replace("{delta}", delta.trim()))
}

fn think_tags() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-tag regex"))
}

/// Locate the JSON object in a model reply.
///
/// Strips `<think>` blocks, then takes the span from the first `{` to the
/// last `}` so code fences and surrounding prose are ignored.
fn json_object_span(content: &str) -> Option<String> {
    let stripped = think_tags().replace_all(content, "");
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end < start {
        return None;
    }
    Some(stripped[start..=end].to_string())
}

fn parse_payload<T: DeserializeOwned>(content: &str, what: &str) -> Result<T> {
    let json = json_object_span(content).ok_or_else(|| {
        debug!("Raw {} reply: {}", what, content);
        EchoNoteError::ExtractionFailed(format!("no JSON object in {what} reply"))
    })?;
    serde_json::from_str(&json).map_err(|e| {
        debug!("Raw {} reply: {}", what, content);
        EchoNoteError::ExtractionFailed(format!("{what} reply violates schema: {e}"))
    })
}

/// Parse and validate a full extraction reply
pub fn parse_fact_bundle(content: &str) -> Result<FactBundle> {
    let bundle: FactBundle = parse_payload(content, "extraction")?;
    bundle.validate().map_err(|e| {
        EchoNoteError::ExtractionFailed(format!("extraction reply violates schema: {e}"))
    })?;
    Ok(bundle)
}

/// Parse and validate an incremental extraction reply
pub fn parse_incremental_update(content: &str) -> Result<IncrementalUpdate> {
    let update: IncrementalUpdate = parse_payload(content, "incremental")?;
    update.validate().map_err(|e| {
        EchoNoteError::ExtractionFailed(format!("incremental reply violates schema: {e}"))
    })?;
    Ok(update)
}
