//! Conversational memory store.
//!
//! Owns the fact set and the processing cursor (byte offset into the
//! transcript already sent for extraction). All mutation goes through
//! [`MemoryStore::process`] and [`MemoryStore::reset`].
//!
//! The state lock is never held across the extraction call. At most one
//! extraction is in flight per store; `reset` bumps the session epoch so a
//! call that started before the reset is discarded instead of applied.

use super::facts::FactSet;
use super::reconcile::{apply_update, MergeReport};
use crate::extraction::Extractor;
use crate::{EchoNoteError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What a call to [`MemoryStore::process`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Nothing new to process; the extractor was not called
    Skipped,
    /// Full extraction replaced the fact set
    Full { fact_count: usize },
    /// Incremental extraction was merged into the fact set
    Incremental(MergeReport),
    /// A reset happened while the extraction was in flight; result dropped
    Discarded,
}

#[derive(Debug, Default)]
struct StoreState {
    facts: FactSet,
    cursor: usize,
    epoch: u64,
}

/// Releases the single-flight slot even if the processing future is dropped
struct FlightGuard(Arc<AtomicBool>);

impl FlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum Request {
    Full,
    Incremental { delta: String, existing: FactSet },
}

/// Shared handle to a session's fact set. Clones refer to the same session.
#[derive(Clone)]
pub struct MemoryStore {
    extractor: Arc<dyn Extractor>,
    state: Arc<Mutex<StoreState>>,
    in_flight: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self {
            extractor,
            state: Arc::new(Mutex::new(StoreState::default())),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Process the full accumulated transcript.
    ///
    /// Only the suffix past the cursor is new. If facts already exist it is
    /// sent for incremental extraction and merged; otherwise the whole
    /// transcript is extracted and replaces the fact set. On failure the fact
    /// set and cursor are untouched.
    pub async fn process(&self, transcript: &str) -> Result<ProcessOutcome> {
        if transcript.trim().is_empty() {
            return Ok(ProcessOutcome::Skipped);
        }

        let (request, epoch, _guard) = {
            let state = self.state.lock().await;
            // A transcript that no longer extends past the cursor has no delta.
            let delta = transcript.get(state.cursor..).unwrap_or("");
            if delta.trim().is_empty() {
                debug!("No unprocessed transcript past cursor {}", state.cursor);
                return Ok(ProcessOutcome::Skipped);
            }

            let guard = FlightGuard::acquire(&self.in_flight).ok_or(EchoNoteError::Busy)?;

            let request = if state.facts.is_empty() {
                Request::Full
            } else {
                Request::Incremental {
                    delta: delta.to_string(),
                    existing: state.facts.clone(),
                }
            };
            (request, state.epoch, guard)
        };

        match request {
            Request::Full => {
                info!("Running full extraction ({} bytes)", transcript.len());
                let bundle = self
                    .extractor
                    .extract(transcript)
                    .await
                    .map_err(into_extraction_failure)?;

                let mut state = self.state.lock().await;
                if state.epoch != epoch {
                    info!("Session reset during extraction, discarding result");
                    return Ok(ProcessOutcome::Discarded);
                }
                let fact_count = bundle.fact_count();
                state.facts = bundle;
                state.cursor = transcript.len();
                info!("Extracted {} facts, cursor at {}", fact_count, state.cursor);
                Ok(ProcessOutcome::Full { fact_count })
            }
            Request::Incremental { delta, existing } => {
                info!(
                    "Running incremental extraction ({} new bytes, {} known facts)",
                    delta.len(),
                    existing.fact_count()
                );
                let update = self
                    .extractor
                    .extract_incremental(&delta, &existing)
                    .await
                    .map_err(into_extraction_failure)?;

                let mut state = self.state.lock().await;
                if state.epoch != epoch {
                    info!("Session reset during extraction, discarding result");
                    return Ok(ProcessOutcome::Discarded);
                }
                let report = apply_update(&mut state.facts, update);
                state.cursor = transcript.len();
                info!(
                    "Merged update: appended={}, flagged={}, updated={}, dropped={}, cursor at {}",
                    report.appended,
                    report.flagged,
                    report.updated,
                    report.dropped_updates,
                    state.cursor
                );
                Ok(ProcessOutcome::Incremental(report))
            }
        }
    }

    /// Clear the fact set and rewind the cursor. Any in-flight extraction
    /// will be discarded when it completes.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.facts = FactSet::default();
        state.cursor = 0;
        state.epoch += 1;
        info!("Session reset (epoch {})", state.epoch);
    }

    /// Snapshot of the current fact set
    pub async fn facts(&self) -> FactSet {
        self.state.lock().await.facts.clone()
    }

    pub async fn cursor(&self) -> usize {
        self.state.lock().await.cursor
    }

    /// Number of resets performed on this session
    pub async fn epoch(&self) -> u64 {
        self.state.lock().await.epoch
    }

    /// Whether `transcript` holds non-blank text past the cursor
    pub async fn has_pending(&self, transcript: &str) -> bool {
        let cursor = self.cursor().await;
        transcript
            .get(cursor..)
            .is_some_and(|delta| !delta.trim().is_empty())
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

fn into_extraction_failure(e: EchoNoteError) -> EchoNoteError {
    warn!("Extraction failed: {}", e);
    match e {
        EchoNoteError::ExtractionFailed(_) => e,
        other => EchoNoteError::ExtractionFailed(other.to_string()),
    }
}
