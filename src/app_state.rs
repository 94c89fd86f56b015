//! Explicit application state for one user session.
//!
//! Tracks the selected image, the language, whether an analysis is in
//! flight, and the last outcome. Every analysis is tagged with a generation
//! ticket; completing with a stale ticket (the user reset or started another
//! analysis meanwhile) is a no-op.

use std::sync::{Mutex, MutexGuard};

use crate::models::{Language, PrescriptionAnalysis};
use crate::pipeline::{AnalysisFailure, EncodedImage};

/// Identifies one analysis attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisTicket(u64);

/// Result of the last analysis that was allowed to complete.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success(PrescriptionAnalysis),
    Failure(AnalysisFailure),
}

#[derive(Debug, Default)]
struct Inner {
    selected_image: Option<EncodedImage>,
    language: Language,
    generation: u64,
    in_flight: bool,
    last_outcome: Option<AnalysisOutcome>,
}

/// Shared session state. Safe to share across threads behind an `Arc`.
#[derive(Debug, Default)]
pub struct AppState {
    inner: Mutex<Inner>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        // No method leaves `Inner` half-updated, so poisoning is recoverable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Select a new image. Any in-flight analysis of the previous one is
    /// invalidated and the previous outcome cleared.
    pub fn select_image(&self, image: EncodedImage) {
        let mut inner = self.inner();
        inner.generation += 1;
        inner.in_flight = false;
        inner.last_outcome = None;
        inner.selected_image = Some(image);
    }

    pub fn selected_image(&self) -> Option<EncodedImage> {
        self.inner().selected_image.clone()
    }

    pub fn set_language(&self, language: Language) {
        self.inner().language = language;
    }

    pub fn language(&self) -> Language {
        self.inner().language
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner().in_flight
    }

    /// Mark an analysis as started. A previously issued ticket becomes stale.
    pub fn begin_analysis(&self) -> AnalysisTicket {
        let mut inner = self.inner();
        inner.generation += 1;
        inner.in_flight = true;
        inner.last_outcome = None;
        tracing::debug!(generation = inner.generation, "Analysis started");
        AnalysisTicket(inner.generation)
    }

    /// Record the outcome of an analysis. Returns `false` and changes nothing
    /// when the ticket is stale.
    pub fn complete(
        &self,
        ticket: AnalysisTicket,
        result: Result<PrescriptionAnalysis, AnalysisFailure>,
    ) -> bool {
        let mut inner = self.inner();
        if ticket.0 != inner.generation || !inner.in_flight {
            tracing::debug!(
                ticket = ticket.0,
                generation = inner.generation,
                "Discarding stale analysis result"
            );
            return false;
        }

        inner.in_flight = false;
        inner.last_outcome = Some(match result {
            Ok(analysis) => AnalysisOutcome::Success(analysis),
            Err(failure) => AnalysisOutcome::Failure(failure),
        });
        true
    }

    /// Abandon the in-flight analysis, keeping the selected image.
    pub fn cancel(&self) {
        let mut inner = self.inner();
        if inner.in_flight {
            inner.generation += 1;
            inner.in_flight = false;
            tracing::info!("In-flight analysis cancelled");
        }
    }

    /// Back to the initial state. The language preference is kept.
    pub fn reset(&self) {
        let mut inner = self.inner();
        inner.generation += 1;
        inner.in_flight = false;
        inner.selected_image = None;
        inner.last_outcome = None;
    }

    pub fn last_outcome(&self) -> Option<AnalysisOutcome> {
        self.inner().last_outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AnalysisError;

    fn image() -> EncodedImage {
        EncodedImage {
            mime_type: "image/png".into(),
            data: "iVBORw0KGgo=".into(),
            byte_len: 8,
        }
    }

    fn failure() -> AnalysisFailure {
        AnalysisFailure::from(&AnalysisError::MalformedResponse("x".into()))
    }

    #[test]
    fn fresh_state_is_idle() {
        let state = AppState::new();
        assert!(!state.is_in_flight());
        assert!(state.selected_image().is_none());
        assert!(state.last_outcome().is_none());
        assert_eq!(state.language(), Language::English);
    }

    #[test]
    fn completion_with_current_ticket_is_recorded() {
        let state = AppState::new();
        state.select_image(image());
        let ticket = state.begin_analysis();
        assert!(state.is_in_flight());

        assert!(state.complete(ticket, Ok(PrescriptionAnalysis::default())));
        assert!(!state.is_in_flight());
        assert!(matches!(state.last_outcome(), Some(AnalysisOutcome::Success(_))));
    }

    #[test]
    fn failure_is_recorded_as_outcome() {
        let state = AppState::new();
        let ticket = state.begin_analysis();
        assert!(state.complete(ticket, Err(failure())));
        assert!(matches!(state.last_outcome(), Some(AnalysisOutcome::Failure(_))));
    }

    #[test]
    fn reset_discards_late_result() {
        let state = AppState::new();
        state.select_image(image());
        let ticket = state.begin_analysis();
        state.reset();

        assert!(!state.complete(ticket, Ok(PrescriptionAnalysis::default())));
        assert!(state.last_outcome().is_none());
        assert!(state.selected_image().is_none());
    }

    #[test]
    fn newer_analysis_supersedes_older() {
        let state = AppState::new();
        let first = state.begin_analysis();
        let second = state.begin_analysis();

        assert!(!state.complete(first, Err(failure())));
        assert!(state.is_in_flight());
        assert!(state.complete(second, Ok(PrescriptionAnalysis::default())));
    }

    #[test]
    fn cancel_keeps_image_and_discards_result() {
        let state = AppState::new();
        state.select_image(image());
        let ticket = state.begin_analysis();
        state.cancel();

        assert!(!state.is_in_flight());
        assert!(!state.complete(ticket, Ok(PrescriptionAnalysis::default())));
        assert!(state.selected_image().is_some());
    }

    #[test]
    fn ticket_completes_only_once() {
        let state = AppState::new();
        let ticket = state.begin_analysis();
        assert!(state.complete(ticket, Ok(PrescriptionAnalysis::default())));
        assert!(!state.complete(ticket, Err(failure())));
        assert!(matches!(state.last_outcome(), Some(AnalysisOutcome::Success(_))));
    }

    #[test]
    fn language_survives_reset() {
        let state = AppState::new();
        state.set_language(Language::Bengali);
        state.reset();
        assert_eq!(state.language(), Language::Bengali);
    }
}
