use log::{debug, info, warn};

use crate::{
    NutritionResult,
    constants::GENERIC_ERROR_MESSAGE,
    error::{AnalysisError, TransitionError},
    image_processor::Preview,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Analyzing,
    Success,
    Error,
}

/// Identifies one submission. Completions carrying an older token are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    None,
    Result(NutritionResult),
    Error(String),
}

/// The single-writer state behind the UI.
#[derive(Debug, Clone)]
pub struct AppState {
    phase: Phase,
    outcome: Outcome,
    preview: Option<Preview>,
    /// Submission currently on screen, kept after it completes so a late
    /// preview still lands.
    active: Option<RequestToken>,
    in_flight: Option<RequestToken>,
    next_token: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            outcome: Outcome::None,
            preview: None,
            active: None,
            in_flight: None,
            next_token: 1,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn result(&self) -> Option<&NutritionResult> {
        match &self.outcome {
            Outcome::Result(result) => Some(result),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Error(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.phase == Phase::Analyzing
    }

    pub fn in_flight(&self) -> Option<RequestToken> {
        self.in_flight
    }

    /// Enters `Analyzing` for a new image.
    ///
    /// Allowed from `Idle`, `Error` and `Analyzing`; a submission made while
    /// another is in flight replaces it.
    pub fn submit(&mut self) -> Result<RequestToken, TransitionError> {
        if self.phase == Phase::Success {
            return Err(TransitionError(self.phase));
        }
        if let Some(stale) = self.in_flight {
            warn!("Superseding in-flight analysis {:?}", stale);
        }

        let token = RequestToken(self.next_token);
        self.next_token += 1;

        self.phase = Phase::Analyzing;
        self.outcome = Outcome::None;
        self.preview = None;
        self.active = Some(token);
        self.in_flight = Some(token);
        debug!("Submitted {:?}", token);
        Ok(token)
    }

    pub fn set_preview(&mut self, token: RequestToken, preview: Preview) -> bool {
        if self.active != Some(token) {
            debug!("Dropping preview for stale {:?}", token);
            return false;
        }
        self.preview = Some(preview);
        true
    }

    /// Applies the outcome of an analysis if `token` is still in flight.
    pub fn complete(
        &mut self,
        token: RequestToken,
        outcome: Result<NutritionResult, AnalysisError>,
    ) -> bool {
        if self.in_flight != Some(token) {
            debug!("Dropping completion for stale {:?}", token);
            return false;
        }
        self.in_flight = None;

        match outcome {
            Ok(result) => {
                info!("Analysis {:?} succeeded: {}", token, result.subject_label);
                self.phase = Phase::Success;
                self.outcome = Outcome::Result(result);
            }
            Err(err) => {
                warn!("Analysis {:?} failed: {:?}", token, err);
                let message = err.to_string();
                self.phase = Phase::Error;
                self.outcome = Outcome::Error(if message.trim().is_empty() {
                    GENERIC_ERROR_MESSAGE.to_string()
                } else {
                    message
                });
            }
        }
        true
    }

    /// Back to `Idle` from any phase, discarding result, error and preview.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.outcome = Outcome::None;
        self.preview = None;
        self.active = None;
        self.in_flight = None;
    }

    /// Teardown while a request may still be running; its completion will be ignored.
    pub fn abandon(&mut self) {
        if let Some(token) = self.in_flight {
            info!("Abandoning analysis {:?}", token);
        }
        self.reset();
    }
}
