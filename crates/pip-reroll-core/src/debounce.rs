//! Stop confirmation.
//!
//! Classifying a live scene can produce a one-frame false positive while pips
//! are still animating in. A stop is only confirmed when the condition holds
//! on the frame that first triggered it *and* on a fresh capture taken at
//! least `delay` later.
//!
//! ```text
//!            condition true                  delay elapsed, fresh check true
//!   Idle ─────────────────────▶ Pending ─────────────────────────────────▶ Confirmed
//!    ▲                             │
//!    └─────────────────────────────┘
//!      fresh check false / run no longer active / fresh check error
//! ```

use std::time::{Duration, Instant};
use tracing::debug;

use crate::criteria::{evaluate, StopCriteria};
use crate::detection::DetectedObject;
use crate::error::Result;

/// Default wait between the first positive check and the confirmation check.
pub const DEFAULT_CONFIRM_DELAY: Duration = Duration::from_millis(50);

/// A stop condition observed once and awaiting confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingStop {
    /// When the condition was first observed
    pub detected_at: Instant,
    /// The detections that triggered it
    pub objects: Vec<DetectedObject>,
}

/// Debounce state machine states.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DebounceState {
    #[default]
    Idle,
    Pending(PendingStop),
    /// Terminal for the current run
    Confirmed,
}

/// Result of one [`DebounceController::advance`] step.
#[derive(Debug, Clone, PartialEq)]
pub enum DebounceOutcome {
    /// Condition not met, nothing pending
    Idle,
    /// Condition met for the first time; confirmation pending
    Armed,
    /// Confirmation pending, delay not yet elapsed
    Waiting,
    /// Confirmation check failed; pending stop discarded
    Cancelled,
    /// Stop confirmed; carries the fresh detections from the confirmation check
    Confirmed(Vec<DetectedObject>),
    /// A stop was already confirmed for this run
    Finished,
}

/// Two-point-in-time stop confirmation.
#[derive(Debug, Clone)]
pub struct DebounceController {
    delay: Duration,
    state: DebounceState,
}

impl Default for DebounceController {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRM_DELAY)
    }
}

impl DebounceController {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingStop> {
        match &self.state {
            DebounceState::Pending(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.state, DebounceState::Confirmed)
    }

    /// Back to `Idle` for a new run.
    pub fn reset(&mut self) {
        self.state = DebounceState::Idle;
    }

    /// Feed one loop iteration's detections.
    ///
    /// `recheck` performs a fresh capture and classification; it is called at
    /// most once, and only when a pending stop has waited at least the
    /// configured delay. `is_active` reports whether the owning reroll run is
    /// still in progress; a stop is never confirmed once it returns false.
    ///
    /// An error from `recheck` discards the pending stop and is returned.
    pub fn advance<R, A>(
        &mut self,
        now: Instant,
        objects: &[DetectedObject],
        criteria: &StopCriteria,
        recheck: R,
        is_active: A,
    ) -> Result<DebounceOutcome>
    where
        R: FnOnce() -> Result<Vec<DetectedObject>>,
        A: Fn() -> bool,
    {
        if self.is_confirmed() {
            return Ok(DebounceOutcome::Finished);
        }

        let mut armed = false;
        let detected_at = match self.pending().map(|pending| pending.detected_at) {
            Some(detected_at) => detected_at,
            None => {
                if !evaluate(objects, criteria) {
                    return Ok(DebounceOutcome::Idle);
                }
                debug!(objects = objects.len(), "Stop condition met, awaiting confirmation");
                self.state = DebounceState::Pending(PendingStop {
                    detected_at: now,
                    objects: objects.to_vec(),
                });
                armed = true;
                now
            }
        };

        if now.saturating_duration_since(detected_at) < self.delay {
            return Ok(if armed {
                DebounceOutcome::Armed
            } else {
                DebounceOutcome::Waiting
            });
        }

        if !is_active() {
            debug!("Run no longer active, dropping pending stop");
            self.state = DebounceState::Idle;
            return Ok(DebounceOutcome::Cancelled);
        }

        let fresh = match recheck() {
            Ok(fresh) => fresh,
            Err(e) => {
                self.state = DebounceState::Idle;
                return Err(e);
            }
        };

        if evaluate(&fresh, criteria) && is_active() {
            self.state = DebounceState::Confirmed;
            Ok(DebounceOutcome::Confirmed(fresh))
        } else {
            debug!("Stop condition did not hold on recheck");
            self.state = DebounceState::Idle;
            Ok(DebounceOutcome::Cancelled)
        }
    }
}
