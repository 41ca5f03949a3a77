//! Edit-rate gating: minimum delay between edits, one edit in flight.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::EditError;

/// Decides whether a visible-message edit may be issued now.
///
/// Two constraints: at most one edit task in flight at a time, and
/// non-forced edits start at least `edit_delay` after the previous edit
/// started. The gate never sleeps; callers skip a gated edit and retry it
/// on the next event (the terminal flush is forced and only waits for the
/// in-flight slot).
#[derive(Debug)]
pub struct RateGate {
    edit_delay: Duration,
    last_edit_started: Option<Instant>,
    in_flight: Option<JoinHandle<Result<(), EditError>>>,
}

impl RateGate {
    pub fn new(edit_delay: Duration) -> Self {
        RateGate {
            edit_delay,
            last_edit_started: None,
            in_flight: None,
        }
    }

    /// Whether an edit may start now under the timing constraint.
    pub fn permits(&self, complete: bool, forced: bool) -> bool {
        forced || complete || self.ready()
    }

    fn ready(&self) -> bool {
        let idle = self
            .in_flight
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true);
        let delay_elapsed = self
            .last_edit_started
            .map(|started| started.elapsed() >= self.edit_delay)
            .unwrap_or(true);
        idle && delay_elapsed
    }

    /// Wait for the in-flight edit, surfacing its failure.
    ///
    /// Keeps edits to one output message totally ordered: a new edit is not
    /// even considered until the prior one finished.
    pub async fn wait_in_flight(&mut self) -> Result<(), EditError> {
        if let Some(handle) = self.in_flight.take() {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(EditError::Transport(format!(
                    "edit task did not complete: {}",
                    join_err
                ))),
            }
        } else {
            Ok(())
        }
    }

    /// Record an edit task as the in-flight slot and stamp its start time.
    pub fn begin_edit(&mut self, handle: JoinHandle<Result<(), EditError>>) {
        self.last_edit_started = Some(Instant::now());
        self.in_flight = Some(handle);
    }

    /// Whether an edit task currently occupies the in-flight slot.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}
