use std::time::{Duration, Instant};

use crate::grid::session::CellId;
use crate::model::config::FocusSettings;

/// The UI side of focus acquisition. Editable controls may be torn down and
/// re-created while state settles, so a focus attempt can silently miss.
pub trait FocusHost {
    /// Try to put input focus inside `cell`. Returns false if no input exists yet.
    fn try_focus(&mut self, cell: &CellId) -> bool;
    /// The cell that currently holds input focus
    fn focused_cell(&self) -> Option<CellId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusStatus {
    /// Waiting for the row to settle or for the next retry
    Waiting,
    Focused,
    /// Out of attempts; the request is dropped
    GaveUp,
}

/// Retry-with-backoff focus of one target cell.
///
/// Each mutation of the target row restarts the stability window. Once the
/// row has been quiet for the window, focus is attempted and then verified;
/// a miss schedules another attempt after `retry * 2^(attempts - 1)`.
#[derive(Debug, Clone)]
pub struct FocusAcquirer {
    target: CellId,
    stability: Duration,
    retry: Duration,
    max_attempts: u32,
    last_mutation: Instant,
    next_attempt_at: Instant,
    attempts: u32,
    status: FocusStatus,
}

impl FocusAcquirer {
    pub fn new(target: CellId, settings: &FocusSettings, now: Instant) -> Self {
        FocusAcquirer {
            target,
            stability: Duration::from_millis(settings.stability_ms),
            retry: Duration::from_millis(settings.retry_ms),
            max_attempts: settings.max_attempts.max(1),
            last_mutation: now,
            next_attempt_at: now,
            attempts: 0,
            status: FocusStatus::Waiting,
        }
    }

    pub fn target(&self) -> &CellId {
        &self.target
    }

    pub fn status(&self) -> FocusStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The target row re-rendered.
    pub fn notify_mutation(&mut self, now: Instant) {
        if self.status == FocusStatus::Waiting {
            self.last_mutation = now;
        }
    }

    /// Drive the acquisition. Call on every tick until it stops returning `Waiting`.
    pub fn poll(&mut self, now: Instant, host: &mut dyn FocusHost) -> FocusStatus {
        if self.status != FocusStatus::Waiting {
            return self.status;
        }
        if now.saturating_duration_since(self.last_mutation) < self.stability
            || now < self.next_attempt_at
        {
            return FocusStatus::Waiting;
        }

        self.attempts += 1;
        let landed =
            host.try_focus(&self.target) && host.focused_cell().as_ref() == Some(&self.target);
        if landed {
            self.status = FocusStatus::Focused;
        } else if self.attempts >= self.max_attempts {
            tracing::debug!(cell = %self.target, attempts = self.attempts, "focus gave up");
            self.status = FocusStatus::GaveUp;
        } else {
            let backoff = self.retry.saturating_mul(1 << (self.attempts - 1).min(16));
            self.next_attempt_at = now + backoff;
        }
        self.status
    }
}
