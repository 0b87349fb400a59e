use std::time::Duration;

use bevy::prelude::*;

/// Result of polling a pending unlock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// No request is in flight.
    Idle,
    /// The external operation has not completed yet.
    Pending,
    /// The unlock was granted.
    Granted,
    /// The external operation reported failure.
    Denied,
}

/// External predicate that can delay a batch reveal, e.g. a reward flow or an
/// engagement timer. The engine treats it as opaque: a boolean plus an
/// asynchronous completion, polled once per tick.
pub trait UnlockGate: Send + Sync {
    /// Called once per tick regardless of state, so time-based gates can
    /// observe play time.
    fn tick(&mut self, _dt: Duration) {}
    fn is_unlocked(&self, batch_index: usize) -> bool;
    fn request_unlock(&mut self, batch_index: usize);
    fn poll(&mut self, dt: Duration) -> GateStatus;
}

/// Gate that never locks anything. The default collaborator.
#[derive(Default)]
pub struct AlwaysUnlocked;

impl UnlockGate for AlwaysUnlocked {
    fn is_unlocked(&self, _batch_index: usize) -> bool {
        true
    }

    fn request_unlock(&mut self, _batch_index: usize) {}

    fn poll(&mut self, _dt: Duration) -> GateStatus {
        GateStatus::Granted
    }
}

/// Cumulative-engagement gate: batch `k` unlocks after `k` times the
/// configured play duration. A pending request resolves asynchronously a
/// short moment after the threshold is reached, standing in for an external
/// reward flow.
pub struct EngagementGate {
    played: Duration,
    per_batch: Duration,
    grant_delay: Duration,
    pending: Option<(usize, Timer)>,
    granted_through: usize,
}

impl EngagementGate {
    pub fn new(per_batch: Duration, grant_delay: Duration) -> Self {
        Self {
            played: Duration::ZERO,
            per_batch,
            grant_delay,
            pending: None,
            granted_through: 0,
        }
    }

    fn threshold_reached(&self, batch_index: usize) -> bool {
        self.played >= self.per_batch.saturating_mul(batch_index as u32)
    }
}

impl UnlockGate for EngagementGate {
    fn is_unlocked(&self, batch_index: usize) -> bool {
        batch_index <= self.granted_through || self.threshold_reached(batch_index)
    }

    fn request_unlock(&mut self, batch_index: usize) {
        if self.pending.is_some() {
            return;
        }
        self.pending = Some((
            batch_index,
            Timer::new(self.grant_delay, TimerMode::Once),
        ));
    }

    fn tick(&mut self, dt: Duration) {
        self.played += dt;
    }

    fn poll(&mut self, dt: Duration) -> GateStatus {
        let Some((batch_index, timer)) = self.pending.as_mut() else {
            return GateStatus::Idle;
        };

        // The grant delay only starts counting once the engagement threshold
        // itself is met.
        if self.played < self.per_batch.saturating_mul(*batch_index as u32) {
            return GateStatus::Pending;
        }

        if timer.tick(dt).just_finished() {
            self.granted_through = self.granted_through.max(*batch_index);
            self.pending = None;
            return GateStatus::Granted;
        }
        GateStatus::Pending
    }
}

/// The unlock collaborator the progression controller consults.
#[derive(Resource)]
pub struct GateHandle(pub Box<dyn UnlockGate>);

impl Default for GateHandle {
    fn default() -> Self {
        Self(Box::new(AlwaysUnlocked))
    }
}
