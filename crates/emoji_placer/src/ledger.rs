use std::collections::HashSet;

use bevy::prelude::*;
use placer_helpers::reset::Resettable;
use serde::{Deserialize, Serialize};

use crate::core::GameState;

/// Set of placed item ids. Consulted by the batch controller to compute
/// resume state and by the board to decide which tray items to spawn.
#[derive(Resource, Default)]
pub struct PlacementLedger {
    placed: HashSet<String>,
}

impl PlacementLedger {
    pub fn is_placed(&self, id: &str) -> bool {
        self.placed.contains(id)
    }

    /// Records a placement. Idempotent: returns true only the first time.
    pub fn mark_placed(&mut self, id: &str) -> bool {
        self.placed.insert(id.to_owned())
    }

    pub fn len(&self) -> usize {
        self.placed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    pub fn clear(&mut self) {
        self.placed.clear();
    }

    /// Progress handed to the external persistence collaborator.
    pub fn snapshot(&self, batch_index: usize) -> LedgerSnapshot {
        let mut placed: Vec<String> = self.placed.iter().cloned().collect();
        placed.sort_unstable();
        LedgerSnapshot {
            placed,
            batch_index,
        }
    }

    pub fn restore(&mut self, snapshot: &LedgerSnapshot) {
        self.placed = snapshot.placed.iter().cloned().collect();
    }
}

impl Resettable for PlacementLedger {
    fn reset(&mut self) {
        self.clear();
    }

    fn initial_state() -> Self::State {
        GameState::Setup
    }

    type State = GameState;
}

/// The only state persisted across restarts: which ids are placed and which
/// batch was in progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub placed: Vec<String>,
    pub batch_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_is_idempotent() {
        let mut ledger = PlacementLedger::default();
        assert!(ledger.mark_placed("a"), "first mark reports the change");
        assert!(!ledger.mark_placed("a"), "second mark is a no-op");
        assert_eq!(ledger.len(), 1, "duplicates are not stored twice");
        assert!(ledger.is_placed("a"), "marked id reads back as placed");
    }

    #[test]
    fn snapshot_round_trips_through_restore() {
        let mut ledger = PlacementLedger::default();
        ledger.mark_placed("b");
        ledger.mark_placed("a");

        let snapshot = ledger.snapshot(2);
        assert_eq!(
            snapshot.placed,
            vec!["a".to_owned(), "b".to_owned()],
            "snapshots are sorted for stable persistence"
        );
        assert_eq!(snapshot.batch_index, 2, "batch index rides along");

        let mut restored = PlacementLedger::default();
        restored.restore(&snapshot);
        assert!(
            restored.is_placed("a") && restored.is_placed("b"),
            "restore rebuilds the placed set"
        );
    }
}
