use std::time::Duration;

use bevy::prelude::*;
use placer_helpers::reset::Resettable;
use strum::Display;

use crate::config::PlacementConfig;
use crate::core::{
    AllBatchesCompleteEvent, BatchCompleteEvent, BatchRevealedEvent, GameState, ItemPlacedEvent,
    PlacementSet,
};
use crate::gate::{GateHandle, GateStatus, UnlockGate};
use crate::ledger::PlacementLedger;
use crate::registry::SpotRegistry;

/// Ordered partition of the target zones into reveal batches.
#[derive(Debug, Clone, Default)]
pub struct BatchSet {
    sizes: Vec<usize>,
}

impl BatchSet {
    /// `count` batches of a fixed size each.
    pub fn uniform(count: usize, size: usize) -> Self {
        Self {
            sizes: vec![size; count],
        }
    }

    /// Explicit ordered size list.
    pub const fn custom(sizes: Vec<usize>) -> Self {
        Self { sizes }
    }

    pub fn batch_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn size_of(&self, batch_index: usize) -> Option<usize> {
        self.sizes.get(batch_index).copied()
    }

    /// Running sum of all previous batch sizes.
    pub fn start_offset(&self, batch_index: usize) -> usize {
        self.sizes.iter().take(batch_index).sum()
    }

    pub fn total(&self) -> usize {
        self.sizes.iter().sum()
    }

    /// The batch a zone ordinal belongs to.
    pub fn batch_of(&self, zone_ordinal: usize) -> Option<usize> {
        let mut cursor = 0;
        for (batch_index, size) in self.sizes.iter().enumerate() {
            cursor += size;
            if zone_ordinal < cursor {
                return Some(batch_index);
            }
        }
        None
    }

    /// The batch sizes are configuration; a mismatch against the actual zone
    /// count is logged and played through, not treated as fatal.
    pub fn check_against(&self, zone_count: usize) {
        if self.total() != zone_count {
            warn!(
                "batch sizes sum to {} but {} target zones exist",
                self.total(),
                zone_count
            );
        }
    }
}

/// Where the controller currently is in the reveal cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum BatchPhase {
    /// Collecting placements for the current batch.
    #[default]
    Filling,
    /// The next batch is gated; waiting for the external unlock.
    WaitingUnlock,
    /// Short delay before the next batch becomes visible.
    Revealing,
    /// Every batch is done.
    AllComplete,
}

/// Signals the controller hands back for the event layer to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSignal {
    Reveal(usize),
    Complete(usize),
    AllComplete,
}

/// Tracks fill progress through the ordered batches and decides when the next
/// one is revealed, optionally gated by an external unlock.
#[derive(Resource, Default)]
pub struct BatchProgress {
    set: BatchSet,
    current: usize,
    filled: usize,
    phase: BatchPhase,
    wait_timer: Option<Timer>,
}

impl BatchProgress {
    /// Builds resume state from the placement ledger: the current batch is
    /// the first whose placed count is below its size; everything before it
    /// shows as already settled, everything after stays hidden.
    pub fn init(set: BatchSet, ordered_ids: &[String], ledger: &PlacementLedger) -> Self {
        set.check_against(ordered_ids.len());

        let mut progress = Self {
            set,
            current: 0,
            filled: 0,
            phase: BatchPhase::AllComplete,
            wait_timer: None,
        };

        for batch_index in 0..progress.set.batch_count() {
            let start = progress.set.start_offset(batch_index);
            let size = progress.set.size_of(batch_index).unwrap_or(0);
            let placed = ordered_ids
                .iter()
                .skip(start)
                .take(size)
                .filter(|id| ledger.is_placed(id))
                .count();

            if placed < size {
                progress.current = batch_index;
                progress.filled = placed;
                progress.phase = BatchPhase::Filling;
                break;
            }
        }

        if progress.phase == BatchPhase::AllComplete {
            progress.current = progress.set.batch_count().saturating_sub(1);
            progress.filled = progress.set.size_of(progress.current).unwrap_or(0);
        }
        progress
    }

    pub const fn current(&self) -> usize {
        self.current
    }

    pub const fn filled(&self) -> usize {
        self.filled
    }

    pub const fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub const fn set(&self) -> &BatchSet {
        &self.set
    }

    /// Whether a batch's zones should be visible right now.
    pub const fn is_revealed(&self, batch_index: usize) -> bool {
        batch_index <= self.current
    }

    /// Total placements across all completed batches plus the current fill.
    pub fn placed_total(&self) -> usize {
        self.set.start_offset(self.current) + self.filled
    }

    /// Counts one successful placement. Only placements in the current batch
    /// are expected; anything else is a consistency warning. Returns the
    /// completion signal when the batch fills.
    pub fn record_placement(&mut self, batch_index: usize) -> Option<BatchSignal> {
        if batch_index != self.current {
            warn!(
                "placement recorded for batch {batch_index} while batch {} is active",
                self.current
            );
            return None;
        }
        if self.phase != BatchPhase::Filling {
            warn!("placement recorded outside the filling phase");
            return None;
        }

        let size = self.set.size_of(self.current).unwrap_or(0);
        if self.filled >= size {
            warn!("batch {} fill count would exceed its size {size}", self.current);
            return None;
        }

        self.filled += 1;
        (self.filled == size).then_some(BatchSignal::Complete(self.current))
    }

    /// One frame of progression: drives the unlock wait and the reveal delay.
    /// The batch index only ever advances here, never decreases.
    pub fn tick(
        &mut self,
        dt: Duration,
        gate: &mut dyn UnlockGate,
        config: &PlacementConfig,
    ) -> Option<BatchSignal> {
        match self.phase {
            BatchPhase::Filling => {
                let size = self.set.size_of(self.current).unwrap_or(0);
                if self.filled < size {
                    return None;
                }
                if self.current + 1 >= self.set.batch_count() {
                    self.phase = BatchPhase::AllComplete;
                    return Some(BatchSignal::AllComplete);
                }
                let next = self.current + 1;
                if gate.is_unlocked(next) {
                    self.begin_reveal(config);
                } else {
                    gate.request_unlock(next);
                    self.phase = BatchPhase::WaitingUnlock;
                    self.wait_timer =
                        Some(Timer::from_seconds(config.unlock_timeout, TimerMode::Once));
                }
                None
            }
            BatchPhase::WaitingUnlock => {
                match gate.poll(dt) {
                    GateStatus::Granted => self.begin_reveal(config),
                    GateStatus::Denied => {
                        warn!("unlock denied for batch {}, continuing without it", self.current + 1);
                        self.begin_reveal(config);
                    }
                    GateStatus::Pending | GateStatus::Idle => {
                        // Bounded wait: fail open rather than hang on a gate
                        // that never answers.
                        let timed_out = self
                            .wait_timer
                            .as_mut()
                            .is_some_and(|timer| timer.tick(dt).just_finished());
                        if timed_out {
                            warn!(
                                "unlock wait for batch {} timed out, continuing without it",
                                self.current + 1
                            );
                            self.begin_reveal(config);
                        }
                    }
                }
                None
            }
            BatchPhase::Revealing => {
                let done = self
                    .wait_timer
                    .as_mut()
                    .is_none_or(|timer| timer.tick(dt).just_finished());
                if done {
                    self.current += 1;
                    self.filled = 0;
                    self.phase = BatchPhase::Filling;
                    self.wait_timer = None;
                    return Some(BatchSignal::Reveal(self.current));
                }
                None
            }
            BatchPhase::AllComplete => None,
        }
    }

    fn begin_reveal(&mut self, config: &PlacementConfig) {
        self.phase = BatchPhase::Revealing;
        self.wait_timer = Some(Timer::from_seconds(config.reveal_delay, TimerMode::Once));
    }

    /// Explicit full-progress reset. The only path that moves the batch index
    /// backwards.
    pub fn reset_progress(&mut self) {
        self.current = 0;
        self.filled = 0;
        self.phase = BatchPhase::Filling;
        self.wait_timer = None;
    }
}

impl Resettable for BatchProgress {
    fn reset(&mut self) {
        self.reset_progress();
    }

    fn initial_state() -> Self::State {
        GameState::Setup
    }

    type State = GameState;
}

pub struct ProgressionPlugin;

impl Plugin for ProgressionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BatchProgress>()
            .init_resource::<GateHandle>()
            .add_systems(
                Update,
                (apply_placements, advance_batches)
                    .chain()
                    .in_set(PlacementSet::Progression)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// Books successful placements: ledger, registry settle flag, batch fill.
fn apply_placements(
    mut placed_events: EventReader<ItemPlacedEvent>,
    mut ledger: ResMut<PlacementLedger>,
    mut registry: ResMut<SpotRegistry>,
    mut progress: ResMut<BatchProgress>,
    mut complete_events: EventWriter<BatchCompleteEvent>,
) {
    for event in placed_events.read() {
        ledger.mark_placed(&event.id);
        registry.mark_settled(&event.id);

        let Some(batch_index) = registry.get(&event.id).map(|spot| spot.batch) else {
            continue;
        };
        if let Some(BatchSignal::Complete(index)) = progress.record_placement(batch_index) {
            info!("batch {index} complete");
            complete_events.send(BatchCompleteEvent { index });
        }
    }
}

/// Steps the reveal cycle once per tick.
fn advance_batches(
    time: Res<Time>,
    mut progress: ResMut<BatchProgress>,
    mut gate: ResMut<GateHandle>,
    config: Res<PlacementConfig>,
    mut revealed_events: EventWriter<BatchRevealedEvent>,
    mut all_complete_events: EventWriter<AllBatchesCompleteEvent>,
) {
    gate.0.tick(time.delta());
    match progress.tick(time.delta(), gate.0.as_mut(), &config) {
        Some(BatchSignal::Reveal(index)) => {
            revealed_events.send(BatchRevealedEvent { index });
        }
        Some(BatchSignal::AllComplete) => {
            all_complete_events.send(AllBatchesCompleteEvent);
        }
        Some(BatchSignal::Complete(_)) | None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::AlwaysUnlocked;

    const TICK: Duration = Duration::from_millis(100);

    struct SilentGate;

    impl UnlockGate for SilentGate {
        fn is_unlocked(&self, batch_index: usize) -> bool {
            batch_index == 0
        }

        fn request_unlock(&mut self, _batch_index: usize) {}

        fn poll(&mut self, _dt: Duration) -> GateStatus {
            GateStatus::Pending
        }
    }

    fn ids(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("spot{i:02}")).collect()
    }

    fn fill_current_batch(progress: &mut BatchProgress) {
        let size = progress.set().size_of(progress.current()).unwrap_or(0);
        for _ in progress.filled()..size {
            progress.record_placement(progress.current());
        }
    }

    #[test]
    fn start_offsets_are_running_sums() {
        let uniform = BatchSet::uniform(3, 4);
        assert_eq!(uniform.start_offset(2), 8, "uniform offsets are k * size");
        assert_eq!(uniform.total(), 12, "uniform total is count * size");

        let custom = BatchSet::custom(vec![2, 5, 1]);
        assert_eq!(custom.start_offset(0), 0, "the first batch starts at zero");
        assert_eq!(custom.start_offset(2), 7, "offsets accumulate prior sizes");
        assert_eq!(custom.batch_of(6), Some(1), "ordinal 6 sits in batch 1");
        assert_eq!(custom.batch_of(7), Some(2), "ordinal 7 opens batch 2");
        assert_eq!(custom.batch_of(8), None, "ordinals past the total have no batch");
    }

    #[test]
    fn resume_selects_first_unfilled_batch() {
        let ordered = ids(14);
        let mut ledger = PlacementLedger::default();
        for id in ordered.iter().take(10) {
            // batch 0 fully placed, batch 1 at three of seven
            ledger.mark_placed(id);
        }

        let progress = BatchProgress::init(BatchSet::uniform(2, 7), &ordered, &ledger);
        assert_eq!(progress.current(), 1, "batch 0 is full, batch 1 resumes");
        assert_eq!(progress.filled(), 3, "three of seven already placed");
        assert_eq!(progress.phase(), BatchPhase::Filling, "resume lands in filling");
        assert!(progress.is_revealed(0), "earlier batches show as settled");
        assert!(!progress.is_revealed(2), "later batches stay hidden");
    }

    #[test]
    fn fill_count_never_exceeds_batch_size() {
        let ordered = ids(4);
        let ledger = PlacementLedger::default();
        let mut progress = BatchProgress::init(BatchSet::uniform(2, 2), &ordered, &ledger);

        assert!(progress.record_placement(0).is_none(), "first fill is quiet");
        assert_eq!(
            progress.record_placement(0),
            Some(BatchSignal::Complete(0)),
            "filling the batch reports completion"
        );
        assert!(
            progress.record_placement(0).is_none(),
            "over-filling is refused"
        );
        assert_eq!(progress.filled(), 2, "fill count is clamped at the size");
        assert!(
            progress.record_placement(1).is_none(),
            "placements outside the current batch are not counted"
        );
    }

    #[test]
    fn batch_index_is_monotonic_through_the_reveal_cycle() {
        let ordered = ids(4);
        let ledger = PlacementLedger::default();
        let mut progress = BatchProgress::init(BatchSet::uniform(2, 2), &ordered, &ledger);
        let config = PlacementConfig::default();
        let mut gate = AlwaysUnlocked;

        fill_current_batch(&mut progress);
        let mut indices = vec![progress.current()];
        let mut revealed = None;
        for _ in 0..60 {
            if let Some(BatchSignal::Reveal(index)) = progress.tick(TICK, &mut gate, &config) {
                revealed = Some(index);
            }
            indices.push(progress.current());
        }

        assert_eq!(revealed, Some(1), "the next batch is revealed after the delay");
        assert!(
            indices.windows(2).all(|pair| pair.first() <= pair.last()),
            "the batch index never decreases"
        );
        assert_eq!(progress.filled(), 0, "fill count resets for the new batch"
        );
    }

    #[test]
    fn unlock_wait_fails_open_after_the_timeout() {
        let ordered = ids(4);
        let ledger = PlacementLedger::default();
        let mut progress = BatchProgress::init(BatchSet::uniform(2, 2), &ordered, &ledger);
        let config = PlacementConfig::default();
        let mut gate = SilentGate;

        fill_current_batch(&mut progress);
        assert!(progress.tick(TICK, &mut gate, &config).is_none(), "gate is locked");
        assert_eq!(
            progress.phase(),
            BatchPhase::WaitingUnlock,
            "a locked gate parks the controller in the wait phase"
        );

        let mut revealed = None;
        // Far past the bounded wait plus the reveal delay.
        for _ in 0..120 {
            if let Some(BatchSignal::Reveal(index)) = progress.tick(TICK, &mut gate, &config) {
                revealed = Some(index);
                break;
            }
        }
        assert_eq!(
            revealed,
            Some(1),
            "a gate that never answers must not block progression forever"
        );
    }

    #[test]
    fn last_batch_completion_reports_all_complete_once() {
        let ordered = ids(2);
        let ledger = PlacementLedger::default();
        let mut progress = BatchProgress::init(BatchSet::uniform(1, 2), &ordered, &ledger);
        let config = PlacementConfig::default();
        let mut gate = AlwaysUnlocked;

        fill_current_batch(&mut progress);
        assert_eq!(
            progress.tick(TICK, &mut gate, &config),
            Some(BatchSignal::AllComplete),
            "filling the final batch completes the board"
        );
        assert!(
            progress.tick(TICK, &mut gate, &config).is_none(),
            "the completion signal fires exactly once"
        );
    }

    #[test]
    fn reset_is_the_only_way_back_to_batch_zero() {
        let ordered = ids(4);
        let mut ledger = PlacementLedger::default();
        for id in &ordered {
            ledger.mark_placed(id);
        }
        let mut progress = BatchProgress::init(BatchSet::uniform(2, 2), &ordered, &ledger);
        assert_eq!(progress.phase(), BatchPhase::AllComplete, "fully placed board resumes complete");

        progress.reset_progress();
        assert_eq!(progress.current(), 0, "reset returns to the first batch");
        assert_eq!(progress.filled(), 0, "reset clears the fill count");
        assert_eq!(progress.phase(), BatchPhase::Filling, "reset resumes filling");
    }
}
