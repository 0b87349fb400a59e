use bevy::prelude::*;
use strum::Display;

/// Game states that control the flow of the application
#[derive(Clone, Eq, PartialEq, Debug, Hash, Default, States)]
pub enum GameState {
    #[default]
    Setup,
    Playing,
    Complete,
}

/// Per-tick ordering of the engine: pointer handling first, then progression
/// bookkeeping, then layout application, then animation stepping. A placement
/// registered this tick is reflected in this tick's layout pass.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlacementSet {
    Input,
    Progression,
    Layout,
    Animate,
}

/// Why a drop attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RejectReason {
    #[strum(serialize = "no target found")]
    NoTarget,
    #[strum(serialize = "wrong target")]
    WrongTarget,
    #[strum(serialize = "too far")]
    TooFar,
}

/// An item settled on its matching target zone.
#[derive(Event)]
pub struct ItemPlacedEvent {
    pub id: String,
    pub spot_entity: Entity,
}

/// A drop attempt failed and the item is flying back to the tray.
#[derive(Event)]
pub struct DropRejectedEvent {
    pub id: String,
    pub reason: RejectReason,
}

/// A batch of target zones just became visible.
#[derive(Event)]
pub struct BatchRevealedEvent {
    pub index: usize,
}

/// Every zone of a batch has been filled.
#[derive(Event)]
pub struct BatchCompleteEvent {
    pub index: usize,
}

/// Every batch is complete.
#[derive(Event)]
pub struct AllBatchesCompleteEvent;

/// Despawns its entity once the timer runs out. Used for the grace delay
/// between an item settling and its tray visual disappearing.
#[derive(Component)]
pub struct DelayedDespawn {
    pub timer: Timer,
}

impl DelayedDespawn {
    pub fn after_seconds(seconds: f32) -> Self {
        Self {
            timer: Timer::from_seconds(seconds, TimerMode::Once),
        }
    }
}

pub fn expire_delayed_despawns(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut DelayedDespawn)>,
) {
    for (entity, mut delayed) in &mut query {
        if delayed.timer.tick(time.delta()).just_finished() {
            commands.entity(entity).despawn_recursive();
        }
    }
}
