use bevy::prelude::*;
use bevy::state::state::FreelyMutableState;

/// Marks entities rebuilt from scratch after a full progress reset.
#[derive(Component)]
pub struct CleanupMarker;

/// Request to wipe all progress and rebuild the scene. The only path that
/// un-settles placed targets.
#[derive(Event, Default)]
pub struct ProgressResetEvent;

pub trait Resettable: Resource {
    fn reset(&mut self);
    fn initial_state() -> Self::State;
    type State: States + FreelyMutableState;
}

/// Applies a pending progress reset to one resettable resource and returns
/// the app to its initial state. Register once per resettable type.
pub fn apply_progress_reset<T: Resettable>(
    mut events: EventReader<ProgressResetEvent>,
    mut next_state: ResMut<NextState<T::State>>,
    mut target: ResMut<T>,
) {
    if events.is_empty() {
        return;
    }
    events.clear();

    target.reset();
    next_state.set(T::initial_state());
}

pub fn cleanup_marked_entities(mut commands: Commands, query: Query<Entity, With<CleanupMarker>>) {
    for entity in query.iter() {
        commands.entity(entity).despawn_recursive();
    }
}
