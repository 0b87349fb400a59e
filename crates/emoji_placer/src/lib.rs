use bevy::prelude::*;
use placer_helpers::emoji::EmojiPlugin;
use placer_helpers::reset::{ProgressResetEvent, apply_progress_reset};

mod batch;
mod board;
mod config;
mod core;
mod drag;
mod feedback;
mod gate;
mod ghost;
mod ledger;
mod registry;
mod tray;
mod validator;

use crate::batch::{BatchProgress, ProgressionPlugin};
use crate::board::BoardPlugin;
use crate::config::PlacementConfig;
use crate::core::{
    AllBatchesCompleteEvent, BatchCompleteEvent, BatchRevealedEvent, DropRejectedEvent, GameState,
    ItemPlacedEvent, PlacementSet,
};
use crate::drag::DragGesture;
use crate::feedback::FeedbackPlugin;
use crate::ghost::GhostSession;
use crate::ledger::PlacementLedger;
use crate::registry::SpotRegistry;
use crate::tray::TrayLayout;

pub fn run() {
    let mut app = placer_helpers::get_default_app(env!("CARGO_PKG_NAME"));
    app.add_plugins(EmojiPlugin)
        .add_plugins(PlacementPlugin)
        .add_plugins(BoardPlugin)
        .add_plugins(ProgressionPlugin)
        .add_plugins(FeedbackPlugin)
        .run();
}

/// Wires the placement engine: state, resources, lifecycle events and the
/// per-tick set ordering. Pointer handling runs before progression
/// bookkeeping, which runs before layout, which runs before animations, so a
/// placement registered this tick is reflected in this tick's layout pass.
struct PlacementPlugin;

impl Plugin for PlacementPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .init_resource::<PlacementConfig>()
            .init_resource::<SpotRegistry>()
            .init_resource::<TrayLayout>()
            .init_resource::<DragGesture>()
            .init_resource::<GhostSession>()
            .init_resource::<PlacementLedger>()
            .add_event::<ItemPlacedEvent>()
            .add_event::<DropRejectedEvent>()
            .add_event::<BatchRevealedEvent>()
            .add_event::<BatchCompleteEvent>()
            .add_event::<AllBatchesCompleteEvent>()
            .add_event::<ProgressResetEvent>()
            .configure_sets(
                Update,
                (
                    PlacementSet::Input,
                    PlacementSet::Progression,
                    PlacementSet::Layout,
                    PlacementSet::Animate,
                )
                    .chain(),
            )
            .add_systems(Startup, setup)
            .add_systems(
                Update,
                (
                    drag::handle_pointer_down,
                    drag::handle_pointer_drag,
                    drag::handle_pointer_up,
                    ghost::follow_pointer,
                )
                    .chain()
                    .in_set(PlacementSet::Input)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(
                Update,
                tray::drive_tray_items
                    .in_set(PlacementSet::Layout)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(
                Update,
                (
                    ghost::animate_ghost_grow,
                    ghost::animate_settle_flight,
                    ghost::animate_return_flight,
                    crate::core::expire_delayed_despawns,
                )
                    .in_set(PlacementSet::Animate),
            )
            .add_systems(
                Update,
                (
                    trigger_full_reset,
                    apply_progress_reset::<PlacementLedger>,
                    apply_progress_reset::<BatchProgress>,
                )
                    .chain(),
            );
    }
}

fn setup(mut commands: Commands) {
    commands.spawn(Camera2d);
}

/// Debug entry to the explicit full-progress reset.
fn trigger_full_reset(
    keys: Res<ButtonInput<KeyCode>>,
    mut events: EventWriter<ProgressResetEvent>,
) {
    if keys.just_pressed(KeyCode::KeyR) {
        info!("full progress reset requested");
        events.send(ProgressResetEvent);
    }
}
