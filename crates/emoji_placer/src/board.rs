use bevy::prelude::*;
use placer_helpers::emoji::{self, AtlasStatus, EmojiAtlas};
use placer_helpers::reset::CleanupMarker;
use placer_helpers::{WINDOW_HEIGHT, WINDOW_WIDTH};

use crate::batch::{BatchPhase, BatchProgress, BatchSet};
use crate::config::PlacementConfig;
use crate::core::{AllBatchesCompleteEvent, BatchRevealedEvent, GameState, PlacementSet};
use crate::feedback::PreSettled;
use crate::ghost::{GhostSession, SettledArtwork, destroy_ghost};
use crate::ledger::PlacementLedger;
use crate::registry::{Spot, SpotRegistry, SpotZone};
use crate::tray::{self, TrayItemVisual, TrayLayout};
use crate::validator::{HitBlocker, Hittable};

const SPOT_Z: f32 = 1.0;
const SETTLED_Z: f32 = 2.0;
const TRAY_PANEL_Z: f32 = 3.0;
const TRAY_ITEM_Z: f32 = 4.0;

const BOARD_COLS: usize = 3;
const BOARD_ROWS: usize = 4;
const BOARD_TOP_Y: f32 = 220.0;
const BOARD_ROW_STEP: f32 = 120.0;

/// Zones are silhouettes until their item settles on them.
const SILHOUETTE_TINT: Color = Color::srgb(0.24, 0.24, 0.28);
const TRAY_PANEL_COLOR: Color = Color::srgb(0.10, 0.10, 0.12);

/// Static definition of one placeable: matching item and zone share the id.
#[derive(Debug, Clone)]
pub struct SpotDef {
    pub id: String,
    pub emoji_index: usize,
    pub center: Vec2,
}

/// Builds the scene: spots, tray, registry and progression state. Rebuilt
/// from scratch on every pass through `Setup`.
pub struct BoardPlugin;

impl Plugin for BoardPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Setup), teardown_scene)
            .add_systems(
                Update,
                build_board.run_if(in_state(GameState::Setup)),
            )
            .add_systems(
                Update,
                (apply_batch_reveals, watch_for_completion)
                    .in_set(PlacementSet::Layout)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// Lays the board out as a row-major grid read top to bottom, so each reveal
/// batch of three fills one row.
fn generate_level(emoji_indices: &[usize]) -> Vec<SpotDef> {
    let col_step = WINDOW_WIDTH / (BOARD_COLS as f32 + 0.5);
    let left_x = -col_step * ((BOARD_COLS as f32 - 1.0) / 2.0);

    emoji_indices
        .iter()
        .enumerate()
        .map(|(ordinal, &emoji_index)| {
            let row = ordinal / BOARD_COLS;
            let col = ordinal % BOARD_COLS;
            let center = Vec2::new(
                (col as f32).mul_add(col_step, left_x),
                (row as f32).mul_add(-BOARD_ROW_STEP, BOARD_TOP_Y),
            );
            SpotDef {
                id: format!("spot{ordinal:02}"),
                emoji_index,
                center,
            }
        })
        .collect()
}

/// Scene transition: a live drag visual is cancelled, every marked entity
/// goes away and the registry index is torn down until the next build
/// refreshes it.
fn teardown_scene(
    mut commands: Commands,
    marked: Query<Entity, With<CleanupMarker>>,
    mut registry: ResMut<SpotRegistry>,
    mut session: ResMut<GhostSession>,
) {
    destroy_ghost(&mut commands, &mut session);
    registry.teardown();
    for entity in &marked {
        commands.entity(entity).despawn_recursive();
    }
}

/// Waits for the artwork source, then spawns the whole scene and switches to
/// `Playing`. Placed ids from the ledger come up already settled, with no
/// reveal or settle animation.
fn build_board(
    mut commands: Commands,
    atlas: Res<EmojiAtlas>,
    status: Res<AtlasStatus>,
    config: Res<PlacementConfig>,
    ledger: Res<PlacementLedger>,
    mut registry: ResMut<SpotRegistry>,
    mut layout: ResMut<TrayLayout>,
    mut progress: ResMut<BatchProgress>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if !emoji::is_ready(&status) {
        return;
    }

    let spot_count = BOARD_COLS * BOARD_ROWS;
    let emoji_indices = emoji::random_emojis(&atlas, &status, spot_count);
    if emoji_indices.len() < spot_count {
        error!("not enough emoji artwork for {spot_count} spots, board stays empty");
        next_state.set(GameState::Playing);
        return;
    }

    let defs = generate_level(&emoji_indices);
    let batches = BatchSet::uniform(BOARD_ROWS, BOARD_COLS);

    let ordered_ids: Vec<String> = defs.iter().map(|def| def.id.clone()).collect();
    *progress = BatchProgress::init(batches.clone(), &ordered_ids, &ledger);

    // Target zones, one silhouette each. Hidden batches wait for their reveal.
    let spot_size = Vec2::splat(config.spot_size);
    let mut spots = Vec::with_capacity(defs.len());
    for (ordinal, def) in defs.iter().enumerate() {
        let batch = batches.batch_of(ordinal).unwrap_or(0);
        let placed = ledger.is_placed(&def.id);

        let Some(mut silhouette) =
            emoji::emoji_sprite(&atlas, &status, def.emoji_index, Some(spot_size))
        else {
            continue;
        };
        silhouette.color = SILHOUETTE_TINT;

        let entity = commands
            .spawn((
                silhouette,
                Transform::from_xyz(def.center.x, def.center.y, SPOT_Z),
                if progress.is_revealed(batch) {
                    Visibility::Visible
                } else {
                    Visibility::Hidden
                },
                SpotZone {
                    id: def.id.clone(),
                    batch,
                },
                Hittable { size: spot_size },
                CleanupMarker,
            ))
            .id();

        if placed {
            if let Some(artwork) =
                emoji::emoji_sprite(&atlas, &status, def.emoji_index, Some(spot_size))
            {
                commands.spawn((
                    artwork,
                    Transform::from_xyz(def.center.x, def.center.y, SETTLED_Z),
                    Visibility::Visible,
                    SettledArtwork,
                    PreSettled,
                    CleanupMarker,
                ));
            }
        }

        spots.push(Spot {
            id: def.id.clone(),
            center: def.center,
            size: spot_size,
            batch,
            settled: placed,
            entity,
        });
    }
    registry.refresh(spots);

    // Tray band with its panel. The panel blocks stray hits except while a
    // drag is live.
    commands.spawn((
        Sprite::from_color(
            TRAY_PANEL_COLOR,
            Vec2::new(WINDOW_WIDTH, config.tray_height),
        ),
        Transform::from_xyz(0.0, tray::tray_item_y(&config), TRAY_PANEL_Z),
        Visibility::Visible,
        Hittable {
            size: Vec2::new(WINDOW_WIDTH, config.tray_height),
        },
        HitBlocker,
        CleanupMarker,
    ));

    // Unplaced items fill the tray in shuffled order.
    let mut pending: Vec<&SpotDef> = defs
        .iter()
        .filter(|def| !ledger.is_placed(&def.id))
        .collect();
    fastrand::shuffle(&mut pending);

    layout.populate(
        pending
            .iter()
            .map(|def| (def.id.clone(), config.tray_item_size))
            .collect(),
        config.tray_spacing,
        config.tray_settle_frames,
    );

    let item_size = Vec2::splat(config.tray_item_size);
    for (index, def) in pending.iter().enumerate() {
        let Some(sprite) = emoji::emoji_sprite(&atlas, &status, def.emoji_index, Some(item_size))
        else {
            continue;
        };
        let position = layout
            .entry(index)
            .map_or(Vec2::ZERO, |entry| tray::item_world_position(&layout, entry, &config));

        commands.spawn((
            sprite,
            Transform::from_xyz(position.x, position.y, TRAY_ITEM_Z),
            Visibility::Visible,
            TrayItemVisual { index },
            CleanupMarker,
        ));
    }

    info!(
        "board built: {} spots in {} batches, {} items waiting",
        registry.len(),
        batches.batch_count(),
        pending.len()
    );

    // A board that resumes fully placed has nothing left to play.
    if progress.phase() == BatchPhase::AllComplete {
        next_state.set(GameState::Complete);
    } else {
        next_state.set(GameState::Playing);
    }
}

/// Makes a freshly unlocked batch's zones visible.
fn apply_batch_reveals(
    mut events: EventReader<BatchRevealedEvent>,
    mut zones: Query<(&SpotZone, &mut Visibility)>,
) {
    for event in events.read() {
        for (zone, mut visibility) in &mut zones {
            if zone.batch == event.index {
                *visibility = Visibility::Visible;
            }
        }
    }
}

fn watch_for_completion(
    mut events: EventReader<AllBatchesCompleteEvent>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if !events.is_empty() {
        events.clear();
        next_state.set(GameState::Complete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ids_pair_ordinals_with_row_major_positions() {
        let emoji_indices: Vec<usize> = (100..112).collect();
        let defs = generate_level(&emoji_indices);

        assert_eq!(defs.len(), 12, "one spot per emoji");
        let first = defs.first().expect("level has a first spot");
        assert_eq!(first.id, "spot00", "ids are zero-padded ordinals");

        let fourth = defs.get(3).expect("level has a fourth spot");
        assert!(
            (fourth.center.y - (BOARD_TOP_Y - BOARD_ROW_STEP)).abs() < f32::EPSILON,
            "spot 3 opens the second row"
        );
        assert!(
            (fourth.center.x - first.center.x).abs() < f32::EPSILON,
            "rows share their column positions"
        );
    }

    #[test]
    fn uniform_row_batches_cover_the_board_exactly() {
        let batches = BatchSet::uniform(BOARD_ROWS, BOARD_COLS);
        assert_eq!(
            batches.total(),
            BOARD_COLS * BOARD_ROWS,
            "batch sizes sum to the zone count"
        );
        assert_eq!(
            batches.batch_of(5),
            Some(1),
            "ordinal 5 sits in the second row batch"
        );
    }
}
