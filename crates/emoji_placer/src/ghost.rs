use bevy::prelude::*;
use placer_helpers::input::pressed_world_position;
use placer_helpers::{WINDOW_HEIGHT, WINDOW_WIDTH};

use crate::config::PlacementConfig;
use crate::drag::{DragGesture, DragPhase};
use crate::tray::{TrayItemVisual, TrayLayout};

/// Z layer of the drag visual, above everything else in the scene.
pub const GHOST_Z: f32 = 10.0;

/// State of the one drag visual a gesture may own.
#[derive(Debug, Clone)]
pub struct ActiveGhost {
    pub item_id: String,
    pub item_index: usize,
    /// `None` in no-visual mode: no artwork could be resolved, but the
    /// gesture still validates drops from the raw pointer.
    pub entity: Option<Entity>,
    pub native_size: Vec2,
}

/// The live drag visual session, if any. One per gesture.
#[derive(Resource, Default)]
pub struct GhostSession {
    active: Option<ActiveGhost>,
}

impl GhostSession {
    /// Opens a session for an item. Re-entrancy guard: a second create while
    /// a session is live is a warning and a no-op, never a double spawn.
    pub fn try_begin(&mut self, item_id: &str, item_index: usize) -> bool {
        if let Some(active) = &self.active {
            warn!(
                "ghost session already live for {:?}, ignoring create for {item_id:?}",
                active.item_id
            );
            return false;
        }
        self.active = Some(ActiveGhost {
            item_id: item_id.to_owned(),
            item_index,
            entity: None,
            native_size: Vec2::ZERO,
        });
        true
    }

    pub fn attach_visual(&mut self, entity: Entity, native_size: Vec2) {
        if let Some(active) = &mut self.active {
            active.entity = Some(entity);
            active.native_size = native_size;
        }
    }

    pub const fn active(&self) -> Option<&ActiveGhost> {
        self.active.as_ref()
    }

    /// Closes the session and hands ownership of the visual to the caller.
    pub fn take(&mut self) -> Option<ActiveGhost> {
        self.active.take()
    }
}

/// Removes the drag visual and closes the session. Safe to call repeatedly
/// and safe when no visual was ever created.
pub fn destroy_ghost(commands: &mut Commands, session: &mut GhostSession) {
    let Some(active) = session.take() else {
        return;
    };
    if let Some(entity) = active.entity {
        if let Some(entity_commands) = commands.get_entity(entity) {
            entity_commands.despawn_recursive();
        }
    }
}

/// Picks the ghost artwork. The target zone's own artwork comes first, the
/// tray item's sprite is the fallback, and with neither the gesture runs
/// without a visual.
pub fn resolve_ghost_visual(
    spot_sprite: Option<&Sprite>,
    spot_size: Vec2,
    item_sprite: Option<&Sprite>,
    item_size: Vec2,
) -> Option<(Sprite, Vec2)> {
    if let Some(sprite) = spot_sprite {
        let mut template = sprite.clone();
        // Zones render as tinted silhouettes; the ghost carries the artwork
        // at full color.
        template.color = Color::WHITE;
        return Some((template, spot_size));
    }
    item_sprite
        .cloned()
        .map(|template| (template, item_size))
}

/// Spawns the drag visual for a freshly opened session, starting at a
/// fraction of the native target size and growing toward it.
pub fn spawn_ghost(
    commands: &mut Commands,
    session: &mut GhostSession,
    config: &PlacementConfig,
    start: Vec2,
    visual: Option<(Sprite, Vec2)>,
) {
    let Some((mut sprite, native_size)) = visual else {
        warn!("no ghost artwork resolvable, continuing drag without a visual");
        return;
    };

    let spawn_size = native_size * config.ghost_spawn_fraction;
    sprite.custom_size = Some(spawn_size);

    let entity = commands
        .spawn((
            sprite,
            Transform::from_xyz(start.x, start.y, GHOST_Z),
            Visibility::Visible,
            GhostGrow {
                timer: Timer::from_seconds(config.ghost_grow_duration, TimerMode::Once),
                from: spawn_size,
                to: native_size,
            },
        ))
        .id();

    session.attach_visual(entity, native_size);
}

/// Grow-in applied to a freshly created ghost.
#[derive(Component)]
pub struct GhostGrow {
    pub timer: Timer,
    pub from: Vec2,
    pub to: Vec2,
}

/// Flight onto an accepted target. The visual it carries becomes the settled
/// representation when the flight lands.
#[derive(Component)]
pub struct SettleFlight {
    pub timer: Timer,
    pub from: Vec2,
    pub to: Vec2,
    pub from_size: Vec2,
    pub to_size: Vec2,
}

/// Flight back toward the origin tray item after a rejected drop.
#[derive(Component)]
pub struct ReturnFlight {
    pub timer: Timer,
    pub item_index: usize,
    pub from: Vec2,
    pub from_size: Vec2,
    pub to_size: Vec2,
}

/// Tag on a visual that finished settling and now represents the placed item.
#[derive(Component)]
pub struct SettledArtwork;

fn ease_smooth(t: f32) -> f32 {
    t * t * 2.0f32.mul_add(-t, 3.0)
}

/// Finger-avoidance offset. Small visuals get a proportional boost so the
/// finger never hides them; the offset fades toward zero near the bottom of
/// the screen so items can still be inspected right above the tray.
pub fn adaptive_offset(pointer: Vec2, visual_size: Vec2, config: &PlacementConfig) -> Vec2 {
    let largest = visual_size.x.max(visual_size.y);
    let boost = (config.ghost_small_size_reference / largest.max(1.0))
        .clamp(1.0, config.ghost_offset_boost_max);

    let from_bottom = ((pointer.y + WINDOW_HEIGHT / 2.0) / WINDOW_HEIGHT).clamp(0.0, 1.0);
    let band = (config.ghost_fade_full_fraction - config.ghost_fade_zero_fraction).max(f32::EPSILON);
    let fade = ease_smooth(((from_bottom - config.ghost_fade_zero_fraction) / band).clamp(0.0, 1.0));

    let magnitude = config.ghost_offset_base * boost * fade;
    let mut offset = Vec2::new(magnitude * config.ghost_side_ratio, magnitude);

    // Diagonal, primarily up. If the lift would push the visual past the top
    // edge, the sideways component flips instead.
    if pointer.y + offset.y + visual_size.y / 2.0 > WINDOW_HEIGHT / 2.0 {
        offset.x = -offset.x;
    }
    offset
}

/// Keeps the visual fully on screen.
pub fn clamp_to_screen(position: Vec2, visual_size: Vec2) -> Vec2 {
    let half = visual_size / 2.0;
    Vec2::new(
        position
            .x
            .clamp(-WINDOW_WIDTH / 2.0 + half.x, WINDOW_WIDTH / 2.0 - half.x),
        position
            .y
            .clamp(-WINDOW_HEIGHT / 2.0 + half.y, WINDOW_HEIGHT / 2.0 - half.y),
    )
}

/// Where the ghost sits for a given pointer position.
pub fn ghost_position(pointer: Vec2, visual_size: Vec2, config: &PlacementConfig) -> Vec2 {
    clamp_to_screen(pointer + adaptive_offset(pointer, visual_size, config), visual_size)
}

/// Forwards the pointer to the live ghost every frame of an item drag.
pub fn follow_pointer(
    gesture: Res<DragGesture>,
    session: Res<GhostSession>,
    config: Res<PlacementConfig>,
    button_input: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    windows: Query<&Window>,
    camera: Query<(&Camera, &GlobalTransform)>,
    mut transforms: Query<&mut Transform>,
) {
    if gesture.phase() != DragPhase::ItemDrag {
        return;
    }
    let Some(active) = session.active() else {
        return;
    };
    let Some(entity) = active.entity else {
        return;
    };
    let Some(pointer) = pressed_world_position(&button_input, &touch_input, &windows, &camera)
    else {
        return;
    };

    if let Ok(mut transform) = transforms.get_mut(entity) {
        let position = ghost_position(pointer, active.native_size, &config);
        transform.translation.x = position.x;
        transform.translation.y = position.y;
    }
}

/// Steps the grow-in animation toward the native target size.
pub fn animate_ghost_grow(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut GhostGrow, &mut Sprite)>,
) {
    for (entity, mut grow, mut sprite) in &mut query {
        grow.timer.tick(time.delta());
        let t = ease_smooth(grow.timer.fraction());
        sprite.custom_size = Some(grow.from.lerp(grow.to, t));

        if grow.timer.finished() {
            commands.entity(entity).remove::<GhostGrow>();
        }
    }
}

/// Flies an accepted ghost onto its zone and converts it into the settled
/// artwork when it lands.
pub fn animate_settle_flight(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut SettleFlight, &mut Transform, &mut Sprite)>,
) {
    for (entity, mut flight, mut transform, mut sprite) in &mut query {
        flight.timer.tick(time.delta());
        let t = ease_smooth(flight.timer.fraction());

        let position = flight.from.lerp(flight.to, t);
        transform.translation.x = position.x;
        transform.translation.y = position.y;
        sprite.custom_size = Some(flight.from_size.lerp(flight.to_size, t));

        if flight.timer.finished() {
            commands
                .entity(entity)
                .remove::<SettleFlight>()
                .insert((SettledArtwork, crate::feedback::SettlePulse::default()));
        }
    }
}

/// Flies a rejected ghost back to its origin item, chasing the item's live
/// position since the tray may re-lay-out mid-flight. When it lands, the
/// origin item gets its opacity and interactivity back.
pub fn animate_return_flight(
    mut commands: Commands,
    time: Res<Time>,
    mut layout: ResMut<TrayLayout>,
    mut ghosts: Query<
        (Entity, &mut ReturnFlight, &mut Transform, &mut Sprite),
        Without<TrayItemVisual>,
    >,
    mut visuals: Query<(&TrayItemVisual, &Transform, &mut Sprite), Without<ReturnFlight>>,
) {
    for (entity, mut flight, mut transform, mut sprite) in &mut ghosts {
        flight.timer.tick(time.delta());

        let destination = visuals
            .iter()
            .find(|(visual, _, _)| visual.index == flight.item_index)
            .map(|(_, item_transform, _)| item_transform.translation.truncate());

        let Some(destination) = destination else {
            // The origin item vanished mid-flight; end the animation instead
            // of chasing a dangling target.
            warn!("return flight lost its origin item, dropping the ghost");
            commands.entity(entity).despawn_recursive();
            continue;
        };

        let t = ease_smooth(flight.timer.fraction());
        let position = flight.from.lerp(destination, t);
        transform.translation.x = position.x;
        transform.translation.y = position.y;
        sprite.custom_size = Some(flight.from_size.lerp(flight.to_size, t));

        if flight.timer.finished() {
            layout.notify_item_returned(flight.item_index);
            for (visual, _, mut item_sprite) in &mut visuals {
                if visual.index == flight.item_index {
                    item_sprite.color = item_sprite.color.with_alpha(1.0);
                }
            }
            commands.entity(entity).despawn_recursive();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PlacementConfig {
        PlacementConfig::default()
    }

    #[test]
    fn session_create_is_guarded_against_reentry() {
        let mut session = GhostSession::default();
        assert!(session.try_begin("spot01", 1), "first create opens a session");
        assert!(
            !session.try_begin("spot01", 1),
            "a second create while live is a no-op"
        );

        session.take();
        assert!(
            session.try_begin("spot02", 2),
            "a closed session accepts a new create"
        );
    }

    #[test]
    fn artwork_falls_back_from_zone_to_item_to_nothing() {
        let zone_art = Sprite::from_color(Color::srgb(0.2, 0.2, 0.2), Vec2::splat(72.0));
        let item_art = Sprite::from_color(Color::WHITE, Vec2::splat(56.0));

        let from_zone = resolve_ghost_visual(
            Some(&zone_art),
            Vec2::splat(72.0),
            Some(&item_art),
            Vec2::splat(56.0),
        );
        let (sprite, native) = from_zone.expect("zone artwork should resolve");
        assert_eq!(
            native,
            Vec2::splat(72.0),
            "the native size is the target's, not the tray item's"
        );
        assert_eq!(
            sprite.color,
            Color::WHITE,
            "the silhouette tint is stripped for the ghost"
        );

        let from_item =
            resolve_ghost_visual(None, Vec2::splat(72.0), Some(&item_art), Vec2::splat(56.0));
        let (_, native) = from_item.expect("item artwork is the fallback");
        assert_eq!(native, Vec2::splat(56.0), "fallback uses the tray item size");

        assert!(
            resolve_ghost_visual(None, Vec2::splat(72.0), None, Vec2::splat(56.0)).is_none(),
            "with no artwork at all the gesture goes visual-less"
        );
    }

    #[test]
    fn offset_fades_out_near_the_bottom_of_the_screen() {
        let cfg = config();
        let size = Vec2::splat(72.0);

        let at_tray = adaptive_offset(Vec2::new(0.0, -WINDOW_HEIGHT / 2.0 + 20.0), size, &cfg);
        assert!(
            at_tray.length() < 1.0,
            "in the bottom band the visual sits under the finger: {at_tray}"
        );

        let mid_screen = adaptive_offset(Vec2::ZERO, size, &cfg);
        assert!(
            mid_screen.y > 10.0,
            "mid-screen the visual is lifted well above the finger"
        );
        assert!(
            mid_screen.x > 0.0 && mid_screen.x < mid_screen.y,
            "the offset is diagonal and primarily up"
        );
    }

    #[test]
    fn small_visuals_get_a_larger_offset() {
        let cfg = config();
        let small = adaptive_offset(Vec2::ZERO, Vec2::splat(30.0), &cfg);
        let large = adaptive_offset(Vec2::ZERO, Vec2::splat(120.0), &cfg);
        assert!(
            small.y > large.y,
            "smaller dragged objects are pushed further from the finger"
        );
    }

    #[test]
    fn offset_flips_sideways_at_the_top_and_stays_on_screen() {
        let cfg = config();
        let size = Vec2::splat(72.0);
        let near_top = Vec2::new(0.0, WINDOW_HEIGHT / 2.0 - 30.0);

        let offset = adaptive_offset(near_top, size, &cfg);
        assert!(offset.x < 0.0, "the sideways component flips at the top edge");

        let position = ghost_position(near_top, size, &cfg);
        assert!(
            position.y + size.y / 2.0 <= WINDOW_HEIGHT / 2.0 + 0.001,
            "the visual is clamped fully on screen"
        );
    }
}
