use bevy::prelude::*;
use placer_helpers::WINDOW_WIDTH;
use placer_helpers::input::{
    just_pressed_world_position, just_released_world_position, pressed_world_position,
};
use strum::Display;

use crate::config::PlacementConfig;
use crate::core::{DelayedDespawn, DropRejectedEvent, ItemPlacedEvent};
use crate::ghost::{self, GhostGrow, GhostSession, ReturnFlight, SettleFlight};
use crate::ledger::PlacementLedger;
use crate::registry::{Spot, SpotRegistry, SpotZone};
use crate::tray::{self, TrayItemVisual, TrayLayout};
use crate::validator::{self, DropVerdict, HitBlocker, Hittable, Surface};

/// Phases of the per-item drag lifecycle. The terminal phases resolve
/// straight back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum DragPhase {
    #[default]
    Idle,
    PotentialDrag,
    TrayScroll,
    ItemDrag,
    Settled,
    ReturnedToTray,
}

/// What a pointer movement amounts to this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DragMove {
    None,
    /// The gesture belongs to the tray's scroll behavior.
    Scroll { delta_x: f32 },
    /// The pointer crossed the drag boundary; the item leaves the tray now.
    CrossedBoundary { index: usize, id: String },
}

/// What a pointer release amounts to.
#[derive(Debug, Clone, PartialEq)]
pub enum DragRelease {
    None,
    /// The gesture never left the tray: it was a scroll, not a placement.
    EndScroll,
    /// The item is airborne; consult the drop validator.
    ValidateDrop { index: usize, id: String },
}

/// The single in-flight gesture. Ephemeral: lives between pointer-down and
/// pointer-up, one item at a time.
#[derive(Resource, Default)]
pub struct DragGesture {
    phase: DragPhase,
    item_index: Option<usize>,
    item_id: Option<String>,
    origin: Vec2,
    last_pointer: Vec2,
    crossed: bool,
}

impl DragGesture {
    pub const fn phase(&self) -> DragPhase {
        self.phase
    }

    /// Where the pointer went down.
    pub const fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Pointer-down inside the tray band. The gesture is handed to the scroll
    /// behavior first; turning into an item drag is the exception.
    pub fn press(&mut self, item: Option<(usize, String)>, position: Vec2) {
        if self.phase != DragPhase::Idle {
            return;
        }
        self.phase = DragPhase::PotentialDrag;
        self.item_index = item.as_ref().map(|(index, _)| *index);
        self.item_id = item.map(|(_, id)| id);
        self.origin = position;
        self.last_pointer = position;
        self.crossed = false;
    }

    /// Pointer movement. The boundary check is latched: it can fire at most
    /// once per gesture, and once an item drag starts, the phase holds until
    /// release no matter where the pointer wanders.
    pub fn drag_to(&mut self, position: Vec2, boundary_y: f32) -> DragMove {
        let delta_x = position.x - self.last_pointer.x;
        self.last_pointer = position;

        match self.phase {
            DragPhase::PotentialDrag | DragPhase::TrayScroll => {
                if !self.crossed && position.y > boundary_y {
                    if let (Some(index), Some(id)) = (self.item_index, self.item_id.clone()) {
                        self.crossed = true;
                        self.phase = DragPhase::ItemDrag;
                        return DragMove::CrossedBoundary { index, id };
                    }
                }
                self.phase = DragPhase::TrayScroll;
                DragMove::Scroll { delta_x }
            }
            _ => DragMove::None,
        }
    }

    /// Pointer released.
    pub fn release(&self) -> DragRelease {
        match self.phase {
            DragPhase::PotentialDrag | DragPhase::TrayScroll => DragRelease::EndScroll,
            DragPhase::ItemDrag => match (self.item_index, self.item_id.clone()) {
                (Some(index), Some(id)) => DragRelease::ValidateDrop { index, id },
                _ => DragRelease::None,
            },
            _ => DragRelease::None,
        }
    }

    /// Terminal transition: the drop settled.
    pub fn settle(&mut self) {
        self.phase = DragPhase::Settled;
        self.finish();
    }

    /// Terminal transition: the item is headed back to the tray.
    pub fn returned(&mut self) {
        self.phase = DragPhase::ReturnedToTray;
        self.finish();
    }

    /// The gesture was only ever a scroll.
    pub fn end_scroll(&mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        *self = Self::default();
    }
}

type ZoneSurfaceQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static GlobalTransform,
        &'static Hittable,
        &'static Visibility,
        Option<&'static SpotZone>,
        Option<&'static HitBlocker>,
    ),
>;

fn scan_spots(zones: &ZoneSurfaceQuery, ledger: &PlacementLedger) -> Vec<Spot> {
    zones
        .iter()
        .filter_map(|(entity, transform, hittable, _, zone, _)| {
            zone.map(|zone| Spot {
                id: zone.id.clone(),
                center: transform.translation().truncate(),
                size: hittable.size,
                batch: zone.batch,
                settled: ledger.is_placed(&zone.id),
                entity,
            })
        })
        .collect()
}

fn collect_surfaces(zones: &ZoneSurfaceQuery) -> Vec<Surface> {
    zones
        .iter()
        .filter(|(_, _, _, visibility, _, _)| **visibility != Visibility::Hidden)
        .map(|(entity, transform, hittable, _, zone, blocker)| Surface {
            entity,
            center: transform.translation().truncate(),
            z: transform.translation().z,
            size: hittable.size,
            zone_id: zone.map(|zone| zone.id.clone()),
            blocks: blocker.is_some(),
        })
        .collect()
}

/// Pointer-down: picks up the tray item under the finger, if any, and arms
/// the gesture.
pub fn handle_pointer_down(
    mut gesture: ResMut<DragGesture>,
    layout: Res<TrayLayout>,
    config: Res<PlacementConfig>,
    button_input: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    windows: Query<&Window>,
    camera: Query<(&Camera, &GlobalTransform)>,
) {
    let Some(position) =
        just_pressed_world_position(&button_input, &touch_input, &windows, &camera)
    else {
        return;
    };
    if gesture.phase() != DragPhase::Idle {
        return;
    }
    // Only presses inside the tray band start a gesture.
    if position.y > tray::tray_top_y(&config) {
        return;
    }

    let item = tray::item_at(&layout, position, &config)
        .and_then(|index| layout.entry(index).map(|entry| (index, entry.id.clone())));
    gesture.press(item, position);
}

/// Pointer movement: scrolls the tray until the boundary is crossed, then
/// lifts the item out and opens a ghost session for it.
pub fn handle_pointer_drag(
    mut commands: Commands,
    mut gesture: ResMut<DragGesture>,
    mut layout: ResMut<TrayLayout>,
    mut session: ResMut<GhostSession>,
    registry: Res<SpotRegistry>,
    config: Res<PlacementConfig>,
    button_input: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    windows: Query<&Window>,
    camera: Query<(&Camera, &GlobalTransform)>,
    mut item_visuals: Query<(&TrayItemVisual, &Transform, &mut Sprite)>,
    spot_sprites: Query<&Sprite, (With<SpotZone>, Without<TrayItemVisual>)>,
) {
    if gesture.phase() == DragPhase::Idle {
        return;
    }
    let Some(position) = pressed_world_position(&button_input, &touch_input, &windows, &camera)
    else {
        return;
    };

    match gesture.drag_to(position, tray::drag_boundary_y(&config)) {
        DragMove::Scroll { delta_x } => {
            layout.scroll_by(delta_x, WINDOW_WIDTH);
        }
        DragMove::CrossedBoundary { index, id } => {
            // The scroll is over for this gesture; the item leaves the flow.
            layout.notify_item_left(index);

            if !session.try_begin(&id, index) {
                return;
            }

            let mut start = position;
            let mut item_art = None;
            for (visual, transform, mut sprite) in &mut item_visuals {
                if visual.index == index {
                    start = transform.translation.truncate();
                    item_art = Some(sprite.clone());
                    let dimmed = sprite.color.with_alpha(config.tray_dragged_alpha);
                    sprite.color = dimmed;
                    break;
                }
            }

            let spot = registry.get(&id);
            let spot_art = spot.and_then(|spot| spot_sprites.get(spot.entity).ok());
            let spot_size = spot.map_or(Vec2::splat(config.spot_size), |spot| spot.size);
            let visual = ghost::resolve_ghost_visual(
                spot_art,
                spot_size,
                item_art.as_ref(),
                Vec2::splat(config.tray_item_size),
            );
            ghost::spawn_ghost(&mut commands, &mut session, &config, start, visual);
        }
        DragMove::None => {}
    }
}

/// Pointer release: either ends a scroll or runs the drop validator and
/// resolves the gesture to settled or returned.
pub fn handle_pointer_up(
    mut commands: Commands,
    mut gesture: ResMut<DragGesture>,
    mut session: ResMut<GhostSession>,
    mut layout: ResMut<TrayLayout>,
    mut registry: ResMut<SpotRegistry>,
    ledger: Res<PlacementLedger>,
    config: Res<PlacementConfig>,
    button_input: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    windows: Query<&Window>,
    camera: Query<(&Camera, &GlobalTransform)>,
    zones: ZoneSurfaceQuery,
    ghost_sprites: Query<(&Transform, &Sprite), Without<TrayItemVisual>>,
    mut item_visuals: Query<(Entity, &TrayItemVisual, &mut Sprite), Without<SpotZone>>,
    mut placed_events: EventWriter<ItemPlacedEvent>,
    mut rejected_events: EventWriter<DropRejectedEvent>,
) {
    let Some(release_position) =
        just_released_world_position(&button_input, &touch_input, &windows, &camera)
    else {
        return;
    };

    match gesture.release() {
        DragRelease::None => {}
        DragRelease::EndScroll => gesture.end_scroll(),
        DragRelease::ValidateDrop { index, id } => {
            // Self-heal: an empty registry rebuilds itself from the scene
            // before the lookup.
            registry.ensure_fresh(|| scan_spots(&zones, &ledger));

            let ghost_state = session
                .active()
                .and_then(|active| active.entity)
                .and_then(|entity| ghost_sprites.get(entity).ok());
            let ghost_center = ghost_state
                .map_or(release_position, |(transform, _)| {
                    transform.translation.truncate()
                });
            let ghost_size = ghost_state
                .and_then(|(_, sprite)| sprite.custom_size)
                .unwrap_or_else(|| Vec2::splat(config.tray_item_size));

            // Decoy blocking stays disabled for the whole drag.
            let hits = validator::hits_at(ghost_center, collect_surfaces(&zones), true);

            match validator::validate(&id, ghost_center, &hits, &registry, &config) {
                DropVerdict::Accepted { spot } => {
                    layout.notify_item_settled(index);

                    // Ownership of the visual transfers to the settled
                    // representation via the settle flight.
                    if let Some(active) = session.take() {
                        if let Some(entity) = active.entity {
                            commands
                                .entity(entity)
                                .remove::<GhostGrow>()
                                .insert(SettleFlight {
                                    timer: Timer::from_seconds(
                                        config.ghost_settle_duration,
                                        TimerMode::Once,
                                    ),
                                    from: ghost_center,
                                    to: spot.center,
                                    from_size: ghost_size,
                                    to_size: spot.size,
                                });
                        }
                    }

                    // The tray visual lingers briefly so the settle animation
                    // can still read its sprite.
                    for (entity, visual, _) in &item_visuals {
                        if visual.index == index {
                            commands
                                .entity(entity)
                                .insert(DelayedDespawn::after_seconds(config.settle_grace_delay));
                        }
                    }

                    placed_events.send(ItemPlacedEvent {
                        id: spot.id.clone(),
                        spot_entity: spot.entity,
                    });
                    gesture.settle();
                }
                DropVerdict::Rejected { reason } => {
                    info!("drop of {id:?} rejected: {reason}");
                    rejected_events.send(DropRejectedEvent {
                        id: id.clone(),
                        reason,
                    });

                    if let Some(active) = session.take() {
                        if let Some(entity) = active.entity {
                            commands
                                .entity(entity)
                                .remove::<GhostGrow>()
                                .insert(ReturnFlight {
                                    timer: Timer::from_seconds(
                                        config.ghost_return_duration,
                                        TimerMode::Once,
                                    ),
                                    item_index: index,
                                    from: ghost_center,
                                    from_size: ghost_size,
                                    to_size: Vec2::splat(config.tray_item_size),
                                });
                        } else {
                            // No-visual mode: nothing to fly back, restore the
                            // item on the spot.
                            layout.notify_item_returned(index);
                            for (_, visual, mut sprite) in &mut item_visuals {
                                if visual.index == index {
                                    let restored = sprite.color.with_alpha(1.0);
                                    sprite.color = restored;
                                }
                            }
                        }
                    }
                    gesture.returned();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY_Y: f32 = -204.8;

    fn armed_gesture() -> DragGesture {
        let mut gesture = DragGesture::default();
        gesture.press(
            Some((2, "spot02".to_owned())),
            Vec2::new(0.0, -290.0),
        );
        gesture
    }

    #[test]
    fn boundary_crossing_fires_at_most_once_per_gesture() {
        let mut gesture = armed_gesture();

        let crossed = gesture.drag_to(Vec2::new(0.0, -100.0), BOUNDARY_Y);
        assert_eq!(
            crossed,
            DragMove::CrossedBoundary {
                index: 2,
                id: "spot02".to_owned()
            },
            "the first move above the boundary lifts the item"
        );

        let back_below = gesture.drag_to(Vec2::new(0.0, -300.0), BOUNDARY_Y);
        assert_eq!(
            back_below,
            DragMove::None,
            "dipping back below the boundary does not end the drag"
        );
        assert_eq!(
            gesture.phase(),
            DragPhase::ItemDrag,
            "the item-drag phase is latched until release"
        );

        let above_again = gesture.drag_to(Vec2::new(0.0, -100.0), BOUNDARY_Y);
        assert_eq!(
            above_again,
            DragMove::None,
            "the crossing transition cannot fire a second time"
        );
    }

    #[test]
    fn movement_below_the_boundary_is_a_scroll() {
        let mut gesture = armed_gesture();

        let moved = gesture.drag_to(Vec2::new(-30.0, -290.0), BOUNDARY_Y);
        assert_eq!(
            moved,
            DragMove::Scroll { delta_x: -30.0 },
            "horizontal movement inside the tray scrolls the list"
        );
        assert_eq!(
            gesture.phase(),
            DragPhase::TrayScroll,
            "the gesture belongs to the scroll behavior"
        );
        assert_eq!(
            gesture.release(),
            DragRelease::EndScroll,
            "releasing a scroll is not a placement attempt"
        );
    }

    #[test]
    fn empty_tray_presses_can_only_scroll() {
        let mut gesture = DragGesture::default();
        gesture.press(None, Vec2::new(0.0, -290.0));

        let crossed = gesture.drag_to(Vec2::new(0.0, -100.0), BOUNDARY_Y);
        assert_eq!(
            crossed,
            DragMove::Scroll { delta_x: 0.0 },
            "without an item under the press there is nothing to lift"
        );
    }

    #[test]
    fn release_during_item_drag_requests_validation() {
        let mut gesture = armed_gesture();
        gesture.drag_to(Vec2::new(0.0, -100.0), BOUNDARY_Y);

        assert_eq!(
            gesture.release(),
            DragRelease::ValidateDrop {
                index: 2,
                id: "spot02".to_owned()
            },
            "releasing mid-drag consults the validator"
        );

        gesture.settle();
        assert_eq!(
            gesture.phase(),
            DragPhase::Idle,
            "terminal phases resolve back to idle"
        );
    }

    #[test]
    fn presses_are_ignored_while_a_gesture_is_live() {
        let mut gesture = armed_gesture();
        gesture.press(Some((5, "spot05".to_owned())), Vec2::ZERO);

        let crossed = gesture.drag_to(Vec2::new(0.0, -100.0), BOUNDARY_Y);
        assert_eq!(
            crossed,
            DragMove::CrossedBoundary {
                index: 2,
                id: "spot02".to_owned()
            },
            "the original item stays bound to the gesture"
        );
    }
}
