use bevy::prelude::*;

/// Resource containing every tuning constant of the placement engine.
///
/// The drop-distance floor and the boundary-cross fraction have no derivation
/// beyond playtesting, so they live here as data rather than as literals.
#[derive(Resource, Clone)]
pub struct PlacementConfig {
    // Drop validation
    /// Hard floor for the drop-distance threshold (layout-independent units)
    pub drop_distance_floor: f32,
    /// Fraction of the larger zone dimension used by the dynamic threshold
    pub drop_distance_zone_fraction: f32,

    // Drag gesture
    /// Fraction of the tray height above the tray top that arms an item drag
    pub boundary_cross_fraction: f32,

    // Ghost visual
    /// Initial ghost size as a fraction of the target's native size
    pub ghost_spawn_fraction: f32,
    /// Duration of the grow-in animation (seconds)
    pub ghost_grow_duration: f32,
    /// Duration of the return flight after a rejected drop (seconds)
    pub ghost_return_duration: f32,
    /// Duration of the settle flight onto an accepted target (seconds)
    pub ghost_settle_duration: f32,
    /// Base magnitude of the finger-avoidance offset
    pub ghost_offset_base: f32,
    /// Visuals smaller than this get a proportional offset boost
    pub ghost_small_size_reference: f32,
    /// Cap on the small-visual offset boost
    pub ghost_offset_boost_max: f32,
    /// Screen-height fraction above which the offset is at full strength
    pub ghost_fade_full_fraction: f32,
    /// Screen-height fraction below which the offset is gone
    pub ghost_fade_zero_fraction: f32,
    /// Sideways share of the offset (the rest points up)
    pub ghost_side_ratio: f32,

    // Tray
    /// Height of the tray band at the bottom of the screen
    pub tray_height: f32,
    /// Gap between tray items, also the leading inset
    pub tray_spacing: f32,
    /// Edge length of a tray item sprite
    pub tray_item_size: f32,
    /// Bounded reposition speed for tray items (units per second)
    pub tray_slide_speed: f32,
    /// Frames after population during which placement is immediate
    pub tray_settle_frames: u32,
    /// Opacity of a tray item while its ghost is being dragged
    pub tray_dragged_alpha: f32,

    // Board
    /// Edge length of a target-zone sprite
    pub spot_size: f32,

    // Progression
    /// Delay before the next batch is revealed (seconds)
    pub reveal_delay: f32,
    /// Duration of the reveal pop-in animation (seconds)
    pub reveal_pop_duration: f32,
    /// Grace delay before a settled tray item despawns (seconds)
    pub settle_grace_delay: f32,
    /// Bound on waiting for an external unlock before failing open (seconds)
    pub unlock_timeout: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            drop_distance_floor: 80.0,
            drop_distance_zone_fraction: 0.5,

            boundary_cross_fraction: 0.2,

            ghost_spawn_fraction: 0.45,
            ghost_grow_duration: 0.25,
            ghost_return_duration: 0.3,
            ghost_settle_duration: 0.2,
            ghost_offset_base: 70.0,
            ghost_small_size_reference: 80.0,
            ghost_offset_boost_max: 2.0,
            ghost_fade_full_fraction: 0.33,
            ghost_fade_zero_fraction: 0.1,
            ghost_side_ratio: 0.35,

            tray_height: 96.0,
            tray_spacing: 12.0,
            tray_item_size: 56.0,
            tray_slide_speed: 420.0,
            tray_settle_frames: 3,
            tray_dragged_alpha: 0.25,

            spot_size: 72.0,

            reveal_delay: 0.6,
            reveal_pop_duration: 0.35,
            settle_grace_delay: 0.4,
            unlock_timeout: 4.0,
        }
    }
}
