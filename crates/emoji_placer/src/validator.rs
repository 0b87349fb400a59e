use bevy::prelude::*;

use crate::config::PlacementConfig;
use crate::core::RejectReason;
use crate::registry::{Spot, SpotRegistry};

/// Marks an entity as part of the interactive hit-test surface.
#[derive(Component, Debug, Clone, Copy)]
pub struct Hittable {
    pub size: Vec2,
}

/// Overlay that swallows pointer hits. Bypassed while an item drag is live so
/// decoy surfaces cannot shadow the target zones underneath.
#[derive(Component)]
pub struct HitBlocker;

/// One surface under the pointer, produced by [`hits_at`].
#[derive(Debug, Clone)]
pub struct HitCandidate {
    pub entity: Entity,
    pub zone_id: Option<String>,
    pub z: f32,
}

/// Everything [`hits_at`] needs to know about one interactive surface.
#[derive(Debug, Clone)]
pub struct Surface {
    pub entity: Entity,
    pub center: Vec2,
    pub z: f32,
    pub size: Vec2,
    pub zone_id: Option<String>,
    pub blocks: bool,
}

/// Verdict of a drop attempt.
#[derive(Debug, Clone)]
pub enum DropVerdict {
    Accepted { spot: Spot },
    Rejected { reason: RejectReason },
}

/// Hit-tests `point` against the given surfaces and returns the candidates
/// underneath it, front to back. Unless `bypass_blockers` is set, a blocking
/// surface swallows everything behind it.
pub fn hits_at(point: Vec2, surfaces: Vec<Surface>, bypass_blockers: bool) -> Vec<HitCandidate> {
    let mut under_pointer: Vec<Surface> = surfaces
        .into_iter()
        .filter(|surface| {
            let delta = (point - surface.center).abs();
            delta.x <= surface.size.x / 2.0 && delta.y <= surface.size.y / 2.0
        })
        .collect();

    under_pointer.sort_by(|a, b| b.z.total_cmp(&a.z));

    let mut hits = Vec::with_capacity(under_pointer.len());
    for surface in under_pointer {
        let blocks = surface.blocks;
        hits.push(HitCandidate {
            entity: surface.entity,
            zone_id: surface.zone_id,
            z: surface.z,
        });
        if blocks && !bypass_blockers {
            break;
        }
    }
    hits
}

/// Dynamic drop-distance threshold: half the larger zone dimension, but never
/// below the configured floor. Small zones stay hittable, large zones do not
/// become trivially easy.
pub fn drop_threshold(zone_size: Vec2, config: &PlacementConfig) -> f32 {
    (config.drop_distance_zone_fraction * zone_size.x.max(zone_size.y))
        .max(config.drop_distance_floor)
}

/// Decides whether dropping `item_id` with the ghost centered at
/// `ghost_center` settles on a target zone.
///
/// Walks the hit candidates front to back, skipping everything that is not a
/// target zone. The raycast alone is unreliable near zone edges during fast
/// motion, so an accepted hit must also pass the distance gate against the
/// zone center.
pub fn validate(
    item_id: &str,
    ghost_center: Vec2,
    hits: &[HitCandidate],
    registry: &SpotRegistry,
    config: &PlacementConfig,
) -> DropVerdict {
    let Some(zone_id) = hits.iter().find_map(|hit| hit.zone_id.as_deref()) else {
        return DropVerdict::Rejected {
            reason: RejectReason::NoTarget,
        };
    };

    let Some(spot) = registry.get(zone_id) else {
        // A zone the registry does not know is a failed validation, not a bug
        // worth crashing over.
        warn!("hit target zone {zone_id:?} missing from the registry");
        return DropVerdict::Rejected {
            reason: RejectReason::NoTarget,
        };
    };

    // Ids must match byte for byte. No case folding, no locale rules.
    if spot.id != item_id {
        return DropVerdict::Rejected {
            reason: RejectReason::WrongTarget,
        };
    }

    let threshold = drop_threshold(spot.size, config);
    if ghost_center.distance(spot.center) > threshold {
        return DropVerdict::Rejected {
            reason: RejectReason::TooFar,
        };
    }

    DropVerdict::Accepted { spot: spot.clone() }
}
