use std::collections::HashMap;

use bevy::prelude::*;

/// Scene-graph side of a target zone. The entity owns the visuals; the
/// registry below only indexes it.
#[derive(Component, Debug, Clone)]
pub struct SpotZone {
    pub id: String,
    pub batch: usize,
}

/// Registry descriptor for a single target zone.
#[derive(Debug, Clone)]
pub struct Spot {
    pub id: String,
    pub center: Vec2,
    pub size: Vec2,
    pub batch: usize,
    pub settled: bool,
    pub entity: Entity,
}

/// Lookup index over the scene's target zones, keyed by id.
///
/// Rebuilt from a scan whenever the scene changes; torn down on scene exit.
/// Never owns the zones. Constructed per scene and handed to collaborators
/// by reference, not reached through a global.
#[derive(Resource, Default)]
pub struct SpotRegistry {
    spots: HashMap<String, Spot>,
    initialized: bool,
}

impl SpotRegistry {
    /// Rebuilds the index from a scan of all known target zones.
    ///
    /// Idempotent, and a scan of zero zones yields an empty map rather than
    /// an error. Zones with an empty id are skipped; for duplicate ids the
    /// first zone registered wins. Both are logged, neither is fatal.
    pub fn refresh(&mut self, scan: impl IntoIterator<Item = Spot>) {
        self.spots.clear();
        for spot in scan {
            if spot.id.is_empty() {
                warn!("skipping target zone with an empty id");
                continue;
            }
            if self.spots.contains_key(&spot.id) {
                warn!("duplicate target zone id {:?}, keeping the first", spot.id);
                continue;
            }
            self.spots.insert(spot.id.clone(), spot);
        }
        self.initialized = true;
    }

    /// Lazy self-heal: runs `scan` and rebuilds the index if it has not been
    /// built since construction or the last teardown. A no-op otherwise, so
    /// repeated lookups never trigger repeated scans.
    pub fn ensure_fresh(&mut self, scan: impl FnOnce() -> Vec<Spot>) {
        if !self.initialized {
            self.refresh(scan());
        }
    }

    pub fn get(&self, id: &str) -> Option<&Spot> {
        self.spots.get(id)
    }

    pub fn get_all(&self) -> impl Iterator<Item = &Spot> {
        self.spots.values()
    }

    /// Marks a zone settled. Write-once: returns true only on the first call
    /// for a given zone; cleared solely by [`Self::reset_progress`].
    pub fn mark_settled(&mut self, id: &str) -> bool {
        match self.spots.get_mut(id) {
            Some(spot) if !spot.settled => {
                spot.settled = true;
                true
            }
            Some(_) => false,
            None => {
                warn!("cannot settle unknown target zone {id:?}");
                false
            }
        }
    }

    /// Explicit full-progress reset: un-settles every zone.
    pub fn reset_progress(&mut self) {
        for spot in self.spots.values_mut() {
            spot.settled = false;
        }
    }

    /// Clears the index on a scene transition. The next lookup path must
    /// refresh before use.
    pub fn teardown(&mut self) {
        self.spots.clear();
        self.initialized = false;
    }

    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot(id: &str) -> Spot {
        Spot {
            id: id.to_owned(),
            center: Vec2::ZERO,
            size: Vec2::splat(64.0),
            batch: 0,
            settled: false,
            entity: Entity::PLACEHOLDER,
        }
    }

    #[test]
    fn refresh_with_no_zones_yields_empty_map() {
        let mut registry = SpotRegistry::default();
        registry.refresh(Vec::new());
        assert!(registry.is_empty(), "empty scan must produce an empty map");
        assert!(
            registry.is_initialized(),
            "an empty scan still counts as a refresh"
        );
    }

    #[test]
    fn duplicate_ids_keep_the_first_registered_zone() {
        let mut registry = SpotRegistry::default();
        let mut first = spot("a");
        first.center = Vec2::new(10.0, 0.0);
        let mut second = spot("a");
        second.center = Vec2::new(99.0, 0.0);

        registry.refresh([first, second, spot("")]);

        assert_eq!(registry.len(), 1, "duplicate and empty ids are skipped");
        let kept = registry.get("a").expect("id a should be registered");
        assert!(
            (kept.center.x - 10.0).abs() < f32::EPSILON,
            "the first zone registered for an id wins"
        );
    }

    #[test]
    fn ensure_fresh_scans_exactly_once_until_teardown() {
        let mut registry = SpotRegistry::default();
        let mut scans = 0;

        registry.ensure_fresh(|| {
            scans += 1;
            vec![spot("a")]
        });
        registry.ensure_fresh(|| {
            scans += 1;
            vec![spot("a")]
        });
        assert_eq!(scans, 1, "lookups on a built index must not rescan");

        registry.teardown();
        registry.ensure_fresh(|| {
            scans += 1;
            vec![spot("a")]
        });
        assert_eq!(scans, 2, "teardown requires one fresh scan before use");
    }

    #[test]
    fn settled_is_write_once_until_full_reset() {
        let mut registry = SpotRegistry::default();
        registry.refresh([spot("a")]);

        assert!(registry.mark_settled("a"), "first settle reports the change");
        assert!(!registry.mark_settled("a"), "second settle is a no-op");
        assert!(!registry.mark_settled("ghost"), "unknown ids never settle");

        registry.reset_progress();
        let reset = registry.get("a").expect("id a should be registered");
        assert!(!reset.settled, "full reset un-settles every zone");
    }
}
