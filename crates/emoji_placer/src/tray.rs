use bevy::prelude::*;
use placer_helpers::{WINDOW_HEIGHT, WINDOW_WIDTH};

use crate::config::PlacementConfig;

/// One tray slot, in original population order.
#[derive(Debug, Clone)]
pub struct TrayEntry {
    pub id: String,
    pub width: f32,
    /// Present in the tray flow. Flips off the moment a drag crosses the
    /// boundary or the item settles.
    pub active: bool,
    /// The item settled and its visual is gone for good.
    pub gone: bool,
    /// Flow offset assigned by the last recalculation. Inactive entries keep
    /// whatever offset they last had.
    pub target_offset: f32,
}

/// Binds a tray sprite entity to its entry index.
#[derive(Component, Debug, Clone, Copy)]
pub struct TrayItemVisual {
    pub index: usize,
}

/// Ordered tray contents plus flow-layout and scroll state.
///
/// Collaborators change item availability through the notify methods only;
/// layout recalculation is internal to those calls.
#[derive(Resource, Default)]
pub struct TrayLayout {
    entries: Vec<TrayEntry>,
    spacing: f32,
    content_width: f32,
    scroll: f32,
    settle_frames: u32,
}

impl TrayLayout {
    pub fn populate(&mut self, items: Vec<(String, f32)>, spacing: f32, settle_frames: u32) {
        self.entries = items
            .into_iter()
            .map(|(id, width)| TrayEntry {
                id,
                width,
                active: true,
                gone: false,
                target_offset: 0.0,
            })
            .collect();
        self.spacing = spacing;
        self.scroll = 0.0;
        self.settle_frames = settle_frames;
        self.recalculate();
    }

    /// Reassigns flow offsets: the cursor starts at one spacing unit and
    /// advances by `width + spacing` past every active entry. Inactive
    /// entries are skipped entirely and keep their last offset. The content
    /// width is the final cursor value.
    pub fn recalculate(&mut self) {
        let mut cursor = self.spacing;
        for entry in &mut self.entries {
            if entry.active {
                entry.target_offset = cursor;
                cursor += entry.width + self.spacing;
            }
        }
        self.content_width = cursor;
    }

    /// An item crossed the drag boundary and left the flow.
    pub fn notify_item_left(&mut self, index: usize) {
        self.set_active(index, false);
    }

    /// A rejected drag brought the item back.
    pub fn notify_item_returned(&mut self, index: usize) {
        self.set_active(index, true);
    }

    /// The item settled on its target and never comes back.
    pub fn notify_item_settled(&mut self, index: usize) {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.active = false;
                entry.gone = true;
                self.recalculate();
            }
            None => warn!("tray notified about unknown item index {index}"),
        }
    }

    fn set_active(&mut self, index: usize, active: bool) {
        match self.entries.get_mut(index) {
            Some(entry) if entry.gone => {
                warn!("tray notified about already settled item index {index}");
            }
            Some(entry) => {
                entry.active = active;
                self.recalculate();
            }
            None => warn!("tray notified about unknown item index {index}"),
        }
    }

    pub fn entry(&self, index: usize) -> Option<&TrayEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[TrayEntry] {
        &self.entries
    }

    pub fn content_width(&self) -> f32 {
        self.content_width
    }

    pub const fn scroll(&self) -> f32 {
        self.scroll
    }

    /// Scrolls the tray by a pointer delta, clamped so the content never
    /// leaves the viewport.
    pub fn scroll_by(&mut self, delta_x: f32, view_width: f32) {
        let max_scroll = (self.content_width - view_width).max(0.0);
        self.scroll = (self.scroll - delta_x).clamp(0.0, max_scroll);
    }

    /// Burns one immediate-placement frame right after population. While any
    /// remain, repositioning snaps instead of sliding, so the initial layout
    /// does not animate into place on scene load.
    pub fn consume_settle_frame(&mut self) -> bool {
        if self.settle_frames > 0 {
            self.settle_frames -= 1;
            return true;
        }
        false
    }

    /// Active items still waiting in the tray.
    pub fn remaining(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.gone).count()
    }
}

/// World-space top edge of the tray band.
pub fn tray_top_y(config: &PlacementConfig) -> f32 {
    -WINDOW_HEIGHT / 2.0 + config.tray_height
}

/// World-space line the pointer must cross upward to turn a scroll into an
/// item drag: the tray top plus a fraction of the tray height.
pub fn drag_boundary_y(config: &PlacementConfig) -> f32 {
    tray_top_y(config) + config.boundary_cross_fraction * config.tray_height
}

/// Vertical center of items resting in the tray.
pub fn tray_item_y(config: &PlacementConfig) -> f32 {
    -WINDOW_HEIGHT / 2.0 + config.tray_height / 2.0
}

/// Where an entry's visual belongs right now, given the current scroll.
pub fn item_world_position(
    layout: &TrayLayout,
    entry: &TrayEntry,
    config: &PlacementConfig,
) -> Vec2 {
    Vec2::new(
        -WINDOW_WIDTH / 2.0 + entry.target_offset + entry.width / 2.0 - layout.scroll(),
        tray_item_y(config),
    )
}

/// The active entry under a world-space point, if the point is inside the
/// tray band.
pub fn item_at(layout: &TrayLayout, point: Vec2, config: &PlacementConfig) -> Option<usize> {
    if point.y < -WINDOW_HEIGHT / 2.0 || point.y > tray_top_y(config) {
        return None;
    }
    layout
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.active)
        .find(|(_, entry)| {
            let center = item_world_position(layout, entry, config);
            (point.x - center.x).abs() <= entry.width / 2.0
        })
        .map(|(index, _)| index)
}

/// Drives every active tray visual toward its flow position with a bounded
/// per-frame step, so rapid leave/return churn never causes a visible jump.
/// During the settle frames right after population, placement is immediate.
/// A visual whose entry is inactive is exempt: mid-drag its transform belongs
/// to the ghost session.
pub fn drive_tray_items(
    time: Res<Time>,
    mut layout: ResMut<TrayLayout>,
    config: Res<PlacementConfig>,
    mut visuals: Query<(&TrayItemVisual, &mut Transform)>,
) {
    let snap = layout.consume_settle_frame();
    let max_step = config.tray_slide_speed * time.delta_secs();

    for (visual, mut transform) in &mut visuals {
        let Some(entry) = layout.entry(visual.index) else {
            continue;
        };
        if !entry.active {
            continue;
        }

        let target = item_world_position(&layout, entry, &config);
        if snap {
            transform.translation.x = target.x;
            transform.translation.y = target.y;
            continue;
        }

        let delta = target.x - transform.translation.x;
        transform.translation.x += delta.clamp(-max_step, max_step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_with(widths: &[f32]) -> TrayLayout {
        let mut layout = TrayLayout::default();
        let items = widths
            .iter()
            .enumerate()
            .map(|(i, &width)| (format!("spot{i:02}"), width))
            .collect();
        layout.populate(items, 10.0, 0);
        layout
    }

    fn expected_content_width(layout: &TrayLayout, spacing: f32) -> f32 {
        layout
            .entries()
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| entry.width + spacing)
            .sum::<f32>()
            + spacing
    }

    #[test]
    fn content_width_matches_the_flow_invariant() {
        let mut layout = layout_with(&[40.0, 60.0, 50.0, 30.0]);
        assert!(
            (layout.content_width() - expected_content_width(&layout, 10.0)).abs() < f32::EPSILON,
            "full tray: leading spacing plus every active item and its gap"
        );

        // Every subset of active flags must satisfy the same invariant.
        for mask in 0u32..16 {
            for index in 0..4 {
                if mask & (1 << index) == 0 {
                    layout.notify_item_left(index);
                } else {
                    layout.notify_item_returned(index);
                }
            }
            layout.recalculate();
            assert!(
                (layout.content_width() - expected_content_width(&layout, 10.0)).abs()
                    < f32::EPSILON,
                "invariant must hold for active mask {mask:04b}"
            );
        }
    }

    #[test]
    fn inactive_entries_keep_their_last_offset() {
        let mut layout = layout_with(&[40.0, 40.0, 40.0]);
        let before = layout.entry(1).map(|entry| entry.target_offset);

        layout.notify_item_left(1);
        let lifted = layout.entry(1).expect("entry 1 exists");
        assert_eq!(
            Some(lifted.target_offset),
            before,
            "a lifted item keeps the offset it had"
        );

        let third = layout.entry(2).expect("entry 2 exists");
        assert!(
            (third.target_offset - 60.0).abs() < f32::EPSILON,
            "the item behind the gap slides forward into it"
        );
    }

    #[test]
    fn returned_items_rejoin_the_flow_in_original_order() {
        let mut layout = layout_with(&[40.0, 40.0, 40.0]);
        layout.notify_item_left(0);
        layout.notify_item_returned(0);

        let first = layout.entry(0).expect("entry 0 exists");
        assert!(
            (first.target_offset - 10.0).abs() < f32::EPSILON,
            "a returned item takes its original flow position back"
        );
    }

    #[test]
    fn settled_items_never_rejoin() {
        let mut layout = layout_with(&[40.0, 40.0]);
        layout.notify_item_settled(0);
        layout.notify_item_returned(0);

        let settled = layout.entry(0).expect("entry 0 exists");
        assert!(!settled.active, "a settled item cannot be reactivated");
        assert!(settled.gone, "a settled item stays gone");
        assert_eq!(layout.remaining(), 1, "one live item remains");
    }

    #[test]
    fn scrolling_is_clamped_to_the_content() {
        let mut layout = layout_with(&[100.0, 100.0, 100.0, 100.0]);
        let view_width = 360.0;
        let max_scroll = layout.content_width() - view_width;

        layout.scroll_by(500.0, view_width);
        assert!(
            layout.scroll().abs() < f32::EPSILON,
            "scrolling backwards stops at the leading edge"
        );

        layout.scroll_by(-10_000.0, view_width);
        assert!(
            (layout.scroll() - max_scroll).abs() < f32::EPSILON,
            "scrolling forwards stops at the trailing edge"
        );
    }

    #[test]
    fn settle_frames_burn_down_once_per_frame() {
        let mut layout = TrayLayout::default();
        layout.populate(vec![("spot00".to_owned(), 40.0)], 10.0, 2);

        assert!(layout.consume_settle_frame(), "first frame snaps");
        assert!(layout.consume_settle_frame(), "second frame snaps");
        assert!(
            !layout.consume_settle_frame(),
            "later frames slide instead of snapping"
        );
    }
}
