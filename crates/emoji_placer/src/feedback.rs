use bevy::prelude::*;
use placer_helpers::reset::CleanupMarker;
use placer_helpers::{FONT, WINDOW_HEIGHT};

use crate::batch::BatchProgress;
use crate::core::{
    AllBatchesCompleteEvent, BatchCompleteEvent, BatchRevealedEvent, DelayedDespawn, GameState,
    ItemPlacedEvent, PlacementSet,
};
use crate::config::PlacementConfig;
use crate::registry::SpotZone;

const CELEBRATION_PARTICLES: usize = 80;
const CELEBRATION_LIFETIME: f32 = 1.5;

/// Settled artwork that was spawned already placed on resume. It must not
/// re-animate.
#[derive(Component)]
pub struct PreSettled;

/// One-shot scale pulse on artwork that just settled.
#[derive(Component)]
pub struct SettlePulse {
    pub timer: Timer,
    pub peak: f32,
}

impl Default for SettlePulse {
    fn default() -> Self {
        Self {
            timer: Timer::from_seconds(0.3, TimerMode::Once),
            peak: 1.25,
        }
    }
}

/// Scale pop-in on zones of a freshly revealed batch.
#[derive(Component)]
pub struct RevealPop {
    pub timer: Timer,
}

#[derive(Component)]
struct CelebrationParticle {
    lifetime: Timer,
    velocity: Vec2,
    initial_scale: f32,
}

#[derive(Component)]
struct ProgressText;

/// Reacts to the engine's lifecycle events with pulses, pop-ins, progress
/// text and the completion celebration. The engine never depends on any of
/// this; removing the plugin leaves placement fully functional.
pub struct FeedbackPlugin;

impl Plugin for FeedbackPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Playing), spawn_progress_text)
            .add_systems(OnEnter(GameState::Complete), spawn_complete_overlay)
            .add_systems(
                Update,
                (
                    start_reveal_pops,
                    update_progress_text,
                    announce_batch_complete,
                    start_celebration,
                )
                    .in_set(PlacementSet::Layout)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(
                Update,
                (
                    animate_settle_pulses,
                    animate_reveal_pops,
                    animate_celebration_particles,
                )
                    .in_set(PlacementSet::Animate),
            );
    }
}

fn spawn_progress_text(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    progress: Res<BatchProgress>,
) {
    commands.spawn((
        Text2d::new(progress_line(&progress)),
        TextFont {
            font: asset_server.load(FONT),
            font_size: 22.0,
            ..default()
        },
        TextColor(Color::WHITE),
        TextLayout::new_with_justify(JustifyText::Center),
        Transform::from_xyz(0.0, WINDOW_HEIGHT / 2.0 - 24.0, 5.0),
        ProgressText,
        CleanupMarker,
    ));
}

fn progress_line(progress: &BatchProgress) -> String {
    format!(
        "Placed {}/{}   Batch {}/{}",
        progress.placed_total(),
        progress.set().total(),
        progress.current() + 1,
        progress.set().batch_count()
    )
}

fn update_progress_text(
    progress: Res<BatchProgress>,
    mut placed_events: EventReader<ItemPlacedEvent>,
    mut revealed_events: EventReader<BatchRevealedEvent>,
    mut texts: Query<&mut Text2d, With<ProgressText>>,
) {
    if placed_events.is_empty() && revealed_events.is_empty() {
        return;
    }
    placed_events.clear();
    revealed_events.clear();

    for mut text in &mut texts {
        *text = Text2d::new(progress_line(&progress));
    }
}

/// Zones of a freshly revealed batch pop in from a smaller scale.
fn start_reveal_pops(
    mut commands: Commands,
    mut events: EventReader<BatchRevealedEvent>,
    config: Res<PlacementConfig>,
    zones: Query<(Entity, &SpotZone)>,
) {
    for event in events.read() {
        for (entity, zone) in &zones {
            if zone.batch == event.index {
                commands.entity(entity).insert(RevealPop {
                    timer: Timer::from_seconds(config.reveal_pop_duration, TimerMode::Once),
                });
            }
        }
    }
}

fn animate_reveal_pops(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut RevealPop, &mut Transform)>,
) {
    for (entity, mut pop, mut transform) in &mut query {
        pop.timer.tick(time.delta());
        let progress = pop.timer.fraction();
        transform.scale = Vec3::splat(0.4f32.mul_add(progress, 0.6));

        if pop.timer.finished() {
            transform.scale = Vec3::ONE;
            commands.entity(entity).remove::<RevealPop>();
        }
    }
}

/// Scale pulse: up to the peak in the first half, back to rest in the second.
fn animate_settle_pulses(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut SettlePulse, &mut Transform), Without<PreSettled>>,
) {
    for (entity, mut pulse, mut transform) in &mut query {
        pulse.timer.tick(time.delta());
        let progress = pulse.timer.fraction();
        let scale = if progress < 0.5 {
            (pulse.peak - 1.0).mul_add(progress / 0.5, 1.0)
        } else {
            (pulse.peak - 1.0).mul_add(-((progress - 0.5) / 0.5), pulse.peak)
        };
        transform.scale = Vec3::splat(scale);

        if pulse.timer.finished() {
            transform.scale = Vec3::ONE;
            commands.entity(entity).remove::<SettlePulse>();
        }
    }
}

/// Short-lived banner when a whole batch fills up.
fn announce_batch_complete(
    mut commands: Commands,
    mut events: EventReader<BatchCompleteEvent>,
    asset_server: Res<AssetServer>,
) {
    for event in events.read() {
        commands.spawn((
            Text2d::new(format!("Row {} complete!", event.index + 1)),
            TextFont {
                font: asset_server.load(FONT),
                font_size: 28.0,
                ..default()
            },
            TextColor(Color::srgb(0.4, 1.0, 0.5)),
            TextLayout::new_with_justify(JustifyText::Center),
            Transform::from_xyz(0.0, 0.0, 8.0),
            DelayedDespawn::after_seconds(1.2),
            CleanupMarker,
        ));
    }
}

fn start_celebration(mut commands: Commands, mut events: EventReader<AllBatchesCompleteEvent>) {
    if events.is_empty() {
        return;
    }
    events.clear();

    for _ in 0..CELEBRATION_PARTICLES {
        let angle = fastrand::f32() * std::f32::consts::TAU;
        let speed = fastrand::f32().mul_add(220.0, 90.0);
        let velocity = Vec2::new(angle.cos(), angle.sin()) * speed;
        let offset = Vec2::new(
            fastrand::f32().mul_add(240.0, -120.0),
            fastrand::f32().mul_add(240.0, -120.0),
        );

        commands.spawn((
            CelebrationParticle {
                lifetime: Timer::from_seconds(CELEBRATION_LIFETIME, TimerMode::Once),
                velocity,
                initial_scale: fastrand::f32().mul_add(1.2, 0.4),
            },
            Sprite {
                color: Color::hsla(fastrand::f32() * 360.0, 0.8, 0.7, 1.0),
                custom_size: Some(Vec2::splat(8.0)),
                ..default()
            },
            Transform::from_xyz(offset.x, offset.y, 9.0),
            Visibility::Visible,
            CleanupMarker,
        ));
    }
}

fn animate_celebration_particles(
    mut commands: Commands,
    time: Res<Time>,
    mut particles: Query<(Entity, &mut Transform, &mut Sprite, &mut CelebrationParticle)>,
) {
    for (entity, mut transform, mut sprite, mut particle) in &mut particles {
        particle.lifetime.tick(time.delta());

        let delta = particle.velocity * time.delta_secs();
        transform.translation += Vec3::new(delta.x, delta.y, 0.0);

        let life_factor = 1.0 - particle.lifetime.fraction();
        sprite.color = sprite.color.with_alpha(life_factor);
        transform.scale = Vec3::splat(particle.initial_scale * life_factor);

        if particle.lifetime.finished() {
            commands.entity(entity).despawn();
        }
    }
}

fn spawn_complete_overlay(mut commands: Commands, asset_server: Res<AssetServer>) {
    commands.spawn((
        Text2d::new("All placed!\nPress R to start over"),
        TextFont {
            font: asset_server.load(FONT),
            font_size: 36.0,
            ..default()
        },
        TextColor(Color::WHITE),
        TextLayout::new_with_justify(JustifyText::Center),
        Transform::from_xyz(0.0, 0.0, 8.0),
        CleanupMarker,
    ));
}
