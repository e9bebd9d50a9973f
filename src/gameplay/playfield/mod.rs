use crate::config::{GameConfig, PlayfieldConfig};
use crate::gameplay::cursor_particles::activity::{
    BreakTimeSignal, HitObjectKind, Playfield, TrackedHitObject,
};
use crate::gameplay::cursor_particles::direction::SpewAction;
use crate::gameplay::cursor_particles::{ParticleParent, SpewInputState};
use crate::states::GameState;
use bevy::prelude::*;

const HIT_OBJECT_Z: f32 = 10.0;
const HIT_OBJECT_LIFETIME_S: f32 = 2.4;
const HIT_OBJECT_RING_RADIUS: f32 = 220.0;
const KIAI_SECTION_SECONDS: f32 = 8.0;

pub struct PlayfieldPlugin;

impl Plugin for PlayfieldPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlayfieldClock>()
            .add_systems(OnEnter(GameState::Loading), spawn_playfield)
            .add_systems(
                Update,
                (
                    toggle_break_override,
                    advance_playfield_clock,
                    update_break_time_signal,
                    spawn_scripted_hit_objects,
                    update_hit_object_engagement,
                    expire_hit_objects,
                )
                    .chain()
                    .run_if(in_state(GameState::Playing))
                    .run_if(resource_exists::<BreakTimeSignal>),
            );
    }
}

#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PlayfieldClock {
    pub elapsed_s: f32,
    pub next_hit_object_s: f32,
    pub spawned_count: u32,
    pub break_override: Option<bool>,
}

#[derive(Component, Debug, Clone, Copy)]
struct HitObjectLifetime {
    remaining_s: f32,
}

fn spawn_playfield(
    mut commands: Commands,
    config: Option<Res<GameConfig>>,
    existing_query: Query<(), With<Playfield>>,
    mut clock: ResMut<PlayfieldClock>,
) {
    let Some(config) = config else {
        warn!("Playfield skipped: `GameConfig` is not available.");
        return;
    };
    if !config.game.playfield.enabled || !existing_query.is_empty() {
        return;
    }

    *clock = PlayfieldClock::default();
    commands.insert_resource(BreakTimeSignal::default());
    commands.spawn((
        Name::new("Playfield"),
        Playfield,
        ParticleParent,
        Transform::default(),
        Visibility::default(),
    ));
    info!(
        "Spawned demo playfield: break every {:.1}s for {:.1}s, hit object every {:.1}s.",
        config.game.playfield.break_every_seconds,
        config.game.playfield.break_length_seconds,
        config.game.playfield.hit_object_interval_seconds,
    );
}

fn toggle_break_override(
    keyboard: Res<ButtonInput<KeyCode>>,
    signal: Res<BreakTimeSignal>,
    mut clock: ResMut<PlayfieldClock>,
) {
    if !keyboard.just_pressed(KeyCode::KeyB) {
        return;
    }

    clock.break_override = match clock.break_override {
        None => Some(!signal.is_break_time),
        Some(_) => None,
    };
    info!(
        "Break time {}.",
        match clock.break_override {
            Some(true) => "forced on",
            Some(false) => "forced off",
            None => "back on schedule",
        }
    );
}

fn advance_playfield_clock(time: Res<Time>, mut clock: ResMut<PlayfieldClock>) {
    clock.elapsed_s += time.delta_secs();
}

fn update_break_time_signal(
    config: Res<GameConfig>,
    clock: Res<PlayfieldClock>,
    mut signal: ResMut<BreakTimeSignal>,
) {
    let is_break_time = clock
        .break_override
        .unwrap_or_else(|| scheduled_break(&config.game.playfield, clock.elapsed_s));

    if signal.is_break_time != is_break_time {
        signal.is_break_time = is_break_time;
        info!(
            "Break time {}.",
            if is_break_time { "started" } else { "ended" }
        );
    }
}

fn scheduled_break(playfield: &PlayfieldConfig, elapsed_s: f32) -> bool {
    if playfield.break_every_seconds <= 0.0 || playfield.break_length_seconds <= 0.0 {
        return false;
    }
    let phase = elapsed_s % playfield.break_every_seconds;
    phase >= playfield.break_every_seconds - playfield.break_length_seconds
}

fn in_kiai_section(elapsed_s: f32) -> bool {
    ((elapsed_s / KIAI_SECTION_SECONDS) as u32) % 2 == 1
}

fn spawn_scripted_hit_objects(
    mut commands: Commands,
    config: Res<GameConfig>,
    signal: Res<BreakTimeSignal>,
    mut clock: ResMut<PlayfieldClock>,
    playfield_query: Query<Entity, With<Playfield>>,
) {
    let interval_s = config.game.playfield.hit_object_interval_seconds;
    if interval_s <= 0.0 || clock.elapsed_s < clock.next_hit_object_s {
        return;
    }
    clock.next_hit_object_s = clock.elapsed_s + interval_s;

    if signal.is_break_time {
        return;
    }
    let Ok(playfield) = playfield_query.single() else {
        return;
    };

    let index = clock.spawned_count;
    clock.spawned_count += 1;
    let kind = match index % 3 {
        0 => HitObjectKind::Slider { tracking: false },
        1 => HitObjectKind::Spinner { spinning: false },
        _ => HitObjectKind::Circle,
    };
    let kiai = in_kiai_section(clock.elapsed_s);
    let angle = index as f32 * 2.4;
    let position = Vec2::from_angle(angle) * HIT_OBJECT_RING_RADIUS;
    let color = if kiai {
        Color::srgba(1.0, 0.55, 0.78, 0.8)
    } else {
        Color::srgba(0.55, 0.62, 0.70, 0.8)
    };

    commands.spawn((
        Name::new("ScriptedHitObject"),
        TrackedHitObject {
            alive: true,
            kiai,
            kind,
        },
        HitObjectLifetime {
            remaining_s: HIT_OBJECT_LIFETIME_S,
        },
        Sprite::from_color(color, Vec2::splat(48.0)),
        Transform::from_xyz(position.x, position.y, HIT_OBJECT_Z),
        ChildOf(playfield),
    ));
}

fn update_hit_object_engagement(
    input_state: Res<SpewInputState>,
    mut hit_object_query: Query<&mut TrackedHitObject>,
) {
    let engaged = input_state.latches.is_held(SpewAction::LeftButton)
        || input_state.latches.is_held(SpewAction::RightButton);

    for mut hit_object in &mut hit_object_query {
        let kind = match hit_object.kind {
            HitObjectKind::Circle => HitObjectKind::Circle,
            HitObjectKind::Slider { .. } => HitObjectKind::Slider { tracking: engaged },
            HitObjectKind::Spinner { .. } => HitObjectKind::Spinner { spinning: engaged },
        };
        if hit_object.kind != kind {
            hit_object.kind = kind;
        }
    }
}

fn expire_hit_objects(
    mut commands: Commands,
    time: Res<Time>,
    mut hit_object_query: Query<(Entity, &mut TrackedHitObject, &mut HitObjectLifetime)>,
) {
    let dt = time.delta_secs();
    for (entity, mut hit_object, mut lifetime) in &mut hit_object_query {
        lifetime.remaining_s -= dt;
        if lifetime.remaining_s > 0.0 {
            continue;
        }

        hit_object.alive = false;
        commands.entity(entity).try_despawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_schedule_occupies_the_tail_of_each_cycle() {
        let playfield = PlayfieldConfig {
            enabled: true,
            break_every_seconds: 20.0,
            break_length_seconds: 6.0,
            hit_object_interval_seconds: 1.0,
        };

        assert!(!scheduled_break(&playfield, 0.0));
        assert!(!scheduled_break(&playfield, 13.9));
        assert!(scheduled_break(&playfield, 14.0));
        assert!(scheduled_break(&playfield, 19.9));
        assert!(!scheduled_break(&playfield, 20.5));
        assert!(scheduled_break(&playfield, 35.0));
    }

    #[test]
    fn zero_length_breaks_never_start() {
        let playfield = PlayfieldConfig {
            enabled: true,
            break_every_seconds: 20.0,
            break_length_seconds: 0.0,
            hit_object_interval_seconds: 1.0,
        };
        assert!(!scheduled_break(&playfield, 19.99));
    }

    #[test]
    fn kiai_sections_alternate() {
        assert!(!in_kiai_section(0.0));
        assert!(!in_kiai_section(7.9));
        assert!(in_kiai_section(8.0));
        assert!(!in_kiai_section(16.5));
    }

    #[test]
    fn held_button_engages_sliders_and_spinners() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .init_resource::<SpewInputState>()
            .add_systems(Update, update_hit_object_engagement);

        let slider = app
            .world_mut()
            .spawn(TrackedHitObject {
                alive: true,
                kiai: true,
                kind: HitObjectKind::Slider { tracking: false },
            })
            .id();
        let circle = app
            .world_mut()
            .spawn(TrackedHitObject {
                alive: true,
                kiai: true,
                kind: HitObjectKind::Circle,
            })
            .id();

        app.world_mut()
            .resource_mut::<SpewInputState>()
            .latches
            .on_pressed(SpewAction::RightButton);
        app.update();

        let world = app.world();
        assert_eq!(
            world.get::<TrackedHitObject>(slider).map(|object| object.kind),
            Some(HitObjectKind::Slider { tracking: true })
        );
        assert_eq!(
            world.get::<TrackedHitObject>(circle).map(|object| object.kind),
            Some(HitObjectKind::Circle)
        );
    }
}
