pub mod activity;
pub mod direction;
pub mod spewer;
pub mod tracker;

use crate::assets::AssetRegistry;
use crate::config::{
    EmissionConfig, GameConfig, SpewerConfig, SpreadConfig, SPEWER_ROLE_BREAK,
};
use crate::states::GameState;
use activity::{any_kiai_engaged, BreakTimeSignal, Playfield, TrackedHitObject};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use direction::{DirectionLatches, EmissionPolicy, SpewAction, SpewDirection, VelocitySpread};
use rand::rngs::StdRng;
use rand::SeedableRng;
use spewer::{SpewerCore, SpewerSettings};

const STAR_PARTICLE_Z: f32 = 50.0;

pub struct CursorParticlesPlugin;

impl Plugin for CursorParticlesPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpewInputState>()
            .init_resource::<SpewInputBindings>()
            .add_systems(Startup, spawn_cursor_anchor)
            .add_systems(
                Update,
                (
                    build_star_spewers,
                    follow_cursor_anchor,
                    read_spew_input,
                    mirror_break_time_signal,
                    scan_kiai_hit_objects,
                    advance_star_spewers,
                    sync_star_particle_sprites,
                )
                    .chain()
                    .run_if(in_state(GameState::Playing))
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct CursorAnchor;

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ParticleParent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpewerRole {
    Break,
    Kiai,
}

impl SpewerRole {
    fn from_config(role: &str) -> Self {
        if role == SPEWER_ROLE_BREAK {
            Self::Break
        } else {
            Self::Kiai
        }
    }
}

#[derive(Component, Debug, Clone)]
pub struct StarSpewer {
    pub id: String,
    pub role: SpewerRole,
    pub offset: Vec2,
    pub color: Color,
    pub texture: String,
    pub sprite_size: f32,
    pub core: SpewerCore,
}

#[derive(Component, Debug, Clone, Copy)]
struct StarParticleSprite {
    spewer: Entity,
    slot: usize,
}

#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SpewInputState {
    pub latches: DirectionLatches,
}

#[derive(Resource, Debug, Clone)]
struct SpewInputBindings {
    left_keys: Vec<KeyCode>,
    left_mouse: Vec<MouseButton>,
    right_keys: Vec<KeyCode>,
    right_mouse: Vec<MouseButton>,
}

impl Default for SpewInputBindings {
    fn default() -> Self {
        Self {
            left_keys: vec![KeyCode::KeyZ],
            left_mouse: vec![MouseButton::Left],
            right_keys: vec![KeyCode::KeyX],
            right_mouse: vec![MouseButton::Right],
        }
    }
}

impl SpewInputBindings {
    fn is_held(
        &self,
        action: SpewAction,
        keyboard: Option<&ButtonInput<KeyCode>>,
        mouse: Option<&ButtonInput<MouseButton>>,
    ) -> bool {
        let (keys, buttons) = match action {
            SpewAction::LeftButton => (&self.left_keys, &self.left_mouse),
            SpewAction::RightButton => (&self.right_keys, &self.right_mouse),
        };

        let key_held = keyboard.is_some_and(|keyboard| keys.iter().any(|key| keyboard.pressed(*key)));
        let button_held =
            mouse.is_some_and(|mouse| buttons.iter().any(|button| mouse.pressed(*button)));
        key_held || button_held
    }
}

pub fn spewer_settings(emission: &EmissionConfig, spewer: &SpewerConfig) -> SpewerSettings {
    SpewerSettings {
        particles_per_second: spewer.particles_per_second,
        lifetime_min_ms: emission.lifetime_min_ms,
        max_lifetime_ms: spewer.max_lifetime_ms,
        gravity: spewer.gravity,
        angular_velocity: (emission.angular_velocity[0], emission.angular_velocity[1]),
        start_scale: (emission.start_scale[0], emission.start_scale[1]),
        end_scale: (emission.end_scale[0], emission.end_scale[1]),
        velocity_window_ms: emission.velocity_window_ms,
    }
}

pub fn emission_policy(emission: &EmissionConfig) -> EmissionPolicy {
    let spread = |config: SpreadConfig| {
        VelocitySpread::new((config.x[0], config.x[1]), (config.y[0], config.y[1]))
    };

    EmissionPolicy {
        left: spread(emission.directions.left),
        right: spread(emission.directions.right),
        both: spread(emission.directions.both),
        velocity_bias_multiplier: emission.velocity_bias_multiplier,
    }
}

pub fn to_parent_space(world_position: Vec2, parent: Option<&GlobalTransform>) -> Vec2 {
    match parent {
        Some(parent) => parent
            .affine()
            .inverse()
            .transform_point3(world_position.extend(0.0))
            .truncate(),
        None => world_position,
    }
}

fn spawn_cursor_anchor(mut commands: Commands) {
    commands.spawn((
        Name::new("CursorAnchor"),
        CursorAnchor,
        Transform::default(),
    ));
}

#[allow(clippy::type_complexity)]
fn build_star_spewers(
    mut commands: Commands,
    config: Res<GameConfig>,
    registry: Option<Res<AssetRegistry>>,
    input_state: Res<SpewInputState>,
    existing_query: Query<Entity, Or<(With<StarSpewer>, With<StarParticleSprite>)>>,
    mut spewer_query: Query<&mut StarSpewer>,
    parent_query: Query<Entity, With<ParticleParent>>,
) {
    if !spewer_query.is_empty() && !config.is_changed() {
        return;
    }

    let policy = emission_policy(&config.particles.emission);
    if retune_star_spewers(&config, policy, &mut spewer_query) {
        debug!("Retuned star spewers in place.");
        return;
    }

    for entity in &existing_query {
        commands.entity(entity).try_despawn();
    }

    let parent = parent_query.iter().next();
    let direction = input_state.latches.direction();

    for spewer_config in &config.particles.spewers {
        let settings = spewer_settings(&config.particles.emission, spewer_config);
        let texture = registry
            .as_deref()
            .and_then(|registry| registry.sprite(&spewer_config.texture));
        spawn_star_spewer(
            &mut commands,
            spewer_config,
            settings,
            policy,
            direction,
            texture,
            parent,
        );
    }
}

// Applies new settings to the existing spewers when every spewer keeps its
// sprites. Returns false when a full rebuild is needed.
fn retune_star_spewers(
    config: &GameConfig,
    policy: EmissionPolicy,
    spewer_query: &mut Query<&mut StarSpewer>,
) -> bool {
    if spewer_query.is_empty() || spewer_query.iter().count() != config.particles.spewers.len() {
        return false;
    }

    let keeps_layout = spewer_query.iter().all(|spewer| {
        config.spewers_by_id.get(&spewer.id).is_some_and(|spewer_config| {
            let settings = spewer_settings(&config.particles.emission, spewer_config);
            spewer.role == SpewerRole::from_config(&spewer_config.role)
                && spewer.texture == spewer_config.texture
                && spewer.sprite_size == spewer_config.sprite_size
                && spewer.core.pool().capacity() == settings.pool_capacity()
        })
    });
    if !keeps_layout {
        return false;
    }

    for mut spewer in spewer_query.iter_mut() {
        let Some(spewer_config) = config.spewers_by_id.get(&spewer.id) else {
            return false;
        };
        let settings = spewer_settings(&config.particles.emission, spewer_config);
        let [red, green, blue] = spewer_config.color;
        spewer.offset = Vec2::from_array(spewer_config.offset);
        spewer.color = Color::srgb(red, green, blue);
        spewer.core.retune(settings, policy);
    }
    true
}

fn spawn_star_spewer(
    commands: &mut Commands,
    spewer_config: &SpewerConfig,
    settings: SpewerSettings,
    policy: EmissionPolicy,
    direction: SpewDirection,
    texture: Option<Handle<Image>>,
    parent: Option<Entity>,
) -> Entity {
    let [red, green, blue] = spewer_config.color;
    let color = Color::srgb(red, green, blue);
    let role = SpewerRole::from_config(&spewer_config.role);
    let mut core = SpewerCore::new(settings, policy, StdRng::from_entropy());
    if role == SpewerRole::Break {
        core.set_direction(direction);
    }
    let capacity = core.pool().capacity();

    let spewer = commands
        .spawn((
            Name::new(format!("StarSpewer:{}", spewer_config.id)),
            StarSpewer {
                id: spewer_config.id.clone(),
                role,
                offset: Vec2::from_array(spewer_config.offset),
                color,
                texture: spewer_config.texture.clone(),
                sprite_size: spewer_config.sprite_size,
                core,
            },
        ))
        .id();

    let size = Vec2::splat(spewer_config.sprite_size);
    for slot in 0..capacity {
        let sprite = match texture.clone() {
            Some(image) => Sprite {
                image,
                color,
                custom_size: Some(size),
                ..default()
            },
            None => Sprite::from_color(color, size),
        };

        let mut particle = commands.spawn((
            Name::new("StarParticle"),
            StarParticleSprite { spewer, slot },
            sprite,
            Transform::from_xyz(0.0, 0.0, STAR_PARTICLE_Z),
            Visibility::Hidden,
        ));
        if let Some(parent) = parent {
            particle.insert(ChildOf(parent));
        }
    }

    info!(
        "Built star spewer `{}` ({}, {} particles/s, pool of {capacity}).",
        spewer_config.id, spewer_config.role, settings.particles_per_second
    );
    spewer
}

fn follow_cursor_anchor(
    window_query: Query<&Window, With<PrimaryWindow>>,
    camera_query: Query<(&Camera, &GlobalTransform)>,
    mut anchor_query: Query<&mut Transform, With<CursorAnchor>>,
) {
    let Ok(window) = window_query.single() else {
        return;
    };
    let Some(cursor_position) = window.cursor_position() else {
        return;
    };
    let Some(world_position) = camera_query.iter().find_map(|(camera, camera_transform)| {
        camera
            .viewport_to_world_2d(camera_transform, cursor_position)
            .ok()
    }) else {
        return;
    };

    for mut transform in &mut anchor_query {
        transform.translation.x = world_position.x;
        transform.translation.y = world_position.y;
    }
}

fn read_spew_input(
    bindings: Res<SpewInputBindings>,
    keyboard: Option<Res<ButtonInput<KeyCode>>>,
    mouse: Option<Res<ButtonInput<MouseButton>>>,
    mut input_state: ResMut<SpewInputState>,
    mut spewer_query: Query<&mut StarSpewer>,
) {
    let mut any_event = false;
    for action in [SpewAction::LeftButton, SpewAction::RightButton] {
        let held = bindings.is_held(action, keyboard.as_deref(), mouse.as_deref());
        if held == input_state.latches.is_held(action) {
            continue;
        }

        any_event = true;
        if held {
            input_state.latches.on_pressed(action);
        } else {
            input_state.latches.on_released(action);
        }
    }

    if !any_event {
        return;
    }

    let direction = input_state.latches.direction();
    for mut spewer in &mut spewer_query {
        if spewer.role == SpewerRole::Break {
            spewer.core.set_direction(direction);
        }
    }
}

fn mirror_break_time_signal(
    signal: Option<Res<BreakTimeSignal>>,
    mut spewer_query: Query<&mut StarSpewer>,
) {
    let Some(signal) = signal else {
        return;
    };

    for mut spewer in &mut spewer_query {
        if spewer.role != SpewerRole::Break {
            continue;
        }
        if spewer.core.set_active(signal.is_break_time) {
            debug!(
                "Star spewer `{}` {} (break time).",
                spewer.id,
                if signal.is_break_time { "activated" } else { "deactivated" }
            );
        }
    }
}

fn scan_kiai_hit_objects(
    playfield_query: Query<(), With<Playfield>>,
    hit_object_query: Query<&TrackedHitObject>,
    mut spewer_query: Query<&mut StarSpewer>,
) {
    if playfield_query.is_empty() {
        return;
    }

    let kiai_active = any_kiai_engaged(&hit_object_query);
    for mut spewer in &mut spewer_query {
        if spewer.role != SpewerRole::Kiai {
            continue;
        }
        if spewer.core.set_active(kiai_active) {
            debug!(
                "Star spewer `{}` {} (kiai).",
                spewer.id,
                if kiai_active { "activated" } else { "deactivated" }
            );
        }
    }
}

fn advance_star_spewers(
    time: Res<Time>,
    anchor_query: Query<&Transform, With<CursorAnchor>>,
    parent_query: Query<&GlobalTransform, With<ParticleParent>>,
    mut spewer_query: Query<&mut StarSpewer>,
) {
    let Ok(anchor) = anchor_query.single() else {
        return;
    };
    let parent = parent_query.iter().next();
    let elapsed_ms = time.delta_secs_f64() * 1_000.0;

    for mut spewer in &mut spewer_query {
        let world_position = anchor.translation.truncate() + spewer.offset;
        let position_in_parent = to_parent_space(world_position, parent);
        spewer.core.advance(elapsed_ms, position_in_parent);
    }
}

fn sync_star_particle_sprites(
    spewer_query: Query<&StarSpewer>,
    mut sprite_query: Query<(
        &StarParticleSprite,
        &mut Transform,
        &mut Sprite,
        &mut Visibility,
    )>,
) {
    for (particle, mut transform, mut sprite, mut visibility) in &mut sprite_query {
        let frame = spewer_query
            .get(particle.spewer)
            .ok()
            .and_then(|spewer| {
                spewer
                    .core
                    .frame_for_slot(particle.slot)
                    .map(|frame| (frame, spewer.color))
            });

        let Some((frame, base_color)) = frame else {
            if *visibility != Visibility::Hidden {
                *visibility = Visibility::Hidden;
            }
            continue;
        };

        *visibility = Visibility::Inherited;
        transform.translation = frame.position.extend(STAR_PARTICLE_Z);
        transform.rotation = Quat::from_rotation_z(frame.rotation);
        transform.scale = Vec3::splat(frame.scale);

        let mut color = base_color;
        color.set_alpha(frame.alpha);
        sprite.color = color;
    }
}
