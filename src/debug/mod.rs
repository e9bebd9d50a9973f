use crate::config::{GameConfig, ParticlesFile};
use crate::gameplay::cursor_particles::activity::{BreakTimeSignal, TrackedHitObject};
use crate::gameplay::cursor_particles::StarSpewer;
use crate::gameplay::playfield::PlayfieldClock;
use crate::states::GameState;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<KeybindOverlayState>()
            .init_resource::<ParticleTuningPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, toggle_keybind_overlay)
            .add_systems(Update, toggle_particle_tuning_panel)
            .add_systems(Update, sync_keybind_overlay_visibility)
            .add_systems(
                Update,
                update_debug_overlay_text
                    .run_if(in_state(GameState::Playing))
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                particle_tuning_panel_ui
                    .run_if(in_state(GameState::Playing))
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct DebugOverlayText;

#[derive(Component)]
struct KeybindOverlayText;

#[derive(Resource, Debug, Clone, Default)]
struct KeybindOverlayState {
    visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct SpewerTuningParams {
    id: String,
    particles_per_second: u32,
    max_lifetime_ms: f32,
    gravity: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct ParticleTuningParams {
    velocity_window_ms: f64,
    velocity_bias_multiplier: f32,
    lifetime_min_ms: f32,
    spewers: Vec<SpewerTuningParams>,
}

impl ParticleTuningParams {
    fn from_particles(particles: &ParticlesFile) -> Self {
        Self {
            velocity_window_ms: particles.emission.velocity_window_ms,
            velocity_bias_multiplier: particles.emission.velocity_bias_multiplier,
            lifetime_min_ms: particles.emission.lifetime_min_ms,
            spewers: particles
                .spewers
                .iter()
                .map(|spewer| SpewerTuningParams {
                    id: spewer.id.clone(),
                    particles_per_second: spewer.particles_per_second,
                    max_lifetime_ms: spewer.max_lifetime_ms,
                    gravity: spewer.gravity,
                })
                .collect(),
        }
    }

    fn apply_to_particles(&self, particles: &mut ParticlesFile) {
        particles.emission.velocity_window_ms = self.velocity_window_ms;
        particles.emission.velocity_bias_multiplier = self.velocity_bias_multiplier;
        particles.emission.lifetime_min_ms = self.lifetime_min_ms;

        for params in &self.spewers {
            if let Some(spewer) = particles
                .spewers
                .iter_mut()
                .find(|spewer| spewer.id == params.id)
            {
                spewer.particles_per_second = params.particles_per_second;
                spewer.max_lifetime_ms = params.max_lifetime_ms;
                spewer.gravity = params.gravity;
            }
        }
    }
}

#[derive(Resource, Debug, Default)]
struct ParticleTuningPanelState {
    visible: bool,
    params: Option<ParticleTuningParams>,
    status: String,
}

fn spawn_debug_overlay(
    mut commands: Commands,
    keybind_overlay: Res<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
    existing_overlay: Query<Entity, With<DebugOverlayText>>,
) {
    if !existing_overlay.is_empty() {
        return;
    }

    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    commands.spawn((
        DebugOverlayText,
        Text::new("debug overlay initializing..."),
        TextFont {
            font_size: 16.0,
            ..default()
        },
        TextColor(Color::srgb(0.92, 0.95, 0.97)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(12.0),
            ..default()
        },
        ZIndex(100),
    ));

    commands.spawn((
        KeybindOverlayText,
        Text::new(keybind_overlay_text()),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        TextColor(Color::srgb(0.90, 0.94, 0.97)),
        BackgroundColor(Color::srgba(0.06, 0.08, 0.10, 0.82)),
        BorderColor::all(Color::srgba(0.60, 0.68, 0.74, 0.9)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(172.0),
            padding: UiRect::axes(Val::Px(10.0), Val::Px(8.0)),
            border: UiRect::all(Val::Px(1.0)),
            ..default()
        },
        if keybind_overlay.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        },
        ZIndex(100),
    ));
}

fn update_debug_overlay_text(
    diagnostics: Res<DiagnosticsStore>,
    break_signal: Option<Res<BreakTimeSignal>>,
    clock: Option<Res<PlayfieldClock>>,
    hit_object_query: Query<&TrackedHitObject>,
    spewer_query: Query<&StarSpewer>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);

    let break_time = match break_signal {
        Some(signal) if signal.is_break_time => "yes",
        Some(_) => "no",
        None => "n/a",
    };
    let break_override = match clock.and_then(|clock| clock.break_override) {
        Some(true) => " (forced on)",
        Some(false) => " (forced off)",
        None => "",
    };
    let kiai_engaged = hit_object_query
        .iter()
        .filter(|object| object.is_kiai_engaged())
        .count();

    let mut spewers: Vec<&StarSpewer> = spewer_query.iter().collect();
    spewers.sort_by(|a, b| a.id.cmp(&b.id));

    *text = Text::new(format!(
        "FPS: {fps:>5.1}\nBreak Time: {break_time}{break_override}\nHit Objects: {total} ({kiai_engaged} kiai engaged)\n{spewer_lines}Hotkeys: H help | P particle tune | F5 reload config | B break",
        total = hit_object_query.iter().count(),
        spewer_lines = spewer_overlay_lines(&spewers),
    ));
}

fn spewer_overlay_lines(spewers: &[&StarSpewer]) -> String {
    let mut lines = String::new();
    for spewer in spewers {
        let velocity = spewer.core.anchor_velocity();
        let _ = writeln!(
            lines,
            "{id}: {state} | {rate}/s | dir {direction} | v ({vx:>6.2}, {vy:>6.2}) px/ms | live {live}/{capacity}",
            id = spewer.id,
            rate = spewer.core.settings().particles_per_second,
            state = match (spewer.core.is_active(), spewer.core.is_present()) {
                (true, _) => "on",
                (false, true) => "fading",
                (false, false) => "off",
            },
            direction = spewer.core.direction().label(),
            vx = velocity.x,
            vy = velocity.y,
            live = spewer.core.live_particle_count(),
            capacity = spewer.core.pool().capacity(),
        );
    }
    lines
}

fn toggle_keybind_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
) {
    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    if keyboard.just_pressed(KeyCode::KeyH) {
        state.visible = !state.visible;
        info!(
            "Debug keybind panel {}.",
            if state.visible { "shown" } else { "hidden" }
        );
    }
}

fn sync_keybind_overlay_visibility(
    state: Res<KeybindOverlayState>,
    mut query: Query<&mut Visibility, With<KeybindOverlayText>>,
) {
    if !state.is_changed() {
        return;
    }

    let next_visibility = if state.visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };

    for mut visibility in &mut query {
        *visibility = next_visibility;
    }
}

fn toggle_particle_tuning_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<ParticleTuningPanelState>,
    config: Option<Res<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyP) {
        return;
    }

    panel_state.visible = !panel_state.visible;
    if panel_state.visible {
        if let Some(config) = config {
            panel_state.params = Some(ParticleTuningParams::from_particles(&config.particles));
        }
        info!("Particle tuning panel shown.");
    } else {
        info!("Particle tuning panel hidden.");
    }
}

fn particle_tuning_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<ParticleTuningPanelState>,
    mut config: ResMut<GameConfig>,
    mut clock: Option<ResMut<PlayfieldClock>>,
) {
    if !panel_state.visible {
        return;
    }

    let mut params = panel_state
        .params
        .clone()
        .unwrap_or_else(|| ParticleTuningParams::from_particles(&config.particles));

    let mut window_open = panel_state.visible;
    let mut params_changed = false;
    let mut reload_clicked = false;
    let mut apply_clicked = false;
    let mut break_override = clock.as_ref().and_then(|clock| clock.break_override);
    let status = panel_state.status.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Cursor Star Tuning")
        .open(&mut window_open)
        .resizable(true)
        .default_width(520.0)
        .show(ctx, |ui| {
            ui.collapsing("Emission", |ui| {
                let mut window_ms = params.velocity_window_ms as f32;
                if tuning_slider_row(ui, "velocity_window_ms", &mut window_ms, 1.0..=100.0, 0.5) {
                    params.velocity_window_ms = window_ms as f64;
                    params_changed = true;
                }
                params_changed |= tuning_slider_row(
                    ui,
                    "velocity_bias_multiplier",
                    &mut params.velocity_bias_multiplier,
                    0.0..=120.0,
                    0.5,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "lifetime_min_ms",
                    &mut params.lifetime_min_ms,
                    1.0..=3000.0,
                    5.0,
                );
            });

            for spewer in &mut params.spewers {
                ui.collapsing(format!("Spewer `{}`", spewer.id), |ui| {
                    ui.horizontal(|ui| {
                        ui.label("particles_per_second");
                        params_changed |= edit_committed(
                            &ui.add(egui::Slider::new(&mut spewer.particles_per_second, 1..=240)),
                        );
                    });
                    params_changed |= tuning_slider_row(
                        ui,
                        "max_lifetime_ms",
                        &mut spewer.max_lifetime_ms,
                        1.0..=5000.0,
                        5.0,
                    );
                    params_changed |= tuning_slider_row(
                        ui,
                        "gravity",
                        &mut spewer.gravity,
                        -1000.0..=1000.0,
                        1.0,
                    );
                });
            }

            ui.separator();
            ui.horizontal(|ui| {
                ui.label("Break time:");
                ui.radio_value(&mut break_override, None, "schedule");
                ui.radio_value(&mut break_override, Some(true), "on");
                ui.radio_value(&mut break_override, Some(false), "off");
            });

            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Reload From Config").clicked() {
                    reload_clicked = true;
                }
                if ui.button("Apply To particles.toml").clicked() {
                    apply_clicked = true;
                }
            });

            if !status.is_empty() {
                ui.separator();
                ui.label(status);
            }
        });

    panel_state.visible = window_open;
    if let Some(clock) = clock.as_mut() {
        if clock.break_override != break_override {
            clock.break_override = break_override;
        }
    }

    if reload_clicked {
        panel_state.params = Some(ParticleTuningParams::from_particles(&config.particles));
        panel_state.status = "Reloaded values from current config.".to_string();
        return;
    }

    panel_state.params = Some(params.clone());

    if params_changed {
        panel_state.status = match apply_particle_tuning_to_runtime_config(&mut config, &params) {
            Ok(()) => "Live-tuning active (in-memory config updated).".to_string(),
            Err(error) => error,
        };
    }

    if apply_clicked {
        match persist_particle_tuning_and_reload(&mut config, &params) {
            Ok(message) => {
                panel_state.status = message;
                panel_state.params = Some(ParticleTuningParams::from_particles(&config.particles));
            }
            Err(error) => panel_state.status = error,
        }
    }
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: std::ops::RangeInclusive<f32>,
    drag_speed: f32,
) -> bool {
    let mut committed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        committed |= edit_committed(
            &ui.add(egui::Slider::new(value, slider_range).show_value(false)),
        );
        committed |= edit_committed(&ui.add(egui::DragValue::new(value).speed(drag_speed as f64)));
    });
    committed
}

// Drags apply once on release; clicks and typed values apply immediately.
fn edit_committed(response: &egui::Response) -> bool {
    response.drag_stopped() || (response.changed() && !response.dragged())
}

fn apply_particle_tuning_to_runtime_config(
    config: &mut GameConfig,
    params: &ParticleTuningParams,
) -> Result<(), String> {
    let mut particles = config.particles.clone();
    params.apply_to_particles(&mut particles);

    let tuned = GameConfig::from_files(config.game.clone(), config.assets.clone(), particles)
        .map_err(|error| format!("Tuning rejected: {error}"))?;
    *config = tuned;
    Ok(())
}

fn persist_particle_tuning_and_reload(
    config: &mut GameConfig,
    params: &ParticleTuningParams,
) -> Result<String, String> {
    let path = Path::new("config").join("particles.toml");
    let original_raw = fs::read_to_string(&path)
        .map_err(|error| format!("Failed reading `{}`: {error}", path.display()))?;
    let mut root: toml::Value = toml::from_str(&original_raw)
        .map_err(|error| format!("Failed parsing `{}`: {error}", path.display()))?;

    write_params_to_toml_value(&mut root, params)?;

    let updated_raw = toml::to_string_pretty(&root)
        .map_err(|error| format!("Failed serializing particles TOML: {error}"))?;
    fs::write(&path, updated_raw)
        .map_err(|error| format!("Failed writing `{}`: {error}", path.display()))?;

    match GameConfig::load_from_dir(Path::new("config")) {
        Ok(new_config) => {
            *config = new_config;
            Ok(format!(
                "Applied tuning and saved to {}.",
                path.to_string_lossy()
            ))
        }
        Err(error) => {
            let _ = fs::write(&path, original_raw);
            if let Ok(restored) = GameConfig::load_from_dir(Path::new("config")) {
                *config = restored;
            }
            Err(format!(
                "Apply failed validation: {error}. Reverted `{}`.",
                path.display()
            ))
        }
    }
}

fn write_params_to_toml_value(
    root: &mut toml::Value,
    params: &ParticleTuningParams,
) -> Result<(), String> {
    let Some(emission) = root.get_mut("emission").and_then(toml::Value::as_table_mut) else {
        return Err("particles.toml: missing or invalid `emission` table".to_string());
    };
    set_toml_float(emission, "velocity_window_ms", params.velocity_window_ms as f32)?;
    set_toml_float(
        emission,
        "velocity_bias_multiplier",
        params.velocity_bias_multiplier,
    )?;
    set_toml_float(emission, "lifetime_min_ms", params.lifetime_min_ms)?;

    let Some(spewers_array) = root.get_mut("spewers").and_then(toml::Value::as_array_mut) else {
        return Err("particles.toml: missing or invalid `spewers` array".to_string());
    };

    for spewer in &params.spewers {
        let Some(spewer_table) = spewers_array.iter_mut().find_map(|spewer_value| {
            let table = spewer_value.as_table_mut()?;
            if table.get("id").and_then(toml::Value::as_str) == Some(spewer.id.as_str()) {
                Some(table)
            } else {
                None
            }
        }) else {
            return Err(format!(
                "particles.toml: could not find spewer with id `{}`",
                spewer.id
            ));
        };

        spewer_table.insert(
            "particles_per_second".to_string(),
            toml::Value::Integer(i64::from(spewer.particles_per_second)),
        );
        set_toml_float(spewer_table, "max_lifetime_ms", spewer.max_lifetime_ms)?;
        set_toml_float(spewer_table, "gravity", spewer.gravity)?;
    }

    Ok(())
}

fn set_toml_float(
    table: &mut toml::map::Map<String, toml::Value>,
    key: &str,
    value: f32,
) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("`{key}` is not a finite number"));
    }

    table.insert(key.to_string(), toml::Value::Float(value as f64));
    Ok(())
}

fn keybind_overlay_text() -> &'static str {
    "Keybinds\n\
H - Toggle this panel\n\
P - Toggle particle tuning panel\n\
F5 - Hot-reload config\n\
Z / Left mouse - Spew left\n\
X / Right mouse - Spew right\n\
B - Force break time on / off / schedule\n\
Esc - Pause / resume"
}
