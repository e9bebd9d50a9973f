use crate::assets::AssetRegistry;
use crate::config::GameConfig;
use bevy::asset::LoadState;
use bevy::prelude::*;

const MIN_LOADING_SCREEN_SECONDS: f64 = 0.25;

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Boot,
    Loading,
    Playing,
    Pause,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera)
            .add_systems(OnEnter(GameState::Boot), enter_boot)
            .add_systems(Update, boot_to_loading.run_if(in_state(GameState::Boot)))
            .add_systems(OnEnter(GameState::Loading), enter_loading)
            .add_systems(
                Update,
                loading_to_playing.run_if(in_state(GameState::Loading)),
            )
            .add_systems(OnEnter(GameState::Playing), enter_playing)
            .add_systems(
                Update,
                playing_controls.run_if(in_state(GameState::Playing)),
            )
            .add_systems(OnEnter(GameState::Pause), enter_pause)
            .add_systems(Update, pause_controls.run_if(in_state(GameState::Pause)));
    }
}

#[derive(Resource, Debug, Clone, Copy)]
struct LoadingScreenState {
    entered_at_s: f64,
}

fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}

fn enter_boot() {
    info!("Entered state: Boot");
}

fn boot_to_loading(mut next_state: ResMut<NextState<GameState>>) {
    next_state.set(GameState::Loading);
}

fn enter_loading(mut commands: Commands, time: Res<Time>) {
    info!("Entered state: Loading");
    commands.insert_resource(LoadingScreenState {
        entered_at_s: time.elapsed_secs_f64(),
    });
}

fn loading_to_playing(
    mut commands: Commands,
    time: Res<Time>,
    asset_server: Res<AssetServer>,
    config: Option<Res<GameConfig>>,
    registry: Option<Res<AssetRegistry>>,
    loading_state: Option<Res<LoadingScreenState>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let (Some(_config), Some(registry), Some(loading_state)) = (config, registry, loading_state)
    else {
        return;
    };

    let has_min_time =
        time.elapsed_secs_f64() - loading_state.entered_at_s >= MIN_LOADING_SCREEN_SECONDS;
    if !has_min_time {
        return;
    }

    let mut failed_count = 0;
    for handle in registry.pending_handles() {
        if matches!(asset_server.load_state(handle.id()), LoadState::Failed(_)) {
            failed_count += 1;
            continue;
        }
        if !asset_server.is_loaded_with_dependencies(handle.id()) {
            return;
        }
    }

    if failed_count > 0 {
        warn!("{failed_count} sprite(s) failed to load, continuing to play state.");
    }

    commands.remove_resource::<LoadingScreenState>();
    next_state.set(GameState::Playing);
}

fn enter_playing() {
    info!("Entered state: Playing");
}

fn playing_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::Pause);
    }
}

fn enter_pause() {
    info!("Entered state: Pause");
}

fn pause_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::Playing);
    }
}
