use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";

pub const SPEWER_ROLE_BREAK: &str = "break";
pub const SPEWER_ROLE_KIAI: &str = "kiai";
pub const MAX_PARTICLES_PER_SECOND: u32 = 1_000;
pub const MAX_PARTICLE_LIFETIME_MS: f32 = 10_000.0;

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey)
            .add_systems(
                Update,
                sync_window_title.run_if(resource_exists_and_changed::<GameConfig>),
            );
    }
}

fn sync_window_title(
    config: Res<GameConfig>,
    mut window_query: Query<&mut Window, With<PrimaryWindow>>,
) {
    let Ok(mut window) = window_query.single_mut() else {
        return;
    };
    if window.title != config.game.app.window_title {
        window.title = config.game.app.window_title.clone();
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");

    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: {} spewers, {} sprites, velocity window {:.1} ms, bias x{:.1}.",
        config.spewers_by_id.len(),
        config.sprite_assets_by_id.len(),
        config.particles.emission.velocity_window_ms,
        config.particles.emission.velocity_bias_multiplier,
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub assets: AssetsFile,
    pub particles: ParticlesFile,
    pub sprite_assets_by_id: HashMap<String, SpriteAssetConfig>,
    pub spewers_by_id: HashMap<String, SpewerConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let assets: AssetsFile = read_toml(&config_dir.join("assets.toml"))?;
        let particles: ParticlesFile = read_toml(&config_dir.join("particles.toml"))?;

        Self::from_files(game, assets, particles)
    }

    pub fn from_files(
        game: GameFile,
        assets: AssetsFile,
        particles: ParticlesFile,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            sprite_assets_by_id: to_index("assets.toml::sprites", &assets.sprites)?,
            spewers_by_id: to_index("particles.toml::spewers", &particles.spewers)?,
            game,
            assets,
            particles,
        };

        config.validate_references()?;
        Ok(config)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        let emission = &self.particles.emission;

        if !(emission.velocity_window_ms.is_finite() && emission.velocity_window_ms > 0.0) {
            return Err(ConfigError::Validation(
                "particles.toml::emission.velocity_window_ms must be finite and > 0".to_string(),
            ));
        }
        if !emission.velocity_bias_multiplier.is_finite() {
            return Err(ConfigError::Validation(
                "particles.toml::emission.velocity_bias_multiplier must be finite".to_string(),
            ));
        }
        if !(emission.lifetime_min_ms.is_finite()
            && emission.lifetime_min_ms > 0.0
            && emission.lifetime_min_ms <= MAX_PARTICLE_LIFETIME_MS)
        {
            return Err(ConfigError::Validation(format!(
                "particles.toml::emission.lifetime_min_ms must be in (0, {MAX_PARTICLE_LIFETIME_MS}]"
            )));
        }

        let ranges = [
            ("emission.angular_velocity", emission.angular_velocity),
            ("emission.start_scale", emission.start_scale),
            ("emission.end_scale", emission.end_scale),
            ("emission.directions.left.x", emission.directions.left.x),
            ("emission.directions.left.y", emission.directions.left.y),
            ("emission.directions.right.x", emission.directions.right.x),
            ("emission.directions.right.y", emission.directions.right.y),
            ("emission.directions.both.x", emission.directions.both.x),
            ("emission.directions.both.y", emission.directions.both.y),
        ];
        for (label, [min, max]) in ranges {
            if !(min.is_finite() && max.is_finite() && min <= max) {
                return Err(ConfigError::Validation(format!(
                    "particles.toml::{label} must be a finite [min, max] pair with min <= max"
                )));
            }
        }

        for role in [SPEWER_ROLE_BREAK, SPEWER_ROLE_KIAI] {
            let count = self
                .particles
                .spewers
                .iter()
                .filter(|spewer| spewer.role == role)
                .count();
            if count != 1 {
                return Err(ConfigError::Validation(format!(
                    "particles.toml::spewers must contain exactly one `{role}` spewer (found {count})"
                )));
            }
        }

        for (index, spewer) in self.particles.spewers.iter().enumerate() {
            if !matches!(spewer.role.as_str(), SPEWER_ROLE_BREAK | SPEWER_ROLE_KIAI) {
                return Err(ConfigError::Validation(format!(
                    "particles.toml::spewers[{index}].role `{}` is unsupported (expected break/kiai)",
                    spewer.role
                )));
            }
            if !(1..=MAX_PARTICLES_PER_SECOND).contains(&spewer.particles_per_second) {
                return Err(ConfigError::Validation(format!(
                    "particles.toml::spewers[{index}].particles_per_second must be in 1..={MAX_PARTICLES_PER_SECOND}"
                )));
            }
            if !(spewer.max_lifetime_ms >= emission.lifetime_min_ms
                && spewer.max_lifetime_ms <= MAX_PARTICLE_LIFETIME_MS)
            {
                return Err(ConfigError::Validation(format!(
                    "particles.toml::spewers[{index}].max_lifetime_ms must be in [{}, {MAX_PARTICLE_LIFETIME_MS}]",
                    emission.lifetime_min_ms
                )));
            }
            if !spewer.gravity.is_finite() {
                return Err(ConfigError::Validation(format!(
                    "particles.toml::spewers[{index}].gravity must be finite"
                )));
            }
            if !(spewer.sprite_size.is_finite() && spewer.sprite_size > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "particles.toml::spewers[{index}].sprite_size must be finite and > 0"
                )));
            }
            if !spewer
                .color
                .iter()
                .chain(spewer.offset.iter())
                .all(|value| value.is_finite())
            {
                return Err(ConfigError::Validation(format!(
                    "particles.toml::spewers[{index}] color and offset must be finite"
                )));
            }
            if !self.sprite_assets_by_id.contains_key(&spewer.texture) {
                return Err(ConfigError::Validation(format!(
                    "particles.toml::spewers[{index}].texture references unknown sprite id `{}`",
                    spewer.texture
                )));
            }
        }

        for (index, sprite) in self.assets.sprites.iter().enumerate() {
            if sprite.path.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "assets.toml::sprites[{index}].path cannot be empty"
                )));
            }
        }

        let playfield = &self.game.playfield;
        if ![
            playfield.break_every_seconds,
            playfield.break_length_seconds,
            playfield.hit_object_interval_seconds,
        ]
        .iter()
        .all(|value| value.is_finite() && *value >= 0.0)
        {
            return Err(ConfigError::Validation(
                "game.toml::playfield timings must be finite and >= 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    #[serde(default)]
    pub playfield: PlayfieldConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub window_title: String,
    pub debug_overlay: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayfieldConfig {
    #[serde(default = "default_playfield_enabled")]
    pub enabled: bool,
    #[serde(default = "default_break_every_seconds")]
    pub break_every_seconds: f32,
    #[serde(default = "default_break_length_seconds")]
    pub break_length_seconds: f32,
    #[serde(default = "default_hit_object_interval_seconds")]
    pub hit_object_interval_seconds: f32,
}

impl Default for PlayfieldConfig {
    fn default() -> Self {
        Self {
            enabled: default_playfield_enabled(),
            break_every_seconds: default_break_every_seconds(),
            break_length_seconds: default_break_length_seconds(),
            hit_object_interval_seconds: default_hit_object_interval_seconds(),
        }
    }
}

fn default_playfield_enabled() -> bool {
    true
}

fn default_break_every_seconds() -> f32 {
    20.0
}

fn default_break_length_seconds() -> f32 {
    6.0
}

fn default_hit_object_interval_seconds() -> f32 {
    1.5
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsFile {
    #[serde(default)]
    pub sprites: Vec<SpriteAssetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpriteAssetConfig {
    pub id: String,
    pub path: String,
}

impl HasId for SpriteAssetConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticlesFile {
    pub emission: EmissionConfig,
    pub spewers: Vec<SpewerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmissionConfig {
    #[serde(default = "default_velocity_window_ms")]
    pub velocity_window_ms: f64,
    #[serde(default = "default_velocity_bias_multiplier")]
    pub velocity_bias_multiplier: f32,
    #[serde(default = "default_lifetime_min_ms")]
    pub lifetime_min_ms: f32,
    pub angular_velocity: [f32; 2],
    pub start_scale: [f32; 2],
    pub end_scale: [f32; 2],
    pub directions: DirectionSpreadsConfig,
}

fn default_velocity_window_ms() -> f64 {
    15.0
}

fn default_velocity_bias_multiplier() -> f32 {
    40.0
}

fn default_lifetime_min_ms() -> f32 {
    300.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectionSpreadsConfig {
    pub left: SpreadConfig,
    pub right: SpreadConfig,
    pub both: SpreadConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SpreadConfig {
    pub x: [f32; 2],
    pub y: [f32; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpewerConfig {
    pub id: String,
    pub role: String,
    pub particles_per_second: u32,
    pub max_lifetime_ms: f32,
    pub gravity: f32,
    pub color: [f32; 3],
    pub texture: String,
    #[serde(default = "default_sprite_size")]
    pub sprite_size: f32,
    #[serde(default)]
    pub offset: [f32; 2],
}

fn default_sprite_size() -> f32 {
    32.0
}

impl HasId for SpewerConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_particles_file() -> ParticlesFile {
        ParticlesFile {
            emission: EmissionConfig {
                velocity_window_ms: 15.0,
                velocity_bias_multiplier: 40.0,
                lifetime_min_ms: 300.0,
                angular_velocity: [-3.0, 3.0],
                start_scale: [0.5, 1.0],
                end_scale: [0.0, 2.0],
                directions: DirectionSpreadsConfig {
                    left: SpreadConfig {
                        x: [-460.0, 0.0],
                        y: [-40.0, 40.0],
                    },
                    right: SpreadConfig {
                        x: [0.0, 460.0],
                        y: [-40.0, 40.0],
                    },
                    both: SpreadConfig {
                        x: [-460.0, 460.0],
                        y: [-160.0, 160.0],
                    },
                },
            },
            spewers: vec![
                SpewerConfig {
                    id: "break_stars".to_string(),
                    role: SPEWER_ROLE_BREAK.to_string(),
                    particles_per_second: 20,
                    max_lifetime_ms: 1_000.0,
                    gravity: 240.0,
                    color: [1.0, 0.8, 0.9],
                    texture: "star2".to_string(),
                    sprite_size: 32.0,
                    offset: [0.0, 0.0],
                },
                SpewerConfig {
                    id: "kiai_stars".to_string(),
                    role: SPEWER_ROLE_KIAI.to_string(),
                    particles_per_second: 60,
                    max_lifetime_ms: 1_000.0,
                    gravity: 240.0,
                    color: [1.0, 0.8, 0.9],
                    texture: "star2".to_string(),
                    sprite_size: 32.0,
                    offset: [0.0, 0.0],
                },
            ],
        }
    }

    pub(crate) fn sample_game_file() -> GameFile {
        GameFile {
            app: AppConfig {
                window_title: "Cursor Stars".to_string(),
                debug_overlay: true,
            },
            playfield: PlayfieldConfig::default(),
        }
    }

    pub(crate) fn sample_assets_file() -> AssetsFile {
        AssetsFile {
            sprites: vec![SpriteAssetConfig {
                id: "star2".to_string(),
                path: "sprites/star2.png".to_string(),
            }],
        }
    }

    pub(crate) fn sample_config() -> GameConfig {
        GameConfig::from_files(
            sample_game_file(),
            sample_assets_file(),
            sample_particles_file(),
        )
        .expect("sample config is valid")
    }

    fn validation_message(particles: ParticlesFile) -> String {
        GameConfig::from_files(sample_game_file(), sample_assets_file(), particles)
            .expect_err("validation should fail")
            .to_string()
    }

    fn spewer_with_role<'a>(config: &'a GameConfig, role: &str) -> Option<&'a SpewerConfig> {
        config
            .particles
            .spewers
            .iter()
            .find(|spewer| spewer.role == role)
    }

    #[test]
    fn sample_config_indexes_spewers_by_id_and_role() {
        let config = sample_config();
        assert_eq!(config.spewers_by_id.len(), 2);
        assert_eq!(
            spewer_with_role(&config, SPEWER_ROLE_KIAI).map(|spewer| spewer.particles_per_second),
            Some(60)
        );
    }

    #[test]
    fn validation_fails_for_unknown_texture_reference() {
        let mut particles = sample_particles_file();
        particles.spewers[0].texture = "missing_star".to_string();

        let message = validation_message(particles);
        assert!(message.contains("texture"));
        assert!(message.contains("missing_star"));
    }

    #[test]
    fn validation_requires_one_spewer_per_role() {
        let mut particles = sample_particles_file();
        particles.spewers[1].role = SPEWER_ROLE_BREAK.to_string();

        let message = validation_message(particles);
        assert!(message.contains("exactly one `break` spewer (found 2)"));
    }

    #[test]
    fn validation_rejects_inverted_ranges() {
        let mut particles = sample_particles_file();
        particles.emission.directions.both.y = [160.0, -160.0];

        let message = validation_message(particles);
        assert!(message.contains("emission.directions.both.y"));
    }

    #[test]
    fn validation_rejects_lifetime_below_minimum() {
        let mut particles = sample_particles_file();
        particles.spewers[0].max_lifetime_ms = 200.0;

        let message = validation_message(particles);
        assert!(message.contains("max_lifetime_ms"));
    }

    #[test]
    fn validation_rejects_non_finite_lifetimes() {
        let mut particles = sample_particles_file();
        particles.spewers[0].max_lifetime_ms = f32::NAN;
        assert!(validation_message(particles).contains("max_lifetime_ms"));

        let mut particles = sample_particles_file();
        particles.spewers[1].max_lifetime_ms = f32::INFINITY;
        assert!(validation_message(particles).contains("max_lifetime_ms"));

        let mut particles = sample_particles_file();
        particles.emission.lifetime_min_ms = f32::NAN;
        assert!(validation_message(particles).contains("lifetime_min_ms"));
    }

    #[test]
    fn validation_rejects_non_finite_emission_and_spewer_scalars() {
        let mut particles = sample_particles_file();
        particles.emission.velocity_window_ms = f64::NAN;
        assert!(validation_message(particles).contains("velocity_window_ms"));

        let mut particles = sample_particles_file();
        particles.emission.velocity_bias_multiplier = f32::INFINITY;
        assert!(validation_message(particles).contains("velocity_bias_multiplier"));

        let mut particles = sample_particles_file();
        particles.spewers[0].gravity = f32::NEG_INFINITY;
        assert!(validation_message(particles).contains("gravity"));

        let mut particles = sample_particles_file();
        particles.spewers[0].sprite_size = f32::NAN;
        assert!(validation_message(particles).contains("sprite_size"));
    }

    #[test]
    fn validation_bounds_pool_size() {
        let mut particles = sample_particles_file();
        particles.spewers[0].max_lifetime_ms = MAX_PARTICLE_LIFETIME_MS + 1.0;
        assert!(validation_message(particles).contains("max_lifetime_ms"));

        let mut particles = sample_particles_file();
        particles.spewers[0].particles_per_second = MAX_PARTICLES_PER_SECOND + 1;
        assert!(validation_message(particles).contains("particles_per_second"));
    }

    #[test]
    fn nan_literal_in_particles_toml_fails_validation() {
        let mut particles = sample_particles_file();
        let raw = "id = \"break_stars\"\nrole = \"break\"\nparticles_per_second = 20\nmax_lifetime_ms = nan\ngravity = 240.0\ncolor = [1.0, 1.0, 1.0]\ntexture = \"star2\"\n";
        particles.spewers[0] = toml::from_str(raw).expect("toml accepts nan");

        assert!(validation_message(particles).contains("max_lifetime_ms"));
    }

    #[test]
    fn duplicate_spewer_ids_are_rejected() {
        let mut particles = sample_particles_file();
        particles.spewers[1].id = particles.spewers[0].id.clone();

        let message = validation_message(particles);
        assert!(message.contains("duplicate id `break_stars`"));
    }

    #[test]
    fn particles_toml_parses_with_defaults() {
        let raw = r#"
            [emission]
            angular_velocity = [-3.0, 3.0]
            start_scale = [0.5, 1.0]
            end_scale = [0.0, 2.0]

            [emission.directions]
            left = { x = [-460.0, 0.0], y = [-40.0, 40.0] }
            right = { x = [0.0, 460.0], y = [-40.0, 40.0] }
            both = { x = [-460.0, 460.0], y = [-160.0, 160.0] }

            [[spewers]]
            id = "break_stars"
            role = "break"
            particles_per_second = 20
            max_lifetime_ms = 1000.0
            gravity = 240.0
            color = [1.0, 0.8, 0.9]
            texture = "star2"
        "#;

        let particles: ParticlesFile = toml::from_str(raw).expect("parses");
        assert_eq!(particles.emission.velocity_window_ms, 15.0);
        assert_eq!(particles.emission.velocity_bias_multiplier, 40.0);
        assert_eq!(particles.emission.lifetime_min_ms, 300.0);
        assert_eq!(particles.spewers[0].sprite_size, 32.0);
        assert_eq!(particles.spewers[0].offset, [0.0, 0.0]);
    }

    #[test]
    fn shipped_config_directory_is_valid() {
        let config_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join(CONFIG_DIR);
        let config = GameConfig::load_from_dir(&config_dir).expect("shipped config loads");

        assert!(spewer_with_role(&config, SPEWER_ROLE_BREAK).is_some());
        assert!(spewer_with_role(&config, SPEWER_ROLE_KIAI).is_some());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let error = GameConfig::load_from_dir(Path::new("definitely/not/here"))
            .expect_err("load should fail");
        assert!(matches!(error, ConfigError::Io { .. }));
        assert!(error.to_string().contains("game.toml"));
    }
}
